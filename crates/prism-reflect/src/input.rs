//! The input stream: tree document to component graph.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::component::{Pointee, Reflect};
use crate::document::{describe, NodeShape, ShapeError, META_OWNED, META_REF};
use crate::handle::{Own, Weak};
use crate::identity::InstanceId;
use crate::persist::Persist;
use crate::registry::TypeRegistry;
use crate::ReflectError;

// ---------------------------------------------------------------------------
// InputStream
// ---------------------------------------------------------------------------

/// State of one load pass.
///
/// Maps every document address loaded so far to the identity of the
/// instance rebuilt for it. An address is recorded *before* the instance's
/// fields are loaded, so references from inside a subtree to its own root
/// resolve.
#[derive(Debug)]
pub struct InputStream<'r> {
    registry: &'r TypeRegistry,
    identities: HashMap<u64, InstanceId>,
    path: Vec<String>,
}

impl<'r> InputStream<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self {
            registry,
            identities: HashMap::new(),
            path: Vec::new(),
        }
    }

    pub fn registry(&self) -> &'r TypeRegistry {
        self.registry
    }

    /// Number of owning nodes loaded so far.
    pub fn owned_count(&self) -> usize {
        self.identities.len()
    }

    /// Identity rebuilt for the document address, if already loaded.
    pub fn resolve_address(&self, address: u64) -> Option<InstanceId> {
        self.identities.get(&address).copied()
    }

    // -- leaves ---------------------------------------------------------------

    /// Read a scalar through its serde representation.
    pub fn read_scalar<S: DeserializeOwned>(&self, node: &Value) -> Result<S, ReflectError> {
        S::deserialize(node).map_err(|e| self.malformed(format!("invalid scalar: {e}")))
    }

    /// Load any persistable value.
    pub fn load<P: Persist>(&mut self, node: &Value) -> Result<P, ReflectError> {
        P::load(node, self)
    }

    // -- component slots ------------------------------------------------------

    /// Load an owning slot.
    ///
    /// Null yields the null handle. An `"owned"` node is constructed from the
    /// registry entry named by its `type`, its address is recorded, and then
    /// its fields are loaded.
    ///
    /// # Errors
    ///
    /// - [`ReflectError::InvalidOwnershipTag`] for a `"ref"` (or fixed) node.
    /// - [`ReflectError::UnknownType`] if `type` is not registered; nothing
    ///   is constructed in that case.
    /// - [`ReflectError::TypeMismatch`] if the named type does not fit `T`.
    /// - [`ReflectError::MultipleStrongReference`] if the address was already
    ///   loaded as an owning node in this pass.
    pub fn load_owning<T: Pointee + ?Sized>(&mut self, node: &Value) -> Result<Own<T>, ReflectError> {
        let (address, type_name, val) = match self.shape(node)? {
            NodeShape::Null => return Ok(Own::null()),
            NodeShape::Owned {
                address,
                type_name,
                val,
            } => (address, type_name, val),
            other => {
                return Err(ReflectError::InvalidOwnershipTag {
                    expected: META_OWNED,
                    found: other.tag().to_owned(),
                })
            }
        };

        let registry = self.registry;
        let info = registry.lookup(type_name)?;
        if self.identities.contains_key(&address) {
            return Err(ReflectError::MultipleStrongReference { address });
        }
        let mut instance = T::construct(registry, type_name)?;

        let id = InstanceId::fresh();
        self.identities.insert(address, id);

        info.load(instance.component_mut(), val, self)?;

        tracing::trace!(address, instance = %id, type_name, "loaded owned node");
        Ok(Own::with_id(id, instance))
    }

    /// Load a non-owning slot.
    ///
    /// # Errors
    ///
    /// - [`ReflectError::InvalidOwnershipTag`] for an `"owned"` (or fixed)
    ///   node.
    /// - [`ReflectError::UnresolvedReference`] if the address has not been
    ///   loaded earlier in this pass.
    pub fn load_weak<T: ?Sized>(&mut self, node: &Value) -> Result<Weak<T>, ReflectError> {
        match self.shape(node)? {
            NodeShape::Null => Ok(Weak::null()),
            NodeShape::Ref { address } => self
                .resolve_address(address)
                .map(Weak::from_id)
                .ok_or(ReflectError::UnresolvedReference { address }),
            other => Err(ReflectError::InvalidOwnershipTag {
                expected: META_REF,
                found: other.tag().to_owned(),
            }),
        }
    }

    /// Load a fixed-type node into a fresh default `T`.
    pub fn load_fixed<T: Reflect>(&mut self, node: &Value) -> Result<T, ReflectError> {
        let mut value = T::default();
        self.load_fixed_into(&mut value, node)?;
        Ok(value)
    }

    /// Load a fixed-type node into an existing value.
    ///
    /// # Errors
    ///
    /// - [`ReflectError::UnknownType`] if `T` is not registered.
    /// - [`ReflectError::TypeMismatch`] if the recorded type name is not
    ///   `T::TYPE_NAME`.
    pub fn load_fixed_into<T: Reflect>(&mut self, value: &mut T, node: &Value) -> Result<(), ReflectError> {
        self.registry.require::<T>()?;
        let (type_name, val) = match self.shape(node)? {
            NodeShape::Fixed { type_name, val } => (type_name, val),
            NodeShape::Null => {
                return Err(self.malformed(format!(
                    "fixed-type slot for '{}' cannot be null",
                    T::TYPE_NAME
                )))
            }
            other => {
                return Err(ReflectError::InvalidOwnershipTag {
                    expected: "fixed",
                    found: other.tag().to_owned(),
                })
            }
        };
        if type_name != T::TYPE_NAME {
            return Err(ReflectError::TypeMismatch {
                expected: T::TYPE_NAME.to_owned(),
                found: type_name.to_owned(),
            });
        }
        T::schema().load(value, val, self)
    }

    // -- helpers --------------------------------------------------------------

    fn shape<'v>(&self, node: &'v Value) -> Result<NodeShape<'v>, ReflectError> {
        NodeShape::parse(node).map_err(|e| match e {
            ShapeError::UnknownTag(tag) => ReflectError::InvalidOwnershipTag {
                expected: "owned or ref",
                found: tag,
            },
            ShapeError::Malformed(details) => self.malformed(details),
        })
    }

    /// Build a [`ReflectError::MalformedDocument`] at the current path.
    pub fn malformed(&self, details: impl Into<String>) -> ReflectError {
        ReflectError::MalformedDocument {
            path: self.path_string(),
            details: details.into(),
        }
    }

    /// Fail unless `node` is an array; returns its elements.
    pub fn expect_array<'v>(&self, node: &'v Value) -> Result<&'v Vec<Value>, ReflectError> {
        node.as_array()
            .ok_or_else(|| self.malformed(format!("expected an array, found {}", describe(node))))
    }

    // -- path tracking --------------------------------------------------------

    pub fn enter(&mut self, segment: impl ToString) {
        self.path.push(segment.to_string());
    }

    pub fn leave(&mut self) {
        self.path.pop();
    }

    pub fn path_string(&self) -> String {
        format!("/{}", self.path.join("/"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use serde_json::json;
    use std::sync::OnceLock;

    #[derive(Debug, Default)]
    struct IntLeaf {
        value: i32,
    }

    impl Reflect for IntLeaf {
        const TYPE_NAME: &'static str = "IntLeaf";

        fn schema() -> &'static Schema<Self> {
            static SCHEMA: OnceLock<Schema<IntLeaf>> = OnceLock::new();
            SCHEMA.get_or_init(|| Schema::<Self>::new().field("value", |s| &s.value, |s| &mut s.value))
        }
    }

    #[derive(Debug, Default)]
    struct SelfRef {
        me: Weak<SelfRef>,
    }

    impl Reflect for SelfRef {
        const TYPE_NAME: &'static str = "SelfRef";

        fn schema() -> &'static Schema<Self> {
            static SCHEMA: OnceLock<Schema<SelfRef>> = OnceLock::new();
            SCHEMA.get_or_init(|| Schema::<Self>::new().field("me", |s| &s.me, |s| &mut s.me))
        }
    }

    fn registry() -> TypeRegistry {
        let mut reg = TypeRegistry::new();
        reg.register::<IntLeaf>();
        reg.register::<SelfRef>();
        reg
    }

    #[test]
    fn load_owned_int_leaf() {
        let reg = registry();
        let mut input = InputStream::new(&reg);
        let doc = json!({"meta": "owned", "address": 77, "type": "IntLeaf", "val": {"value": 5}});
        let leaf: Own<IntLeaf> = input.load_owning(&doc).unwrap();
        assert_eq!(leaf.get().unwrap().value, 5);
        assert_eq!(input.resolve_address(77), leaf.id());
        assert_ne!(leaf.id().unwrap().to_raw(), 77);
    }

    #[test]
    fn ref_in_owning_slot_is_rejected() {
        let reg = registry();
        let mut input = InputStream::new(&reg);
        let err = input
            .load_owning::<IntLeaf>(&json!({"meta": "ref", "address": 1}))
            .unwrap_err();
        assert!(matches!(err, ReflectError::InvalidOwnershipTag { expected: "owned", found } if found == "ref"));
    }

    #[test]
    fn owned_in_weak_slot_is_rejected() {
        let reg = registry();
        let mut input = InputStream::new(&reg);
        let doc = json!({"meta": "owned", "address": 1, "type": "IntLeaf", "val": {}});
        let err = input.load_weak::<IntLeaf>(&doc).unwrap_err();
        assert!(matches!(err, ReflectError::InvalidOwnershipTag { expected: "ref", .. }));
    }

    #[test]
    fn unknown_meta_tag_is_rejected() {
        let reg = registry();
        let mut input = InputStream::new(&reg);
        let err = input
            .load_owning::<IntLeaf>(&json!({"meta": "shared", "address": 1}))
            .unwrap_err();
        assert!(matches!(err, ReflectError::InvalidOwnershipTag { found, .. } if found == "shared"));
    }

    #[test]
    fn forward_reference_is_unresolved() {
        let reg = registry();
        let mut input = InputStream::new(&reg);
        let err = input
            .load_weak::<IntLeaf>(&json!({"meta": "ref", "address": 99}))
            .unwrap_err();
        assert!(matches!(err, ReflectError::UnresolvedReference { address: 99 }));
    }

    #[test]
    fn self_reference_resolves_during_load() {
        let reg = registry();
        let mut input = InputStream::new(&reg);
        let doc = json!({
            "meta": "owned", "address": 5, "type": "SelfRef",
            "val": {"me": {"meta": "ref", "address": 5}}
        });
        let node: Own<SelfRef> = input.load_owning(&doc).unwrap();
        assert!(node.get().unwrap().me.points_to(&node));
    }

    #[test]
    fn duplicate_owned_address_is_rejected() {
        let reg = registry();
        let mut input = InputStream::new(&reg);
        let doc = json!({"meta": "owned", "address": 3, "type": "IntLeaf", "val": {"value": 1}});
        let _first: Own<IntLeaf> = input.load_owning(&doc).unwrap();
        let err = input.load_owning::<IntLeaf>(&doc).unwrap_err();
        assert!(matches!(err, ReflectError::MultipleStrongReference { address: 3 }));
    }

    #[test]
    fn unknown_type_constructs_nothing() {
        let reg = registry();
        let mut input = InputStream::new(&reg);
        let doc = json!({"meta": "owned", "address": 1, "type": "NoSuchType", "val": {}});
        let err = input.load_owning::<dyn crate::component::Component>(&doc).unwrap_err();
        assert!(matches!(err, ReflectError::UnknownType { name, .. } if name == "NoSuchType"));
        assert_eq!(input.owned_count(), 0);
    }

    #[test]
    fn fixed_type_mismatch() {
        let reg = registry();
        let mut input = InputStream::new(&reg);
        let err = input
            .load_fixed::<IntLeaf>(&json!({"type": "SelfRef", "val": {}}))
            .unwrap_err();
        assert!(matches!(
            err,
            ReflectError::TypeMismatch { expected, found } if expected == "IntLeaf" && found == "SelfRef"
        ));
    }

    #[derive(Debug, Default)]
    struct Unregistered;

    impl Reflect for Unregistered {
        const TYPE_NAME: &'static str = "Unregistered";

        fn schema() -> &'static Schema<Self> {
            static SCHEMA: OnceLock<Schema<Unregistered>> = OnceLock::new();
            SCHEMA.get_or_init(Schema::new)
        }
    }

    #[test]
    fn unregistered_fixed_type_cannot_be_loaded() {
        let reg = registry();
        let mut input = InputStream::new(&reg);
        let err = input
            .load_fixed::<Unregistered>(&json!({"type": "Unregistered", "val": {}}))
            .unwrap_err();
        match err {
            ReflectError::UnknownType { name, registered } => {
                assert_eq!(name, "Unregistered");
                assert_eq!(registered, "IntLeaf, SelfRef");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn fixed_load_reads_fields() {
        let reg = registry();
        let mut input = InputStream::new(&reg);
        let leaf: IntLeaf = input
            .load_fixed(&json!({"type": "IntLeaf", "val": {"value": -4}}))
            .unwrap();
        assert_eq!(leaf.value, -4);
    }

    #[test]
    fn missing_address_is_malformed() {
        let reg = registry();
        let mut input = InputStream::new(&reg);
        input.enter("camera");
        let err = input
            .load_owning::<IntLeaf>(&json!({"meta": "owned", "type": "IntLeaf", "val": {}}))
            .unwrap_err();
        assert!(matches!(err, ReflectError::MalformedDocument { path, .. } if path == "/camera"));
    }
}
