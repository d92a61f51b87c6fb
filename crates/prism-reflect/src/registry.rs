//! Type registration and the interface index.
//!
//! Every concrete component type that appears in a document must be
//! registered in a [`TypeRegistry`]. Registration produces a [`TypeInfo`]:
//! the type's name plus type-erased construct/save/load entry points built
//! from its [`Schema`](crate::schema::Schema).
//!
//! Interfaces (trait objects implementing [`Interface`]) keep a separate
//! index of their implementations, used to construct an implementation by
//! name directly as `Box<dyn Trait>` and to enumerate the alternatives for a
//! slot.

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde_json::Value;

use crate::component::{Component, Interface, Reflect};
use crate::handle::Own;
use crate::input::InputStream;
use crate::output::OutputStream;
use crate::schema::FieldInfo;
use crate::ReflectError;

// ---------------------------------------------------------------------------
// TypeInfo
// ---------------------------------------------------------------------------

type SaveFn = fn(&dyn Component, &mut OutputStream<'_>) -> Result<Value, ReflectError>;
type LoadFn = fn(&mut dyn Component, &Value, &mut InputStream<'_>) -> Result<(), ReflectError>;

/// Runtime record of one registered component type.
#[derive(Clone, Copy)]
pub struct TypeInfo {
    name: &'static str,
    type_id: TypeId,
    construct: fn() -> Box<dyn Component>,
    save: SaveFn,
    load: LoadFn,
    fields: fn() -> Vec<FieldInfo>,
}

impl TypeInfo {
    /// Build the record for `T`.
    pub fn of<T: Reflect>() -> Self {
        Self {
            name: T::TYPE_NAME,
            type_id: TypeId::of::<T>(),
            construct: construct_erased::<T>,
            save: save_erased::<T>,
            load: load_erased::<T>,
            fields: fields_of::<T>,
        }
    }

    /// The registered type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// A new default instance.
    pub fn construct(&self) -> Box<dyn Component> {
        (self.construct)()
    }

    /// Save the fields of `component` as a `val` object.
    ///
    /// Fails with [`ReflectError::TypeMismatch`] if `component` is not of
    /// this type.
    pub fn save(&self, component: &dyn Component, out: &mut OutputStream<'_>) -> Result<Value, ReflectError> {
        (self.save)(component, out)
    }

    /// Load the fields of `component` from a `val` object.
    pub fn load(
        &self,
        component: &mut dyn Component,
        node: &Value,
        input: &mut InputStream<'_>,
    ) -> Result<(), ReflectError> {
        (self.load)(component, node, input)
    }

    /// The declared fields, in order.
    pub fn fields(&self) -> Vec<FieldInfo> {
        (self.fields)()
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("name", &self.name)
            .field("fields", &self.fields())
            .finish()
    }
}

fn construct_erased<T: Reflect>() -> Box<dyn Component> {
    Box::new(T::default())
}

fn save_erased<T: Reflect>(component: &dyn Component, out: &mut OutputStream<'_>) -> Result<Value, ReflectError> {
    let value = component
        .downcast_ref::<T>()
        .ok_or_else(|| mismatch::<T>(component))?;
    T::schema().save(value, out)
}

fn load_erased<T: Reflect>(
    component: &mut dyn Component,
    node: &Value,
    input: &mut InputStream<'_>,
) -> Result<(), ReflectError> {
    let found = component.type_name();
    let value = component
        .downcast_mut::<T>()
        .ok_or_else(|| ReflectError::TypeMismatch {
            expected: T::TYPE_NAME.to_owned(),
            found: found.to_owned(),
        })?;
    T::schema().load(value, node, input)
}

fn fields_of<T: Reflect>() -> Vec<FieldInfo> {
    T::schema().fields().copied().collect()
}

fn mismatch<T: Reflect>(component: &dyn Component) -> ReflectError {
    ReflectError::TypeMismatch {
        expected: T::TYPE_NAME.to_owned(),
        found: component.type_name().to_owned(),
    }
}

// ---------------------------------------------------------------------------
// Interface index
// ---------------------------------------------------------------------------

/// Builds a default implementation already upcast to the interface object.
struct Upcaster<I: ?Sized>(Box<dyn Fn() -> Box<I> + Send + Sync>);

/// Implementations of one interface, keyed (and therefore ordered) by type
/// name. Each value is an `Upcaster<I>` for the interface's own `I`.
struct InterfaceEntry {
    tag: &'static str,
    implementations: BTreeMap<&'static str, Box<dyn Any + Send + Sync>>,
}

// ---------------------------------------------------------------------------
// TypeRegistry
// ---------------------------------------------------------------------------

/// Registry mapping type names and Rust types to their [`TypeInfo`].
///
/// Registration happens during setup; afterwards the registry is only read,
/// and any number of save/load passes may share it.
pub struct TypeRegistry {
    /// TypeId -> index into `infos`.
    by_type: HashMap<TypeId, usize>,
    /// Type name -> index into `infos`.
    by_name: HashMap<&'static str, usize>,
    infos: Vec<TypeInfo>,
    /// Interface object TypeId -> its implementations.
    interfaces: HashMap<TypeId, InterfaceEntry>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            by_type: HashMap::new(),
            by_name: HashMap::new(),
            infos: Vec::new(),
            interfaces: HashMap::new(),
        }
    }

    /// Register `T` under its [`Reflect::TYPE_NAME`].
    ///
    /// Registering the same type again returns the existing entry.
    ///
    /// # Panics
    ///
    /// Panics if a *different* type is already registered under the same
    /// name.
    pub fn register<T: Reflect>(&mut self) -> &TypeInfo {
        let index = self.register_index::<T>();
        &self.infos[index]
    }

    fn register_index<T: Reflect>(&mut self) -> usize {
        let type_id = TypeId::of::<T>();
        if let Some(&index) = self.by_type.get(&type_id) {
            tracing::trace!(type_name = T::TYPE_NAME, "type already registered");
            return index;
        }
        if self.by_name.contains_key(T::TYPE_NAME) {
            panic!(
                "type name '{}' is already registered for a different type",
                T::TYPE_NAME
            );
        }

        let index = self.infos.len();
        self.infos.push(TypeInfo::of::<T>());
        self.by_type.insert(type_id, index);
        self.by_name.insert(T::TYPE_NAME, index);
        tracing::debug!(
            type_name = T::TYPE_NAME,
            fields = T::schema().len(),
            "registered component type"
        );
        index
    }

    /// Register `T` as an implementation of the interface `I`.
    ///
    /// `T` itself is registered first if needed. `upcast` turns a boxed `T`
    /// into the interface object, normally `|b| b`.
    ///
    /// A second registration of the same pair is ignored; the first one
    /// wins.
    pub fn register_implementation<T, I>(&mut self, upcast: fn(Box<T>) -> Box<I>) -> &TypeInfo
    where
        T: Reflect,
        I: Interface + ?Sized,
    {
        let index = self.register_index::<T>();
        let entry = self
            .interfaces
            .entry(TypeId::of::<I>())
            .or_insert_with(|| InterfaceEntry {
                tag: I::TAG,
                implementations: BTreeMap::new(),
            });

        if entry.implementations.contains_key(T::TYPE_NAME) {
            tracing::warn!(
                interface = I::TAG,
                type_name = T::TYPE_NAME,
                "implementation already registered -- ignoring"
            );
        } else {
            let make: Upcaster<I> = Upcaster(Box::new(move || upcast(Box::new(T::default()))));
            entry.implementations.insert(T::TYPE_NAME, Box::new(make));
            tracing::debug!(interface = I::TAG, type_name = T::TYPE_NAME, "registered implementation");
        }
        &self.infos[index]
    }

    // -- lookups --------------------------------------------------------------

    /// Look up a type by its registered name.
    ///
    /// # Errors
    ///
    /// [`ReflectError::UnknownType`] if no type has that name.
    pub fn lookup(&self, name: &str) -> Result<&TypeInfo, ReflectError> {
        self.by_name
            .get(name)
            .map(|&index| &self.infos[index])
            .ok_or_else(|| self.unknown(name))
    }

    /// The entry for the Rust type `T`, if registered.
    pub fn info_of<T: Reflect>(&self) -> Option<&TypeInfo> {
        self.by_type.get(&TypeId::of::<T>()).map(|&index| &self.infos[index])
    }

    /// The entry for the Rust type `T`.
    ///
    /// # Errors
    ///
    /// [`ReflectError::UnknownType`] if `T` was never registered.
    pub fn require<T: Reflect>(&self) -> Result<&TypeInfo, ReflectError> {
        self.info_of::<T>().ok_or_else(|| self.unknown(T::TYPE_NAME))
    }

    /// The entry for the concrete type behind `component`.
    ///
    /// # Errors
    ///
    /// [`ReflectError::UnknownType`] if that type was never registered.
    pub fn info_for(&self, component: &dyn Component) -> Result<&TypeInfo, ReflectError> {
        self.by_type
            .get(&component.concrete_type_id())
            .map(|&index| &self.infos[index])
            .ok_or_else(|| self.unknown(component.type_name()))
    }

    /// Construct a default instance of the named type under a fresh
    /// identity.
    pub fn create(&self, name: &str) -> Result<Own<dyn Component>, ReflectError> {
        Ok(Own::from_box(self.lookup(name)?.construct()))
    }

    /// Construct a default instance of the named implementation of `I`,
    /// viewed as the interface object.
    ///
    /// # Errors
    ///
    /// [`ReflectError::UnknownType`] if the name is not registered at all,
    /// if no implementation of `I` is registered, or if the named type exists
    /// but does not implement `I`. In the last case `registered` lists the
    /// implementations of `I` instead of every registered type.
    pub fn construct_as<I: Interface + ?Sized>(&self, name: &str) -> Result<Box<I>, ReflectError> {
        let info = self.lookup(name)?;
        let entry = self.interface_entry::<I>()?;
        let make = entry
            .implementations
            .get(info.name())
            .and_then(|erased| erased.downcast_ref::<Upcaster<I>>())
            .ok_or_else(|| {
                tracing::debug!(interface = I::TAG, type_name = name, "type does not implement interface");
                ReflectError::UnknownType {
                    name: name.to_owned(),
                    registered: entry.implementations.keys().copied().collect::<Vec<_>>().join(", "),
                }
            })?;
        Ok((make.0)())
    }

    /// Every implementation of `I`, ordered by type name.
    ///
    /// # Errors
    ///
    /// [`ReflectError::UnknownType`] (named after the interface tag) if no
    /// implementation of `I` was registered.
    pub fn implementations_of<I: Interface + ?Sized>(&self) -> Result<Vec<&TypeInfo>, ReflectError> {
        let entry = self.interface_entry::<I>()?;
        entry
            .implementations
            .keys()
            .map(|name| self.lookup(name))
            .collect()
    }

    /// Whether `name` is a registered implementation of `I`.
    pub fn implements<I: Interface + ?Sized>(&self, name: &str) -> bool {
        self.interfaces
            .get(&TypeId::of::<I>())
            .is_some_and(|entry| entry.implementations.contains_key(name))
    }

    fn interface_entry<I: Interface + ?Sized>(&self) -> Result<&InterfaceEntry, ReflectError> {
        self.interfaces
            .get(&TypeId::of::<I>())
            .ok_or_else(|| self.unknown(I::TAG))
    }

    fn unknown(&self, name: &str) -> ReflectError {
        ReflectError::UnknownType {
            name: name.to_owned(),
            registered: self.registered_names().join(", "),
        }
    }

    /// Names of all registered types, sorted.
    pub fn registered_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.by_name.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Tags of all interfaces with at least one implementation, sorted.
    pub fn interface_tags(&self) -> Vec<&'static str> {
        let mut tags: Vec<&'static str> = self.interfaces.values().map(|entry| entry.tag).collect();
        tags.sort_unstable();
        tags
    }

    /// Total number of registered types.
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.registered_names())
            .field("interfaces", &self.interface_tags())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldKind, Schema};
    use std::sync::OnceLock;

    trait Shape: Component {
        fn area(&self) -> f32;
    }

    crate::declare_interface!(Shape, "Shape");

    #[derive(Debug, Default)]
    struct Square {
        side: f32,
    }

    impl Reflect for Square {
        const TYPE_NAME: &'static str = "Square";

        fn schema() -> &'static Schema<Self> {
            static SCHEMA: OnceLock<Schema<Square>> = OnceLock::new();
            SCHEMA.get_or_init(|| Schema::<Self>::new().field("side", |s| &s.side, |s| &mut s.side))
        }
    }

    impl Shape for Square {
        fn area(&self) -> f32 {
            self.side * self.side
        }
    }

    #[derive(Debug)]
    struct Disk {
        radius: f32,
    }

    impl Default for Disk {
        fn default() -> Self {
            Self { radius: 1.0 }
        }
    }

    impl Reflect for Disk {
        const TYPE_NAME: &'static str = "Disk";

        fn schema() -> &'static Schema<Self> {
            static SCHEMA: OnceLock<Schema<Disk>> = OnceLock::new();
            SCHEMA.get_or_init(|| Schema::<Self>::new().field("radius", |s| &s.radius, |s| &mut s.radius))
        }
    }

    impl Shape for Disk {
        fn area(&self) -> f32 {
            std::f32::consts::PI * self.radius * self.radius
        }
    }

    #[derive(Debug, Default)]
    struct Label;

    impl Reflect for Label {
        const TYPE_NAME: &'static str = "Label";

        fn schema() -> &'static Schema<Self> {
            static SCHEMA: OnceLock<Schema<Label>> = OnceLock::new();
            SCHEMA.get_or_init(Schema::new)
        }
    }

    #[derive(Debug, Default)]
    struct FakeSquare;

    impl Reflect for FakeSquare {
        const TYPE_NAME: &'static str = "Square";

        fn schema() -> &'static Schema<Self> {
            static SCHEMA: OnceLock<Schema<FakeSquare>> = OnceLock::new();
            SCHEMA.get_or_init(Schema::new)
        }
    }

    fn shapes() -> TypeRegistry {
        let mut reg = TypeRegistry::new();
        // Registration order must not matter.
        reg.register_implementation::<Square, dyn Shape>(|b| b);
        reg.register::<Label>();
        reg.register_implementation::<Disk, dyn Shape>(|b| b);
        reg
    }

    #[test]
    fn register_and_lookup() {
        let reg = shapes();
        assert_eq!(reg.len(), 3);
        let info = reg.lookup("Square").unwrap();
        assert_eq!(info.name(), "Square");
        assert_eq!(info.type_id(), TypeId::of::<Square>());
        assert_eq!(
            info.fields(),
            vec![FieldInfo {
                name: "side",
                kind: FieldKind::Scalar,
                transient: false
            }]
        );
        assert!(reg.info_of::<Label>().is_some());
    }

    #[test]
    fn re_registering_is_idempotent() {
        let mut reg = shapes();
        reg.register::<Square>();
        reg.register_implementation::<Square, dyn Shape>(|b| b);
        assert_eq!(reg.len(), 3);
        assert_eq!(reg.implementations_of::<dyn Shape>().unwrap().len(), 2);
    }

    #[test]
    #[should_panic(expected = "already registered for a different type")]
    fn name_clash_panics() {
        let mut reg = shapes();
        reg.register::<FakeSquare>();
    }

    #[test]
    fn unknown_type_lists_registered_names() {
        let reg = shapes();
        let err = reg.lookup("Hexagon").unwrap_err();
        match err {
            ReflectError::UnknownType { name, registered } => {
                assert_eq!(name, "Hexagon");
                assert_eq!(registered, "Disk, Label, Square");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn implementations_are_sorted_by_name() {
        let reg = shapes();
        let names: Vec<_> = reg
            .implementations_of::<dyn Shape>()
            .unwrap()
            .iter()
            .map(|info| info.name())
            .collect();
        assert_eq!(names, vec!["Disk", "Square"]);
        assert!(reg.implements::<dyn Shape>("Disk"));
        assert!(!reg.implements::<dyn Shape>("Label"));
        assert_eq!(reg.interface_tags(), vec!["Shape"]);
    }

    #[test]
    fn interface_without_implementations_is_unknown() {
        let reg = TypeRegistry::new();
        let err = reg.implementations_of::<dyn Shape>().unwrap_err();
        assert!(matches!(err, ReflectError::UnknownType { name, .. } if name == "Shape"));
    }

    #[test]
    fn construct_as_interface() {
        let reg = shapes();
        let disk = reg.construct_as::<dyn Shape>("Disk").unwrap();
        assert_eq!(disk.type_name(), "Disk");
        assert!((disk.area() - std::f32::consts::PI).abs() < 1e-6);
        assert!(format!("{disk:?}").contains("Disk"));
    }

    #[test]
    fn construct_as_rejects_non_implementation_as_unknown() {
        let reg = shapes();
        let err = reg.construct_as::<dyn Shape>("Label").unwrap_err();
        match err {
            ReflectError::UnknownType { name, registered } => {
                assert_eq!(name, "Label");
                assert_eq!(registered, "Disk, Square");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn create_by_name() {
        let reg = shapes();
        let own = reg.create("Disk").unwrap();
        assert!(own.get().unwrap().is::<Disk>());
        assert!(own.id().is_some());
        assert!(matches!(reg.create("Nope"), Err(ReflectError::UnknownType { .. })));
    }

    #[test]
    fn require_rejects_unregistered_types() {
        let reg = shapes();
        assert_eq!(reg.require::<Disk>().unwrap().name(), "Disk");
        match reg.require::<FakeSquare>() {
            Err(ReflectError::UnknownType { name, registered }) => {
                assert_eq!(name, "Square");
                assert_eq!(registered, "Disk, Label, Square");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn info_for_reverse_lookup() {
        let reg = shapes();
        let square = Square { side: 2.0 };
        assert_eq!(reg.info_for(&square).unwrap().name(), "Square");
        let unregistered = FakeSquare;
        assert!(matches!(
            reg.info_for(&unregistered),
            Err(ReflectError::UnknownType { .. })
        ));
    }

    #[test]
    fn erased_save_rejects_wrong_component() {
        let reg = shapes();
        let mut out = OutputStream::new(&reg);
        let info = reg.lookup("Square").unwrap();
        let err = info.save(&Label, &mut out).unwrap_err();
        assert!(matches!(err, ReflectError::TypeMismatch { .. }));
    }
}
