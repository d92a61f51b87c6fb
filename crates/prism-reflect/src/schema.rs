//! Field schemas.
//!
//! A [`Schema<T>`] is the ordered list of named fields a [`Reflect`] type
//! persists. Each field is declared once, with a pair of accessor function
//! pointers; the schema turns them into type-erased save/load/walk closures
//! so that one generic routine serializes every registered type.
//!
//! Field order is significant: fields are saved and loaded in declaration
//! order, so a field holding owning handles must be declared before any
//! field holding weak references to those handles.

use std::fmt;

use serde_json::{Map, Value};

use crate::component::{OwnedRef, Reflect};
use crate::input::InputStream;
use crate::output::OutputStream;
use crate::persist::Persist;
use crate::ReflectError;

// ---------------------------------------------------------------------------
// FieldKind / FieldInfo
// ---------------------------------------------------------------------------

/// How a field is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Numbers, strings, booleans, fixed-size numeric tuples.
    Scalar,
    /// An owning handle.
    Owned,
    /// A non-owning reference.
    Weak,
    /// A statically typed, always-present nested component.
    Fixed,
    /// `Option<T>`: null or a value.
    Optional,
    /// An ordered sequence.
    Sequence,
    /// A mapping stored as an array of key/value pairs.
    Mapping,
}

/// Introspection record for one declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Transient fields are listed but never saved or loaded.
    pub transient: bool,
}

// ---------------------------------------------------------------------------
// Field
// ---------------------------------------------------------------------------

type SaveFn<T> =
    Box<dyn Fn(&T, &mut OutputStream<'_>) -> Result<Value, ReflectError> + Send + Sync>;
type LoadFn<T> =
    Box<dyn Fn(&mut T, &Value, &mut InputStream<'_>) -> Result<(), ReflectError> + Send + Sync>;
type WalkFn<T> = Box<dyn for<'a> Fn(&'a T, &mut dyn FnMut(OwnedRef<'a>)) + Send + Sync>;

fn saver<T, F>(f: F) -> SaveFn<T>
where
    F: Fn(&T, &mut OutputStream<'_>) -> Result<Value, ReflectError> + Send + Sync + 'static,
{
    Box::new(f)
}

fn loader<T, F>(f: F) -> LoadFn<T>
where
    F: Fn(&mut T, &Value, &mut InputStream<'_>) -> Result<(), ReflectError>
        + Send
        + Sync
        + 'static,
{
    Box::new(f)
}

fn walker<T, F>(f: F) -> WalkFn<T>
where
    F: for<'a> Fn(&'a T, &mut dyn FnMut(OwnedRef<'a>)) + Send + Sync + 'static,
{
    Box::new(f)
}

/// Persisted behaviour of one field; `None` for transient fields.
struct FieldOps<T> {
    save: SaveFn<T>,
    load: LoadFn<T>,
    walk: WalkFn<T>,
}

struct Field<T> {
    info: FieldInfo,
    ops: Option<FieldOps<T>>,
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Ordered field descriptor for a type `T`.
pub struct Schema<T> {
    fields: Vec<Field<T>>,
}

impl<T: 'static> Schema<T> {
    /// An empty schema (a type with no persisted state).
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Declare a field persisted through its [`Persist`] implementation.
    ///
    /// # Panics
    ///
    /// Panics if `name` was already declared on this schema.
    pub fn field<F>(mut self, name: &'static str, get: fn(&T) -> &F, get_mut: fn(&mut T) -> &mut F) -> Self
    where
        F: Persist + 'static,
    {
        self.assert_unique(name);
        let ops = FieldOps {
            save: saver(move |value, out| get(value).save(out)),
            load: loader(move |value, node, input| {
                *get_mut(value) = F::load(node, input)?;
                Ok(())
            }),
            walk: walker(move |value, visit| get(value).walk_owned(visit)),
        };
        self.fields.push(Field {
            info: FieldInfo {
                name,
                kind: F::kind(),
                transient: false,
            },
            ops: Some(ops),
        });
        self
    }

    /// Declare a nested component whose concrete type is statically fixed.
    ///
    /// It is written as `{ "type": ..., "val": ... }` without ownership
    /// metadata, and loading it checks the recorded type name.
    pub fn fixed<F>(mut self, name: &'static str, get: fn(&T) -> &F, get_mut: fn(&mut T) -> &mut F) -> Self
    where
        F: Reflect,
    {
        self.assert_unique(name);
        let ops = FieldOps {
            save: saver(move |value, out| out.save_fixed(get(value))),
            load: loader(move |value, node, input| input.load_fixed_into(get_mut(value), node)),
            walk: walker(move |value, visit| F::schema().walk_owned(get(value), visit)),
        };
        self.fields.push(Field {
            info: FieldInfo {
                name,
                kind: FieldKind::Fixed,
                transient: false,
            },
            ops: Some(ops),
        });
        self
    }

    /// Declare a field that is part of the type but never persisted.
    ///
    /// A loaded instance keeps whatever its `Default` put there.
    pub fn transient(mut self, name: &'static str) -> Self {
        self.assert_unique(name);
        self.fields.push(Field {
            info: FieldInfo {
                name,
                kind: FieldKind::Scalar,
                transient: true,
            },
            ops: None,
        });
        self
    }

    fn assert_unique(&self, name: &str) {
        if self.fields.iter().any(|f| f.info.name == name) {
            panic!("field '{name}' is declared twice in the same schema");
        }
    }

    /// Declared fields, in order, transient ones included.
    pub fn fields(&self) -> impl Iterator<Item = &FieldInfo> + '_ {
        self.fields.iter().map(|f| &f.info)
    }

    /// Number of declared fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Save every persisted field of `value` into a `val` object.
    pub fn save(&self, value: &T, out: &mut OutputStream<'_>) -> Result<Value, ReflectError> {
        let mut object = Map::new();
        for field in &self.fields {
            let Some(ops) = &field.ops else { continue };
            out.enter(field.info.name);
            let node = (ops.save)(value, out);
            out.leave();
            object.insert(field.info.name.to_owned(), node?);
        }
        Ok(Value::Object(object))
    }

    /// Load every persisted field present in the `val` object `node`.
    ///
    /// Absent fields keep their current value; unknown keys are ignored.
    pub fn load(&self, value: &mut T, node: &Value, input: &mut InputStream<'_>) -> Result<(), ReflectError> {
        let Some(object) = node.as_object() else {
            return Err(input.malformed(format!(
                "expected a field object, found {}",
                crate::document::describe(node)
            )));
        };
        for field in &self.fields {
            let Some(ops) = &field.ops else { continue };
            let Some(child) = object.get(field.info.name) else {
                tracing::trace!(field = field.info.name, "field absent from document -- keeping default");
                continue;
            };
            input.enter(field.info.name);
            let result = (ops.load)(value, child, input);
            input.leave();
            result?;
        }
        if tracing::enabled!(tracing::Level::TRACE) {
            for key in object.keys() {
                if !self.fields.iter().any(|f| f.ops.is_some() && f.info.name == key) {
                    tracing::trace!(key = %key, "ignoring unknown field in document");
                }
            }
        }
        Ok(())
    }

    /// Visit the children held by owning handles, in declaration order.
    pub fn walk_owned<'a>(&self, value: &'a T, visit: &mut dyn FnMut(OwnedRef<'a>)) {
        for field in &self.fields {
            if let Some(ops) = &field.ops {
                (ops.walk)(value, visit);
            }
        }
    }
}

impl<T: 'static> Default for Schema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Schema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.fields.iter().map(|field| &field.info))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{Own, Weak};
    use crate::registry::TypeRegistry;
    use std::sync::OnceLock;

    #[derive(Debug, Default)]
    struct Leaf {
        value: i32,
    }

    impl Reflect for Leaf {
        const TYPE_NAME: &'static str = "Leaf";

        fn schema() -> &'static Schema<Self> {
            static SCHEMA: OnceLock<Schema<Leaf>> = OnceLock::new();
            SCHEMA.get_or_init(|| Schema::<Self>::new().field("value", |s| &s.value, |s| &mut s.value))
        }
    }

    #[derive(Debug, Default)]
    struct Holder {
        label: String,
        child: Own<Leaf>,
        alias: Weak<Leaf>,
        cache: Vec<u8>,
        scores: Vec<f32>,
    }

    impl Reflect for Holder {
        const TYPE_NAME: &'static str = "Holder";

        fn schema() -> &'static Schema<Self> {
            static SCHEMA: OnceLock<Schema<Holder>> = OnceLock::new();
            SCHEMA.get_or_init(|| {
                Schema::<Self>::new()
                    .field("label", |s| &s.label, |s| &mut s.label)
                    .field("child", |s| &s.child, |s| &mut s.child)
                    .field("alias", |s| &s.alias, |s| &mut s.alias)
                    .transient("cache")
                    .field("scores", |s| &s.scores, |s| &mut s.scores)
            })
        }
    }

    fn registry() -> TypeRegistry {
        let mut reg = TypeRegistry::new();
        reg.register::<Leaf>();
        reg.register::<Holder>();
        reg
    }

    #[test]
    fn field_infos_in_declaration_order() {
        let infos: Vec<_> = Holder::schema().fields().map(|f| (f.name, f.kind, f.transient)).collect();
        assert_eq!(
            infos,
            vec![
                ("label", FieldKind::Scalar, false),
                ("child", FieldKind::Owned, false),
                ("alias", FieldKind::Weak, false),
                ("cache", FieldKind::Scalar, true),
                ("scores", FieldKind::Sequence, false),
            ]
        );
    }

    #[test]
    fn transient_field_is_not_saved() {
        let reg = registry();
        let holder = Holder {
            label: "h".to_owned(),
            cache: vec![1, 2, 3],
            ..Default::default()
        };
        let mut out = OutputStream::new(&reg);
        let val = Holder::schema().save(&holder, &mut out).unwrap();
        let object = val.as_object().unwrap();
        assert!(!object.contains_key("cache"));
        assert_eq!(object["label"], "h");
        assert!(object["child"].is_null());
        assert!(object["alias"].is_null());
    }

    #[test]
    fn missing_fields_keep_defaults() {
        let reg = registry();
        let mut holder = Holder::default();
        let mut input = InputStream::new(&reg);
        Holder::schema()
            .load(&mut holder, &serde_json::json!({ "label": "only", "extra": 1 }), &mut input)
            .unwrap();
        assert_eq!(holder.label, "only");
        assert!(holder.child.is_null());
        assert!(holder.scores.is_empty());
    }

    #[test]
    fn non_object_val_is_malformed() {
        let reg = registry();
        let mut leaf = Leaf::default();
        let mut input = InputStream::new(&reg);
        let err = Leaf::schema().load(&mut leaf, &serde_json::json!([1]), &mut input).unwrap_err();
        assert!(matches!(err, ReflectError::MalformedDocument { .. }));
    }

    #[test]
    fn walk_visits_owned_children_only() {
        let child = Own::new(Leaf { value: 1 });
        let child_id = child.id().unwrap();
        let holder = Holder {
            alias: child.weak(),
            child,
            ..Default::default()
        };
        let mut seen = Vec::new();
        Holder::schema().walk_owned(&holder, &mut |r| seen.push(r.id));
        assert_eq!(seen, vec![child_id]);
    }

    #[test]
    #[should_panic(expected = "declared twice")]
    fn duplicate_field_names_panic() {
        let _ = Schema::<Leaf>::new()
            .field("value", |s| &s.value, |s| &mut s.value)
            .field("value", |s| &s.value, |s| &mut s.value);
    }
}
