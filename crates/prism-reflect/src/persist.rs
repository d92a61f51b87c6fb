//! Generic save/load for every field kind.
//!
//! [`Persist`] is what a schema field dispatches to. It is implemented for
//! scalars (through serde), fixed-size arrays, `Option`, `Vec`, the two
//! standard maps, and the two handle types. Element types recurse, so a
//! `Vec<Own<dyn Material>>` or a `BTreeMap<String, Vec<Weak<dyn Shape>>>`
//! needs no extra code.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::component::{OwnedRef, Pointee};
use crate::document::{describe, KEY, VAL};
use crate::handle::{Own, Weak};
use crate::input::InputStream;
use crate::output::OutputStream;
use crate::schema::FieldKind;
use crate::ReflectError;

// ---------------------------------------------------------------------------
// Persist
// ---------------------------------------------------------------------------

/// A value that can be written to and rebuilt from a document node.
pub trait Persist: Sized {
    fn save(&self, out: &mut OutputStream<'_>) -> Result<Value, ReflectError>;

    fn load(node: &Value, input: &mut InputStream<'_>) -> Result<Self, ReflectError>;

    /// The field kind reported by schema introspection.
    fn kind() -> FieldKind {
        FieldKind::Scalar
    }

    /// Visit components held through owning handles inside this value.
    fn walk_owned<'a>(&'a self, visit: &mut dyn FnMut(OwnedRef<'a>)) {
        let _ = visit;
    }
}

// ---------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------

macro_rules! persist_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Persist for $ty {
                fn save(&self, out: &mut OutputStream<'_>) -> Result<Value, ReflectError> {
                    out.write_scalar(self)
                }

                fn load(node: &Value, input: &mut InputStream<'_>) -> Result<Self, ReflectError> {
                    input.read_scalar(node)
                }
            }
        )*
    };
}

persist_scalar!(bool, char, i8, i16, i32, i64, u8, u16, u32, u64, usize, String);

// JSON has no NaN or infinity; serde_json would write them as null, which
// then fails to load as a number.
macro_rules! persist_float {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Persist for $ty {
                fn save(&self, out: &mut OutputStream<'_>) -> Result<Value, ReflectError> {
                    if !self.is_finite() {
                        return Err(ReflectError::MalformedDocument {
                            path: out.path_string(),
                            details: format!("non-finite {} {} cannot be saved", stringify!($ty), self),
                        });
                    }
                    out.write_scalar(self)
                }

                fn load(node: &Value, input: &mut InputStream<'_>) -> Result<Self, ReflectError> {
                    input.read_scalar(node)
                }
            }
        )*
    };
}

persist_float!(f32, f64);

/// Adapter persisting any serde type as a scalar leaf.
///
/// Useful for small plain-data enums and structs that have no component
/// identity, e.g. `Serde<Filter>` where `Filter` derives serde.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Serde<T>(pub T);

impl<T: Serialize + DeserializeOwned> Persist for Serde<T> {
    fn save(&self, out: &mut OutputStream<'_>) -> Result<Value, ReflectError> {
        out.write_scalar(&self.0)
    }

    fn load(node: &Value, input: &mut InputStream<'_>) -> Result<Self, ReflectError> {
        input.read_scalar(node).map(Serde)
    }
}

/// Fixed-size tuples such as `[f32; 3]` points and colors.
impl<T: Persist, const N: usize> Persist for [T; N] {
    fn save(&self, out: &mut OutputStream<'_>) -> Result<Value, ReflectError> {
        save_sequence(self.iter(), out)
    }

    fn load(node: &Value, input: &mut InputStream<'_>) -> Result<Self, ReflectError> {
        let items: Vec<T> = load_sequence(node, input)?;
        let len = items.len();
        items
            .try_into()
            .map_err(|_| input.malformed(format!("expected {N} elements, found {len}")))
    }

    fn walk_owned<'a>(&'a self, visit: &mut dyn FnMut(OwnedRef<'a>)) {
        for item in self {
            item.walk_owned(visit);
        }
    }
}

// ---------------------------------------------------------------------------
// Option / Vec
// ---------------------------------------------------------------------------

/// `None` is written as null. A `Some` holding a null handle is written as
/// null too, so `Some(Own::null())` and `Some(Weak::null())` reload as
/// `None`.
impl<T: Persist> Persist for Option<T> {
    fn save(&self, out: &mut OutputStream<'_>) -> Result<Value, ReflectError> {
        match self {
            None => Ok(out.write_null()),
            Some(value) => value.save(out),
        }
    }

    fn load(node: &Value, input: &mut InputStream<'_>) -> Result<Self, ReflectError> {
        if node.is_null() {
            Ok(None)
        } else {
            T::load(node, input).map(Some)
        }
    }

    fn kind() -> FieldKind {
        FieldKind::Optional
    }

    fn walk_owned<'a>(&'a self, visit: &mut dyn FnMut(OwnedRef<'a>)) {
        if let Some(value) = self {
            value.walk_owned(visit);
        }
    }
}

impl<T: Persist> Persist for Vec<T> {
    fn save(&self, out: &mut OutputStream<'_>) -> Result<Value, ReflectError> {
        save_sequence(self.iter(), out)
    }

    fn load(node: &Value, input: &mut InputStream<'_>) -> Result<Self, ReflectError> {
        load_sequence(node, input)
    }

    fn kind() -> FieldKind {
        FieldKind::Sequence
    }

    fn walk_owned<'a>(&'a self, visit: &mut dyn FnMut(OwnedRef<'a>)) {
        for item in self {
            item.walk_owned(visit);
        }
    }
}

fn save_sequence<'t, T, I>(items: I, out: &mut OutputStream<'_>) -> Result<Value, ReflectError>
where
    T: Persist + 't,
    I: Iterator<Item = &'t T>,
{
    let mut array = Vec::new();
    for (index, item) in items.enumerate() {
        out.enter(index);
        let node = item.save(out);
        out.leave();
        array.push(node?);
    }
    Ok(Value::Array(array))
}

fn load_sequence<T: Persist>(node: &Value, input: &mut InputStream<'_>) -> Result<Vec<T>, ReflectError> {
    let array = input.expect_array(node)?;
    let mut items = Vec::with_capacity(array.len());
    for (index, element) in array.iter().enumerate() {
        input.enter(index);
        let item = T::load(element, input);
        input.leave();
        items.push(item?);
    }
    Ok(items)
}

// ---------------------------------------------------------------------------
// Mappings
// ---------------------------------------------------------------------------

impl<K, V> Persist for BTreeMap<K, V>
where
    K: Persist + Ord,
    V: Persist,
{
    /// Entries are written in key order.
    fn save(&self, out: &mut OutputStream<'_>) -> Result<Value, ReflectError> {
        save_pairs(self.iter(), out)
    }

    fn load(node: &Value, input: &mut InputStream<'_>) -> Result<Self, ReflectError> {
        let mut map = BTreeMap::new();
        for (key, value) in load_pairs::<K, V>(node, input)? {
            if map.contains_key(&key) {
                return Err(input.malformed("duplicate key in mapping"));
            }
            map.insert(key, value);
        }
        Ok(map)
    }

    fn kind() -> FieldKind {
        FieldKind::Mapping
    }

    fn walk_owned<'a>(&'a self, visit: &mut dyn FnMut(OwnedRef<'a>)) {
        for (key, value) in self {
            key.walk_owned(visit);
            value.walk_owned(visit);
        }
    }
}

impl<K, V> Persist for HashMap<K, V>
where
    K: Persist + Eq + Hash,
    V: Persist,
{
    /// Entries are written sorted by the JSON text of their saved keys so
    /// the document does not depend on hash iteration order.
    fn save(&self, out: &mut OutputStream<'_>) -> Result<Value, ReflectError> {
        let Value::Array(mut pairs) = save_pairs(self.iter(), out)? else {
            unreachable!("save_pairs always produces an array");
        };
        pairs.sort_by_cached_key(|pair| pair.get(KEY).map(Value::to_string).unwrap_or_default());
        Ok(Value::Array(pairs))
    }

    fn load(node: &Value, input: &mut InputStream<'_>) -> Result<Self, ReflectError> {
        let pairs = load_pairs::<K, V>(node, input)?;
        let mut map = HashMap::with_capacity(pairs.len());
        for (key, value) in pairs {
            if map.contains_key(&key) {
                return Err(input.malformed("duplicate key in mapping"));
            }
            map.insert(key, value);
        }
        Ok(map)
    }

    fn kind() -> FieldKind {
        FieldKind::Mapping
    }

    fn walk_owned<'a>(&'a self, visit: &mut dyn FnMut(OwnedRef<'a>)) {
        for (key, value) in self {
            key.walk_owned(visit);
            value.walk_owned(visit);
        }
    }
}

/// Persist a set of scalar keys as a sorted sequence.
impl<T> Persist for HashSet<T>
where
    T: Persist + Eq + Hash,
{
    fn save(&self, out: &mut OutputStream<'_>) -> Result<Value, ReflectError> {
        let Value::Array(mut items) = save_sequence(self.iter(), out)? else {
            unreachable!("save_sequence always produces an array");
        };
        items.sort_by_cached_key(Value::to_string);
        Ok(Value::Array(items))
    }

    fn load(node: &Value, input: &mut InputStream<'_>) -> Result<Self, ReflectError> {
        let items: Vec<T> = load_sequence(node, input)?;
        let mut set = HashSet::with_capacity(items.len());
        for item in items {
            if !set.insert(item) {
                return Err(input.malformed("duplicate element in set"));
            }
        }
        Ok(set)
    }

    fn kind() -> FieldKind {
        FieldKind::Sequence
    }
}

fn save_pairs<'t, K, V, I>(entries: I, out: &mut OutputStream<'_>) -> Result<Value, ReflectError>
where
    K: Persist + 't,
    V: Persist + 't,
    I: Iterator<Item = (&'t K, &'t V)>,
{
    let mut array = Vec::new();
    for (index, (key, value)) in entries.enumerate() {
        out.enter(index);
        out.enter(KEY);
        let key_node = key.save(out);
        out.leave();
        out.enter(VAL);
        let value_node = value.save(out);
        out.leave();
        out.leave();

        let mut pair = Map::new();
        pair.insert(KEY.to_owned(), key_node?);
        pair.insert(VAL.to_owned(), value_node?);
        array.push(Value::Object(pair));
    }
    Ok(Value::Array(array))
}

fn load_pairs<K: Persist, V: Persist>(
    node: &Value,
    input: &mut InputStream<'_>,
) -> Result<Vec<(K, V)>, ReflectError> {
    let array = input.expect_array(node)?;
    let mut pairs = Vec::with_capacity(array.len());
    for (index, entry) in array.iter().enumerate() {
        input.enter(index);
        let pair = load_pair(entry, input);
        input.leave();
        pairs.push(pair?);
    }
    Ok(pairs)
}

fn load_pair<K: Persist, V: Persist>(entry: &Value, input: &mut InputStream<'_>) -> Result<(K, V), ReflectError> {
    let Some(object) = entry.as_object() else {
        return Err(input.malformed(format!(
            "expected a key/value object, found {}",
            describe(entry)
        )));
    };
    let (Some(key_node), Some(value_node)) = (object.get(KEY), object.get(VAL)) else {
        return Err(input.malformed(format!("mapping entry needs both '{KEY}' and '{VAL}'")));
    };

    input.enter(KEY);
    let key = K::load(key_node, input);
    input.leave();
    let key = key?;

    input.enter(VAL);
    let value = V::load(value_node, input);
    input.leave();
    Ok((key, value?))
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

impl<T: Pointee + ?Sized> Persist for Own<T> {
    fn save(&self, out: &mut OutputStream<'_>) -> Result<Value, ReflectError> {
        out.save_owning(self)
    }

    fn load(node: &Value, input: &mut InputStream<'_>) -> Result<Self, ReflectError> {
        input.load_owning(node)
    }

    fn kind() -> FieldKind {
        FieldKind::Owned
    }

    fn walk_owned<'a>(&'a self, visit: &mut dyn FnMut(OwnedRef<'a>)) {
        if let Some((id, boxed)) = self.boxed() {
            visit(OwnedRef {
                id,
                component: <T as Pointee>::component(boxed),
                holder: boxed,
            });
        }
    }
}

impl<T: Pointee + ?Sized> Persist for Weak<T> {
    fn save(&self, out: &mut OutputStream<'_>) -> Result<Value, ReflectError> {
        out.save_weak(self)
    }

    fn load(node: &Value, input: &mut InputStream<'_>) -> Result<Self, ReflectError> {
        input.load_weak(node)
    }

    fn kind() -> FieldKind {
        FieldKind::Weak
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::registry::TypeRegistry;
    use serde_json::json;

    fn save<P: Persist>(value: &P) -> Value {
        let reg = TypeRegistry::new();
        let mut out = OutputStream::new(&reg);
        value.save(&mut out).unwrap()
    }

    fn load<P: Persist>(node: Value) -> Result<P, ReflectError> {
        let reg = TypeRegistry::new();
        let mut input = InputStream::new(&reg);
        P::load(&node, &mut input)
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    enum Filter {
        Box,
        Gaussian,
    }

    #[test]
    fn scalars_use_plain_json() {
        assert_eq!(save(&5i32), json!(5));
        assert_eq!(save(&true), json!(true));
        assert_eq!(save(&"hi".to_owned()), json!("hi"));
        assert_eq!(save(&[1.0f32, 2.0, 3.0]), json!([1.0, 2.0, 3.0]));
        assert_eq!(load::<f64>(json!(0.5)).unwrap(), 0.5);
        assert_eq!(load::<[i32; 2]>(json!([4, 5])).unwrap(), [4, 5]);
    }

    #[test]
    fn wrong_scalar_shape_is_malformed() {
        assert!(matches!(load::<i32>(json!("five")), Err(ReflectError::MalformedDocument { .. })));
        assert!(matches!(load::<[i32; 3]>(json!([1, 2])), Err(ReflectError::MalformedDocument { .. })));
        assert!(matches!(load::<Vec<i32>>(json!({"a": 1})), Err(ReflectError::MalformedDocument { .. })));
    }

    #[test]
    fn serde_adapter() {
        assert_eq!(save(&Serde(Filter::Gaussian)), json!("Gaussian"));
        assert_eq!(load::<Serde<Filter>>(json!("Box")).unwrap(), Serde(Filter::Box));
    }

    #[test]
    fn option_maps_to_null() {
        assert_eq!(save(&None::<u8>), Value::Null);
        assert_eq!(load::<Option<u8>>(Value::Null).unwrap(), None);
        assert_eq!(load::<Option<u8>>(json!(3)).unwrap(), Some(3));
    }

    #[test]
    fn optional_null_handle_reloads_as_none() {
        let some_null: Option<Own<dyn Component>> = Some(Own::null());
        assert_eq!(save(&some_null), Value::Null);
        assert!(load::<Option<Own<dyn Component>>>(Value::Null).unwrap().is_none());

        let some_null: Option<Weak<dyn Component>> = Some(Weak::null());
        assert_eq!(save(&some_null), Value::Null);
        assert!(load::<Option<Weak<dyn Component>>>(Value::Null).unwrap().is_none());
    }

    #[test]
    fn non_finite_floats_are_not_saved() {
        let reg = TypeRegistry::new();
        let mut out = OutputStream::new(&reg);
        out.enter("clip");
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            match value.save(&mut out) {
                Err(ReflectError::MalformedDocument { path, details }) => {
                    assert_eq!(path, "/clip");
                    assert!(details.contains("non-finite f64"), "{details}");
                }
                other => panic!("unexpected result: {other:?}"),
            }
        }
        assert!(matches!(f32::NAN.save(&mut out), Err(ReflectError::MalformedDocument { .. })));
        assert_eq!(f32::MAX.save(&mut out).unwrap(), json!(f32::MAX));
    }

    #[test]
    fn btree_map_is_written_in_key_order() {
        let map: BTreeMap<String, i32> = [("b".to_owned(), 2), ("a".to_owned(), 1)].into_iter().collect();
        assert_eq!(
            save(&map),
            json!([{"key": "a", "val": 1}, {"key": "b", "val": 2}])
        );
        let back: BTreeMap<String, i32> = load(save(&map)).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn hash_map_is_written_in_canonical_order() {
        let map: HashMap<u32, bool> = (0..20).map(|i| (i, i % 2 == 0)).collect();
        let doc = save(&map);
        let keys: Vec<String> = doc
            .as_array()
            .unwrap()
            .iter()
            .map(|pair| pair["key"].to_string())
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        let back: HashMap<u32, bool> = load(doc).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn duplicate_map_keys_are_malformed() {
        let doc = json!([{"key": "a", "val": 1}, {"key": "a", "val": 2}]);
        assert!(matches!(
            load::<BTreeMap<String, i32>>(doc),
            Err(ReflectError::MalformedDocument { .. })
        ));
    }

    #[test]
    fn map_entry_without_val_is_malformed() {
        let doc = json!([{"key": "a"}]);
        let err = load::<HashMap<String, i32>>(doc).unwrap_err();
        assert!(matches!(err, ReflectError::MalformedDocument { path, .. } if path == "/0"));
    }

    #[test]
    fn nested_error_path_points_at_element() {
        let err = load::<Vec<Vec<i32>>>(json!([[1], [2, "x"]])).unwrap_err();
        assert!(matches!(err, ReflectError::MalformedDocument { path, .. } if path == "/1/1"));
    }

    #[test]
    fn hash_set_roundtrip() {
        let set: HashSet<String> = ["x", "y", "z"].iter().map(|s| s.to_string()).collect();
        assert_eq!(save(&set), json!(["x", "y", "z"]));
        assert_eq!(load::<HashSet<String>>(save(&set)).unwrap(), set);
    }

    #[test]
    fn field_kinds() {
        assert_eq!(<u8 as Persist>::kind(), FieldKind::Scalar);
        assert_eq!(<Option<u8> as Persist>::kind(), FieldKind::Optional);
        assert_eq!(<Vec<u8> as Persist>::kind(), FieldKind::Sequence);
        assert_eq!(<BTreeMap<u8, u8> as Persist>::kind(), FieldKind::Mapping);
    }
}
