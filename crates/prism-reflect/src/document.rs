//! Document node shapes.
//!
//! The tree document is a `serde_json::Value`. Component-bearing nodes take
//! one of these shapes:
//!
//! ```text
//! null                                                    empty handle or reference
//! { "meta": "owned", "address": A, "type": T, "val": {..} }  owning handle
//! { "meta": "ref", "address": A }                          weak reference
//! { "type": T, "val": {..} }                               fixed-type slot
//! ```
//!
//! Sequences are arrays; mappings are arrays of `{ "key": .., "val": .. }`.

use serde_json::{Map, Value};

/// Key holding the ownership tag.
pub const META: &str = "meta";
/// Key holding the instance address.
pub const ADDRESS: &str = "address";
/// Key holding the registered type name.
pub const TYPE: &str = "type";
/// Key holding the field object (and a mapping entry's value).
pub const VAL: &str = "val";
/// Key holding a mapping entry's key.
pub const KEY: &str = "key";

/// Ownership tag of an owning node.
pub const META_OWNED: &str = "owned";
/// Ownership tag of a reference node.
pub const META_REF: &str = "ref";

// ---------------------------------------------------------------------------
// NodeShape
// ---------------------------------------------------------------------------

/// A classified component-bearing node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeShape<'a> {
    Null,
    Owned {
        address: u64,
        type_name: &'a str,
        val: &'a Value,
    },
    Ref {
        address: u64,
    },
    Fixed {
        type_name: &'a str,
        val: &'a Value,
    },
}

/// Why a node could not be classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    /// The `meta` tag is neither `"owned"` nor `"ref"`.
    UnknownTag(String),
    /// A required key is missing or has the wrong JSON type.
    Malformed(String),
}

impl<'a> NodeShape<'a> {
    /// Classify `node`.
    pub fn parse(node: &'a Value) -> Result<Self, ShapeError> {
        let object = match node {
            Value::Null => return Ok(NodeShape::Null),
            Value::Object(object) => object,
            other => {
                return Err(ShapeError::Malformed(format!(
                    "expected an object or null, found {}",
                    describe(other)
                )))
            }
        };

        match object.get(META) {
            None => Ok(NodeShape::Fixed {
                type_name: required_str(object, TYPE)?,
                val: required(object, VAL)?,
            }),
            Some(Value::String(tag)) if tag == META_OWNED => Ok(NodeShape::Owned {
                address: required_u64(object, ADDRESS)?,
                type_name: required_str(object, TYPE)?,
                val: required(object, VAL)?,
            }),
            Some(Value::String(tag)) if tag == META_REF => Ok(NodeShape::Ref {
                address: required_u64(object, ADDRESS)?,
            }),
            Some(Value::String(tag)) => Err(ShapeError::UnknownTag(tag.clone())),
            Some(other) => Err(ShapeError::Malformed(format!(
                "'{META}' must be a string, found {}",
                describe(other)
            ))),
        }
    }

    /// The tag this shape would carry, for error messages.
    pub fn tag(&self) -> &'static str {
        match self {
            NodeShape::Null => "null",
            NodeShape::Owned { .. } => META_OWNED,
            NodeShape::Ref { .. } => META_REF,
            NodeShape::Fixed { .. } => "fixed",
        }
    }
}

fn required<'a>(object: &'a Map<String, Value>, key: &str) -> Result<&'a Value, ShapeError> {
    object
        .get(key)
        .ok_or_else(|| ShapeError::Malformed(format!("missing required key '{key}'")))
}

fn required_str<'a>(object: &'a Map<String, Value>, key: &str) -> Result<&'a str, ShapeError> {
    let value = required(object, key)?;
    value.as_str().ok_or_else(|| {
        ShapeError::Malformed(format!("'{key}' must be a string, found {}", describe(value)))
    })
}

fn required_u64(object: &Map<String, Value>, key: &str) -> Result<u64, ShapeError> {
    let value = required(object, key)?;
    value.as_u64().ok_or_else(|| {
        ShapeError::Malformed(format!(
            "'{key}' must be an unsigned integer, found {}",
            describe(value)
        ))
    })
}

/// Short name of a JSON value's kind.
pub fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_all_shapes() {
        assert_eq!(NodeShape::parse(&Value::Null), Ok(NodeShape::Null));

        let owned = json!({"meta": "owned", "address": 7, "type": "IntLeaf", "val": {"value": 5}});
        assert_eq!(
            NodeShape::parse(&owned),
            Ok(NodeShape::Owned {
                address: 7,
                type_name: "IntLeaf",
                val: &json!({"value": 5}),
            })
        );

        let reference = json!({"meta": "ref", "address": 7});
        assert_eq!(NodeShape::parse(&reference), Ok(NodeShape::Ref { address: 7 }));

        let fixed = json!({"type": "Film", "val": {}});
        assert_eq!(
            NodeShape::parse(&fixed),
            Ok(NodeShape::Fixed {
                type_name: "Film",
                val: &json!({}),
            })
        );
    }

    #[test]
    fn unknown_tag() {
        let node = json!({"meta": "val", "address": 1});
        assert_eq!(NodeShape::parse(&node), Err(ShapeError::UnknownTag("val".to_owned())));
    }

    #[test]
    fn missing_keys_are_malformed() {
        for node in [
            json!({"meta": "owned", "type": "X", "val": {}}),
            json!({"meta": "owned", "address": 1, "val": {}}),
            json!({"meta": "owned", "address": 1, "type": "X"}),
            json!({"meta": "ref"}),
            json!({"meta": "ref", "address": -3}),
            json!({"meta": 3}),
            json!({"val": {}}),
            json!(12),
        ] {
            assert!(
                matches!(NodeShape::parse(&node), Err(ShapeError::Malformed(_))),
                "{node} should be malformed"
            );
        }
    }
}
