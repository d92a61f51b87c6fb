//! The output stream: component graph to tree document.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::{json, Value};

use crate::component::{Pointee, Reflect};
use crate::document::{ADDRESS, META, META_OWNED, META_REF, TYPE, VAL};
use crate::handle::{Own, Weak};
use crate::identity::InstanceId;
use crate::persist::Persist;
use crate::registry::TypeRegistry;
use crate::ReflectError;

// ---------------------------------------------------------------------------
// OutputStream
// ---------------------------------------------------------------------------

/// State of one save pass.
///
/// The visited set covers the whole pass: every nested save goes through
/// the same stream, so a second owning handle to an instance is detected
/// wherever it appears in the graph.
#[derive(Debug)]
pub struct OutputStream<'r> {
    registry: &'r TypeRegistry,
    visited: HashSet<InstanceId>,
    path: Vec<String>,
}

impl<'r> OutputStream<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self {
            registry,
            visited: HashSet::new(),
            path: Vec::new(),
        }
    }

    pub fn registry(&self) -> &'r TypeRegistry {
        self.registry
    }

    /// Number of owning nodes written so far.
    pub fn owned_count(&self) -> usize {
        self.visited.len()
    }

    /// Whether the instance `id` has already been written by this pass.
    pub fn has_serialized(&self, id: InstanceId) -> bool {
        self.visited.contains(&id)
    }

    // -- leaves ---------------------------------------------------------------

    pub fn write_null(&self) -> Value {
        Value::Null
    }

    /// Emit a scalar through its serde representation.
    pub fn write_scalar<S: Serialize + ?Sized>(&self, value: &S) -> Result<Value, ReflectError> {
        serde_json::to_value(value).map_err(|e| ReflectError::MalformedDocument {
            path: self.path_string(),
            details: format!("scalar could not be serialized: {e}"),
        })
    }

    /// Save any persistable value.
    pub fn save<P: Persist>(&mut self, value: &P) -> Result<Value, ReflectError> {
        value.save(self)
    }

    // -- component slots ------------------------------------------------------

    /// Save an owning handle as an `"owned"` node (or null).
    ///
    /// # Errors
    ///
    /// [`ReflectError::MultipleStrongReference`] if the instance was already
    /// written by this pass; [`ReflectError::UnknownType`] if its concrete
    /// type is not registered.
    pub fn save_owning<T: Pointee + ?Sized>(&mut self, handle: &Own<T>) -> Result<Value, ReflectError> {
        let Some((id, value)) = handle.parts() else {
            return Ok(self.write_null());
        };
        if !self.visited.insert(id) {
            return Err(ReflectError::MultipleStrongReference {
                address: id.to_raw(),
            });
        }

        let registry = self.registry;
        let component = value.component();
        let info = registry.info_for(component)?;
        let val = info.save(component, self)?;

        tracing::trace!(address = id.to_raw(), type_name = info.name(), "saved owned node");
        Ok(json!({
            META: META_OWNED,
            ADDRESS: id.to_raw(),
            TYPE: info.name(),
            VAL: val,
        }))
    }

    /// Save a weak reference as a `"ref"` node (or null).
    ///
    /// The target does not need to have been written yet.
    pub fn save_weak<T: ?Sized>(&mut self, reference: &Weak<T>) -> Result<Value, ReflectError> {
        Ok(match reference.id() {
            None => self.write_null(),
            Some(id) => json!({
                META: META_REF,
                ADDRESS: id.to_raw(),
            }),
        })
    }

    /// Save a value whose concrete type is statically known as a fixed-type
    /// node.
    ///
    /// # Errors
    ///
    /// [`ReflectError::UnknownType`] if `T` is not registered.
    pub fn save_fixed<T: Reflect>(&mut self, value: &T) -> Result<Value, ReflectError> {
        let name = self.registry.require::<T>()?.name();
        let val = T::schema().save(value, self)?;
        Ok(json!({
            TYPE: name,
            VAL: val,
        }))
    }

    // -- path tracking --------------------------------------------------------

    /// Push a path segment (field name or index) for diagnostics.
    pub fn enter(&mut self, segment: impl ToString) {
        self.path.push(segment.to_string());
    }

    pub fn leave(&mut self) {
        self.path.pop();
    }

    /// Current location as `/field/index/...`.
    pub fn path_string(&self) -> String {
        format!("/{}", self.path.join("/"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
