//! Prism Reflect -- polymorphic object-graph persistence.
//!
//! Components register a type name and an ordered field [`Schema`] with a
//! [`TypeRegistry`]. Graphs of components connected by owning handles
//! ([`Own`]) and non-owning references ([`Weak`]) are then saved to and
//! loaded from a JSON tree document. Owning edges must form a tree: a
//! second owning handle to an instance fails the save with
//! [`ReflectError::MultipleStrongReference`]. Weak references are written as
//! addresses and rebound to the reconstructed instances on load.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::OnceLock;
//! use prism_reflect::prelude::*;
//!
//! #[derive(Debug, Default)]
//! struct IntLeaf {
//!     value: i32,
//! }
//!
//! impl Reflect for IntLeaf {
//!     const TYPE_NAME: &'static str = "IntLeaf";
//!
//!     fn schema() -> &'static Schema<Self> {
//!         static SCHEMA: OnceLock<Schema<IntLeaf>> = OnceLock::new();
//!         SCHEMA.get_or_init(|| Schema::<Self>::new().field("value", |s| &s.value, |s| &mut s.value))
//!     }
//! }
//!
//! let mut registry = TypeRegistry::new();
//! registry.register::<IntLeaf>();
//!
//! let leaf = Own::new(IntLeaf { value: 5 });
//! let document = prism_reflect::save(&registry, &leaf).unwrap();
//! assert_eq!(document["type"], "IntLeaf");
//! assert_eq!(document["val"]["value"], 5);
//!
//! let loaded: Own<IntLeaf> = prism_reflect::load(&registry, &document).unwrap();
//! assert_eq!(loaded.get().unwrap().value, 5);
//! ```

#![deny(unsafe_code)]

pub mod component;
pub mod dispatch;
pub mod document;
pub mod graph;
pub mod handle;
pub mod identity;
pub mod input;
pub mod output;
pub mod persist;
pub mod registry;
pub mod schema;

use serde_json::Value;

use crate::component::{Pointee, Reflect};
use crate::handle::Own;
use crate::input::InputStream;
use crate::output::OutputStream;
use crate::registry::TypeRegistry;

#[doc(inline)]
pub use crate::schema::Schema;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by save and load passes.
///
/// Every error aborts the pass; no partial result is returned.
#[derive(Debug, thiserror::Error)]
pub enum ReflectError {
    /// A type name is not registered (or an interface has no
    /// implementations).
    #[error("type '{name}' not registered. Registered types: [{registered}]")]
    UnknownType {
        name: String,
        registered: String,
    },

    /// A second owning handle targets an instance already written (or an
    /// owned address appears twice in a document).
    #[error("instance at address {address} is owned more than once")]
    MultipleStrongReference {
        address: u64,
    },

    /// The node's ownership tag does not fit the slot.
    #[error("expected a '{expected}' node, found '{found}'")]
    InvalidOwnershipTag {
        expected: &'static str,
        found: String,
    },

    /// A reference names an address that has not been loaded yet.
    #[error("reference to address {address} does not match any previously loaded instance")]
    UnresolvedReference {
        address: u64,
    },

    /// A stored type name does not fit the destination type.
    #[error("type mismatch: expected '{expected}', found '{found}'")]
    TypeMismatch {
        expected: String,
        found: String,
    },

    /// A structural key is missing or has the wrong shape.
    #[error("malformed document at {path}: {details}")]
    MalformedDocument {
        path: String,
        details: String,
    },
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Save the graph owned by `root`.
pub fn save<T: Pointee + ?Sized>(registry: &TypeRegistry, root: &Own<T>) -> Result<Value, ReflectError> {
    let mut out = OutputStream::new(registry);
    let document = out.save_owning(root)?;
    tracing::debug!(owned = out.owned_count(), "save pass finished");
    Ok(document)
}

/// Load a graph saved by [`save`].
pub fn load<T: Pointee + ?Sized>(registry: &TypeRegistry, document: &Value) -> Result<Own<T>, ReflectError> {
    let mut input = InputStream::new(registry);
    let root = input.load_owning(document)?;
    tracing::debug!(owned = input.owned_count(), "load pass finished");
    Ok(root)
}

/// Save a value of statically known type as a fixed-type node.
pub fn save_fixed<T: Reflect>(registry: &TypeRegistry, value: &T) -> Result<Value, ReflectError> {
    let mut out = OutputStream::new(registry);
    let document = out.save_fixed(value)?;
    tracing::debug!(type_name = T::TYPE_NAME, owned = out.owned_count(), "fixed save pass finished");
    Ok(document)
}

/// Load a fixed-type node saved by [`save_fixed`].
pub fn load_fixed<T: Reflect>(registry: &TypeRegistry, document: &Value) -> Result<T, ReflectError> {
    let mut input = InputStream::new(registry);
    let value = input.load_fixed(document)?;
    tracing::debug!(type_name = T::TYPE_NAME, owned = input.owned_count(), "fixed load pass finished");
    Ok(value)
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::component::{Component, Interface, OwnedRef, Pointee, Reflect};
    pub use crate::dispatch::TypeSwitch;
    pub use crate::graph::GraphIndex;
    pub use crate::handle::{Own, Weak};
    pub use crate::identity::InstanceId;
    pub use crate::input::InputStream;
    pub use crate::output::OutputStream;
    pub use crate::persist::{Persist, Serde};
    pub use crate::registry::{TypeInfo, TypeRegistry};
    pub use crate::schema::{FieldInfo, FieldKind, Schema};
    pub use crate::ReflectError;
    pub use crate::declare_interface;
}
