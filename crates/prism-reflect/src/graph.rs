//! Resolving weak references against a live graph.
//!
//! A [`Weak`] is only an identity. To reach its target, walk the owning
//! edges of the graph that contains it once, and look identities up in the
//! resulting [`GraphIndex`].

use std::collections::{BTreeMap, HashMap};

use crate::component::{Component, OwnedRef, Pointee, Reflect};
use crate::handle::{Own, Weak};
use crate::identity::InstanceId;
use crate::persist::Persist;

/// Identity -> component map over every instance reachable through owning
/// handles from a root.
#[derive(Default)]
pub struct GraphIndex<'g> {
    nodes: HashMap<InstanceId, OwnedRef<'g>>,
}

impl<'g> GraphIndex<'g> {
    /// Index the graph owned by `root` (the root itself included).
    pub fn build<T: Pointee + ?Sized>(root: &'g Own<T>) -> Self {
        let mut index = Self::default();
        <Own<T> as Persist>::walk_owned(root, &mut |node| index.insert(node));
        index
    }

    /// Index the graph under a value that is not itself behind a handle,
    /// such as a fixed-type scene root.
    pub fn from_fixed<T: Reflect>(root: &'g T) -> Self {
        let mut index = Self::default();
        Component::walk_owned(root, &mut |node| index.insert(node));
        index
    }

    fn insert(&mut self, node: OwnedRef<'g>) {
        if self.nodes.insert(node.id, node).is_some() {
            tracing::warn!(instance = %node.id, "identity owned twice in one graph");
            return;
        }
        node.component.walk_owned(&mut |child| self.insert(child));
    }

    /// The component carrying `id`.
    pub fn get(&self, id: InstanceId) -> Option<&'g dyn Component> {
        self.nodes.get(&id).map(|node| node.component)
    }

    /// Dereference `reference`.
    ///
    /// Returns `None` for a null or dangling reference, and when the target
    /// is not a `T`.
    pub fn resolve<T: Pointee + ?Sized>(&self, reference: &Weak<T>) -> Option<&'g T> {
        let node = *self.nodes.get(&reference.id()?)?;
        if let Some(boxed) = node.holder.downcast_ref::<Box<T>>() {
            return Some(&**boxed);
        }
        T::from_component(node.component)
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Number of indexed instances.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every indexed component, in no particular order.
    pub fn components(&self) -> impl Iterator<Item = &'g dyn Component> + '_ {
        self.nodes.values().map(|node| node.component)
    }

    /// Instance count per concrete type name.
    pub fn count_by_type(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for component in self.components() {
            *counts.entry(component.type_name()).or_insert(0) += 1;
        }
        counts
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
