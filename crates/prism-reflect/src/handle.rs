//! Owning handles and non-owning references.
//!
//! These are the only two pointer-like relations the framework understands
//! between components:
//!
//! - [`Own<T>`] exclusively owns zero or one instance. Under owning edges
//!   the components form a tree.
//! - [`Weak<T>`] names an instance by its [`InstanceId`] and never owns it.
//!   It is resolved against a live graph through a
//!   [`GraphIndex`](crate::graph::GraphIndex).

use std::fmt;
use std::marker::PhantomData;

use crate::identity::InstanceId;

// ---------------------------------------------------------------------------
// Own
// ---------------------------------------------------------------------------

/// Nullable exclusive owner of one component.
///
/// `Own` is move-only; every non-null handle carries the identity of the
/// instance it owns.
pub struct Own<T: ?Sized> {
    slot: Option<(InstanceId, Box<T>)>,
}

impl<T> Own<T> {
    /// Own `value` under a fresh identity.
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }
}

impl<T: ?Sized> Own<T> {
    /// The null handle.
    pub fn null() -> Self {
        Self { slot: None }
    }

    /// Own an already boxed value under a fresh identity.
    ///
    /// This is also how a concrete value is placed in an interface slot:
    /// `Own::<dyn Material>::from_box(Box::new(matte))`.
    pub fn from_box(value: Box<T>) -> Self {
        Self::with_id(InstanceId::fresh(), value)
    }

    /// Rewrap `value` under an existing identity.
    ///
    /// Weak references that name `id` keep pointing at the new handle. The
    /// caller must make sure no other live handle carries `id`; saving a
    /// graph where two handles share an identity fails with
    /// [`ReflectError::MultipleStrongReference`](crate::ReflectError::MultipleStrongReference).
    pub fn with_id(id: InstanceId, value: Box<T>) -> Self {
        Self {
            slot: Some((id, value)),
        }
    }

    pub fn is_null(&self) -> bool {
        self.slot.is_none()
    }

    /// Identity of the owned instance, `None` for the null handle.
    pub fn id(&self) -> Option<InstanceId> {
        self.slot.as_ref().map(|(id, _)| *id)
    }

    pub fn get(&self) -> Option<&T> {
        self.slot.as_ref().map(|(_, value)| &**value)
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.slot.as_mut().map(|(_, value)| &mut **value)
    }

    /// The identity together with the owned value.
    pub fn parts(&self) -> Option<(InstanceId, &T)> {
        self.slot.as_ref().map(|(id, value)| (*id, &**value))
    }

    /// The identity together with the box itself, which graph walks expose
    /// as `&dyn Any` for typed downcasts.
    #[allow(clippy::borrowed_box)]
    pub(crate) fn boxed(&self) -> Option<(InstanceId, &Box<T>)> {
        self.slot.as_ref().map(|(id, value)| (*id, value))
    }

    /// Move the instance out, leaving this handle null.
    pub fn take(&mut self) -> Own<T> {
        Own {
            slot: self.slot.take(),
        }
    }

    /// Replace the owned instance with `value` under the *same* identity,
    /// returning the previous one under a fresh identity.
    ///
    /// Used when a component is swapped for another implementation while
    /// weak references to its slot must stay valid. On a null handle the
    /// value is owned under a fresh identity and a null handle is returned.
    pub fn replace_keeping_id(&mut self, value: Box<T>) -> Own<T> {
        match self.slot.take() {
            Some((id, previous)) => {
                self.slot = Some((id, value));
                Own::from_box(previous)
            }
            None => {
                *self = Own::from_box(value);
                Own::null()
            }
        }
    }

    pub fn into_parts(self) -> Option<(InstanceId, Box<T>)> {
        self.slot
    }

    /// A non-owning reference to this handle's instance (null if the handle
    /// is null).
    pub fn weak(&self) -> Weak<T> {
        Weak {
            target: self.id(),
            _marker: PhantomData,
        }
    }

    /// Convert the owned box (e.g. upcast to an interface object), keeping
    /// the identity.
    pub fn map_box<U: ?Sized>(self, f: impl FnOnce(Box<T>) -> Box<U>) -> Own<U> {
        Own {
            slot: self.slot.map(|(id, value)| (id, f(value))),
        }
    }
}

impl<T: ?Sized> Default for Own<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized> From<Box<T>> for Own<T> {
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Own<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.slot {
            None => f.write_str("Own(null)"),
            Some((id, value)) => f.debug_tuple("Own").field(id).field(value).finish(),
        }
    }
}

// ---------------------------------------------------------------------------
// Weak
// ---------------------------------------------------------------------------

/// Nullable non-owning reference, stored as the target's identity.
pub struct Weak<T: ?Sized> {
    target: Option<InstanceId>,
    _marker: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized> Weak<T> {
    pub fn null() -> Self {
        Self {
            target: None,
            _marker: PhantomData,
        }
    }

    /// A reference to whatever instance carries `id`.
    pub fn from_id(id: InstanceId) -> Self {
        Self {
            target: Some(id),
            _marker: PhantomData,
        }
    }

    pub fn is_null(&self) -> bool {
        self.target.is_none()
    }

    /// Identity of the target, `None` for the null reference.
    pub fn id(&self) -> Option<InstanceId> {
        self.target
    }

    /// Whether this reference names the instance owned by `owner`.
    ///
    /// Always `false` for null references and null handles.
    pub fn points_to<U: ?Sized>(&self, owner: &Own<U>) -> bool {
        self.target.is_some() && self.target == owner.id()
    }

    /// Reinterpret the target's static type (e.g. concrete to interface).
    pub fn cast<U: ?Sized>(self) -> Weak<U> {
        Weak {
            target: self.target,
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> Clone for Weak<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for Weak<T> {}

impl<T: ?Sized> PartialEq for Weak<T> {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target
    }
}

impl<T: ?Sized> Eq for Weak<T> {}

impl<T: ?Sized> Default for Weak<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized> fmt::Debug for Weak<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            None => f.write_str("Weak(null)"),
            Some(id) => write!(f, "Weak({id})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
