//! The component model.
//!
//! A *component* is any value whose concrete type implements [`Reflect`]:
//! it has a unique type name and a declared [`Schema`]. Every such type is
//! automatically a [`Component`], which is the object-safe view the
//! registry and the streams work with.
//!
//! Owning handles and weak references point at a [`Pointee`]: either a
//! concrete component type, `dyn Component`, or an interface object such as
//! `dyn Material` (see [`Interface`]).

use std::any::{Any, TypeId};

use crate::identity::InstanceId;
use crate::registry::TypeRegistry;
use crate::schema::Schema;
use crate::ReflectError;

// ---------------------------------------------------------------------------
// Reflect
// ---------------------------------------------------------------------------

/// Per-type declaration: a type name and an ordered field schema.
///
/// The schema is built once per type, normally behind a `OnceLock`:
///
/// ```
/// use std::sync::OnceLock;
/// use prism_reflect::prelude::*;
///
/// #[derive(Debug, Default)]
/// struct IntLeaf {
///     value: i32,
/// }
///
/// impl Reflect for IntLeaf {
///     const TYPE_NAME: &'static str = "IntLeaf";
///
///     fn schema() -> &'static Schema<Self> {
///         static SCHEMA: OnceLock<Schema<IntLeaf>> = OnceLock::new();
///         SCHEMA.get_or_init(|| Schema::<Self>::new().field("value", |s| &s.value, |s| &mut s.value))
///     }
/// }
///
/// assert_eq!(IntLeaf::schema().len(), 1);
/// ```
pub trait Reflect: Default + Send + Sync + 'static {
    /// Name recorded in documents. Must be unique within a registry.
    const TYPE_NAME: &'static str;

    /// The ordered field schema for this type.
    fn schema() -> &'static Schema<Self>;
}

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// A child reached through an owning edge while walking a live graph.
#[derive(Clone, Copy)]
pub struct OwnedRef<'a> {
    /// Identity of the owning handle.
    pub id: InstanceId,
    /// The pointee viewed as a component.
    pub component: &'a dyn Component,
    /// The `Box<T>` held by the handle, for typed downcasts.
    pub holder: &'a dyn Any,
}

/// Object-safe view of a reflected value.
///
/// Implemented for every [`Reflect`] type; there is no need (and no way) to
/// implement it by hand.
pub trait Component: Any + Send + Sync {
    /// The registered type name of the concrete type.
    fn type_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn as_component(&self) -> &dyn Component;

    fn as_component_mut(&mut self) -> &mut dyn Component;

    /// Call `visit` for every direct child held through an owning handle,
    /// in schema order.
    fn walk_owned<'a>(&'a self, visit: &mut dyn FnMut(OwnedRef<'a>));
}

impl<T: Reflect> Component for T {
    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn as_component(&self) -> &dyn Component {
        self
    }

    fn as_component_mut(&mut self) -> &mut dyn Component {
        self
    }

    fn walk_owned<'a>(&'a self, visit: &mut dyn FnMut(OwnedRef<'a>)) {
        T::schema().walk_owned(self, visit);
    }
}

impl dyn Component {
    /// Whether the concrete type is `T`.
    pub fn is<T: Component>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }

    /// `TypeId` of the concrete type (not of `dyn Component`).
    pub fn concrete_type_id(&self) -> TypeId {
        self.as_any().type_id()
    }
}

impl std::fmt::Debug for dyn Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{}>", self.type_name())
    }
}

// ---------------------------------------------------------------------------
// Pointee
// ---------------------------------------------------------------------------

/// Anything an [`Own`](crate::handle::Own) or [`Weak`](crate::handle::Weak)
/// may point at.
///
/// Concrete [`Reflect`] types and `dyn Component` are covered here. An
/// interface trait implements it for its trait object, delegating
/// construction to [`TypeRegistry::construct_as`]:
///
/// ```ignore
/// impl Pointee for dyn Material {
///     fn construct(registry: &TypeRegistry, name: &str) -> Result<Box<Self>, ReflectError> {
///         registry.construct_as::<dyn Material>(name)
///     }
///     fn component(&self) -> &dyn Component { self.as_component() }
///     fn component_mut(&mut self) -> &mut dyn Component { self.as_component_mut() }
/// }
/// ```
pub trait Pointee: Send + Sync + 'static {
    /// Build a default instance of the registered type `type_name`, viewed
    /// as `Self`.
    fn construct(registry: &TypeRegistry, type_name: &str) -> Result<Box<Self>, ReflectError>;

    fn component(&self) -> &dyn Component;

    fn component_mut(&mut self) -> &mut dyn Component;

    /// Typed view of an arbitrary component, if it is a `Self`.
    ///
    /// Interfaces may leave the default, which never matches; weak
    /// references of interface type are then resolved through the owning
    /// slot's own static type instead.
    fn from_component(component: &dyn Component) -> Option<&Self> {
        let _ = component;
        None
    }
}

impl<T: Reflect> Pointee for T {
    fn construct(registry: &TypeRegistry, type_name: &str) -> Result<Box<Self>, ReflectError> {
        let info = registry.lookup(type_name)?;
        if info.type_id() != TypeId::of::<T>() {
            return Err(ReflectError::TypeMismatch {
                expected: T::TYPE_NAME.to_owned(),
                found: type_name.to_owned(),
            });
        }
        Ok(Box::new(T::default()))
    }

    fn component(&self) -> &dyn Component {
        self
    }

    fn component_mut(&mut self) -> &mut dyn Component {
        self
    }

    fn from_component(component: &dyn Component) -> Option<&Self> {
        component.downcast_ref::<T>()
    }
}

impl Pointee for dyn Component {
    fn construct(registry: &TypeRegistry, type_name: &str) -> Result<Box<Self>, ReflectError> {
        Ok(registry.lookup(type_name)?.construct())
    }

    fn component(&self) -> &dyn Component {
        self
    }

    fn component_mut(&mut self) -> &mut dyn Component {
        self
    }

    fn from_component(component: &dyn Component) -> Option<&Self> {
        Some(component)
    }
}

// ---------------------------------------------------------------------------
// Interface
// ---------------------------------------------------------------------------

/// A trait object whose implementations are enumerable through the
/// registry's interface index.
pub trait Interface: Pointee {
    /// Human-readable tag, e.g. `"Material"`.
    const TAG: &'static str;
}

/// Implement [`Pointee`], [`Interface`] and `Debug` for `dyn $trait`.
///
/// `$trait` must have [`Component`] as a supertrait.
///
/// ```
/// use prism_reflect::prelude::*;
///
/// pub trait Light: Component {
///     fn power(&self) -> f32;
/// }
///
/// prism_reflect::declare_interface!(Light, "Light");
///
/// assert_eq!(<dyn Light as Interface>::TAG, "Light");
/// ```
#[macro_export]
macro_rules! declare_interface {
    ($trait:ident, $tag:literal) => {
        impl $crate::component::Pointee for dyn $trait {
            fn construct(
                registry: &$crate::registry::TypeRegistry,
                type_name: &str,
            ) -> ::std::result::Result<::std::boxed::Box<Self>, $crate::ReflectError> {
                registry.construct_as::<dyn $trait>(type_name)
            }

            fn component(&self) -> &dyn $crate::component::Component {
                $crate::component::Component::as_component(self)
            }

            fn component_mut(&mut self) -> &mut dyn $crate::component::Component {
                $crate::component::Component::as_component_mut(self)
            }
        }

        impl $crate::component::Interface for dyn $trait {
            const TAG: &'static str = $tag;
        }

        impl ::std::fmt::Debug for dyn $trait {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "<{}>", $crate::component::Component::type_name(self))
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
