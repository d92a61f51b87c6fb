//! Dispatch on the concrete type behind a `dyn Component`.

use std::any::TypeId;
use std::collections::HashMap;

use crate::component::{Component, Reflect};

type Handler<'a, R> = Box<dyn Fn(&dyn Component) -> Option<R> + 'a>;

/// A type-keyed table of handlers.
///
/// ```
/// # use std::sync::OnceLock;
/// # use prism_reflect::prelude::*;
/// # #[derive(Debug, Default)] struct Sphere { radius: f32 }
/// # impl Reflect for Sphere {
/// #     const TYPE_NAME: &'static str = "Sphere";
/// #     fn schema() -> &'static Schema<Self> {
/// #         static S: OnceLock<Schema<Sphere>> = OnceLock::new();
/// #         S.get_or_init(|| Schema::<Self>::new().field("radius", |s| &s.radius, |s| &mut s.radius))
/// #     }
/// # }
/// let describe = TypeSwitch::new().on(|s: &Sphere| format!("sphere r={}", s.radius));
/// let sphere = Sphere { radius: 2.0 };
/// assert_eq!(describe.dispatch(&sphere).as_deref(), Some("sphere r=2"));
/// ```
pub struct TypeSwitch<'a, R> {
    handlers: HashMap<TypeId, Handler<'a, R>>,
    fallback: Option<Box<dyn Fn(&dyn Component) -> R + 'a>>,
}

impl<'a, R> TypeSwitch<'a, R> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            fallback: None,
        }
    }

    /// Handle components of concrete type `T`. A later handler for the same
    /// type replaces the earlier one.
    pub fn on<T: Reflect>(mut self, handler: impl Fn(&T) -> R + 'a) -> Self {
        self.handlers.insert(
            TypeId::of::<T>(),
            Box::new(move |component: &dyn Component| component.downcast_ref::<T>().map(&handler)),
        );
        self
    }

    /// Handle every component without a dedicated handler.
    pub fn otherwise(mut self, handler: impl Fn(&dyn Component) -> R + 'a) -> Self {
        self.fallback = Some(Box::new(handler));
        self
    }

    /// Run the handler for the concrete type of `component`.
    ///
    /// Returns `None` when no handler (and no fallback) matches.
    pub fn dispatch(&self, component: &dyn Component) -> Option<R> {
        match self.handlers.get(&component.concrete_type_id()) {
            Some(handler) => handler(component),
            None => self.fallback.as_ref().map(|fallback| fallback(component)),
        }
    }

    /// Whether a dedicated handler exists for the concrete type.
    pub fn handles(&self, component: &dyn Component) -> bool {
        self.handlers.contains_key(&component.concrete_type_id())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<R> Default for TypeSwitch<'_, R> {
    fn default() -> Self {
        Self::new()
    }
}
