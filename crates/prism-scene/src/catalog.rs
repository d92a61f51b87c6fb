//! Implementation catalogs.
//!
//! A [`Catalog`] lists the choices an editor offers for an interface slot:
//! `"Empty"` followed by every registered implementation in name order.
//! Selecting a choice produces the replacement value for the slot; the
//! caller decides whether to keep the slot's identity ([`Catalog::apply`]).

use prism_reflect::prelude::*;

/// Entry standing for the null handle.
pub const EMPTY: &str = "Empty";

#[derive(Debug)]
pub struct Catalog<'r, I: Interface + ?Sized> {
    registry: &'r TypeRegistry,
    entries: Vec<&'static str>,
    _marker: std::marker::PhantomData<fn() -> Box<I>>,
}

impl<'r, I: Interface + ?Sized> Catalog<'r, I> {
    /// # Errors
    ///
    /// [`ReflectError::UnknownType`] when nothing implements `I`.
    pub fn of(registry: &'r TypeRegistry) -> Result<Self, ReflectError> {
        let mut entries = vec![EMPTY];
        entries.extend(registry.implementations_of::<I>()?.into_iter().map(|info| info.name()));
        Ok(Self {
            registry,
            entries,
            _marker: std::marker::PhantomData,
        })
    }

    pub fn tag(&self) -> &'static str {
        I::TAG
    }

    /// `"Empty"` first, then implementations in name order.
    pub fn entries(&self) -> &[&'static str] {
        &self.entries
    }

    pub fn contains(&self, choice: &str) -> bool {
        self.entries.iter().any(|entry| *entry == choice)
    }

    /// The entry describing what `slot` currently holds.
    pub fn current(&self, slot: &Own<I>) -> &'static str {
        slot.get().map_or(EMPTY, |value| value.component().type_name())
    }

    /// The replacement for `slot` when the user picks `choice`.
    ///
    /// Returns `None` when `choice` is what the slot already holds, a null
    /// handle for [`EMPTY`], and a fresh default instance otherwise.
    ///
    /// # Errors
    ///
    /// [`ReflectError::UnknownType`] when `choice` is not an entry.
    pub fn select(&self, slot: &Own<I>, choice: &str) -> Result<Option<Own<I>>, ReflectError> {
        if choice == self.current(slot) {
            return Ok(None);
        }
        if choice == EMPTY {
            return Ok(Some(Own::null()));
        }
        if !self.contains(choice) {
            return Err(ReflectError::UnknownType {
                name: choice.to_owned(),
                registered: self.entries.join(", "),
            });
        }
        let value = self.registry.construct_as::<I>(choice)?;
        Ok(Some(Own::from_box(value)))
    }

    /// Apply `choice` to `slot` in place, keeping the slot's identity so
    /// weak references to it stay valid. Returns whether the slot changed.
    pub fn apply(&self, slot: &mut Own<I>, choice: &str) -> Result<bool, ReflectError> {
        match self.select(slot, choice)? {
            None => Ok(false),
            Some(replacement) => {
                match replacement.into_parts() {
                    Some((_, value)) => {
                        slot.replace_keeping_id(value);
                    }
                    None => {
                        slot.take();
                    }
                }
                tracing::debug!(interface = I::TAG, choice, "catalog selection applied");
                Ok(true)
            }
        }
    }
}
