//! Write-once context slots.

use crate::errors::{MissingStateError, SlotConflictError};

/// A named value that may be written exactly once.
///
/// A second write returns [`SlotConflictError`]; reading an empty slot
/// through [`Slot::require`] returns [`MissingStateError`].
#[derive(Debug, Clone)]
pub struct Slot<T> {
    name: &'static str,
    value: Option<T>,
}

impl<T> Slot<T> {
    /// Creates an empty slot.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self { name, value: None }
    }

    /// Slot name used in errors.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Fills the slot.
    ///
    /// # Errors
    ///
    /// Returns `SlotConflictError` if the slot was already written.
    pub fn set(&mut self, value: T) -> Result<(), SlotConflictError> {
        if self.value.is_some() {
            return Err(SlotConflictError::new(self.name));
        }
        self.value = Some(value);
        Ok(())
    }

    /// Returns the value if filled.
    #[must_use]
    pub const fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Returns the value or a missing-state error.
    pub fn require(&self) -> Result<&T, MissingStateError> {
        self.value.as_ref().ok_or(MissingStateError::new(self.name))
    }

    /// True once written.
    #[must_use]
    pub const fn is_filled(&self) -> bool {
        self.value.is_some()
    }
}
