//! Run input and mutable run state.
//!
//! This module provides:
//! - Immutable provisioning options and executor filters
//! - Write-once result slots
//! - The provisioning context threaded through actions

mod options;
mod provision;
mod slots;

pub use options::{ExecutorFilters, ProvisionOptions, VolumeCreateParams};
pub use provision::ProvisionContext;
pub use slots::Slot;
