//! # Podflow
//!
//! Provisioning pipelines for rented GPU pods.
//!
//! Podflow provides:
//!
//! - **Candidate selection**: Pareto filtering over price and hardware metrics
//! - **Action pipelines**: sequential, side-effecting steps with gating, step
//!   counting and a clean stop outcome
//! - **Reporting**: a progress contract with console, silent and recording
//!   implementations
//! - **Fan-out**: bounded concurrent execution of one command over many pods
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use podflow::prelude::*;
//!
//! let mut ctx = ProvisionContext::new(options, provider, reporter, store);
//! preflight_pipeline().run_preflight(&mut ctx).await?;
//! let outcome = provision_pipeline().run(&mut ctx).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod actions;
pub mod config;
pub mod context;
pub mod errors;
pub mod pipeline;
pub mod provider;
pub mod reporter;
pub mod selection;
pub mod store;
pub mod summary;
pub mod termination;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::actions::{Action, ActionContext, Flow, FnAction};
    pub use crate::config::Config;
    pub use crate::context::{ExecutorFilters, ProvisionContext, ProvisionOptions, Slot};
    pub use crate::errors::{ActionFailed, PodflowError, RemoteError, Result};
    pub use crate::pipeline::{
        exec_all, preflight_pipeline, provision_pipeline, run_bounded, FanOutReport, Pipeline,
        PipelineOutcome,
    };
    #[cfg(feature = "http")]
    pub use crate::provider::HttpProvider;
    pub use crate::provider::{ExecutorInfo, PodInfo, Provider, Template};
    pub use crate::reporter::{ConsoleReporter, NullReporter, Reporter, SummaryItem};
    pub use crate::selection::{pareto_frontier, pick_best, Candidate, MetricPolicy};
    pub use crate::store::{FileSelectionStore, MemorySelectionStore, SelectionStore};
    pub use crate::summary::UpSummary;
    pub use crate::termination::parse_termination_time;
}
