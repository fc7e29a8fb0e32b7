//! Testing utilities for podflow pipelines.
//!
//! This module provides:
//! - An in-memory provider with scripted catalogs and failures
//! - A reporter that records every call and scripts prompt answers

mod fake_provider;
mod recording;

pub use fake_provider::FakeProvider;
pub use recording::{RecordingReporter, ReporterEvent};
