//! Clip composition worker.
//!
//! This crate provides:
//! - The [`Composer`] that turns a [`vcomp_models::CompositionJob`] into one file
//! - Per-clip stages: splice, audio presence, canvas standardization
//! - Job stages: sequencing, concatenation, audio alignment
//! - Scratch file lifecycle
//! - Structured job logging and Prometheus metrics

pub mod composer;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;

pub use composer::Composer;
pub use config::ComposerConfig;
pub use error::{AlignmentError, ComposeError, ComposeResult, SequencingError, Stage};
pub use logging::JobLogger;
