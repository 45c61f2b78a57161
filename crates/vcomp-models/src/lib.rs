//! Shared data models for the composition backend.
//!
//! This crate provides Serde-serializable types for:
//! - Composition jobs and clip requests
//! - Clip specs as they flow through the pipeline
//! - Canvas orientation and resolution
//! - Audio/video alignment policy
//! - Encoding configuration

pub mod alignment;
pub mod canvas;
pub mod clip;
pub mod encoding;
pub mod job;

// Re-export common types
pub use alignment::{AlignmentPolicy, AlignmentStandard, ALIGNMENT_TOLERANCE_SECS};
pub use canvas::{CanvasSpec, Orientation, Resolution};
pub use clip::{ClipRequest, ClipSpec};
pub use encoding::EncodingConfig;
pub use job::{CompositionJob, JobId};
