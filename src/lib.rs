//! Muscle and head-movement artifact detection for MEG/EEG recordings.
//!
//! Detectors produce [`Annotations`] labelling bad time spans, and
//! [`compute_average_dev_head_t`] averages continuous head position fits into
//! a single device-to-head transform over the good parts of a recording.

pub mod annotations;
pub mod config;
pub mod error;
pub mod filter;
pub mod head_transform;
pub mod mask;
pub mod movement;
pub mod muscle;
pub mod profiling;
pub mod quaternion;
pub mod report;
pub mod transform;
pub mod types;

pub use annotations::{annotations_from_mask, Annotation, Annotations};
pub use config::ArtifactConfig;
pub use error::{ArtifactError, Result};
pub use filter::{ButterworthFilter, SignalFilter};
pub use head_transform::compute_average_dev_head_t;
pub use mask::{absorb_short_runs, segment};
pub use movement::{
    annotate_movement, MovementCheck, MovementDetection, MovementDetector, MovementLimits,
};
pub use muscle::{
    annotate_muscle_zscore, MuscleConfig, MuscleDetection, MuscleDetector, MUSCLE_DESCRIPTION,
};
pub use quaternion::{angle_between, average_quaternions};
pub use report::{CollectingReporter, LogReporter, OmissionReporter, OmissionSummary};
pub use transform::{CoordFrame, RigidTransform};
pub use types::*;
