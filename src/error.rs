use thiserror::Error;

use crate::movement::MovementCheck;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Different channel types selected ({0}); pick one type")]
    MixedChannelTypes(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid {check} limit: {value} (must be a positive number)")]
    InvalidLimit { check: MovementCheck, value: f64 },

    #[error("Head position timestamps must be strictly increasing (sample {index}: {previous} -> {current})")]
    NonIncreasingTimestamps {
        index: usize,
        previous: f64,
        current: f64,
    },

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Inconsistent data: {0}")]
    DataConsistency(String),

    #[error("First head position is before the first sample and the next one is only {gap:.6}s later (sample period {period:.6}s)")]
    RoundingGap { gap: f64, period: f64 },

    #[error("Average head translation is {magnitude:.3} m, expected less than 1 m")]
    ImplausibleTranslation { magnitude: f64 },

    #[error("No good data left after excluding bad segments")]
    NoGoodData,

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl ArtifactError {
    /// Errors the caller can fix by changing its input.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::MixedChannelTypes(_)
                | Self::InvalidParameter(_)
                | Self::InvalidLimit { .. }
                | Self::NonIncreasingTimestamps { .. }
                | Self::EmptyInput(_)
                | Self::Config(_)
        )
    }

    /// Errors that point at corrupted upstream data.
    pub fn is_data_consistency_error(&self) -> bool {
        matches!(
            self,
            Self::DataConsistency(_)
                | Self::RoundingGap { .. }
                | Self::ImplausibleTranslation { .. }
                | Self::NoGoodData
        )
    }
}

pub type Result<T> = std::result::Result<T, ArtifactError>;
