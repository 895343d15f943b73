use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::movement::MovementLimits;
use crate::muscle::MuscleConfig;

/// Combined detector configuration, usually loaded from JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactConfig {
    #[serde(default)]
    pub muscle: MuscleConfig,
    #[serde(default)]
    pub movement: MovementLimits,
}

impl ArtifactConfig {
    /// Parse and validate. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.muscle.validate()?;
        self.movement.validate()
    }
}
