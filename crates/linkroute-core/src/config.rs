//! Routing configuration.

use linkroute_router::RouterOptions;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse routing options: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid routing options: {0}")]
    Invalid(String),
}

/// Options handed to the geometry engine when it loads.
///
/// Keys are camelCase in JSON, missing keys take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoutingOptions {
    /// Distance obstacles are inflated by.
    pub shape_buffer_distance: f64,
    /// Separation between parallel segments of different connections.
    pub ideal_nudging_distance: f64,
    /// Straight run out of a port before the first bend.
    pub port_overflow: f64,
}

impl Default for RoutingOptions {
    fn default() -> Self {
        Self {
            shape_buffer_distance: 20.0,
            ideal_nudging_distance: 10.0,
            port_overflow: 10.0,
        }
    }
}

impl RoutingOptions {
    /// Parse options from JSON and validate them.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Serialize options to JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject negative or non-finite distances.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("shapeBufferDistance", self.shape_buffer_distance),
            ("idealNudgingDistance", self.ideal_nudging_distance),
            ("portOverflow", self.port_overflow),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Options for the reference router.
    pub fn to_router_options(&self) -> RouterOptions {
        RouterOptions {
            shape_buffer_distance: self.shape_buffer_distance,
            ideal_nudging_distance: self.ideal_nudging_distance,
            port_overflow: self.port_overflow,
            ..RouterOptions::default()
        }
    }
}
