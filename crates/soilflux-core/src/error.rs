//! Error type for the soil water engine.
//!
//! Every fatal condition stops the day's computation. There is no retry: these
//! are parameterization or programming errors, not runtime faults.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, WaterError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WaterError {
    /// Water content above saturation by more than the clamp tolerance.
    #[error(
        "layer {layer}: volumetric water content {vwc:.6} exceeds saturation {saturation:.6} beyond tolerance"
    )]
    ParameterViolation {
        layer: usize,
        vwc: f64,
        saturation: f64,
    },

    /// Realized flux larger than the potential supplied upstream.
    #[error("{quantity}: realized {realized:.9} kg/m2 exceeds potential {potential:.9} kg/m2")]
    BalanceViolation {
        quantity: &'static str,
        realized: f64,
        potential: f64,
    },

    /// The groundwater view did not fold back conservatively.
    #[error("groundwater remap changed column water by {discrepancy:e} kg/m2")]
    RemapViolation { discrepancy: f64 },

    /// A hygroscopic-floor shortfall that no sink could absorb.
    #[error("layer {layer}: storage shortfall {shortfall:e} kg/m2 could not be absorbed")]
    NegativeStorage { layer: usize, shortfall: f64 },

    #[error("invalid soil layer {layer}: {reason}")]
    InvalidLayer { layer: usize, reason: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl WaterError {
    pub(crate) fn layer(layer: usize, reason: impl Into<String>) -> Self {
        Self::InvalidLayer {
            layer,
            reason: reason.into(),
        }
    }

    /// `true` for the fatal conditions raised while integrating a day.
    pub fn is_numerical(&self) -> bool {
        matches!(
            self,
            Self::ParameterViolation { .. }
                | Self::BalanceViolation { .. }
                | Self::RemapViolation { .. }
                | Self::NegativeStorage { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_layer() {
        let err = WaterError::ParameterViolation {
            layer: 3,
            vwc: 0.51,
            saturation: 0.45,
        };
        assert!(err.to_string().contains("layer 3"));
        assert!(err.is_numerical());
    }

    #[test]
    fn input_errors_are_not_numerical() {
        assert!(!WaterError::InvalidInput("x".into()).is_numerical());
        assert!(!WaterError::layer(0, "bad").is_numerical());
    }
}
