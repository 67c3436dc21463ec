//! Engine configuration.
//!
//! Every field has a default, so a partial JSON document only needs to name
//! what it changes.

use serde::{Deserialize, Serialize};

use crate::error::{Result, WaterError};

/// Vertical transport strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverKind {
    /// Adaptive sub-daily percolation and diffusion integration.
    #[default]
    Richards,
    /// Daily gravity drainage plus a relative-saturation diffusion pass.
    Tipping,
}

impl std::str::FromStr for SolverKind {
    type Err = WaterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "richards" => Ok(Self::Richards),
            "tipping" => Ok(Self::Tipping),
            other => Err(WaterError::InvalidConfig(format!(
                "unknown solver '{other}', expected 'richards' or 'tipping'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub solver: SolverKind,
    /// Largest VWC change allowed per sub-step [m3 m-3].
    pub discretization_tolerance: f64,
    /// First sub-step of each day [s].
    pub initial_step: u32,
    pub min_step: u32,
    pub max_step: u32,
    /// Maximum pond depth before spill to runoff [kg m-2].
    pub pond_max: f64,
    /// VWC excursion above saturation clamped silently [m3 m-3].
    pub saturation_tolerance: f64,
    /// Tolerance on balance checks and remaps [kg m-2].
    pub balance_tolerance: f64,
    /// Cumulative stage-1 evaporation limit [kg m-2].
    pub evaporation_stage1_limit: f64,
    /// Stage-2 evaporation coefficient [kg m-2 d-1/2].
    pub evaporation_stage2_coeff: f64,
    /// Capillary fringe height override [m]; `None` uses the air-entry head.
    pub capillary_fringe_height: Option<f64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            solver: SolverKind::Richards,
            discretization_tolerance: 0.002,
            initial_step: 60,
            min_step: 1,
            max_step: 3600,
            pond_max: 5.0,
            saturation_tolerance: 1e-6,
            balance_tolerance: 1e-9,
            evaporation_stage1_limit: 6.0,
            evaporation_stage2_coeff: 3.0,
            capillary_fringe_height: None,
        }
    }
}

impl EngineConfig {
    pub fn with_solver(solver: SolverKind) -> Self {
        Self {
            solver,
            ..Self::default()
        }
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| WaterError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("discretization_tolerance", self.discretization_tolerance),
            ("saturation_tolerance", self.saturation_tolerance),
            ("balance_tolerance", self.balance_tolerance),
        ];
        for (name, v) in positive {
            if !(v.is_finite() && v > 0.0) {
                return Err(WaterError::InvalidConfig(format!("{name} must be positive, got {v}")));
            }
        }
        let non_negative = [
            ("pond_max", self.pond_max),
            ("evaporation_stage1_limit", self.evaporation_stage1_limit),
            ("evaporation_stage2_coeff", self.evaporation_stage2_coeff),
        ];
        for (name, v) in non_negative {
            if !(v.is_finite() && v >= 0.0) {
                return Err(WaterError::InvalidConfig(format!(
                    "{name} must be non-negative, got {v}"
                )));
            }
        }
        if let Some(h) = self.capillary_fringe_height {
            if !(h.is_finite() && h >= 0.0) {
                return Err(WaterError::InvalidConfig(format!(
                    "capillary_fringe_height must be non-negative, got {h}"
                )));
            }
        }
        if self.min_step == 0 || self.min_step > self.max_step {
            return Err(WaterError::InvalidConfig(format!(
                "sub-step bounds must satisfy 0 < min_step <= max_step, got {}..{}",
                self.min_step, self.max_step
            )));
        }
        if !(self.min_step..=self.max_step).contains(&self.initial_step) {
            return Err(WaterError::InvalidConfig(format!(
                "initial_step {} outside {}..={}",
                self.initial_step, self.min_step, self.max_step
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let c = EngineConfig::default();
        assert!(c.validate().is_ok());
        assert_eq!(c.solver, SolverKind::Richards);
        assert_eq!(c.max_step, 3600);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let c = EngineConfig::from_json_str(r#"{"solver": "tipping", "pond_max": 10.0}"#).unwrap();
        assert_eq!(c.solver, SolverKind::Tipping);
        assert_eq!(c.pond_max, 10.0);
        assert_eq!(c.initial_step, 60);
        assert_eq!(c.capillary_fringe_height, None);
    }

    #[test]
    fn unknown_fields_rejected() {
        let err = EngineConfig::from_json_str(r#"{"pondmax": 1.0}"#).unwrap_err();
        assert!(matches!(err, WaterError::InvalidConfig(_)));
    }

    #[test]
    fn step_bounds_checked() {
        let c = EngineConfig {
            min_step: 100,
            max_step: 10,
            ..EngineConfig::default()
        };
        assert!(c.validate().is_err());

        let c = EngineConfig {
            initial_step: 7200,
            ..EngineConfig::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn negative_tolerance_rejected() {
        let c = EngineConfig {
            discretization_tolerance: -1.0,
            ..EngineConfig::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn solver_kind_parses() {
        assert_eq!("Tipping".parse::<SolverKind>().unwrap(), SolverKind::Tipping);
        assert!("implicit".parse::<SolverKind>().is_err());
    }

    #[test]
    fn serde_roundtrip() {
        let c = EngineConfig {
            capillary_fringe_height: Some(0.25),
            ..EngineConfig::with_solver(SolverKind::Tipping)
        };
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(EngineConfig::from_json_str(&json).unwrap(), c);
    }
}
