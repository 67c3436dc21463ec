//! Pedotransfer functions: hydraulic parameters from sand/silt/clay.
//!
//! Cosby-type regressions for the Brooks-Corey exponent, saturated potential,
//! porosity and conductivity; characteristic water contents follow from
//! inverting the retention curve at fixed potentials.

use super::constants::{
    PSI_FIELD_CAPACITY, PSI_HYGROSCOPIC, PSI_WILTING_POINT, TEXTURE_BOUNDS,
    TEXTURE_SUM_TOLERANCE,
};
use super::layer::HydraulicProperties;
use crate::error::{Result, WaterError};

/// Conversion from inch per hour to metre per second.
const INCH_PER_HOUR_TO_M_PER_S: f64 = 7.0556e-6;

/// Conversion from cm of suction to MPa.
const CM_TO_MPA: f64 = 9.8e-5;

/// Soil texture as mass percentages of the fine earth fraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Texture {
    pub sand: f64,
    pub silt: f64,
    pub clay: f64,
}

impl Texture {
    pub fn new(sand: f64, silt: f64, clay: f64) -> Result<Self> {
        for (name, v) in [("sand", sand), ("silt", silt), ("clay", clay)] {
            if !v.is_finite() || !TEXTURE_BOUNDS.contains(v) {
                return Err(WaterError::InvalidInput(format!(
                    "{name} = {v} % is out of bounds [{}, {}]",
                    TEXTURE_BOUNDS.min, TEXTURE_BOUNDS.max
                )));
            }
        }
        let total = sand + silt + clay;
        if (total - 100.0).abs() > TEXTURE_SUM_TOLERANCE {
            return Err(WaterError::InvalidInput(format!(
                "sand + silt + clay = {total} %, expected 100 %"
            )));
        }
        Ok(Self { sand, silt, clay })
    }

    /// Brooks-Corey exponent b [-].
    pub fn soil_b(&self) -> f64 {
        3.1 + 0.157 * self.clay - 0.003 * self.sand
    }

    /// Saturated matric potential [MPa].
    pub fn psi_sat(&self) -> f64 {
        let suction_cm = 10f64.powf(1.54 - 0.0095 * self.sand + 0.0063 * self.silt);
        -suction_cm * CM_TO_MPA
    }

    /// Porosity, i.e. saturation VWC [m3 m-3].
    pub fn vwc_sat(&self) -> f64 {
        (50.5 - 0.142 * self.sand - 0.037 * self.clay) / 100.0
    }

    /// Saturated hydraulic conductivity [m s-1].
    pub fn ksat(&self) -> f64 {
        10f64.powf(-0.6 + 0.0126 * self.sand - 0.0064 * self.clay) * INCH_PER_HOUR_TO_M_PER_S
    }

    /// Daily tipping-bucket drain fraction; coarse soils drain faster.
    pub fn drain_coeff(&self) -> f64 {
        (0.1 + 0.006 * self.sand).clamp(0.1, 0.7)
    }

    /// Derive the full parameter set.
    pub fn hydraulic_properties(&self) -> HydraulicProperties {
        let soil_b = self.soil_b();
        let psi_sat = self.psi_sat();
        let vwc_sat = self.vwc_sat();
        let at = |psi: f64| vwc_at_potential(vwc_sat, psi_sat, soil_b, psi);
        HydraulicProperties {
            vwc_sat,
            vwc_fc: at(PSI_FIELD_CAPACITY),
            vwc_wp: at(PSI_WILTING_POINT),
            vwc_hw: at(PSI_HYGROSCOPIC),
            ksat: self.ksat(),
            soil_b,
            psi_sat,
            drain_coeff: self.drain_coeff(),
        }
    }
}

/// Inverse retention curve: `θ = θsat·(ψ/ψsat)^(-1/b)`, capped at saturation.
pub fn vwc_at_potential(vwc_sat: f64, psi_sat: f64, soil_b: f64, psi: f64) -> f64 {
    if psi >= psi_sat {
        return vwc_sat;
    }
    vwc_sat * (psi / psi_sat).powf(-1.0 / soil_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_approx(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() < tol,
            "expected {expected} +/- {tol}, got {actual}"
        );
    }

    #[test]
    fn loam_parameters_are_plausible() {
        let t = Texture::new(40.0, 40.0, 20.0).unwrap();
        let p = t.hydraulic_properties();
        assert_approx(p.soil_b, 6.12, 1e-9);
        assert_approx(p.vwc_sat, 0.4408, 1e-9);
        assert!(p.vwc_fc > 0.25 && p.vwc_fc < 0.33, "fc = {}", p.vwc_fc);
        assert!(p.vwc_wp > 0.12 && p.vwc_wp < 0.19, "wp = {}", p.vwc_wp);
        assert!(p.ksat > 1e-6 && p.ksat < 1e-5, "ksat = {}", p.ksat);
    }

    #[test]
    fn derived_contents_are_ordered() {
        for (sand, silt, clay) in [(90.0, 5.0, 5.0), (40.0, 40.0, 20.0), (10.0, 30.0, 60.0)] {
            let p = Texture::new(sand, silt, clay).unwrap().hydraulic_properties();
            assert!(p.validate(0).is_ok(), "texture {sand}/{silt}/{clay}: {p:?}");
        }
    }

    #[test]
    fn sand_drains_faster_than_clay() {
        let sand = Texture::new(90.0, 5.0, 5.0).unwrap();
        let clay = Texture::new(10.0, 30.0, 60.0).unwrap();
        assert!(sand.ksat() > clay.ksat());
        assert!(sand.drain_coeff() > clay.drain_coeff());
    }

    #[test]
    fn rejects_bad_sum() {
        assert!(Texture::new(50.0, 50.0, 50.0).is_err());
    }

    #[test]
    fn rejects_negative_fraction() {
        assert!(Texture::new(-5.0, 55.0, 50.0).is_err());
    }

    #[test]
    fn potential_above_air_entry_is_saturated() {
        assert_eq!(vwc_at_potential(0.45, -0.003, 5.0, -0.001), 0.45);
    }
}
