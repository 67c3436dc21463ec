//! A single soil layer and its static hydraulic parameters.

use serde::{Deserialize, Serialize};

use super::constants::{
    DRAIN_COEFF_BOUNDS, KSAT_BOUNDS, MPA_TO_HEAD_M, ORDERING_EPS, PSI_SAT_BOUNDS, SOIL_B_BOUNDS,
    WATER_DENSITY,
};
use super::texture::Texture;
use crate::error::{Result, WaterError};

/// Hydrologic zone of a layer relative to the water table.
///
/// The three zones are mutually exclusive. Zones are assigned once per day
/// from the groundwater depth and never stored on the layer itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HydroZone {
    #[default]
    Normal,
    CapillaryFringe,
    Groundwater,
}

/// Texture-derived hydraulic parameters shared by all depths of one soil.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HydraulicProperties {
    /// Saturation VWC [m3 m-3].
    pub vwc_sat: f64,
    /// Field-capacity VWC [m3 m-3].
    pub vwc_fc: f64,
    /// Wilting-point VWC [m3 m-3].
    pub vwc_wp: f64,
    /// Hygroscopic-point VWC [m3 m-3].
    pub vwc_hw: f64,
    /// Saturated hydraulic conductivity [m s-1].
    pub ksat: f64,
    /// Brooks-Corey exponent [-].
    pub soil_b: f64,
    /// Saturated matric potential [MPa], negative.
    pub psi_sat: f64,
    /// Fraction of water above field capacity drained per day (tipping bucket).
    pub drain_coeff: f64,
}

impl HydraulicProperties {
    /// Length of the flat parameter layout used by `from_array` / `to_array`.
    pub const N_PARAMS: usize = 8;

    /// Layout: `[vwc_sat, vwc_fc, vwc_wp, vwc_hw, ksat, soil_b, psi_sat, drain_coeff]`.
    pub fn from_array(arr: &[f64; Self::N_PARAMS]) -> Self {
        Self {
            vwc_sat: arr[0],
            vwc_fc: arr[1],
            vwc_wp: arr[2],
            vwc_hw: arr[3],
            ksat: arr[4],
            soil_b: arr[5],
            psi_sat: arr[6],
            drain_coeff: arr[7],
        }
    }

    pub fn to_array(&self) -> [f64; Self::N_PARAMS] {
        [
            self.vwc_sat,
            self.vwc_fc,
            self.vwc_wp,
            self.vwc_hw,
            self.ksat,
            self.soil_b,
            self.psi_sat,
            self.drain_coeff,
        ]
    }

    /// Check bounds and `0 <= hygroscopic <= wilting <= field capacity <= saturation <= 1`.
    pub fn validate(&self, layer: usize) -> Result<()> {
        let p = self;
        let values = [
            ("vwc_sat", p.vwc_sat),
            ("vwc_fc", p.vwc_fc),
            ("vwc_wp", p.vwc_wp),
            ("vwc_hw", p.vwc_hw),
            ("ksat", p.ksat),
            ("soil_b", p.soil_b),
            ("psi_sat", p.psi_sat),
            ("drain_coeff", p.drain_coeff),
        ];
        if let Some((name, _)) = values.iter().find(|(_, v)| !v.is_finite()) {
            return Err(WaterError::layer(layer, format!("{name} is not finite")));
        }
        let ordered = 0.0 <= p.vwc_hw
            && p.vwc_hw <= p.vwc_wp + ORDERING_EPS
            && p.vwc_wp <= p.vwc_fc + ORDERING_EPS
            && p.vwc_fc <= p.vwc_sat + ORDERING_EPS
            && p.vwc_sat <= 1.0
            && p.vwc_sat > 0.0;
        if !ordered {
            return Err(WaterError::layer(
                layer,
                format!(
                    "water contents out of order: hw={} wp={} fc={} sat={}",
                    p.vwc_hw, p.vwc_wp, p.vwc_fc, p.vwc_sat
                ),
            ));
        }
        let bounded = [
            ("soil_b", p.soil_b, &SOIL_B_BOUNDS),
            ("ksat", p.ksat, &KSAT_BOUNDS),
            ("psi_sat", p.psi_sat, &PSI_SAT_BOUNDS),
            ("drain_coeff", p.drain_coeff, &DRAIN_COEFF_BOUNDS),
        ];
        for (name, value, bounds) in bounded {
            if !bounds.contains(value) {
                return Err(WaterError::layer(
                    layer,
                    format!(
                        "{name} = {value} is out of bounds [{}, {}]",
                        bounds.min, bounds.max
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// One depth band of the soil column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilLayer {
    /// Depth of the upper boundary [m].
    pub top: f64,
    /// Depth of the lower boundary (cumulative depth) [m].
    pub bottom: f64,
    pub props: HydraulicProperties,
}

impl SoilLayer {
    /// Create a layer spanning `top..bottom` metres, validating its parameters.
    pub fn new(index: usize, top: f64, bottom: f64, props: HydraulicProperties) -> Result<Self> {
        if !(top.is_finite() && bottom.is_finite()) || top < 0.0 || bottom <= top {
            return Err(WaterError::layer(
                index,
                format!("invalid depth range {top}..{bottom} m"),
            ));
        }
        props.validate(index)?;
        Ok(Self { top, bottom, props })
    }

    /// Create a layer with parameters from sand/silt/clay percentages.
    pub fn from_texture(index: usize, top: f64, bottom: f64, texture: &Texture) -> Result<Self> {
        Self::new(index, top, bottom, texture.hydraulic_properties())
    }

    pub fn thickness(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn midpoint(&self) -> f64 {
        0.5 * (self.top + self.bottom)
    }

    /// Water mass [kg m-2] held at a given VWC.
    pub fn mass_at(&self, vwc: f64) -> f64 {
        vwc * self.thickness() * WATER_DENSITY
    }

    /// VWC [m3 m-3] implied by a water mass.
    pub fn vwc_of(&self, water: f64) -> f64 {
        water / (self.thickness() * WATER_DENSITY)
    }

    pub fn saturation_mass(&self) -> f64 {
        self.mass_at(self.props.vwc_sat)
    }

    pub fn field_capacity_mass(&self) -> f64 {
        self.mass_at(self.props.vwc_fc)
    }

    pub fn wilting_mass(&self) -> f64 {
        self.mass_at(self.props.vwc_wp)
    }

    pub fn hygroscopic_mass(&self) -> f64 {
        self.mass_at(self.props.vwc_hw)
    }

    /// Saturated conductivity as a mass flux [kg m-2 s-1].
    pub fn ksat_flux(&self) -> f64 {
        self.props.ksat * WATER_DENSITY
    }

    /// Height of the capillary fringe above a water table [m]: the air-entry head.
    pub fn capillary_fringe_height(&self) -> f64 {
        -self.props.psi_sat * MPA_TO_HEAD_M
    }

    /// Copy of this layer restricted to `top..bottom`, same parameters.
    pub(crate) fn slice(&self, top: f64, bottom: f64) -> Self {
        Self {
            top,
            bottom,
            props: self.props,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::testing::loam;

    #[test]
    fn geometry() {
        let l = SoilLayer::new(0, 0.1, 0.3, loam()).unwrap();
        assert!((l.thickness() - 0.2).abs() < 1e-12);
        assert!((l.midpoint() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn masses_follow_thickness() {
        let l = SoilLayer::new(0, 0.0, 0.1, loam()).unwrap();
        assert!((l.saturation_mass() - 45.0).abs() < 1e-9);
        assert!((l.field_capacity_mass() - 30.0).abs() < 1e-9);
        assert!((l.vwc_of(15.0) - 0.15).abs() < 1e-12);
    }

    #[test]
    fn rejects_inverted_depths() {
        assert!(SoilLayer::new(0, 0.3, 0.1, loam()).is_err());
        assert!(SoilLayer::new(0, -0.1, 0.1, loam()).is_err());
    }

    #[test]
    fn rejects_unordered_contents() {
        let mut p = loam();
        p.vwc_wp = 0.35;
        let err = SoilLayer::new(2, 0.0, 0.1, p).unwrap_err();
        assert!(matches!(err, WaterError::InvalidLayer { layer: 2, .. }));
    }

    #[test]
    fn rejects_out_of_bounds_b() {
        let mut p = loam();
        p.soil_b = 0.5;
        assert!(SoilLayer::new(0, 0.0, 0.1, p).is_err());
    }

    #[test]
    fn fringe_height_is_air_entry_head() {
        let l = SoilLayer::new(0, 0.0, 0.1, loam()).unwrap();
        assert!((l.capillary_fringe_height() - 0.003 * MPA_TO_HEAD_M).abs() < 1e-12);
    }

    #[test]
    fn parameter_array_layout() {
        let p = loam();
        let arr = p.to_array();
        assert_eq!(arr[4], 5e-6);
        assert_eq!(arr[6], -0.003);
        assert_eq!(HydraulicProperties::from_array(&arr), p);
    }

    #[test]
    fn texture_layer_is_valid() {
        let t = Texture::new(60.0, 30.0, 10.0).unwrap();
        let l = SoilLayer::from_texture(0, 0.0, 0.3, &t).unwrap();
        assert_eq!(l.props, t.hydraulic_properties());
        assert!(l.wilting_mass() < l.field_capacity_mass());
    }
}
