//! The soil column: ordered layers with static parameters and a lower-boundary rule.
//!
//! Layer parameters are fixed at initialization. The only per-day variation
//! is the effective lower boundary, which falls back to field capacity when a
//! groundwater boundary is configured but no groundwater depth is known.

pub mod constants;
pub mod layer;
pub mod texture;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{Result, WaterError};
use constants::{AGGREGATE_DEPTH, MAX_INLINE_LAYERS, STANDARD_LAYER_BOTTOMS};
pub use layer::{HydraulicProperties, HydroZone, SoilLayer};
pub use texture::Texture;

/// Per-layer values, inline for the usual profile depths.
pub type LayerVec = SmallVec<[f64; MAX_INLINE_LAYERS]>;

/// Per-layer hydrologic zones for one day.
pub type ZoneMap = SmallVec<[HydroZone; MAX_INLINE_LAYERS]>;

/// Rule applied below the deepest layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LowerBoundary {
    /// Bottom layer is held at field capacity after each day.
    #[default]
    FieldCapacity,
    /// Water percolating out of the bottom layer leaves the column.
    FreeDrainage,
    /// Bottom is controlled by the water table; requires a groundwater depth.
    Groundwater,
}

impl std::str::FromStr for LowerBoundary {
    type Err = WaterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "field_capacity" => Ok(Self::FieldCapacity),
            "free_drainage" => Ok(Self::FreeDrainage),
            "groundwater" => Ok(Self::Groundwater),
            other => Err(WaterError::InvalidConfig(format!(
                "unknown lower boundary '{other}', expected 'field_capacity', \
                 'free_drainage' or 'groundwater'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilColumn {
    layers: Vec<SoilLayer>,
    lower_boundary: LowerBoundary,
}

impl SoilColumn {
    /// Build a column from contiguous layers starting at the surface.
    pub fn new(layers: Vec<SoilLayer>, lower_boundary: LowerBoundary) -> Result<Self> {
        if layers.is_empty() {
            return Err(WaterError::InvalidInput("soil column has no layers".to_string()));
        }
        if layers[0].top != 0.0 {
            return Err(WaterError::layer(0, "first layer must start at the surface"));
        }
        for (i, pair) in layers.windows(2).enumerate() {
            if (pair[1].top - pair[0].bottom).abs() > 1e-12 {
                return Err(WaterError::layer(
                    i + 1,
                    format!(
                        "top {} m does not meet the bottom {} m of the layer above",
                        pair[1].top, pair[0].bottom
                    ),
                ));
            }
        }
        for (i, l) in layers.iter().enumerate() {
            l.props.validate(i)?;
        }
        Ok(Self {
            layers,
            lower_boundary,
        })
    }

    /// Build a column from layer bottoms, one parameter set per layer.
    pub fn from_bottoms(
        bottoms: &[f64],
        props: &[HydraulicProperties],
        lower_boundary: LowerBoundary,
    ) -> Result<Self> {
        if bottoms.len() != props.len() {
            return Err(WaterError::InvalidInput(format!(
                "{} layer bottoms but {} parameter sets",
                bottoms.len(),
                props.len()
            )));
        }
        let mut layers = Vec::with_capacity(bottoms.len());
        let mut top = 0.0;
        for (i, (&bottom, p)) in bottoms.iter().zip(props).enumerate() {
            layers.push(SoilLayer::new(i, top, bottom, *p)?);
            top = bottom;
        }
        Self::new(layers, lower_boundary)
    }

    /// The standard 10-layer profile with uniform parameters.
    pub fn standard(props: HydraulicProperties, lower_boundary: LowerBoundary) -> Result<Self> {
        let props = [props; STANDARD_LAYER_BOTTOMS.len()];
        Self::from_bottoms(&STANDARD_LAYER_BOTTOMS, &props, lower_boundary)
    }

    /// The standard profile with parameters derived from texture percentages.
    pub fn from_texture(sand: f64, silt: f64, clay: f64, lower_boundary: LowerBoundary) -> Result<Self> {
        let texture = Texture::new(sand, silt, clay)?;
        Self::standard(texture.hydraulic_properties(), lower_boundary)
    }

    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layers(&self) -> &[SoilLayer] {
        &self.layers
    }

    pub fn layer(&self, i: usize) -> &SoilLayer {
        &self.layers[i]
    }

    pub fn total_depth(&self) -> f64 {
        self.layers[self.layers.len() - 1].bottom
    }

    pub fn lower_boundary(&self) -> LowerBoundary {
        self.lower_boundary
    }

    /// Lower boundary for a day: `Groundwater` without a known depth falls back
    /// to `FieldCapacity`.
    pub fn effective_lower_boundary(&self, groundwater_depth: Option<f64>) -> LowerBoundary {
        match (self.lower_boundary, groundwater_depth) {
            (LowerBoundary::Groundwater, None) => LowerBoundary::FieldCapacity,
            (rule, _) => rule,
        }
    }

    /// Index of the layer containing `depth` (top inclusive, bottom exclusive).
    ///
    /// Depths at or beyond the column bottom map to the deepest layer;
    /// negative or NaN depths return `None`.
    pub fn layer_index_at_depth(&self, depth: f64) -> Option<usize> {
        if depth.is_nan() || depth < 0.0 {
            return None;
        }
        let idx = self.layers.partition_point(|l| l.bottom <= depth);
        Some(idx.min(self.layers.len() - 1))
    }

    /// Number of layers whose top lies above `depth`.
    pub fn layers_above(&self, depth: f64) -> usize {
        self.layers.partition_point(|l| l.top < depth)
    }

    /// Number of layers forming the root zone for a rooting depth (at least one).
    pub fn rootzone_layers(&self, root_depth: f64) -> usize {
        self.layers_above(root_depth).max(1)
    }

    /// Number of layers lying entirely within the shallow aggregate depth.
    pub fn aggregate_layers(&self) -> usize {
        self.layers
            .partition_point(|l| l.bottom <= AGGREGATE_DEPTH + 1e-12)
    }

    /// Water masses with each layer at the VWC picked from its own parameters.
    pub fn water_at(&self, vwc: impl Fn(&HydraulicProperties) -> f64) -> LayerVec {
        self.layers.iter().map(|l| l.mass_at(vwc(&l.props))).collect()
    }

    pub fn field_capacity_water(&self) -> LayerVec {
        self.water_at(|p| p.vwc_fc)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for unit tests across the crate.
    use super::*;

    pub fn loam() -> HydraulicProperties {
        HydraulicProperties {
            vwc_sat: 0.45,
            vwc_fc: 0.30,
            vwc_wp: 0.15,
            vwc_hw: 0.05,
            ksat: 5e-6,
            soil_b: 5.0,
            psi_sat: -0.003,
            drain_coeff: 0.5,
        }
    }

    pub fn standard_loam() -> SoilColumn {
        SoilColumn::standard(loam(), LowerBoundary::FieldCapacity).unwrap()
    }

    pub fn uniform(bottoms: &[f64], boundary: LowerBoundary) -> SoilColumn {
        let props = vec![loam(); bottoms.len()];
        SoilColumn::from_bottoms(bottoms, &props, boundary).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn standard_profile_has_ten_layers() {
        let c = standard_loam();
        assert_eq!(c.n_layers(), 10);
        assert_eq!(c.total_depth(), 10.0);
        assert_eq!(c.layer(0).top, 0.0);
    }

    #[test]
    fn rejects_gaps_between_layers() {
        let a = SoilLayer::new(0, 0.0, 0.1, loam()).unwrap();
        let b = SoilLayer::new(1, 0.2, 0.3, loam()).unwrap();
        assert!(SoilColumn::new(vec![a, b], LowerBoundary::FreeDrainage).is_err());
    }

    #[test]
    fn rejects_empty_column() {
        assert!(SoilColumn::new(vec![], LowerBoundary::FreeDrainage).is_err());
    }

    #[test]
    fn depth_lookup_by_binary_search() {
        let c = standard_loam();
        assert_eq!(c.layer_index_at_depth(0.0), Some(0));
        assert_eq!(c.layer_index_at_depth(0.029), Some(0));
        assert_eq!(c.layer_index_at_depth(0.03), Some(1));
        assert_eq!(c.layer_index_at_depth(0.5), Some(3));
        assert_eq!(c.layer_index_at_depth(25.0), Some(9));
        assert_eq!(c.layer_index_at_depth(-1.0), None);
        assert_eq!(c.layer_index_at_depth(f64::NAN), None);
    }

    #[test]
    fn rootzone_counts_penetrated_layers() {
        let c = standard_loam();
        assert_eq!(c.rootzone_layers(0.0), 1);
        assert_eq!(c.rootzone_layers(0.05), 2);
        assert_eq!(c.rootzone_layers(0.30), 3);
        assert_eq!(c.rootzone_layers(0.31), 4);
    }

    #[test]
    fn aggregate_covers_top_two_metres() {
        assert_eq!(standard_loam().aggregate_layers(), 8);
    }

    #[test]
    fn groundwater_boundary_falls_back_without_depth() {
        let c = SoilColumn::standard(loam(), LowerBoundary::Groundwater).unwrap();
        assert_eq!(c.effective_lower_boundary(None), LowerBoundary::FieldCapacity);
        assert_eq!(c.effective_lower_boundary(Some(2.5)), LowerBoundary::Groundwater);
    }

    #[test]
    fn texture_column_is_valid() {
        let c = SoilColumn::from_texture(40.0, 40.0, 20.0, LowerBoundary::FreeDrainage).unwrap();
        assert_eq!(c.n_layers(), 10);
    }

    #[test]
    fn lower_boundary_parses_snake_case() {
        assert_eq!("free_drainage".parse::<LowerBoundary>().unwrap(), LowerBoundary::FreeDrainage);
        assert_eq!("Groundwater".parse::<LowerBoundary>().unwrap(), LowerBoundary::Groundwater);
        assert!("bedrock".parse::<LowerBoundary>().is_err());
    }
}
