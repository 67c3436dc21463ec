//! Soil water state carried from day to day.
//!
//! Layer water masses, pond depth and the evaporation counters are updated by
//! the engine. Snow and canopy water belong to upstream collaborators and are
//! only carried here so that a restart restores them together.
use serde::{Deserialize, Serialize};

use crate::column::{LayerVec, SoilColumn};
use crate::error::{Result, WaterError};
use crate::evaporation::EvaporationCounters;
use crate::traits::ModelState;

/// Number of scalar slots after the layer masses in the flat layout.
const SCALAR_SLOTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilWaterState {
    /// Water mass per layer [kg m-2].
    pub water: LayerVec,
    /// Pond water depth [kg m-2].
    pub pond: f64,
    /// Snow water equivalent [kg m-2].
    pub snow_water: f64,
    /// Canopy-intercepted water [kg m-2].
    pub canopy_water: f64,
    pub evaporation: EvaporationCounters,
}

impl SoilWaterState {
    /// Every layer at field capacity, no pond, no snow, counters reset.
    pub fn initialize(column: &SoilColumn) -> Self {
        Self {
            water: column.field_capacity_water(),
            pond: 0.0,
            snow_water: 0.0,
            canopy_water: 0.0,
            evaporation: EvaporationCounters::default(),
        }
    }

    pub fn n_layers(&self) -> usize {
        self.water.len()
    }

    pub fn total_water(&self) -> f64 {
        self.water.iter().sum()
    }

    /// Water held by the column and its pond [kg m-2].
    pub fn storage(&self) -> f64 {
        self.total_water() + self.pond
    }

    /// Sum over the first `n` layers.
    pub fn water_above(&self, n: usize) -> f64 {
        self.water.iter().take(n).sum()
    }

    pub fn vwc(&self, column: &SoilColumn) -> LayerVec {
        column
            .layers()
            .iter()
            .zip(&self.water)
            .map(|(l, &w)| l.vwc_of(w))
            .collect()
    }

    /// Check shape and sign against a column.
    pub fn validate(&self, column: &SoilColumn) -> Result<()> {
        if self.water.len() != column.n_layers() {
            return Err(WaterError::InvalidState(format!(
                "state has {} layers, column has {}",
                self.water.len(),
                column.n_layers()
            )));
        }
        if let Some(i) = self.water.iter().position(|w| !w.is_finite() || *w < 0.0) {
            return Err(WaterError::InvalidState(format!(
                "layer {i} water {} kg/m2 is not a finite non-negative value",
                self.water[i]
            )));
        }
        let scalars = [
            ("pond", self.pond),
            ("snow_water", self.snow_water),
            ("canopy_water", self.canopy_water),
            ("evaporation stage 1", self.evaporation.stage1),
            ("evaporation stage 2", self.evaporation.stage2),
        ];
        for (name, v) in scalars {
            if !v.is_finite() || v < 0.0 {
                return Err(WaterError::InvalidState(format!(
                    "{name} = {v} is not a finite non-negative value"
                )));
            }
        }
        Ok(())
    }
}

impl ModelState for SoilWaterState {
    /// Layout: `[n_layers, water[0..n], pond, snow, canopy, stage1, stage2]`.
    fn to_vec(&self) -> Vec<f64> {
        let mut arr = Vec::with_capacity(self.array_len());
        arr.push(self.n_layers() as f64);
        arr.extend_from_slice(&self.water);
        arr.push(self.pond);
        arr.push(self.snow_water);
        arr.push(self.canopy_water);
        arr.push(self.evaporation.stage1);
        arr.push(self.evaporation.stage2);
        arr
    }

    fn from_slice(arr: &[f64]) -> Result<Self> {
        let Some(&head) = arr.first() else {
            return Err(WaterError::InvalidState("state array is empty".to_string()));
        };
        if !(head >= 1.0 && head.fract() == 0.0) {
            return Err(WaterError::InvalidState(format!(
                "state array declares {head} layers"
            )));
        }
        let n = head as usize;
        let expected = 1 + n + SCALAR_SLOTS;
        if arr.len() != expected {
            return Err(WaterError::InvalidState(format!(
                "state array length {} does not match expected {} for {} layers",
                arr.len(),
                expected,
                n
            )));
        }
        let tail = &arr[1 + n..];
        Ok(Self {
            water: LayerVec::from_slice(&arr[1..1 + n]),
            pond: tail[0],
            snow_water: tail[1],
            canopy_water: tail[2],
            evaporation: EvaporationCounters {
                stage1: tail[3],
                stage2: tail[4],
            },
        })
    }

    fn array_len(&self) -> usize {
        1 + self.n_layers() + SCALAR_SLOTS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::testing::standard_loam;

    fn wet_state() -> SoilWaterState {
        let column = standard_loam();
        let mut s = SoilWaterState::initialize(&column);
        s.water[0] = 12.345_678_901_234;
        s.pond = 1.5;
        s.snow_water = 20.0;
        s.canopy_water = 0.3;
        s.evaporation = EvaporationCounters {
            stage1: 6.0,
            stage2: 1.0 / 3.0,
        };
        s
    }

    #[test]
    fn initialize_at_field_capacity() {
        let column = standard_loam();
        let s = SoilWaterState::initialize(&column);
        assert_eq!(s.n_layers(), 10);
        assert_eq!(s.water[0], column.layer(0).field_capacity_mass());
        assert_eq!(s.pond, 0.0);
        assert!(s.validate(&column).is_ok());
    }

    #[test]
    fn flat_roundtrip_is_exact() {
        let s = wet_state();
        let arr = s.to_vec();
        assert_eq!(arr.len(), s.array_len());
        assert_eq!(arr[0], 10.0);
        let back = SoilWaterState::from_slice(&arr).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn json_roundtrip_is_exact() {
        let s = wet_state();
        let json = serde_json::to_string(&s).unwrap();
        let back: SoilWaterState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn from_slice_rejects_bad_lengths() {
        assert!(SoilWaterState::from_slice(&[]).is_err());
        assert!(SoilWaterState::from_slice(&[2.0, 1.0, 1.0]).is_err());
        assert!(SoilWaterState::from_slice(&[1.5, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]).is_err());
        assert!(SoilWaterState::from_slice(&[1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]).is_ok());
    }

    #[test]
    fn validate_rejects_layer_mismatch_and_negatives() {
        let column = standard_loam();
        let mut s = SoilWaterState::initialize(&column);
        s.pond = -1.0;
        assert!(s.validate(&column).is_err());
        s.pond = 0.0;
        s.water.pop();
        assert!(s.validate(&column).is_err());
    }

    #[test]
    fn storage_includes_pond() {
        let s = wet_state();
        assert_eq!(s.storage(), s.total_water() + 1.5);
        assert_eq!(s.water_above(1), s.water[0]);
    }
}
