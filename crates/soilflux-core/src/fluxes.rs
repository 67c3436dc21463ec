//! Daily water engine outputs.
//!
//! Two levels, as in the model runners: `DailyFluxes` holds one day of
//! column totals and `LayerFluxes` one day of one layer. The derive generates
//! the columnar `*Timeseries` companions; `ColumnTimeseries` pairs them for a
//! multi-day run, storing layer values row-major (day, layer).

use serde::Serialize;
use soilflux_macros::Fluxes;

use crate::traits::FluxesTimeseriesOps;

/// Column totals for one day [kg m-2 unless noted].
///
/// Fields tagged `source` bring water into the column and its pond, fields
/// tagged `sink` take it out; the balance residual is
/// `total_sources() - total_sinks() - storage_change`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Fluxes)]
pub struct DailyFluxes {
    /// Throughfall, snowmelt, canopy drip and surface irrigation.
    #[fluxes(source)]
    pub water_to_surface: f64,
    #[fluxes(source)]
    pub direct_irrigation: f64,
    #[fluxes(source)]
    pub groundwater_discharge: f64,
    /// Water added to hold the bottom layer at field capacity.
    #[fluxes(source)]
    pub boundary_inflow: f64,

    #[fluxes(sink)]
    pub pond_evaporation: f64,
    /// Pond spill, net of hygroscopic-floor shortfalls charged against it.
    #[fluxes(sink)]
    pub runoff: f64,
    #[fluxes(sink)]
    pub soil_evaporation: f64,
    #[fluxes(sink)]
    pub transpiration: f64,
    #[fluxes(sink)]
    pub deep_percolation: f64,
    #[fluxes(sink)]
    pub groundwater_recharge: f64,
    /// Water removed to hold the bottom layer at field capacity.
    #[fluxes(sink)]
    pub boundary_outflow: f64,

    pub potential_evaporation: f64,
    pub potential_transpiration: f64,
    pub infiltration: f64,
    pub pond_to_soil: f64,
    pub soil_to_pond: f64,
    pub transpiration_deficit: f64,
    pub pond_water: f64,
    pub soil_water: f64,
    pub rootzone_water: f64,
    pub soil_water_0_2m: f64,
    /// Root-zone mean VWC [m3 m-3].
    pub rootzone_vwc: f64,
    /// Root-zone mean matric potential [MPa].
    pub rootzone_psi: f64,
    pub storage_change: f64,
    pub balance_residual: f64,
    /// Solver sub-steps taken.
    pub substeps: f64,
}

/// One layer for one day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Fluxes)]
#[fluxes(timeseries_name = "LayerSeries")]
pub struct LayerFluxes {
    pub vwc: f64,
    pub wfps: f64,
    /// Matric potential [MPa].
    pub psi: f64,
    pub pf: f64,
    /// Gravity drainage out of the layer [kg m-2].
    pub percolation: f64,
    /// Net diffusion to the layer below, positive downward [kg m-2].
    pub diffusion: f64,
    pub transpiration: f64,
    pub groundwater_discharge: f64,
    pub groundwater_recharge: f64,
}

/// Everything the engine returns for one day.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DailyOutput {
    pub fluxes: DailyFluxes,
    pub layers: Vec<LayerFluxes>,
}

/// Multi-day output of a column run.
#[derive(Debug, Clone, Default)]
pub struct ColumnTimeseries {
    pub daily: DailyFluxesTimeseries,
    /// Row-major (day, layer).
    pub layers: LayerSeries,
    pub n_layers: usize,
}

impl ColumnTimeseries {
    /// Split a flat per-layer series into one slice per day.
    pub fn rows<'a>(&self, values: &'a [f64]) -> std::slice::Chunks<'a, f64> {
        values.chunks(self.n_layers.max(1))
    }
}

impl FluxesTimeseriesOps<DailyOutput> for ColumnTimeseries {
    fn with_capacity(n: usize) -> Self {
        Self {
            daily: DailyFluxesTimeseries::with_capacity(n),
            layers: LayerSeries::default(),
            n_layers: 0,
        }
    }

    fn push(&mut self, f: &DailyOutput) {
        if self.daily.is_empty() {
            self.n_layers = f.layers.len();
        }
        self.daily.push(&f.fluxes);
        for layer in &f.layers {
            self.layers.push(layer);
        }
    }

    fn len(&self) -> usize {
        self.daily.len()
    }

    fn is_empty(&self) -> bool {
        self.daily.is_empty()
    }
}
