//! Daily tipping-bucket transport.
//!
//! The whole day is one step: infiltration fills the top layer, gravity
//! drainage tips water above field capacity downward, a diffusion pass evens
//! out relative saturation between neighbours, and the day's evaporation and
//! transpiration are withdrawn last.

use log::debug;

use super::transfer::{
    apply, limit_to_floor, percolation_sink, redistribute_excess, route_percolation, Ledger,
    Transfers,
};
use super::{Collaborators, DayInputs, StepStats, TransportFluxes, VerticalTransportSolver};
use crate::column::constants::{SECONDS_PER_DAY, VWC_GRADIENT_EPS, WATER_DENSITY};
use crate::column::{HydroZone, SoilColumn, SoilLayer};
use crate::config::SolverKind;
use crate::error::Result;
use crate::hydraulics::diffusivity;
use crate::state::SoilWaterState;

const DAY: f64 = SECONDS_PER_DAY as f64;

#[derive(Debug, Clone)]
pub struct TippingBucketSolver {
    collaborators: Collaborators,
}

impl TippingBucketSolver {
    pub fn new(collaborators: Collaborators) -> Self {
        Self { collaborators }
    }
}

/// Water a layer can shed in one day: everything above saturation plus the
/// drainage coefficient's share of the band between field capacity and
/// saturation, capped by saturated conductivity.
fn gravity_drainage(layer: &SoilLayer, water: f64) -> f64 {
    let sat = layer.saturation_mass();
    let above_sat = (water - sat).max(0.0);
    let above_fc = (water.min(sat) - layer.field_capacity_mass()).max(0.0);
    (above_sat + layer.props.drain_coeff * above_fc).min(layer.ksat_flux() * DAY)
}

/// Drainage on a day with infiltration: a single top-down pass where each
/// layer drains after receiving what the layer above released.
fn drain_wet(layers: &[SoilLayer], zones: &[HydroZone], water: &mut [f64], ledger: &mut Ledger) {
    for (i, layer) in layers.iter().enumerate() {
        let drain = gravity_drainage(layer, water[i]);
        if drain <= 0.0 {
            continue;
        }
        if let Some(sink) = percolation_sink(layers, zones, water, i) {
            route_percolation(zones, water, ledger, i, drain, sink);
        }
    }
}

/// Drainage on a dry day: every layer drains from its start-of-day content
/// and the transfers are applied together.
fn drain_dry(layers: &[SoilLayer], zones: &[HydroZone], water: &mut [f64], ledger: &mut Ledger) {
    let mut t = Transfers::new(layers.len());
    for i in (0..layers.len()).rev() {
        let drain = gravity_drainage(&layers[i], water[i]);
        if drain <= 0.0 {
            continue;
        }
        if let Some(sink) = percolation_sink(layers, zones, water, i) {
            t.percolation[i] = drain;
            t.sinks[i] = sink;
        }
    }
    apply(zones, water, &t, ledger);
}

/// Even out relative saturation between neighbours, bottom pair first.
///
/// Relative saturation is measured over the wilting-to-saturation span. The
/// exchange is bounded by the diffusive rate over one day; the donor keeps
/// its hygroscopic water and the receiver stays at or below saturation.
/// Capillary-fringe layers never receive from above.
pub(crate) fn diffuse(
    layers: &[SoilLayer],
    zones: &[HydroZone],
    water: &mut [f64],
    ledger: &mut Ledger,
) {
    for i in (0..layers.len().saturating_sub(1)).rev() {
        if zones[i] == HydroZone::Groundwater || zones[i + 1] == HydroZone::Groundwater {
            continue;
        }
        let (a, b) = (&layers[i], &layers[i + 1]);
        let span_a = a.saturation_mass() - a.wilting_mass();
        let span_b = b.saturation_mass() - b.wilting_mass();
        let ea = water[i] - a.wilting_mass();
        let eb = water[i + 1] - b.wilting_mass();
        if (ea / span_a - eb / span_b).abs() < VWC_GRADIENT_EPS {
            continue;
        }

        // positive moves water up into layer i
        let q_eq = (span_a * eb - span_b * ea) / (span_a + span_b);
        if q_eq < 0.0 && zones[i + 1] == HydroZone::CapillaryFringe {
            continue;
        }

        let (theta_a, theta_b) = (a.vwc_of(water[i]), b.vwc_of(water[i + 1]));
        let d = 0.5 * (diffusivity(a, theta_a) + diffusivity(b, theta_b));
        let dz = b.midpoint() - a.midpoint();
        let rate_bound = d * (theta_a - theta_b).abs() / dz * WATER_DENSITY * DAY;

        let (donor, receiver, dl, rl) = if q_eq > 0.0 {
            (i + 1, i, b, a)
        } else {
            (i, i + 1, a, b)
        };
        let q = q_eq
            .abs()
            .min(rate_bound)
            .min((water[donor] - dl.hygroscopic_mass()).max(0.0))
            .min((rl.saturation_mass() - water[receiver]).max(0.0));
        if q <= 0.0 {
            continue;
        }
        water[donor] -= q;
        water[receiver] += q;
        ledger.diffusion[i] += if donor == i { q } else { -q };
    }
}

impl VerticalTransportSolver for TippingBucketSolver {
    fn kind(&self) -> SolverKind {
        SolverKind::Tipping
    }

    fn transport(
        &self,
        column: &SoilColumn,
        zones: &[HydroZone],
        state: &mut SoilWaterState,
        day: &DayInputs,
    ) -> Result<TransportFluxes> {
        let c = &self.collaborators;
        let layers = column.layers();
        let mut ledger = Ledger::new(layers.len());

        let (evaporation, transpiration) = c.open_day(
            layers,
            zones,
            &mut state.water,
            &mut state.evaporation,
            day,
            day.root_fractions,
            &mut ledger,
        );

        let mut t = Transfers::new(layers.len());
        t.infiltration = day.potential_infiltration.max(0.0);
        apply(zones, &mut state.water, &t, &mut ledger);

        if t.infiltration > 0.0 {
            drain_wet(layers, zones, &mut state.water, &mut ledger);
        } else {
            drain_dry(layers, zones, &mut state.water, &mut ledger);
        }
        redistribute_excess(layers, zones, &mut state.water, &mut state.pond, &mut ledger);
        diffuse(layers, zones, &mut state.water, &mut ledger);

        t.clear();
        t.evaporation = evaporation.actual;
        t.transpiration.copy_from_slice(&transpiration.realized);
        limit_to_floor(layers, zones, &state.water, &mut t);
        apply(zones, &mut state.water, &t, &mut ledger);
        redistribute_excess(layers, zones, &mut state.water, &mut state.pond, &mut ledger);

        c.close_day(column, state, &mut ledger, day, &evaporation, 0.0)?;

        debug!(
            "tipping: infiltration {:.3}, deep percolation {:.3}, soil to pond {:.3}",
            ledger.infiltration, ledger.deep_percolation, ledger.soil_to_pond
        );
        Ok(TransportFluxes {
            ledger,
            evaporation,
            transpiration,
            infiltration_to_pond: 0.0,
            steps: StepStats::single(SECONDS_PER_DAY),
        })
    }
}
