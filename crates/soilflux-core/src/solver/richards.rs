//! Adaptive sub-daily integration of percolation and diffusion.
//!
//! One call integrates a full day as a sequence of explicit sub-steps of
//! whole seconds. Each sub-step proposes infiltration, extraction,
//! conductivity-driven percolation and content-driven diffusion from the
//! current contents, trims them at the hygroscopic floor, applies them and
//! pushes any over-saturation upward. The next sub-step length keeps the
//! largest VWC change within the discretization tolerance.
//!
//! Infiltration enters at the surface saturated conductivity from the first
//! sub-step until the day's input is used up, so a wetting front sets the
//! step length as soon as it forms. Evaporation is spread over the day and
//! the top layer keeps back what it still owes, ahead of percolation and
//! downward diffusion.

use log::debug;

use super::transfer::{
    apply, limit_to_floor, percolation_sink, redistribute_excess, Ledger, Transfers,
};
use super::{Collaborators, DayInputs, StepStats, TransportFluxes, VerticalTransportSolver};
use crate::column::constants::{SECONDS_PER_DAY, VWC_GRADIENT_EPS, WATER_DENSITY};
use crate::column::{HydroZone, LayerVec, SoilColumn, SoilLayer};
use crate::config::{EngineConfig, SolverKind};
use crate::error::Result;
use crate::evaporation::EvaporationOutcome;
use crate::groundwater::GroundwaterView;
use crate::hydraulics::{conductivity, diffusivity};
use crate::state::SoilWaterState;
use crate::transpiration::TranspirationDemand;

#[derive(Debug, Clone)]
pub struct RichardsSolver {
    collaborators: Collaborators,
    /// Largest VWC change per sub-step [m3 m-3].
    tolerance: f64,
    initial_step: u32,
    min_step: u32,
    max_step: u32,
}

impl RichardsSolver {
    pub fn new(collaborators: Collaborators, config: &EngineConfig) -> Self {
        Self {
            collaborators,
            tolerance: config.discretization_tolerance,
            initial_step: config.initial_step,
            min_step: config.min_step,
            max_step: config.max_step,
        }
    }

    /// Next sub-step length [s] for the largest VWC rate of change [s-1].
    ///
    /// `floor(tolerance / rate)` clamped to the step bounds; a still profile
    /// takes the longest step.
    pub fn next_step(&self, max_rate: f64) -> u32 {
        if max_rate <= 0.0 {
            return self.max_step;
        }
        let raw = (self.tolerance / max_rate).floor();
        if raw >= f64::from(self.max_step) {
            self.max_step
        } else {
            // NaN and negative values saturate to 0 and then to the minimum
            (raw as u32).max(self.min_step)
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn integrate(
        &self,
        layers: &[SoilLayer],
        zones: &[HydroZone],
        water: &mut [f64],
        pond: &mut f64,
        day: &DayInputs,
        evaporation: &EvaporationOutcome,
        transpiration: &TranspirationDemand,
        ledger: &mut Ledger,
    ) -> StepStats {
        let day_length = f64::from(SECONDS_PER_DAY);
        let infiltration_capacity = layers[0].ksat_flux();
        let evaporation_rate = evaporation.actual / day_length;
        let transpiration_rate: LayerVec = transpiration
            .realized
            .iter()
            .map(|r| r / day_length)
            .collect();

        let mut remaining_infiltration = day.potential_infiltration;
        let mut remaining_evaporation = evaporation.actual;
        let mut t = Transfers::new(layers.len());
        let mut before = LayerVec::from_slice(water);
        let mut stats = StepStats {
            substeps: 0,
            min_step: u32::MAX,
            max_step: 0,
            elapsed: 0,
        };
        let mut dt = self.initial_step;

        while stats.elapsed < SECONDS_PER_DAY {
            dt = dt.min(SECONDS_PER_DAY - stats.elapsed);
            let secs = f64::from(dt);
            before.copy_from_slice(water);

            t.clear();
            // the day's input enters at the surface conductivity until it is used up
            t.infiltration = (infiltration_capacity * secs).min(remaining_infiltration.max(0.0));
            t.evaporation = evaporation_rate * secs;
            for (tr, rate) in t.transpiration.iter_mut().zip(&transpiration_rate) {
                *tr = rate * secs;
            }
            let reserve = remaining_evaporation.max(0.0);
            percolation(layers, zones, water, secs, reserve, &mut t);
            diffusion(layers, zones, water, secs, reserve, &mut t);
            limit_to_floor(layers, zones, water, &mut t);

            remaining_infiltration -= t.infiltration;
            remaining_evaporation -= t.evaporation;
            apply(zones, water, &t, ledger);
            redistribute_excess(layers, zones, water, pond, ledger);

            stats.substeps += 1;
            stats.elapsed += dt;
            stats.min_step = stats.min_step.min(dt);
            stats.max_step = stats.max_step.max(dt);
            dt = self.next_step(max_vwc_rate(layers, &before, water, secs));
        }
        stats
    }
}

/// Water the top layer holds back for the evaporation still due today
/// [kg m-2]: its hygroscopic mass plus `reserve`. Zero reserve holds nothing.
fn evaporation_floor(layer: &SoilLayer, reserve: f64) -> Option<f64> {
    (reserve > 0.0).then(|| layer.hygroscopic_mass() + reserve)
}

/// Conductivity-limited drainage of water above field capacity.
///
/// The top layer never drains into the water it still owes to evaporation.
fn percolation(
    layers: &[SoilLayer],
    zones: &[HydroZone],
    water: &[f64],
    secs: f64,
    reserve: f64,
    t: &mut Transfers,
) {
    for (i, layer) in layers.iter().enumerate() {
        let mut floor = layer.field_capacity_mass();
        if i == 0 {
            if let Some(held) = evaporation_floor(layer, reserve) {
                floor = floor.max(held);
            }
        }
        let drainable = water[i] - floor;
        if drainable <= 0.0 {
            continue;
        }
        let Some(sink) = percolation_sink(layers, zones, water, i) else {
            continue;
        };
        let k = conductivity(layer, layer.vwc_of(water[i]));
        t.percolation[i] = (k * WATER_DENSITY * secs).min(drainable);
        t.sinks[i] = sink;
    }
}

/// Diffusion between neighbours, never past their common equilibrium content.
fn diffusion(
    layers: &[SoilLayer],
    zones: &[HydroZone],
    water: &[f64],
    secs: f64,
    reserve: f64,
    t: &mut Transfers,
) {
    for i in 0..layers.len().saturating_sub(1) {
        if zones[i] == HydroZone::Groundwater || zones[i + 1] == HydroZone::Groundwater {
            continue;
        }
        let (a, b) = (&layers[i], &layers[i + 1]);
        let (theta_a, theta_b) = (a.vwc_of(water[i]), b.vwc_of(water[i + 1]));
        let gradient = theta_a - theta_b;
        if gradient.abs() < VWC_GRADIENT_EPS {
            continue;
        }
        let d = 0.5 * (diffusivity(a, theta_a) + diffusivity(b, theta_b));
        let dz = b.midpoint() - a.midpoint();
        let flux = d * gradient / dz * WATER_DENSITY * secs;

        let equilibrium =
            (water[i] + water[i + 1]) / (WATER_DENSITY * (a.thickness() + b.thickness()));
        let limit = water[i] - a.mass_at(equilibrium);
        let mut flux = if flux.abs() > limit.abs() { limit } else { flux };
        if i == 0 && flux > 0.0 {
            if let Some(held) = evaporation_floor(a, reserve) {
                flux = flux.min((water[0] - t.percolation[0] - held).max(0.0));
            }
        }
        t.diffusion[i] = flux;
    }
}

fn max_vwc_rate(layers: &[SoilLayer], before: &[f64], after: &[f64], secs: f64) -> f64 {
    layers
        .iter()
        .zip(before.iter().zip(after))
        .map(|(l, (&b, &a))| (l.vwc_of(a) - l.vwc_of(b)).abs() / secs)
        .fold(0.0, f64::max)
}

fn fold_transpiration(t: &TranspirationDemand, view: &GroundwaterView) -> TranspirationDemand {
    TranspirationDemand {
        demand: view.fold(&t.demand),
        realized: view.fold(&t.realized),
        deficit: view.fold(&t.deficit),
        clamped: t.clamped,
    }
}

impl VerticalTransportSolver for RichardsSolver {
    fn kind(&self) -> SolverKind {
        SolverKind::Richards
    }

    fn transport(
        &self,
        column: &SoilColumn,
        zones: &[HydroZone],
        state: &mut SoilWaterState,
        day: &DayInputs,
    ) -> Result<TransportFluxes> {
        let c = &self.collaborators;
        let mut view = c
            .coupler
            .view(column.layers(), zones, &state.water, day.groundwater_depth)?;
        let roots = view.split(day.root_fractions);
        let mut ledger = Ledger::new(view.len());

        let (evaporation, demand) = c.open_day(
            &view.layers,
            &view.zones,
            &mut view.water,
            &mut state.evaporation,
            day,
            &roots,
            &mut ledger,
        );
        let steps = self.integrate(
            &view.layers,
            &view.zones,
            &mut view.water,
            &mut state.pond,
            day,
            &evaporation,
            &demand,
            &mut ledger,
        );
        view.fold_back(&mut state.water, ledger.net_storage_change())?;

        let mut ledger = ledger.fold(&view);
        let transpiration = fold_transpiration(&demand, &view);
        let unrouted = (day.potential_infiltration - ledger.infiltration).max(0.0);
        c.close_day(column, state, &mut ledger, day, &evaporation, unrouted)?;

        debug!(
            "richards: {} sub-steps over {} view layers, steps {}..{} s",
            steps.substeps,
            view.len(),
            steps.min_step,
            steps.max_step
        );
        Ok(TransportFluxes {
            ledger,
            evaporation,
            transpiration,
            infiltration_to_pond: unrouted,
            steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::testing::{standard_loam, uniform};
    use crate::column::ZoneMap;
    use crate::LowerBoundary;

    fn assert_approx(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() < tol,
            "expected {expected} +/- {tol}, got {actual}"
        );
    }

    fn solver(config: &EngineConfig) -> RichardsSolver {
        RichardsSolver::new(Collaborators::from_config(config), config)
    }

    fn quiet_day() -> DayInputs<'static> {
        DayInputs {
            potential_infiltration: 0.0,
            potential_evaporation: 0.0,
            water_input: 0.0,
            potential_transpiration: 0.0,
            root_fractions: &[],
            groundwater_depth: None,
            prior_runoff: 0.0,
        }
    }

    fn normal(n: usize) -> ZoneMap {
        ZoneMap::from_elem(HydroZone::Normal, n)
    }

    /// Storage change minus net boundary exchange, which must vanish.
    fn residual(before: f64, state: &SoilWaterState, day: &DayInputs, f: &TransportFluxes) -> f64 {
        let l = &f.ledger;
        let after = state.storage();
        let inflow = day.potential_infiltration + l.total_discharge() + l.total_shortfall();
        let outflow = l.evaporation
            + l.total_transpiration()
            + l.deep_percolation
            + l.total_recharge()
            + l.runoff;
        after - before - (inflow - outflow)
    }

    // -- Step selection --

    #[test]
    fn step_length_follows_rate() {
        let s = solver(&EngineConfig::default());
        assert_eq!(s.next_step(0.0), 3600);
        assert_eq!(s.next_step(s.tolerance / 200.5), 200);
        assert_eq!(s.next_step(1.0), 1);
        assert_eq!(s.next_step(1e-9), 3600);
        assert_eq!(s.next_step(f64::NAN), 1);
    }

    // -- Fixed point --

    #[test]
    fn column_at_field_capacity_is_unchanged() {
        let column = standard_loam();
        let mut state = SoilWaterState::initialize(&column);
        let before = state.clone();
        let f = solver(&EngineConfig::default())
            .transport(&column, &normal(10), &mut state, &quiet_day())
            .unwrap();
        assert_eq!(state, before);
        assert_eq!(f.ledger.deep_percolation, 0.0);
        assert_eq!(f.steps.elapsed, SECONDS_PER_DAY);
    }

    // -- Transport --

    #[test]
    fn pulse_into_dry_column_conserves_mass() {
        let column = uniform(&[0.1, 0.3, 0.6], LowerBoundary::FreeDrainage);
        let mut state = SoilWaterState::initialize(&column);
        for (w, l) in state.water.iter_mut().zip(column.layers()) {
            *w = l.wilting_mass();
        }
        let before = state.storage();
        let day = DayInputs {
            potential_infiltration: 30.0,
            potential_evaporation: 2.0,
            water_input: 30.0,
            potential_transpiration: 3.0,
            root_fractions: &[0.5, 0.3, 0.2],
            ..quiet_day()
        };
        let f = solver(&EngineConfig::default())
            .transport(&column, &normal(3), &mut state, &day)
            .unwrap();
        assert_approx(residual(before, &state, &day, &f), 0.0, 1e-9);
        assert_eq!(f.steps.elapsed, SECONDS_PER_DAY);
        assert!(f.ledger.infiltration > 0.0);
        assert!(f.ledger.diffusion[0] > 0.0, "wet top layer should diffuse downward");
        for (w, l) in state.water.iter().zip(column.layers()) {
            assert!(*w >= l.hygroscopic_mass() - 1e-9);
            assert!(*w <= l.saturation_mass() + 1e-9);
        }
    }

    #[test]
    fn infiltration_beyond_conductivity_returns_to_pond() {
        let mut props = crate::column::testing::loam();
        props.ksat = 1e-8;
        let column =
            crate::SoilColumn::from_bottoms(&[0.1, 0.2], &[props, props], LowerBoundary::FreeDrainage)
                .unwrap();
        let mut state = SoilWaterState::initialize(&column);
        let before = state.storage();
        let day = DayInputs {
            potential_infiltration: 5.0,
            water_input: 5.0,
            ..quiet_day()
        };
        let f = solver(&EngineConfig::default())
            .transport(&column, &normal(2), &mut state, &day)
            .unwrap();
        // 1e-8 m/s over one day admits 0.864 kg/m2
        assert_approx(f.ledger.infiltration, 0.864, 1e-9);
        assert_approx(f.infiltration_to_pond, 5.0 - 0.864, 1e-9);
        assert_approx(state.pond, 4.136, 1e-9);
        assert_approx(residual(before, &state, &day, &f), 0.0, 1e-9);
    }

    #[test]
    fn water_above_field_capacity_percolates() {
        let column = uniform(&[0.1, 0.2, 0.3], LowerBoundary::FreeDrainage);
        let mut state = SoilWaterState::initialize(&column);
        state.water[0] = column.layer(0).saturation_mass();
        let before = state.storage();
        let f = solver(&EngineConfig::default())
            .transport(&column, &normal(3), &mut state, &quiet_day())
            .unwrap();
        assert!(state.water[0] < column.layer(0).saturation_mass());
        assert!(f.ledger.percolation[0] > 0.0);
        assert!(f.steps.substeps > 24);
        assert_approx(residual(before, &state, &quiet_day(), &f), 0.0, 1e-9);
    }

    // -- Groundwater view --

    #[test]
    fn table_inside_layer_is_resolved_in_view() {
        let config = EngineConfig {
            capillary_fringe_height: Some(0.05),
            ..EngineConfig::default()
        };
        let column = uniform(&[0.1, 0.2, 0.5], LowerBoundary::Groundwater);
        let mut state = SoilWaterState::initialize(&column);
        // saturated below the table, field capacity above it
        state.water[2] = 112.5;
        let before = state.storage();
        let day = DayInputs {
            groundwater_depth: Some(0.35),
            potential_transpiration: 2.0,
            root_fractions: &[0.0, 0.0, 1.0],
            ..quiet_day()
        };
        let zones = Collaborators::from_config(&config)
            .coupler
            .assign_zones(column.layers(), day.groundwater_depth);
        let f = solver(&config)
            .transport(&column, &zones, &mut state, &day)
            .unwrap();
        // the slice below the table transpires from the table itself
        assert_approx(f.ledger.total_discharge(), 1.0, 1e-6);
        assert_approx(f.ledger.total_transpiration(), 2.0, 1e-9);
        assert_eq!(f.ledger.discharge.len(), 3);
        assert_approx(residual(before, &state, &day, &f), 0.0, 1e-9);
    }

    #[test]
    fn equilibrated_table_exchanges_nothing() {
        let config = EngineConfig {
            capillary_fringe_height: Some(0.05),
            ..EngineConfig::default()
        };
        let column = uniform(&[0.1, 0.2, 0.5], LowerBoundary::Groundwater);
        let mut state = SoilWaterState::initialize(&column);
        state.water[2] = 112.5;
        let at_rest = state.clone();
        let day = DayInputs {
            groundwater_depth: Some(0.35),
            ..quiet_day()
        };
        let zones = Collaborators::from_config(&config)
            .coupler
            .assign_zones(column.layers(), day.groundwater_depth);
        let s = solver(&config);
        for _ in 0..3 {
            let f = s.transport(&column, &zones, &mut state, &day).unwrap();
            assert_approx(f.ledger.total_discharge(), 0.0, 1e-9);
            assert_approx(f.ledger.total_recharge(), 0.0, 1e-9);
        }
        for (w, expected) in state.water.iter().zip(&at_rest.water) {
            assert_approx(*w, *expected, 1e-9);
        }
    }

    // -- Adaptivity --

    #[test]
    fn wetting_front_shortens_steps() {
        let column = SoilColumn::standard(
            crate::column::testing::loam(),
            LowerBoundary::FreeDrainage,
        )
        .unwrap();
        let s = solver(&EngineConfig::default());
        let run = |vwc: f64, throughfall: f64| {
            let mut state = SoilWaterState::initialize(&column);
            for (w, l) in state.water.iter_mut().zip(column.layers()) {
                *w = l.mass_at(vwc);
            }
            let day = DayInputs {
                potential_infiltration: throughfall,
                water_input: throughfall,
                ..quiet_day()
            };
            s.transport(&column, &normal(10), &mut state, &day).unwrap().steps
        };
        let dry_pulse = run(0.15, 40.0);
        let near_saturated = run(0.43, 0.5);
        assert_eq!(dry_pulse.elapsed, SECONDS_PER_DAY);
        assert_eq!(near_saturated.elapsed, SECONDS_PER_DAY);
        assert!(
            dry_pulse.substeps > near_saturated.substeps,
            "dry pulse took {} sub-steps, near-saturated column {}",
            dry_pulse.substeps,
            near_saturated.substeps
        );
    }

    // -- Evaporation --

    #[test]
    fn saturated_top_layer_evaporates_before_draining() {
        let column = uniform(&[0.01, 0.1], LowerBoundary::FreeDrainage);
        let mut state = SoilWaterState::initialize(&column);
        state.water[0] = column.layer(0).saturation_mass();
        let before = state.storage();
        let day = DayInputs {
            potential_evaporation: 6.0,
            ..quiet_day()
        };
        let f = solver(&EngineConfig::default())
            .transport(&column, &normal(2), &mut state, &day)
            .unwrap();
        // saturation 4.5 less hygroscopic 0.5
        assert_approx(f.evaporation.actual, 4.0, 1e-9);
        assert_approx(f.ledger.evaporation, 4.0, 1e-9);
        assert_approx(f.ledger.percolation[0], 0.0, 1e-9);
        assert_approx(residual(before, &state, &day, &f), 0.0, 1e-9);
    }
}
