//! Daily orchestration of the water engine.
//!
//! One `step` per simulated day:
//!
//! 1. pond evaporation takes the first share of potential evaporation
//! 2. direct irrigation enters its target layers
//! 3. surface routing splits incoming water into infiltration, pond and runoff
//! 4. the configured solver moves water through the column
//! 5. the lower boundary rule is enforced
//! 6. layer hydraulics and root-zone aggregates are resolved
//! 7. the day is audited against the mass balance
use log::debug;

use crate::balance::MassBalanceAuditor;
use crate::column::constants::WATER_DENSITY;
use crate::column::{HydroZone, LowerBoundary, SoilColumn, SoilLayer};
use crate::config::{EngineConfig, SolverKind};
use crate::diagnostics::{Anomaly, Diagnostics};
use crate::error::Result;
use crate::fluxes::{ColumnTimeseries, DailyFluxes, DailyOutput, LayerFluxes};
use crate::forcing::DailyForcing;
use crate::solver::transfer::redistribute_excess;
use crate::solver::{build_solver, Collaborators, DayInputs, Ledger, VerticalTransportSolver};
use crate::state::SoilWaterState;
use crate::surface::{evaporate_pond, SurfaceRouter};
use crate::traits::HydrologicalModel;

#[derive(Debug)]
pub struct WaterEngine {
    column: SoilColumn,
    config: EngineConfig,
    solver: Box<dyn VerticalTransportSolver>,
    collaborators: Collaborators,
    diagnostics: Diagnostics,
    auditor: MassBalanceAuditor,
    /// Days stepped so far.
    day: usize,
}

impl WaterEngine {
    pub fn new(column: SoilColumn, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            solver: build_solver(&config),
            collaborators: Collaborators::from_config(&config),
            diagnostics: Diagnostics::new(),
            auditor: MassBalanceAuditor::new(config.balance_tolerance),
            column,
            config,
            day: 0,
        })
    }

    pub fn column(&self) -> &SoilColumn {
        &self.column
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn solver_kind(&self) -> SolverKind {
        self.solver.kind()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn auditor(&self) -> &MassBalanceAuditor {
        &self.auditor
    }

    pub fn day(&self) -> usize {
        self.day
    }
}

/// Hold a layer at field capacity. Returns `(inflow, outflow)`.
fn hold_field_capacity(layer: &SoilLayer, water: &mut f64) -> (f64, f64) {
    let delta = layer.field_capacity_mass() - *water;
    *water += delta;
    if delta >= 0.0 {
        (delta, 0.0)
    } else {
        (0.0, -delta)
    }
}

impl HydrologicalModel for WaterEngine {
    type State = SoilWaterState;
    type Forcing = DailyForcing;
    type Fluxes = DailyOutput;
    type FluxesTimeseries = ColumnTimeseries;

    fn initialize_state(&self) -> SoilWaterState {
        SoilWaterState::initialize(&self.column)
    }

    fn step(&mut self, state: &mut SoilWaterState, forcing: &DailyForcing) -> Result<DailyOutput> {
        let column = &self.column;
        let layers = column.layers();
        let n = column.n_layers();
        let c = self.collaborators;
        let day = self.day;
        forcing.validate(n)?;
        state.validate(column)?;

        let boundary = column.effective_lower_boundary(forcing.groundwater_depth);
        let groundwater_depth = match boundary {
            LowerBoundary::Groundwater => forcing.groundwater_depth,
            _ => None,
        };
        let zones = c.coupler.assign_zones(layers, groundwater_depth);
        let storage_before = state.storage();

        let (pond_evaporation, potential_evaporation) =
            evaporate_pond(&mut state.pond, forcing.potential_evaporation);

        let mut pre = Ledger::new(n);
        for (i, &amount) in forcing.direct_irrigation.iter().enumerate() {
            if zones[i] == HydroZone::Groundwater {
                pre.recharge[i] += amount;
            } else {
                state.water[i] += amount;
            }
        }
        redistribute_excess(layers, &zones, &mut state.water, &mut state.pond, &mut pre);

        let water_to_surface = forcing.water_to_surface();
        let available = SurfaceRouter::available_space(layers, &state.water);
        let routing = c.router.route(water_to_surface, state.pond, available);
        state.pond = routing.pond;

        let inputs = DayInputs {
            potential_infiltration: routing.potential_infiltration,
            potential_evaporation,
            water_input: water_to_surface + forcing.total_direct_irrigation(),
            potential_transpiration: forcing.potential_transpiration,
            root_fractions: &forcing.root_fractions,
            groundwater_depth,
            prior_runoff: routing.runoff,
        };
        let transport = self.solver.transport(column, &zones, state, &inputs)?;
        let ledger = &transport.ledger;

        let (boundary_inflow, boundary_outflow) = match boundary {
            LowerBoundary::FieldCapacity => {
                hold_field_capacity(column.layer(n - 1), &mut state.water[n - 1])
            }
            LowerBoundary::FreeDrainage | LowerBoundary::Groundwater => (0.0, 0.0),
        };

        let mut clamped = 0.0;
        let hydraulics = c
            .resolver
            .resolve_column(column, &mut state.water, &mut clamped)?;

        let n_root = column.rootzone_layers(forcing.rooting_depth);
        let (root_thickness, root_psi) = layers[..n_root]
            .iter()
            .zip(&hydraulics)
            .fold((0.0, 0.0), |(h, psi), (l, hy)| {
                (h + l.thickness(), psi + hy.psi * l.thickness())
            });
        let rootzone_water = state.water_above(n_root);
        let shortfall = ledger.total_shortfall();
        let transpiration = ledger.total_transpiration();

        let mut fluxes = DailyFluxes {
            water_to_surface,
            direct_irrigation: forcing.total_direct_irrigation(),
            groundwater_discharge: ledger.total_discharge(),
            boundary_inflow,
            pond_evaporation,
            runoff: routing.runoff + ledger.runoff - shortfall,
            soil_evaporation: ledger.evaporation,
            transpiration,
            deep_percolation: ledger.deep_percolation + clamped,
            groundwater_recharge: ledger.total_recharge() + pre.total_recharge(),
            boundary_outflow,
            potential_evaporation: forcing.potential_evaporation,
            potential_transpiration: forcing.potential_transpiration,
            infiltration: ledger.infiltration,
            pond_to_soil: routing.pond_to_soil,
            soil_to_pond: ledger.soil_to_pond + pre.soil_to_pond,
            transpiration_deficit: (transport.transpiration.total_demand() - transpiration)
                .max(0.0),
            pond_water: state.pond,
            soil_water: state.total_water(),
            rootzone_water,
            soil_water_0_2m: state.water_above(column.aggregate_layers()),
            rootzone_vwc: rootzone_water / (root_thickness * WATER_DENSITY),
            rootzone_psi: root_psi / root_thickness,
            storage_change: state.storage() - storage_before,
            balance_residual: 0.0,
            substeps: f64::from(transport.steps.substeps),
        };
        let residual = self.auditor.audit(&fluxes);
        fluxes.balance_residual = residual;

        let d = &mut self.diagnostics;
        let ponded = routing.pond_formed + fluxes.soil_to_pond;
        if ponded > 0.0 {
            d.record(Anomaly::PondFormed, day, format_args!("{ponded:.3} kg/m2"));
        }
        if transport.transpiration.clamped {
            d.record(
                Anomaly::TranspirationClamped,
                day,
                format_args!("deficit {:.3} kg/m2", fluxes.transpiration_deficit),
            );
        }
        if transport.evaporation.clamped {
            d.record(
                Anomaly::EvaporationClamped,
                day,
                format_args!(
                    "{:.3} of {:.3} kg/m2",
                    transport.evaporation.actual, transport.evaporation.demand
                ),
            );
        }
        if shortfall > 0.0 {
            d.record(
                Anomaly::FloorShortfall,
                day,
                format_args!("{shortfall:e} kg/m2 in layer {:?}", ledger.deepest_shortfall()),
            );
        }
        if !self.auditor.within_tolerance(residual) {
            d.record(Anomaly::BalanceResidual, day, format_args!("{residual:e} kg/m2"));
        }

        debug!(
            "day {day}: {:?} solver, {} sub-steps (smallest {} s), residual {residual:e}",
            self.solver.kind(),
            transport.steps.substeps,
            transport.steps.min_step
        );

        let layer_fluxes = hydraulics
            .iter()
            .enumerate()
            .map(|(i, h)| LayerFluxes {
                vwc: h.vwc,
                wfps: h.wfps,
                psi: h.psi,
                pf: h.pf,
                percolation: ledger.percolation[i],
                diffusion: ledger.diffusion[i],
                transpiration: ledger.transpiration[i],
                groundwater_discharge: ledger.discharge[i],
                groundwater_recharge: ledger.recharge[i] + pre.recharge[i],
            })
            .collect();

        self.day += 1;
        Ok(DailyOutput {
            fluxes,
            layers: layer_fluxes,
        })
    }
}
