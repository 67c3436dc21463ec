//! Vertical transport strategies.
//!
//! Both solvers process one whole day and share their collaborators: the
//! hydraulic resolver, the evaporation limiter, the groundwater coupler and
//! the surface router. They also share the open and close of a day, which
//! fix the daily evaporation and transpiration budgets up front and check
//! the day's outcome at the end.

pub mod richards;
pub mod tipping;
pub mod transfer;

use crate::column::{HydroZone, SoilColumn, SoilLayer};
use crate::config::{EngineConfig, SolverKind};
use crate::error::{Result, WaterError};
use crate::evaporation::{EvaporationCounters, EvaporationLimiter, EvaporationOutcome};
use crate::groundwater::{saturate_groundwater, GroundwaterCoupler};
use crate::hydraulics::HydraulicResolver;
use crate::state::SoilWaterState;
use crate::surface::SurfaceRouter;
use crate::transpiration::{self, TranspirationDemand};

pub use richards::RichardsSolver;
pub use tipping::TippingBucketSolver;
pub use transfer::{Ledger, Sink, Transfers};

/// Inputs of one solver call, after surface routing.
#[derive(Debug, Clone, Copy)]
pub struct DayInputs<'a> {
    /// Water offered to the top layer [kg m-2].
    pub potential_infiltration: f64,
    /// Potential soil evaporation left after pond evaporation [kg m-2].
    pub potential_evaporation: f64,
    /// All water reaching the soil today, used to detect wetting [kg m-2].
    pub water_input: f64,
    pub potential_transpiration: f64,
    /// Root-length fraction per primary layer.
    pub root_fractions: &'a [f64],
    /// Water table depth [m], if known.
    pub groundwater_depth: Option<f64>,
    /// Runoff already generated today by the surface router [kg m-2].
    pub prior_runoff: f64,
}

/// Sub-step statistics of one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepStats {
    pub substeps: u32,
    /// Smallest sub-step taken [s].
    pub min_step: u32,
    /// Largest sub-step taken [s].
    pub max_step: u32,
    /// Integrated time [s]; always one day.
    pub elapsed: u32,
}

impl StepStats {
    pub fn single(length: u32) -> Self {
        Self {
            substeps: 1,
            min_step: length,
            max_step: length,
            elapsed: length,
        }
    }
}

/// Result of transporting water through the column for one day.
#[derive(Debug, Clone)]
pub struct TransportFluxes {
    /// Daily totals on the primary layers.
    pub ledger: Ledger,
    pub evaporation: EvaporationOutcome,
    pub transpiration: TranspirationDemand,
    /// Offered infiltration the soil did not take, returned to the pond.
    pub infiltration_to_pond: f64,
    pub steps: StepStats,
}

/// Vertical transport strategy, selected at runtime.
pub trait VerticalTransportSolver: std::fmt::Debug + Send + Sync {
    fn kind(&self) -> SolverKind;

    /// Move water through the column for one day, updating `state` in place.
    fn transport(
        &self,
        column: &SoilColumn,
        zones: &[HydroZone],
        state: &mut SoilWaterState,
        day: &DayInputs,
    ) -> Result<TransportFluxes>;
}

/// Components injected into both solvers.
#[derive(Debug, Clone, Copy)]
pub struct Collaborators {
    pub resolver: HydraulicResolver,
    pub limiter: EvaporationLimiter,
    pub coupler: GroundwaterCoupler,
    pub router: SurfaceRouter,
    pub balance_tolerance: f64,
}

impl Collaborators {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            resolver: HydraulicResolver::new(config.saturation_tolerance),
            limiter: EvaporationLimiter::new(
                config.evaporation_stage1_limit,
                config.evaporation_stage2_coeff,
            ),
            coupler: GroundwaterCoupler::new(
                config.capillary_fringe_height,
                config.balance_tolerance,
            ),
            router: SurfaceRouter::new(config.pond_max),
            balance_tolerance: config.balance_tolerance,
        }
    }

    /// Saturate groundwater layers and fix the day's evaporation and
    /// transpiration budgets.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn open_day(
        &self,
        layers: &[SoilLayer],
        zones: &[HydroZone],
        water: &mut [f64],
        counters: &mut EvaporationCounters,
        day: &DayInputs,
        root_fractions: &[f64],
        ledger: &mut Ledger,
    ) -> (EvaporationOutcome, TranspirationDemand) {
        saturate_groundwater(layers, zones, water, &mut ledger.discharge);

        let top = &layers[0];
        let extractable = if zones[0] == HydroZone::Groundwater {
            f64::INFINITY
        } else {
            (water[0] + day.potential_infiltration).min(top.saturation_mass())
                - top.hygroscopic_mass()
        };
        let evaporation = self.limiter.limit(
            counters,
            day.potential_evaporation,
            day.water_input,
            extractable,
        );
        let transpiration = transpiration::distribute(
            layers,
            zones,
            water,
            day.potential_transpiration,
            root_fractions,
        );
        (evaporation, transpiration)
    }

    /// Return unrouted infiltration to the pond, spill the pond, check the
    /// day's realized fluxes against their potentials and clamp the layers.
    pub(crate) fn close_day(
        &self,
        column: &SoilColumn,
        state: &mut SoilWaterState,
        ledger: &mut Ledger,
        day: &DayInputs,
        evaporation: &EvaporationOutcome,
        unrouted_infiltration: f64,
    ) -> Result<()> {
        let tol = self.balance_tolerance;

        state.pond += unrouted_infiltration;
        ledger.runoff += self.router.spill(&mut state.pond);

        let shortfall = ledger.total_shortfall();
        let runoff = day.prior_runoff + ledger.runoff - shortfall;
        if runoff < -tol {
            return Err(WaterError::NegativeStorage {
                layer: ledger.deepest_shortfall().unwrap_or(0),
                shortfall: -runoff,
            });
        }

        if ledger.evaporation > day.potential_evaporation + tol {
            return Err(WaterError::BalanceViolation {
                quantity: "soil evaporation",
                realized: ledger.evaporation,
                potential: day.potential_evaporation,
            });
        }
        let transpired = ledger.total_transpiration();
        if transpired > day.potential_transpiration + tol {
            return Err(WaterError::BalanceViolation {
                quantity: "transpiration",
                realized: transpired,
                potential: day.potential_transpiration,
            });
        }

        // keep the stage counters in step with what actually evaporated
        let unrealized = evaporation.actual - ledger.evaporation;
        if unrealized > tol {
            self.limiter.roll_back(&mut state.evaporation, unrealized);
        }

        self.resolver
            .resolve_column(column, &mut state.water, &mut ledger.deep_percolation)?;
        Ok(())
    }
}

/// Build the solver selected by the configuration.
pub fn build_solver(config: &EngineConfig) -> Box<dyn VerticalTransportSolver> {
    let collaborators = Collaborators::from_config(config);
    match config.solver {
        SolverKind::Richards => Box::new(RichardsSolver::new(collaborators, config)),
        SolverKind::Tipping => Box::new(TippingBucketSolver::new(collaborators)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::testing::uniform;
    use crate::LowerBoundary;

    #[test]
    fn builds_requested_solver() {
        for kind in [SolverKind::Richards, SolverKind::Tipping] {
            let solver = build_solver(&EngineConfig::with_solver(kind));
            assert_eq!(solver.kind(), kind);
        }
    }

    #[test]
    fn single_step_stats_cover_the_day() {
        let s = StepStats::single(86_400);
        assert_eq!(s.substeps, 1);
        assert_eq!(s.elapsed, 86_400);
    }

    // -- Close of day --

    fn day(potential_evaporation: f64, potential_transpiration: f64) -> DayInputs<'static> {
        DayInputs {
            potential_infiltration: 0.0,
            potential_evaporation,
            water_input: 0.0,
            potential_transpiration,
            root_fractions: &[],
            groundwater_depth: None,
            prior_runoff: 0.0,
        }
    }

    fn outcome(actual: f64) -> EvaporationOutcome {
        EvaporationOutcome {
            demand: actual,
            actual,
            clamped: false,
        }
    }

    fn close(ledger: &mut Ledger, day: &DayInputs) -> Result<SoilWaterState> {
        let column = uniform(&[0.1, 0.2], LowerBoundary::FreeDrainage);
        let mut state = SoilWaterState::initialize(&column);
        Collaborators::from_config(&EngineConfig::default()).close_day(
            &column,
            &mut state,
            ledger,
            day,
            &outcome(ledger.evaporation),
            0.0,
        )?;
        Ok(state)
    }

    #[test]
    fn balanced_day_closes() {
        let mut ledger = Ledger::new(2);
        ledger.evaporation = 2.0;
        ledger.transpiration[1] = 3.0;
        assert!(close(&mut ledger, &day(2.0, 3.0)).is_ok());
    }

    #[test]
    fn evaporation_above_potential_is_fatal() {
        let mut ledger = Ledger::new(2);
        ledger.evaporation = 2.5;
        let err = close(&mut ledger, &day(2.0, 0.0)).unwrap_err();
        assert!(err.is_numerical());
        match err {
            WaterError::BalanceViolation {
                quantity,
                realized,
                potential,
            } => {
                assert_eq!(quantity, "soil evaporation");
                assert_eq!(realized, 2.5);
                assert_eq!(potential, 2.0);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn transpiration_above_potential_is_fatal() {
        let mut ledger = Ledger::new(2);
        ledger.transpiration[0] = 1.0;
        ledger.transpiration[1] = 1.5;
        let err = close(&mut ledger, &day(0.0, 2.0)).unwrap_err();
        assert!(matches!(
            err,
            WaterError::BalanceViolation { quantity: "transpiration", .. }
        ));
    }

    #[test]
    fn shortfall_beyond_runoff_is_fatal() {
        let mut ledger = Ledger::new(2);
        ledger.shortfall[1] = 0.75;
        let err = close(&mut ledger, &day(0.0, 0.0)).unwrap_err();
        match err {
            WaterError::NegativeStorage { layer, shortfall } => {
                assert_eq!(layer, 1);
                assert!((shortfall - 0.75).abs() < 1e-12);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn shortfall_covered_by_runoff_closes() {
        let mut ledger = Ledger::new(2);
        ledger.shortfall[0] = 0.75;
        let covered = DayInputs {
            prior_runoff: 1.0,
            ..day(0.0, 0.0)
        };
        assert!(close(&mut ledger, &covered).is_ok());
    }
}
