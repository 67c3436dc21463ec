//! soilflux: daily multilayer soil water transport.
//!
//! Moves water through a vertically layered soil column once per simulated
//! day: surface routing into infiltration, pond and runoff; percolation and
//! diffusion between layers; bare-soil evaporation and root-zone
//! transpiration; exchange with a water table and its capillary fringe.
//! Two interchangeable vertical solvers are provided: an adaptive sub-daily
//! Richards-type integrator and a tipping-bucket approximation.
pub mod balance;
pub mod column;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod evaporation;
pub mod fluxes;
pub mod forcing;
pub mod groundwater;
pub mod hydraulics;
pub mod run;
pub mod solver;
pub mod state;
pub mod surface;
pub mod traits;
pub mod transpiration;

pub use column::{HydroZone, LayerVec, LowerBoundary, SoilColumn, SoilLayer};
pub use config::{EngineConfig, SolverKind};
pub use error::{Result, WaterError};
pub use fluxes::{DailyFluxes, DailyOutput, LayerFluxes};
pub use forcing::DailyForcing;
pub use run::WaterEngine;
pub use state::SoilWaterState;
