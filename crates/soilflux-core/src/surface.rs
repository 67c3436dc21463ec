//! Surface routing: incoming water split between infiltration, pond and runoff.

use crate::column::constants::SURFACE_LAYERS;
use crate::column::SoilLayer;

/// Outcome of routing one day's surface water.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SurfaceRouting {
    /// Water offered to the top layer today, pond drainage included [kg m-2].
    pub potential_infiltration: f64,
    /// Part of `potential_infiltration` drawn from existing pond water.
    pub pond_to_soil: f64,
    /// New pond water formed from today's input.
    pub pond_formed: f64,
    /// Pond water above the maximum depth, lost to runoff.
    pub runoff: f64,
    /// Pond depth after routing.
    pub pond: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct SurfaceRouter {
    /// Maximum pond depth [kg m-2].
    pond_max: f64,
}

impl SurfaceRouter {
    pub fn new(pond_max: f64) -> Self {
        Self { pond_max }
    }

    pub fn pond_max(&self) -> f64 {
        self.pond_max
    }

    /// Free pore space left in the top two layers [kg m-2].
    pub fn available_space(layers: &[SoilLayer], water: &[f64]) -> f64 {
        layers
            .iter()
            .zip(water)
            .take(SURFACE_LAYERS)
            .map(|(l, &w)| (l.saturation_mass() - w).max(0.0))
            .sum()
    }

    /// Split `water_to_surface` and the existing pond.
    ///
    /// Pond water drains first into the available space; today's input fills
    /// whatever space remains and the rest joins the pond.
    pub fn route(&self, water_to_surface: f64, pond: f64, available: f64) -> SurfaceRouting {
        let mut space = available.max(0.0);

        let pond_to_soil = pond.min(space);
        space -= pond_to_soil;
        let mut pond = pond - pond_to_soil;

        let infiltrating = water_to_surface.min(space);
        let pond_formed = water_to_surface - infiltrating;
        pond += pond_formed;

        let runoff = self.spill(&mut pond);

        SurfaceRouting {
            potential_infiltration: pond_to_soil + infiltrating,
            pond_to_soil,
            pond_formed,
            runoff,
            pond,
        }
    }

    /// Remove pond water above the maximum depth, returning it as runoff.
    pub fn spill(&self, pond: &mut f64) -> f64 {
        let excess = (*pond - self.pond_max).max(0.0);
        *pond -= excess;
        excess
    }
}

/// Evaporate pond water against potential evaporation.
///
/// Returns `(pond_evaporation, remaining_potential)`.
pub fn evaporate_pond(pond: &mut f64, potential: f64) -> (f64, f64) {
    let e = pond.min(potential).max(0.0);
    *pond -= e;
    (e, potential - e)
}
