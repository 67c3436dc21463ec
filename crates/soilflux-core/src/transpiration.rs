//! Root-zone transpiration extraction.
//!
//! Potential transpiration is split across layers by root-length fraction.
//! Each layer supplies at most its water above wilting point; deficits are
//! recorded but not shifted to other layers on the same day. Groundwater
//! layers draw on the water table and are never short.

use crate::column::{HydroZone, LayerVec, SoilLayer};

/// Per-layer transpiration for one day [kg m-2].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranspirationDemand {
    pub demand: LayerVec,
    pub realized: LayerVec,
    pub deficit: LayerVec,
    /// `true` if any layer could not meet its demand.
    pub clamped: bool,
}

impl TranspirationDemand {
    pub fn total_demand(&self) -> f64 {
        self.demand.iter().sum()
    }

    pub fn total_realized(&self) -> f64 {
        self.realized.iter().sum()
    }

    pub fn total_deficit(&self) -> f64 {
        self.deficit.iter().sum()
    }
}

pub fn distribute(
    layers: &[SoilLayer],
    zones: &[HydroZone],
    water: &[f64],
    potential: f64,
    root_fractions: &[f64],
) -> TranspirationDemand {
    let n = layers.len();
    let mut out = TranspirationDemand {
        demand: LayerVec::from_elem(0.0, n),
        realized: LayerVec::from_elem(0.0, n),
        deficit: LayerVec::from_elem(0.0, n),
        clamped: false,
    };
    let potential = potential.max(0.0);
    for i in 0..n {
        let fraction = root_fractions.get(i).copied().unwrap_or(0.0);
        let demand = potential * fraction;
        if demand <= 0.0 {
            continue;
        }
        let available = if zones[i] == HydroZone::Groundwater {
            demand
        } else {
            (water[i] - layers[i].wilting_mass()).max(0.0)
        };
        let realized = demand.min(available);
        out.demand[i] = demand;
        out.realized[i] = realized;
        out.deficit[i] = demand - realized;
        if realized < demand {
            out.clamped = true;
        }
    }
    out
}
