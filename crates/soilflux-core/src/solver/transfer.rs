//! Transfers between layers and the bookkeeping shared by both solvers.
//!
//! A `Transfers` holds the fluxes proposed for one step. `limit_to_floor`
//! trims them so no layer ends below its hygroscopic point, `apply` moves the
//! water with the zone routing rules, and `redistribute_excess` pushes any
//! over-saturation upward and finally into the pond.

use smallvec::SmallVec;

use crate::column::constants::MAX_INLINE_LAYERS;
use crate::column::{HydroZone, LayerVec, SoilLayer};
use crate::groundwater::GroundwaterView;

/// Mass below saturation still treated as saturated [kg m-2].
const SATURATION_SLACK: f64 = 1e-9;

/// Destination of percolation leaving a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sink {
    Layer(usize),
    /// Leaves the column as recharge of the water table under this layer.
    Recharge(usize),
    DeepPercolation,
}

pub(crate) fn is_saturated(layer: &SoilLayer, water: f64) -> bool {
    water >= layer.saturation_mass() - SATURATION_SLACK
}

/// Where percolation from layer `i` goes, or `None` if it is suppressed.
///
/// Groundwater layers do not percolate. A capillary-fringe layer only
/// drains when the layer below is saturated, and then into recharge.
pub(crate) fn percolation_sink(
    layers: &[SoilLayer],
    zones: &[HydroZone],
    water: &[f64],
    i: usize,
) -> Option<Sink> {
    if zones[i] == HydroZone::Groundwater {
        return None;
    }
    if i + 1 == layers.len() {
        return Some(Sink::DeepPercolation);
    }
    match zones[i] {
        HydroZone::CapillaryFringe if is_saturated(&layers[i + 1], water[i + 1]) => {
            Some(Sink::Recharge(i + 1))
        }
        HydroZone::CapillaryFringe => None,
        _ => Some(Sink::Layer(i + 1)),
    }
}

/// Fluxes proposed for one step [kg m-2].
#[derive(Debug, Clone)]
pub struct Transfers {
    /// Into the top layer.
    pub infiltration: f64,
    /// Out of the top layer.
    pub evaporation: f64,
    pub transpiration: LayerVec,
    pub percolation: LayerVec,
    pub sinks: SmallVec<[Sink; MAX_INLINE_LAYERS]>,
    /// Between layer `i` and `i + 1`, positive downward. The last slot is unused.
    pub diffusion: LayerVec,
    /// Water added to lift a layer back to its floor, charged to runoff.
    pub shortfall: LayerVec,
}

impl Transfers {
    pub fn new(n: usize) -> Self {
        Self {
            infiltration: 0.0,
            evaporation: 0.0,
            transpiration: LayerVec::from_elem(0.0, n),
            percolation: LayerVec::from_elem(0.0, n),
            sinks: SmallVec::from_elem(Sink::DeepPercolation, n),
            diffusion: LayerVec::from_elem(0.0, n),
            shortfall: LayerVec::from_elem(0.0, n),
        }
    }

    pub fn clear(&mut self) {
        self.infiltration = 0.0;
        self.evaporation = 0.0;
        for v in [
            &mut self.transpiration,
            &mut self.percolation,
            &mut self.diffusion,
            &mut self.shortfall,
        ] {
            v.iter_mut().for_each(|x| *x = 0.0);
        }
        self.sinks.iter_mut().for_each(|s| *s = Sink::DeepPercolation);
    }

    /// Content of layer `i` once these transfers are applied.
    pub fn projected(&self, i: usize, water: &[f64]) -> f64 {
        let mut w = water[i] + self.shortfall[i] - self.transpiration[i] - self.percolation[i]
            - self.diffusion[i];
        if i == 0 {
            w += self.infiltration - self.evaporation;
        } else {
            if self.sinks[i - 1] == Sink::Layer(i) {
                w += self.percolation[i - 1];
            }
            w += self.diffusion[i - 1];
        }
        w
    }
}

fn take(flux: &mut f64, deficit: &mut f64) {
    let r = flux.min(*deficit).max(0.0);
    *flux -= r;
    *deficit -= r;
}

/// Trim transfers so no layer ends below its hygroscopic point.
///
/// Layers are visited top-down. A deficit is absorbed by reducing, in order,
/// evaporation, transpiration, percolation out, downward diffusion out, and
/// upward diffusion into the layer above (as far as that layer can spare).
/// What is left is recorded as shortfall. Returns the total shortfall.
pub fn limit_to_floor(
    layers: &[SoilLayer],
    zones: &[HydroZone],
    water: &[f64],
    t: &mut Transfers,
) -> f64 {
    let mut total = 0.0;
    for i in 0..layers.len() {
        if zones[i] == HydroZone::Groundwater {
            continue;
        }
        let mut deficit = layers[i].hygroscopic_mass() - t.projected(i, water);
        if deficit <= 0.0 {
            continue;
        }
        if i == 0 {
            take(&mut t.evaporation, &mut deficit);
        }
        take(&mut t.transpiration[i], &mut deficit);
        take(&mut t.percolation[i], &mut deficit);
        if t.diffusion[i] > 0.0 {
            take(&mut t.diffusion[i], &mut deficit);
        }
        if i > 0 && deficit > 0.0 && t.diffusion[i - 1] < 0.0 {
            let slack = (t.projected(i - 1, water) - layers[i - 1].hygroscopic_mass()).max(0.0);
            let r = (-t.diffusion[i - 1]).min(deficit).min(slack);
            t.diffusion[i - 1] += r;
            deficit -= r;
        }
        if deficit > 0.0 {
            t.shortfall[i] += deficit;
            total += deficit;
        }
    }
    total
}

/// Daily totals accumulated over all steps [kg m-2].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    pub infiltration: f64,
    pub evaporation: f64,
    pub deep_percolation: f64,
    /// Excess pushed out of the top layer into the pond.
    pub soil_to_pond: f64,
    /// Pond spill to runoff at the end of the day.
    pub runoff: f64,
    pub transpiration: LayerVec,
    pub percolation: LayerVec,
    /// Net flux from layer `i` to `i + 1`, positive downward.
    pub diffusion: LayerVec,
    pub discharge: LayerVec,
    pub recharge: LayerVec,
    pub shortfall: LayerVec,
}

impl Ledger {
    pub fn new(n: usize) -> Self {
        let zeros = LayerVec::from_elem(0.0, n);
        Self {
            transpiration: zeros.clone(),
            percolation: zeros.clone(),
            diffusion: zeros.clone(),
            discharge: zeros.clone(),
            recharge: zeros.clone(),
            shortfall: zeros,
            ..Self::default()
        }
    }

    pub fn total_transpiration(&self) -> f64 {
        self.transpiration.iter().sum()
    }

    pub fn total_discharge(&self) -> f64 {
        self.discharge.iter().sum()
    }

    pub fn total_recharge(&self) -> f64 {
        self.recharge.iter().sum()
    }

    pub fn total_shortfall(&self) -> f64 {
        self.shortfall.iter().sum()
    }

    /// Change in soil water implied by the fluxes booked so far [kg m-2].
    ///
    /// Exchange with groundwater layers counts as discharge in and recharge
    /// out; pond spill to runoff never touches the soil.
    pub fn net_storage_change(&self) -> f64 {
        self.infiltration - self.evaporation - self.total_transpiration() + self.total_discharge()
            - self.total_recharge()
            - self.deep_percolation
            + self.total_shortfall()
            - self.soil_to_pond
    }

    /// Deepest layer that needed a shortfall fill, if any.
    pub fn deepest_shortfall(&self) -> Option<usize> {
        self.shortfall.iter().rposition(|&s| s > 0.0)
    }

    /// Map per-layer totals from a groundwater view onto the primary layers.
    pub fn fold(&self, view: &GroundwaterView) -> Self {
        Self {
            infiltration: self.infiltration,
            evaporation: self.evaporation,
            deep_percolation: self.deep_percolation,
            soil_to_pond: self.soil_to_pond,
            runoff: self.runoff,
            transpiration: view.fold(&self.transpiration),
            // percolation inside one parent is internal redistribution
            percolation: view.fold_pairs(&self.percolation),
            diffusion: view.fold_pairs(&self.diffusion),
            discharge: view.fold(&self.discharge),
            recharge: view.fold(&self.recharge),
            shortfall: view.fold(&self.shortfall),
        }
    }
}

/// Route percolation `amount` leaving layer `i`.
pub(crate) fn route_percolation(
    zones: &[HydroZone],
    water: &mut [f64],
    ledger: &mut Ledger,
    i: usize,
    amount: f64,
    sink: Sink,
) {
    water[i] -= amount;
    ledger.percolation[i] += amount;
    match sink {
        Sink::Layer(j) if zones[j] == HydroZone::Groundwater => ledger.recharge[j] += amount,
        Sink::Layer(j) => water[j] += amount,
        Sink::Recharge(j) => ledger.recharge[j] += amount,
        Sink::DeepPercolation => ledger.deep_percolation += amount,
    }
}

/// Apply transfers to `water`.
///
/// Withdrawals from a groundwater layer come from the water table and are
/// booked as discharge; inflows to it are booked as recharge.
pub fn apply(zones: &[HydroZone], water: &mut [f64], t: &Transfers, ledger: &mut Ledger) {
    let n = water.len();
    let gw = |i: usize| zones[i] == HydroZone::Groundwater;

    if gw(0) {
        ledger.recharge[0] += t.infiltration;
        ledger.discharge[0] += t.evaporation;
    } else {
        water[0] += t.infiltration - t.evaporation;
    }
    ledger.infiltration += t.infiltration;
    ledger.evaporation += t.evaporation;

    for i in 0..n {
        let tr = t.transpiration[i];
        if gw(i) {
            ledger.discharge[i] += tr;
        } else {
            water[i] -= tr;
        }
        ledger.transpiration[i] += tr;

        if t.percolation[i] > 0.0 {
            route_percolation(zones, water, ledger, i, t.percolation[i], t.sinks[i]);
        }
        if i + 1 < n && t.diffusion[i] != 0.0 {
            water[i] -= t.diffusion[i];
            water[i + 1] += t.diffusion[i];
            ledger.diffusion[i] += t.diffusion[i];
        }
        if t.shortfall[i] > 0.0 {
            water[i] += t.shortfall[i];
            ledger.shortfall[i] += t.shortfall[i];
        }
    }
}

/// Move water above saturation upward, bottom to top; the top layer's excess
/// joins the pond.
pub fn redistribute_excess(
    layers: &[SoilLayer],
    zones: &[HydroZone],
    water: &mut [f64],
    pond: &mut f64,
    ledger: &mut Ledger,
) {
    for i in (0..layers.len()).rev() {
        if zones[i] == HydroZone::Groundwater {
            continue;
        }
        let sat = layers[i].saturation_mass();
        let excess = water[i] - sat;
        if excess <= 0.0 {
            continue;
        }
        water[i] = sat;
        if i == 0 {
            *pond += excess;
            ledger.soil_to_pond += excess;
        } else if zones[i - 1] == HydroZone::Groundwater {
            ledger.recharge[i - 1] += excess;
        } else {
            water[i - 1] += excess;
        }
    }
}
