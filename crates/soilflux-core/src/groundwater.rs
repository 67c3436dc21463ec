//! Water table and capillary fringe coupling.
//!
//! Zones are assigned per day from the groundwater depth. For the sub-daily
//! solver the primary layers are cut at the water table and at the top of the
//! fringe, giving a temporary finer view whose results fold back onto the
//! primary layers by parent index at the end of the call.
//!
//! A cut parent hands its water to the slices below the table first, up to
//! their saturation, and spreads the rest over the slices above by
//! thickness. A parent holding a saturated table and field capacity above it
//! is then already at rest in the view.

use crate::column::{HydroZone, LayerVec, SoilLayer, ZoneMap};
use crate::error::{Result, WaterError};

/// Thinnest slice the view will cut from a layer [m].
const MIN_SLICE: f64 = 1e-3;

#[derive(Debug, Clone, Copy)]
pub struct GroundwaterCoupler {
    /// Fixed fringe height [m]; `None` uses each layer's air-entry head.
    fringe_override: Option<f64>,
    /// Largest mass change tolerated across a remap [kg m-2].
    tolerance: f64,
}

impl GroundwaterCoupler {
    pub fn new(fringe_override: Option<f64>, tolerance: f64) -> Self {
        Self {
            fringe_override,
            tolerance,
        }
    }

    pub fn fringe_height(&self, layer: &SoilLayer) -> f64 {
        self.fringe_override
            .unwrap_or_else(|| layer.capillary_fringe_height())
    }

    /// Zone of every layer for a water table at `groundwater_depth` metres.
    ///
    /// Layers starting at or below the table are groundwater; layers reaching
    /// into the fringe band above it are capillary fringe. Without a depth
    /// every layer is normal.
    pub fn assign_zones(&self, layers: &[SoilLayer], groundwater_depth: Option<f64>) -> ZoneMap {
        let Some(gw) = groundwater_depth else {
            return ZoneMap::from_elem(HydroZone::Normal, layers.len());
        };
        layers.iter().map(|l| self.zone(l, gw)).collect()
    }

    fn zone(&self, layer: &SoilLayer, groundwater_depth: f64) -> HydroZone {
        if layer.top >= groundwater_depth {
            HydroZone::Groundwater
        } else if layer.bottom > groundwater_depth - self.fringe_height(layer) {
            HydroZone::CapillaryFringe
        } else {
            HydroZone::Normal
        }
    }

    /// Build the working view for one solver call.
    ///
    /// Uncut layers keep their primary `zones`; slices of a cut layer are
    /// zoned against the table.
    pub fn view(
        &self,
        layers: &[SoilLayer],
        zones: &[HydroZone],
        water: &[f64],
        groundwater_depth: Option<f64>,
    ) -> Result<GroundwaterView> {
        let entry_total: f64 = water.iter().sum();
        let mut view = GroundwaterView {
            layers: Vec::with_capacity(layers.len() + 2),
            zones: ZoneMap::new(),
            water: LayerVec::new(),
            parent: Vec::with_capacity(layers.len() + 2),
            n_primary: layers.len(),
            entry_total,
            tolerance: self.tolerance,
        };

        for (p, (layer, &w)) in layers.iter().zip(water).enumerate() {
            let Some(gw) = groundwater_depth else {
                view.push(layer.clone(), zones[p], w, p);
                continue;
            };
            let mut cuts: LayerVec = LayerVec::new();
            for c in [gw - self.fringe_height(layer), gw] {
                if c > layer.top + MIN_SLICE && c < layer.bottom - MIN_SLICE {
                    cuts.push(c);
                }
            }
            if cuts.is_empty() {
                view.push(layer.clone(), zones[p], w, p);
                continue;
            }
            cuts.sort_by(f64::total_cmp);
            cuts.dedup();

            let mut slices: Vec<SoilLayer> = Vec::with_capacity(cuts.len() + 1);
            let mut top = layer.top;
            for &c in &cuts {
                slices.push(layer.slice(top, c));
                top = c;
            }
            slices.push(layer.slice(top, layer.bottom));
            let shares = split_parent(&slices, w, gw);
            for (slice, share) in slices.into_iter().zip(shares) {
                let zone = self.zone(&slice, gw);
                view.push(slice, zone, share, p);
            }
        }

        view.check(entry_total)?;
        Ok(view)
    }
}

/// Shares of `water` for the slices of one parent layer.
///
/// Slices below the table take their saturation mass first. The rest goes to
/// the slices above by thickness, each capped at saturation; the last of
/// them takes the remainder so the shares sum to `water` exactly.
fn split_parent(slices: &[SoilLayer], water: f64, groundwater_depth: f64) -> LayerVec {
    let mut shares = LayerVec::from_elem(0.0, slices.len());
    let mut rest = water;
    for (share, slice) in shares.iter_mut().zip(slices) {
        if slice.top >= groundwater_depth {
            *share = slice.saturation_mass().min(rest.max(0.0));
            rest -= *share;
        }
    }

    let above: Vec<usize> = (0..slices.len())
        .filter(|&k| slices[k].top < groundwater_depth)
        .collect();
    let Some((&last, upper)) = above.split_last() else {
        // nothing above the table to take the remainder
        if let Some(share) = shares.last_mut() {
            *share += rest;
        }
        return shares;
    };
    let thickness: f64 = above.iter().map(|&k| slices[k].thickness()).sum();
    let unsaturated = rest;
    for &k in upper {
        let share = (unsaturated * slices[k].thickness() / thickness)
            .min(slices[k].saturation_mass());
        shares[k] = share;
        rest -= share;
    }
    shares[last] = rest;
    shares
}

/// Fill groundwater layers to saturation, booking the water as discharge.
///
/// Returns the total discharge.
pub fn saturate_groundwater(
    layers: &[SoilLayer],
    zones: &[HydroZone],
    water: &mut [f64],
    discharge: &mut [f64],
) -> f64 {
    let mut total = 0.0;
    for i in 0..layers.len() {
        if zones[i] != HydroZone::Groundwater {
            continue;
        }
        let fill = (layers[i].saturation_mass() - water[i]).max(0.0);
        if fill > 0.0 {
            water[i] += fill;
            discharge[i] += fill;
            total += fill;
        }
    }
    total
}

/// Temporary, possibly finer layering used inside one solver call.
#[derive(Debug, Clone)]
pub struct GroundwaterView {
    pub layers: Vec<SoilLayer>,
    pub zones: ZoneMap,
    pub water: LayerVec,
    /// Primary layer index of each view layer.
    parent: Vec<usize>,
    n_primary: usize,
    /// Primary water when the view was built [kg m-2].
    entry_total: f64,
    tolerance: f64,
}

impl GroundwaterView {
    fn push(&mut self, layer: SoilLayer, zone: HydroZone, water: f64, parent: usize) {
        self.layers.push(layer);
        self.zones.push(zone);
        self.water.push(water);
        self.parent.push(parent);
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// `true` when no primary layer was cut.
    pub fn is_identity(&self) -> bool {
        self.layers.len() == self.n_primary
    }

    pub fn parent(&self, k: usize) -> usize {
        self.parent[k]
    }

    fn check(&self, expected: f64) -> Result<()> {
        let discrepancy = self.water.iter().sum::<f64>() - expected;
        if discrepancy.abs() <= self.tolerance {
            Ok(())
        } else {
            Err(WaterError::RemapViolation { discrepancy })
        }
    }

    /// Spread per-primary-layer fractions over the view by thickness share.
    pub fn split(&self, values: &[f64]) -> LayerVec {
        let thickness: LayerVec = self.layers.iter().map(SoilLayer::thickness).collect();
        let parent_thickness = self.fold(&thickness);
        self.parent
            .iter()
            .zip(&thickness)
            .map(|(&p, &h)| values.get(p).copied().unwrap_or(0.0) * h / parent_thickness[p])
            .collect()
    }

    /// Sum per-view-layer values onto their parents.
    pub fn fold(&self, values: &[f64]) -> LayerVec {
        let mut out = LayerVec::from_elem(0.0, self.n_primary);
        for (&p, &v) in self.parent.iter().zip(values) {
            out[p] += v;
        }
        out
    }

    /// Fold fluxes crossing the lower boundary of each view layer.
    ///
    /// Only a parent's deepest child crosses a primary boundary; fluxes
    /// between siblings are internal to the view and vanish.
    pub fn fold_pairs(&self, values: &[f64]) -> LayerVec {
        let mut out = LayerVec::from_elem(0.0, self.n_primary);
        for (k, &v) in values.iter().enumerate().take(self.len()) {
            let last_child = k + 1 == self.len() || self.parent[k] != self.parent[k + 1];
            if last_child {
                out[self.parent[k]] += v;
            }
        }
        out
    }

    /// Write the view's water back onto the primary layers.
    ///
    /// `net_change` is the storage change implied by the view's boundary
    /// fluxes since the view was built. The folded water must match the
    /// primary water at entry plus that change.
    pub fn fold_back(&self, primary: &mut [f64], net_change: f64) -> Result<()> {
        if primary.len() != self.n_primary {
            return Err(WaterError::InvalidState(format!(
                "fold target has {} layers, view was built from {}",
                primary.len(),
                self.n_primary
            )));
        }
        let folded = self.fold(&self.water);
        let expected = self.entry_total + net_change;
        let discrepancy = folded.iter().sum::<f64>() - expected;
        let allowed = self.tolerance.max(1e-12 * expected.abs());
        if !(discrepancy.abs() <= allowed) {
            return Err(WaterError::RemapViolation { discrepancy });
        }
        primary.copy_from_slice(&folded);
        Ok(())
    }
}
