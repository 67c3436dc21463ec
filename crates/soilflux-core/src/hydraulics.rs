//! Hydraulic parameter resolution.
//!
//! Power-law (Brooks-Corey / Clapp-Hornberger) relations between water
//! content, matric potential, conductivity and diffusivity. The pure
//! functions are used inside the solvers' inner loops; `HydraulicResolver`
//! adds the saturation clamp applied to whole layers.

use crate::column::constants::{MPA_TO_HEAD_CM, MPA_TO_HEAD_M, VWC_FLOOR};
use crate::column::{LayerVec, SoilColumn, SoilLayer};
use crate::error::{Result, WaterError};

/// Relative saturation `θ/θsat`, floored to keep power laws finite.
fn relative(layer: &SoilLayer, vwc: f64) -> f64 {
    (vwc.max(VWC_FLOOR) / layer.props.vwc_sat).min(1.0)
}

/// Matric potential [MPa]: `ψ = ψsat·(θ/θsat)^(-b)`.
pub fn matric_potential(layer: &SoilLayer, vwc: f64) -> f64 {
    layer.props.psi_sat * relative(layer, vwc).powf(-layer.props.soil_b)
}

/// pF: log10 of the suction head in cm.
pub fn pf(psi: f64) -> f64 {
    (-psi * MPA_TO_HEAD_CM).max(1.0).log10()
}

/// Unsaturated conductivity [m s-1]: `Ksat·(θ/θsat)^(2b+3)`, capped at `Ksat`.
pub fn conductivity(layer: &SoilLayer, vwc: f64) -> f64 {
    let p = &layer.props;
    (p.ksat * relative(layer, vwc).powf(2.0 * p.soil_b + 3.0)).min(p.ksat)
}

/// Soil water diffusivity [m2 s-1]: `b·Ksat·(−ψsat)/θsat·(θ/θsat)^(b+2)`.
pub fn diffusivity(layer: &SoilLayer, vwc: f64) -> f64 {
    let p = &layer.props;
    let head_sat = -p.psi_sat * MPA_TO_HEAD_M;
    p.soil_b * p.ksat * head_sat / p.vwc_sat * relative(layer, vwc).powf(p.soil_b + 2.0)
}

/// Hydraulic state of one layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerHydraulics {
    /// Volumetric water content [m3 m-3].
    pub vwc: f64,
    /// Water-filled pore space [-].
    pub wfps: f64,
    /// Matric potential [MPa].
    pub psi: f64,
    pub pf: f64,
    /// Conductivity [m s-1].
    pub conductivity: f64,
    /// Diffusivity [m2 s-1].
    pub diffusivity: f64,
}

impl LayerHydraulics {
    pub fn evaluate(layer: &SoilLayer, vwc: f64) -> Self {
        let psi = matric_potential(layer, vwc);
        Self {
            vwc,
            wfps: vwc / layer.props.vwc_sat,
            psi,
            pf: pf(psi),
            conductivity: conductivity(layer, vwc),
            diffusivity: diffusivity(layer, vwc),
        }
    }
}

/// Outcome of resolving one layer's water mass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolved {
    /// Water mass after clamping [kg m-2].
    pub water: f64,
    /// Mass removed by the saturation clamp [kg m-2].
    pub excess: f64,
    pub hydraulics: LayerHydraulics,
}

/// Converts water mass to hydraulic state, clamping small excursions above saturation.
#[derive(Debug, Clone, Copy)]
pub struct HydraulicResolver {
    /// Largest VWC excursion above saturation that is silently clamped.
    tolerance: f64,
}

impl HydraulicResolver {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Resolve one layer. Content above saturation by more than the tolerance is fatal;
    /// within tolerance it is clamped and returned as `excess`.
    pub fn resolve(&self, index: usize, layer: &SoilLayer, water: f64) -> Result<Resolved> {
        let vwc = layer.vwc_of(water);
        let vwc_sat = layer.props.vwc_sat;
        if vwc > vwc_sat + self.tolerance {
            return Err(WaterError::ParameterViolation {
                layer: index,
                vwc,
                saturation: vwc_sat,
            });
        }
        let (water, excess, vwc) = if vwc > vwc_sat {
            let sat = layer.saturation_mass();
            (sat, water - sat, vwc_sat)
        } else {
            (water, 0.0, vwc)
        };
        Ok(Resolved {
            water,
            excess,
            hydraulics: LayerHydraulics::evaluate(layer, vwc),
        })
    }

    /// Resolve every layer in place; clamped excess is added to `deep_percolation`.
    pub fn resolve_column(
        &self,
        column: &SoilColumn,
        water: &mut [f64],
        deep_percolation: &mut f64,
    ) -> Result<Vec<LayerHydraulics>> {
        let mut out = Vec::with_capacity(water.len());
        for (i, (layer, w)) in column.layers().iter().zip(water.iter_mut()).enumerate() {
            let r = self.resolve(i, layer, *w)?;
            *w = r.water;
            *deep_percolation += r.excess;
            out.push(r.hydraulics);
        }
        Ok(out)
    }
}

/// Volumetric contents of every layer.
pub fn column_vwc(column: &SoilColumn, water: &[f64]) -> LayerVec {
    column
        .layers()
        .iter()
        .zip(water)
        .map(|(l, &w)| l.vwc_of(w))
        .collect()
}
