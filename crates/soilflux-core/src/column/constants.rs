//! Physical constants, standard profile geometry and parameter bounds.
//!
//! Centralises the fixed values used by the column, the hydraulic relations
//! and both vertical solvers.

// -- Physical constants --

/// Density of liquid water [kg m-3].
pub const WATER_DENSITY: f64 = 1000.0;

/// Length of one simulation day [s].
pub const SECONDS_PER_DAY: u32 = 86_400;

/// Matric potential to hydraulic head [m per MPa].
pub const MPA_TO_HEAD_M: f64 = 101.971_6;

/// Matric potential to hydraulic head [cm per MPa], used for pF.
pub const MPA_TO_HEAD_CM: f64 = 10_197.16;

// -- Characteristic potentials [MPa] --

/// Potential at field capacity.
pub const PSI_FIELD_CAPACITY: f64 = -0.033;

/// Potential at the permanent wilting point.
pub const PSI_WILTING_POINT: f64 = -1.5;

/// Potential at the hygroscopic point.
pub const PSI_HYGROSCOPIC: f64 = -10.0;

// -- Standard profile --

/// Number of layers in the standard profile.
pub const N_STANDARD_LAYERS: usize = 10;

/// Lower boundaries of the standard layers [m].
pub const STANDARD_LAYER_BOTTOMS: [f64; N_STANDARD_LAYERS] =
    [0.03, 0.10, 0.30, 0.60, 0.90, 1.20, 1.50, 2.00, 3.00, 10.00];

/// Depth of the shallow aggregate reported alongside the root zone [m].
pub const AGGREGATE_DEPTH: f64 = 2.0;

/// Inline capacity of per-layer vectors; deeper profiles spill to the heap.
pub const MAX_INLINE_LAYERS: usize = 16;

/// Number of top layers whose free pore space receives surface water.
pub const SURFACE_LAYERS: usize = 2;

// -- Numerical safeguards --

/// Gradients smaller than this [m3 m-3] produce no diffusive flux.
pub const VWC_GRADIENT_EPS: f64 = 1e-12;

/// Lower floor on VWC when evaluating power laws, avoids 0^-b.
pub const VWC_FLOOR: f64 = 1e-6;

/// Tolerance on the ordering of characteristic water contents [m3 m3].
pub const ORDERING_EPS: f64 = 1e-12;

// -- Parameter bounds --

/// Closed parameter range.
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Brooks-Corey exponent [-].
pub const SOIL_B_BOUNDS: Bounds = Bounds {
    min: 1.0,
    max: 30.0,
};

/// Saturated hydraulic conductivity [m s-1].
pub const KSAT_BOUNDS: Bounds = Bounds {
    min: 0.0,
    max: 1e-2,
};

/// Saturated matric potential [MPa].
pub const PSI_SAT_BOUNDS: Bounds = Bounds {
    min: -0.1,
    max: -1e-6,
};

/// Daily drain coefficient of the tipping bucket [-].
pub const DRAIN_COEFF_BOUNDS: Bounds = Bounds {
    min: 0.0,
    max: 1.0,
};

/// Sand, silt or clay fraction [%].
pub const TEXTURE_BOUNDS: Bounds = Bounds {
    min: 0.0,
    max: 100.0,
};

/// Allowed deviation of sand + silt + clay from 100 [%].
pub const TEXTURE_SUM_TOLERANCE: f64 = 1.0;
