//! Daily inputs supplied by upstream collaborators.

use serde::{Deserialize, Serialize};

use crate::column::LayerVec;
use crate::error::{Result, WaterError};

/// Allowed excess of the root fraction sum over one.
const ROOT_FRACTION_SLACK: f64 = 1e-9;

/// Forcing for one day [kg m-2 unless noted].
///
/// Empty per-layer vectors mean "zero in every layer".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyForcing {
    pub potential_evaporation: f64,
    pub potential_transpiration: f64,
    pub throughfall: f64,
    pub snowmelt: f64,
    pub canopy_drip: f64,
    pub surface_irrigation: f64,
    /// Irrigation delivered straight into each layer.
    pub direct_irrigation: LayerVec,
    /// Root-length fraction per layer, summing to at most one.
    pub root_fractions: LayerVec,
    /// Rooting depth [m].
    pub rooting_depth: f64,
    /// Water table depth [m]; `None` when unknown.
    pub groundwater_depth: Option<f64>,
}

impl DailyForcing {
    /// Water arriving at the soil surface.
    pub fn water_to_surface(&self) -> f64 {
        self.throughfall + self.snowmelt + self.canopy_drip + self.surface_irrigation
    }

    pub fn total_direct_irrigation(&self) -> f64 {
        self.direct_irrigation.iter().sum()
    }

    /// Check values and vector lengths against a column of `n_layers`.
    pub fn validate(&self, n_layers: usize) -> Result<()> {
        let scalars = [
            ("potential_evaporation", self.potential_evaporation),
            ("potential_transpiration", self.potential_transpiration),
            ("throughfall", self.throughfall),
            ("snowmelt", self.snowmelt),
            ("canopy_drip", self.canopy_drip),
            ("surface_irrigation", self.surface_irrigation),
            ("rooting_depth", self.rooting_depth),
        ];
        for (name, v) in scalars {
            check_amount(name, v)?;
        }
        if let Some(gw) = self.groundwater_depth {
            check_amount("groundwater_depth", gw)?;
        }

        for (name, values) in [
            ("direct_irrigation", &self.direct_irrigation),
            ("root_fractions", &self.root_fractions),
        ] {
            if !values.is_empty() && values.len() != n_layers {
                return Err(WaterError::InvalidInput(format!(
                    "{name} has {} values for {n_layers} layers",
                    values.len()
                )));
            }
            for v in values {
                check_amount(name, *v)?;
            }
        }
        let root_sum: f64 = self.root_fractions.iter().sum();
        if root_sum > 1.0 + ROOT_FRACTION_SLACK {
            return Err(WaterError::InvalidInput(format!(
                "root fractions sum to {root_sum}, more than 1"
            )));
        }
        Ok(())
    }
}

fn check_amount(name: &str, v: f64) -> Result<()> {
    if v.is_finite() && v >= 0.0 {
        Ok(())
    } else {
        Err(WaterError::InvalidInput(format!(
            "{name} = {v} must be finite and non-negative"
        )))
    }
}

/// Columnar forcing for a multi-day run, as handed over by array callers.
///
/// Per-layer inputs are row-major (day, layer). A NaN groundwater depth means
/// the depth is unknown that day.
#[derive(Debug, Clone, Copy)]
pub struct ForcingArrays<'a> {
    pub potential_evaporation: &'a [f64],
    pub potential_transpiration: &'a [f64],
    pub throughfall: &'a [f64],
    pub snowmelt: Option<&'a [f64]>,
    pub canopy_drip: Option<&'a [f64]>,
    pub surface_irrigation: Option<&'a [f64]>,
    pub direct_irrigation: Option<&'a [f64]>,
    pub root_fractions: &'a [f64],
    pub rooting_depth: &'a [f64],
    pub groundwater_depth: Option<&'a [f64]>,
}

impl ForcingArrays<'_> {
    pub fn n_days(&self) -> usize {
        self.throughfall.len()
    }

    /// Build and validate one `DailyForcing` per day.
    pub fn to_daily(&self, n_layers: usize) -> Result<Vec<DailyForcing>> {
        let n = self.n_days();
        if n == 0 {
            return Err(WaterError::InvalidInput("forcing arrays are empty".to_string()));
        }
        let daily_len = |name: &str, values: &[f64]| -> Result<()> {
            if values.len() == n {
                Ok(())
            } else {
                Err(WaterError::InvalidInput(format!(
                    "{name} length {} does not match throughfall length {n}",
                    values.len()
                )))
            }
        };
        let layered_len = |name: &str, values: &[f64]| -> Result<()> {
            if values.len() == n * n_layers {
                Ok(())
            } else {
                Err(WaterError::InvalidInput(format!(
                    "{name} has {} values, expected {n} days x {n_layers} layers",
                    values.len()
                )))
            }
        };

        daily_len("potential_evaporation", self.potential_evaporation)?;
        daily_len("potential_transpiration", self.potential_transpiration)?;
        daily_len("rooting_depth", self.rooting_depth)?;
        for (name, values) in [
            ("snowmelt", self.snowmelt),
            ("canopy_drip", self.canopy_drip),
            ("surface_irrigation", self.surface_irrigation),
            ("groundwater_depth", self.groundwater_depth),
        ] {
            if let Some(v) = values {
                daily_len(name, v)?;
            }
        }
        layered_len("root_fractions", self.root_fractions)?;
        if let Some(v) = self.direct_irrigation {
            layered_len("direct_irrigation", v)?;
        }

        let at = |values: Option<&[f64]>, t: usize| values.map_or(0.0, |v| v[t]);
        let row = |values: &[f64], t: usize| LayerVec::from_slice(&values[t * n_layers..(t + 1) * n_layers]);

        (0..n)
            .map(|t| {
                let forcing = DailyForcing {
                    potential_evaporation: self.potential_evaporation[t],
                    potential_transpiration: self.potential_transpiration[t],
                    throughfall: self.throughfall[t],
                    snowmelt: at(self.snowmelt, t),
                    canopy_drip: at(self.canopy_drip, t),
                    surface_irrigation: at(self.surface_irrigation, t),
                    direct_irrigation: self
                        .direct_irrigation
                        .map(|v| row(v, t))
                        .unwrap_or_default(),
                    root_fractions: row(self.root_fractions, t),
                    rooting_depth: self.rooting_depth[t],
                    groundwater_depth: self
                        .groundwater_depth
                        .map(|v| v[t])
                        .filter(|d| !d.is_nan()),
                };
                forcing.validate(n_layers).map_err(|e| match e {
                    WaterError::InvalidInput(msg) => WaterError::InvalidInput(format!("day {t}: {msg}")),
                    other => other,
                })?;
                Ok(forcing)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn day() -> DailyForcing {
        DailyForcing {
            potential_evaporation: 2.0,
            potential_transpiration: 3.0,
            throughfall: 5.0,
            snowmelt: 1.0,
            canopy_drip: 0.5,
            surface_irrigation: 0.25,
            root_fractions: smallvec![0.5, 0.3, 0.2],
            rooting_depth: 0.4,
            ..DailyForcing::default()
        }
    }

    // -- Single day --

    #[test]
    fn surface_water_sums_sources() {
        assert_eq!(day().water_to_surface(), 6.75);
        assert!(day().validate(3).is_ok());
    }

    #[test]
    fn rejects_negative_and_nan() {
        let f = DailyForcing {
            throughfall: -1.0,
            ..day()
        };
        assert!(f.validate(3).is_err());
        let f = DailyForcing {
            potential_evaporation: f64::NAN,
            ..day()
        };
        let err = f.validate(3).unwrap_err();
        assert!(err.to_string().contains("potential_evaporation"));
    }

    #[test]
    fn rejects_wrong_layer_count() {
        assert!(day().validate(4).is_err());
        let f = DailyForcing {
            direct_irrigation: smallvec![1.0, 0.0],
            ..day()
        };
        assert!(f.validate(3).is_err());
    }

    #[test]
    fn rejects_root_fractions_above_one() {
        let f = DailyForcing {
            root_fractions: smallvec![0.6, 0.3, 0.2],
            ..day()
        };
        assert!(f.validate(3).is_err());
    }

    // -- Arrays --

    fn arrays<'a>(roots: &'a [f64], gw: &'a [f64]) -> ForcingArrays<'a> {
        ForcingArrays {
            potential_evaporation: &[1.0, 2.0],
            potential_transpiration: &[0.0, 1.0],
            throughfall: &[10.0, 0.0],
            snowmelt: None,
            canopy_drip: None,
            surface_irrigation: None,
            direct_irrigation: None,
            root_fractions: roots,
            rooting_depth: &[0.3, 0.3],
            groundwater_depth: Some(gw),
        }
    }

    #[test]
    fn arrays_split_into_days() {
        let roots = [0.6, 0.4, 0.5, 0.5];
        let gw = [f64::NAN, 1.5];
        let days = arrays(&roots, &gw).to_daily(2).unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].groundwater_depth, None);
        assert_eq!(days[1].groundwater_depth, Some(1.5));
        assert_eq!(days[1].root_fractions.as_slice(), &[0.5, 0.5]);
        assert_eq!(days[0].snowmelt, 0.0);
        assert!(days[0].direct_irrigation.is_empty());
    }

    #[test]
    fn arrays_reject_length_mismatch() {
        let roots = [0.6, 0.4, 0.5];
        let gw = [1.0, 1.0];
        let err = arrays(&roots, &gw).to_daily(2).unwrap_err();
        assert!(err.to_string().contains("root_fractions"));
    }

    #[test]
    fn arrays_report_failing_day() {
        let roots = [0.6, 0.4, 0.9, 0.5];
        let gw = [1.0, 1.0];
        let err = arrays(&roots, &gw).to_daily(2).unwrap_err();
        assert!(err.to_string().contains("day 1"));
    }
}
