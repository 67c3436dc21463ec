//! Running water balance over a run.

use crate::fluxes::DailyFluxes;

/// Accumulates the daily residual `sources - sinks - storage change`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MassBalanceAuditor {
    tolerance: f64,
    days: usize,
    cumulative: f64,
    worst: f64,
}

impl MassBalanceAuditor {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            ..Self::default()
        }
    }

    /// Residual of one day [kg m-2], folded into the running totals.
    pub fn audit(&mut self, fluxes: &DailyFluxes) -> f64 {
        let residual = fluxes.total_sources() - fluxes.total_sinks() - fluxes.storage_change;
        self.days += 1;
        self.cumulative += residual;
        if residual.abs() > self.worst.abs() {
            self.worst = residual;
        }
        residual
    }

    pub fn within_tolerance(&self, residual: f64) -> bool {
        residual.abs() <= self.tolerance
    }

    pub fn days(&self) -> usize {
        self.days
    }

    /// Sum of all daily residuals [kg m-2].
    pub fn cumulative_residual(&self) -> f64 {
        self.cumulative
    }

    /// Daily residual with the largest magnitude [kg m-2].
    pub fn worst_residual(&self) -> f64 {
        self.worst
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.tolerance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_approx(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() < tol,
            "expected {expected} +/- {tol}, got {actual}"
        );
    }

    #[test]
    fn balanced_day_has_zero_residual() {
        let mut a = MassBalanceAuditor::new(1e-9);
        let f = DailyFluxes {
            water_to_surface: 10.0,
            soil_evaporation: 2.0,
            deep_percolation: 3.0,
            storage_change: 5.0,
            ..DailyFluxes::default()
        };
        let r = a.audit(&f);
        assert_approx(r, 0.0, 1e-12);
        assert!(a.within_tolerance(r));
        assert_eq!(a.days(), 1);
    }

    #[test]
    fn residuals_accumulate() {
        let mut a = MassBalanceAuditor::new(1e-9);
        let leak = DailyFluxes {
            water_to_surface: 1.0,
            ..DailyFluxes::default()
        };
        a.audit(&leak);
        let r = a.audit(&DailyFluxes {
            storage_change: 0.5,
            ..DailyFluxes::default()
        });
        assert!(!a.within_tolerance(r));
        assert_approx(a.cumulative_residual(), 0.5, 1e-12);
        assert_approx(a.worst_residual(), 1.0, 1e-12);
        a.reset();
        assert_eq!(a.days(), 0);
    }
}
