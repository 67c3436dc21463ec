//! One-shot flags for non-fatal anomalies.
//!
//! Each anomaly is logged at `warn` level the first time it occurs in a run
//! and counted afterwards without further logging.

use std::fmt;

use log::warn;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Anomaly {
    /// Surface input exceeded the top layers' free pore space.
    PondFormed,
    /// A layer could not meet its share of the transpiration demand.
    TranspirationClamped,
    /// Soil evaporation was limited by extractable water.
    EvaporationClamped,
    /// A layer was lifted back to its hygroscopic point at the expense of runoff.
    FloorShortfall,
    /// The daily mass balance residual exceeded the tolerance.
    BalanceResidual,
}

impl Anomaly {
    pub const ALL: [Anomaly; 5] = [
        Anomaly::PondFormed,
        Anomaly::TranspirationClamped,
        Anomaly::EvaporationClamped,
        Anomaly::FloorShortfall,
        Anomaly::BalanceResidual,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Anomaly::PondFormed => "pond formation",
            Anomaly::TranspirationClamped => "clamped transpiration demand",
            Anomaly::EvaporationClamped => "clamped soil evaporation",
            Anomaly::FloorShortfall => "hygroscopic shortfall charged to runoff",
            Anomaly::BalanceResidual => "mass balance residual above tolerance",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    first_day: [Option<usize>; Anomaly::ALL.len()],
    count: [usize; Anomaly::ALL.len()],
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an occurrence on `day`. Returns `true` on the first one.
    pub fn record(&mut self, anomaly: Anomaly, day: usize, detail: impl fmt::Display) -> bool {
        let i = anomaly.index();
        self.count[i] += 1;
        if self.first_day[i].is_some() {
            return false;
        }
        self.first_day[i] = Some(day);
        warn!("day {day}: first {anomaly} ({detail})");
        true
    }

    pub fn is_raised(&self, anomaly: Anomaly) -> bool {
        self.first_day[anomaly.index()].is_some()
    }

    pub fn first_day(&self, anomaly: Anomaly) -> Option<usize> {
        self.first_day[anomaly.index()]
    }

    pub fn count(&self, anomaly: Anomaly) -> usize {
        self.count[anomaly.index()]
    }

    /// Anomalies seen so far.
    pub fn raised(&self) -> impl Iterator<Item = Anomaly> + '_ {
        Anomaly::ALL.into_iter().filter(|a| self.is_raised(*a))
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_one_shot() {
        let mut d = Diagnostics::new();
        assert!(d.record(Anomaly::PondFormed, 3, "1.2 kg/m2"));
        assert!(!d.record(Anomaly::PondFormed, 7, "0.4 kg/m2"));
        assert_eq!(d.first_day(Anomaly::PondFormed), Some(3));
        assert_eq!(d.count(Anomaly::PondFormed), 2);
        assert!(!d.is_raised(Anomaly::EvaporationClamped));
    }

    #[test]
    fn raised_lists_in_declaration_order() {
        let mut d = Diagnostics::new();
        d.record(Anomaly::BalanceResidual, 0, "");
        d.record(Anomaly::TranspirationClamped, 1, "");
        let raised: Vec<_> = d.raised().collect();
        assert_eq!(raised, vec![Anomaly::TranspirationClamped, Anomaly::BalanceResidual]);
        d.reset();
        assert_eq!(d.raised().count(), 0);
    }

    #[test]
    fn display_names() {
        assert_eq!(Anomaly::PondFormed.to_string(), "pond formation");
    }
}
