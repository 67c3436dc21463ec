use crate::error::Result;

/// Core trait for daily water models.
///
/// A model owns its static configuration; the state is owned by the caller
/// and mutated in place by each step. Steps are fallible because a day can
/// end in a fatal numerical condition.
pub trait HydrologicalModel {
    type State: Clone;
    type Forcing;
    type Fluxes;
    type FluxesTimeseries: FluxesTimeseriesOps<Self::Fluxes>;

    /// Create a default initial state.
    fn initialize_state(&self) -> Self::State;

    /// Advance `state` by one day and return that day's fluxes.
    fn step(&mut self, state: &mut Self::State, forcing: &Self::Forcing) -> Result<Self::Fluxes>;

    /// Run the model over a forcing series.
    ///
    /// Default implementation: initialize or clone the provided state, then
    /// loop over forcing calling step. Stops at the first failing day.
    fn run(
        &mut self,
        forcing: &[Self::Forcing],
        initial_state: Option<&Self::State>,
    ) -> Result<(Self::State, Self::FluxesTimeseries)> {
        let mut state = match initial_state {
            Some(s) => s.clone(),
            None => self.initialize_state(),
        };

        let mut outputs = Self::FluxesTimeseries::with_capacity(forcing.len());
        for f in forcing {
            let fluxes = self.step(&mut state, f)?;
            outputs.push(&fluxes);
        }

        Ok((state, outputs))
    }
}

/// Operations required on the timeseries collection type.
pub trait FluxesTimeseriesOps<F> {
    fn with_capacity(n: usize) -> Self;
    fn push(&mut self, f: &F);
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool;
}

/// Flat-array persistence of a model state.
pub trait ModelState: Sized {
    fn to_vec(&self) -> Vec<f64>;
    fn from_slice(arr: &[f64]) -> Result<Self>;
    fn array_len(&self) -> usize;
}
