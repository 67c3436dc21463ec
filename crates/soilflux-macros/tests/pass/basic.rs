use soilflux_macros::Fluxes;

#[derive(Debug, Clone, Copy, Fluxes)]
pub struct TestFluxes {
    pub infiltration: f64,
    pub percolation: f64,
    pub pond_water: f64,
}

fn main() {
    let f = TestFluxes { infiltration: 1.0, percolation: 2.0, pond_water: 3.0 };
    let mut ts = TestFluxesTimeseries::with_capacity(10);
    ts.push(&f);
    assert_eq!(ts.len(), 1);
    assert!(!ts.is_empty());
    assert_eq!(TestFluxes::field_names(), &["infiltration", "percolation", "pond_water"]);
    assert_eq!(f.total_sources(), 0.0);
    assert_eq!(f.total_sinks(), 0.0);
}
