use soilflux_macros::Fluxes;

#[derive(Debug, Clone, Copy, Fluxes)]
pub struct BalanceFluxes {
    #[fluxes(source)]
    pub rain: f64,
    #[fluxes(source)]
    pub irrigation: f64,
    #[fluxes(sink)]
    pub evaporation: f64,
    #[fluxes(sink)]
    pub runoff: f64,
    pub infiltration: f64,
}

fn main() {
    let f = BalanceFluxes {
        rain: 10.0,
        irrigation: 2.5,
        evaporation: 1.5,
        runoff: 4.0,
        infiltration: 7.0,
    };
    assert_eq!(f.total_sources(), 12.5);
    assert_eq!(f.total_sinks(), 5.5);
    assert_eq!(BalanceFluxes::source_names(), &["rain", "irrigation"]);
    assert_eq!(BalanceFluxes::sink_names(), &["evaporation", "runoff"]);
    let ts = BalanceFluxesTimeseries::with_capacity(1);
    assert!(ts.is_empty());
}
