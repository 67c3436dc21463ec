use soilflux_macros::Fluxes;

#[derive(Debug, Clone, Copy, Fluxes)]
#[fluxes(timeseries_name = "LayerSeries")]
pub struct LayerFluxes {
    pub transpiration: f64,
    pub diffusion: f64,
}

fn main() {
    let f = LayerFluxes { transpiration: 0.5, diffusion: -0.1 };
    let mut ts = LayerSeries::with_capacity(4);
    ts.push(&f);
    ts.push(&f);
    assert_eq!(ts.len(), 2);
    assert_eq!(ts.diffusion, vec![-0.1, -0.1]);
}
