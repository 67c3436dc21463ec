use numpy::{PyArray1, PyReadonlyArray1, PyReadonlyArray2};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use soilflux_core::column::constants::STANDARD_LAYER_BOTTOMS;
use soilflux_core::column::{HydraulicProperties, Texture};
use soilflux_core::forcing::ForcingArrays;
use soilflux_core::traits::{HydrologicalModel, ModelState};
use soilflux_core::{
    DailyForcing, EngineConfig, LayerVec, LowerBoundary, SoilColumn, SoilWaterState, WaterEngine,
};

use crate::convert::{checked_rows, checked_slice, contiguous_slice, to_py_err};

/// Build an engine from `(n_layers, 8)` parameters, layer bottoms and options.
fn build_engine(
    layer_params: &PyReadonlyArray2<'_, f64>,
    layer_bottoms: &PyReadonlyArray1<'_, f64>,
    lower_boundary: &str,
    config_json: Option<&str>,
) -> PyResult<WaterEngine> {
    let (params, n_layers) =
        checked_rows(layer_params, HydraulicProperties::N_PARAMS, "layer_params")?;
    let bottoms = checked_slice(layer_bottoms, n_layers, "layer_bottoms")?;
    let props: Vec<HydraulicProperties> = params
        .chunks_exact(HydraulicProperties::N_PARAMS)
        .map(|row| {
            let mut arr = [0.0f64; HydraulicProperties::N_PARAMS];
            arr.copy_from_slice(row);
            HydraulicProperties::from_array(&arr)
        })
        .collect();

    let boundary: LowerBoundary = lower_boundary.parse().map_err(to_py_err)?;
    let column = SoilColumn::from_bottoms(bottoms, &props, boundary).map_err(to_py_err)?;
    let config = match config_json {
        Some(json) => EngineConfig::from_json_str(json).map_err(to_py_err)?,
        None => EngineConfig::default(),
    };
    WaterEngine::new(column, config).map_err(to_py_err)
}

fn optional<'py>(arr: &'py Option<PyReadonlyArray1<'py, f64>>) -> PyResult<Option<&'py [f64]>> {
    arr.as_ref().map(contiguous_slice).transpose()
}

fn optional_rows<'py>(
    arr: &'py Option<PyReadonlyArray2<'py, f64>>,
    n_layers: usize,
    name: &str,
) -> PyResult<Option<&'py [f64]>> {
    arr.as_ref()
        .map(|a| checked_rows(a, n_layers, name).map(|(s, _)| s))
        .transpose()
}

fn restore_state(arr: &PyReadonlyArray1<'_, f64>, engine: &WaterEngine) -> PyResult<SoilWaterState> {
    let state = SoilWaterState::from_slice(contiguous_slice(arr)?).map_err(to_py_err)?;
    state.validate(engine.column()).map_err(to_py_err)?;
    Ok(state)
}

/// Run the water engine over a forcing series.
///
/// `root_fractions` and `direct_irrigation` are `(n_days, n_layers)`; a NaN
/// groundwater depth marks a day without a known water table.
///
/// Returns (final_state, daily_dict, layer_dict); layer arrays are
/// `(n_days, n_layers)`.
#[pyfunction]
#[allow(clippy::too_many_arguments)]
#[pyo3(signature = (
    layer_params,
    layer_bottoms,
    throughfall,
    potential_evaporation,
    potential_transpiration,
    root_fractions,
    rooting_depth,
    lower_boundary="field_capacity",
    snowmelt=None,
    canopy_drip=None,
    surface_irrigation=None,
    direct_irrigation=None,
    groundwater_depth=None,
    initial_state=None,
    config_json=None,
))]
fn column_run<'py>(
    py: Python<'py>,
    layer_params: PyReadonlyArray2<'py, f64>,
    layer_bottoms: PyReadonlyArray1<'py, f64>,
    throughfall: PyReadonlyArray1<'py, f64>,
    potential_evaporation: PyReadonlyArray1<'py, f64>,
    potential_transpiration: PyReadonlyArray1<'py, f64>,
    root_fractions: PyReadonlyArray2<'py, f64>,
    rooting_depth: PyReadonlyArray1<'py, f64>,
    lower_boundary: &str,
    snowmelt: Option<PyReadonlyArray1<'py, f64>>,
    canopy_drip: Option<PyReadonlyArray1<'py, f64>>,
    surface_irrigation: Option<PyReadonlyArray1<'py, f64>>,
    direct_irrigation: Option<PyReadonlyArray2<'py, f64>>,
    groundwater_depth: Option<PyReadonlyArray1<'py, f64>>,
    initial_state: Option<PyReadonlyArray1<'py, f64>>,
    config_json: Option<&str>,
) -> PyResult<(
    Bound<'py, PyArray1<f64>>,
    Bound<'py, PyDict>,
    Bound<'py, PyDict>,
)> {
    let mut engine = build_engine(&layer_params, &layer_bottoms, lower_boundary, config_json)?;
    let n_layers = engine.column().n_layers();

    let arrays = ForcingArrays {
        potential_evaporation: contiguous_slice(&potential_evaporation)?,
        potential_transpiration: contiguous_slice(&potential_transpiration)?,
        throughfall: contiguous_slice(&throughfall)?,
        snowmelt: optional(&snowmelt)?,
        canopy_drip: optional(&canopy_drip)?,
        surface_irrigation: optional(&surface_irrigation)?,
        direct_irrigation: optional_rows(&direct_irrigation, n_layers, "direct_irrigation")?,
        root_fractions: checked_rows(&root_fractions, n_layers, "root_fractions")?.0,
        rooting_depth: contiguous_slice(&rooting_depth)?,
        groundwater_depth: optional(&groundwater_depth)?,
    };
    let forcing = arrays.to_daily(n_layers).map_err(to_py_err)?;

    let state = initial_state
        .as_ref()
        .map(|s| restore_state(s, &engine))
        .transpose()?;

    let (final_state, result) = engine.run(&forcing, state.as_ref()).map_err(to_py_err)?;
    let state_out = PyArray1::from_vec(py, final_state.to_vec());

    let daily = result.daily;
    let daily_dict = timeseries_to_dict!(
        py, daily,
        water_to_surface, direct_irrigation, groundwater_discharge, boundary_inflow,
        pond_evaporation, runoff, soil_evaporation, transpiration, deep_percolation,
        groundwater_recharge, boundary_outflow, potential_evaporation,
        potential_transpiration, infiltration, pond_to_soil, soil_to_pond,
        transpiration_deficit, pond_water, soil_water, rootzone_water, soil_water_0_2m,
        rootzone_vwc, rootzone_psi, storage_change, balance_residual, substeps,
    );
    let layers = result.layers;
    let layer_dict = layer_series_to_dict!(
        py, layers, n_layers,
        vwc, wfps, psi, pf, percolation, diffusion, transpiration,
        groundwater_discharge, groundwater_recharge,
    );
    Ok((state_out, daily_dict, layer_dict))
}

/// Advance a column state by one day.
///
/// Returns (new_state, fluxes_dict, layer_dict); layer arrays have one value
/// per layer.
#[pyfunction]
#[allow(clippy::too_many_arguments)]
#[pyo3(signature = (
    state,
    layer_params,
    layer_bottoms,
    throughfall,
    potential_evaporation,
    potential_transpiration,
    root_fractions,
    rooting_depth,
    lower_boundary="field_capacity",
    snowmelt=0.0,
    canopy_drip=0.0,
    surface_irrigation=0.0,
    direct_irrigation=None,
    groundwater_depth=None,
    config_json=None,
))]
fn column_step<'py>(
    py: Python<'py>,
    state: PyReadonlyArray1<'py, f64>,
    layer_params: PyReadonlyArray2<'py, f64>,
    layer_bottoms: PyReadonlyArray1<'py, f64>,
    throughfall: f64,
    potential_evaporation: f64,
    potential_transpiration: f64,
    root_fractions: PyReadonlyArray1<'py, f64>,
    rooting_depth: f64,
    lower_boundary: &str,
    snowmelt: f64,
    canopy_drip: f64,
    surface_irrigation: f64,
    direct_irrigation: Option<PyReadonlyArray1<'py, f64>>,
    groundwater_depth: Option<f64>,
    config_json: Option<&str>,
) -> PyResult<(
    Bound<'py, PyArray1<f64>>,
    Bound<'py, PyDict>,
    Bound<'py, PyDict>,
)> {
    let mut engine = build_engine(&layer_params, &layer_bottoms, lower_boundary, config_json)?;
    let n_layers = engine.column().n_layers();
    let mut s = restore_state(&state, &engine)?;

    let forcing = DailyForcing {
        potential_evaporation,
        potential_transpiration,
        throughfall,
        snowmelt,
        canopy_drip,
        surface_irrigation,
        direct_irrigation: match &direct_irrigation {
            Some(a) => LayerVec::from_slice(checked_slice(a, n_layers, "direct_irrigation")?),
            None => LayerVec::new(),
        },
        root_fractions: LayerVec::from_slice(checked_slice(
            &root_fractions,
            n_layers,
            "root_fractions",
        )?),
        rooting_depth,
        groundwater_depth,
    };

    let out = engine.step(&mut s, &forcing).map_err(to_py_err)?;
    let state_out = PyArray1::from_vec(py, s.to_vec());

    let fluxes = out.fluxes;
    let flux_dict = fluxes_to_dict!(
        py, fluxes,
        water_to_surface, direct_irrigation, groundwater_discharge, boundary_inflow,
        pond_evaporation, runoff, soil_evaporation, transpiration, deep_percolation,
        groundwater_recharge, boundary_outflow, potential_evaporation,
        potential_transpiration, infiltration, pond_to_soil, soil_to_pond,
        transpiration_deficit, pond_water, soil_water, rootzone_water, soil_water_0_2m,
        rootzone_vwc, rootzone_psi, storage_change, balance_residual, substeps,
    );
    let layer_dict = layers_to_dict!(
        py, out.layers,
        vwc, wfps, psi, pf, percolation, diffusion, transpiration,
        groundwater_discharge, groundwater_recharge,
    );
    Ok((state_out, flux_dict, layer_dict))
}

/// Initial state of a column: every layer at field capacity, empty pond.
#[pyfunction]
#[pyo3(signature = (layer_params, layer_bottoms, lower_boundary="field_capacity"))]
fn column_initial_state<'py>(
    py: Python<'py>,
    layer_params: PyReadonlyArray2<'py, f64>,
    layer_bottoms: PyReadonlyArray1<'py, f64>,
    lower_boundary: &str,
) -> PyResult<Bound<'py, PyArray1<f64>>> {
    let engine = build_engine(&layer_params, &layer_bottoms, lower_boundary, None)?;
    Ok(PyArray1::from_vec(py, engine.initialize_state().to_vec()))
}

/// Hydraulic parameters (8 values) derived from sand/silt/clay percentages.
#[pyfunction]
fn params_from_texture<'py>(
    py: Python<'py>,
    sand: f64,
    silt: f64,
    clay: f64,
) -> PyResult<Bound<'py, PyArray1<f64>>> {
    let texture = Texture::new(sand, silt, clay).map_err(to_py_err)?;
    Ok(PyArray1::from_slice(py, &texture.hydraulic_properties().to_array()))
}

/// Bottom depths [m] of the standard 10-layer profile.
#[pyfunction]
fn standard_layer_bottoms(py: Python<'_>) -> Bound<'_, PyArray1<f64>> {
    PyArray1::from_slice(py, &STANDARD_LAYER_BOTTOMS)
}

/// Validate a JSON engine configuration and return it with defaults filled in.
#[pyfunction]
fn normalize_config(config_json: &str) -> PyResult<String> {
    let config = EngineConfig::from_json_str(config_json).map_err(to_py_err)?;
    serde_json::to_string(&config).map_err(|e| PyValueError::new_err(e.to_string()))
}

pub fn register(parent: &Bound<'_, PyModule>) -> PyResult<()> {
    let py = parent.py();
    let m = PyModule::new(py, "column")?;
    m.add_function(wrap_pyfunction!(column_run, &m)?)?;
    m.add_function(wrap_pyfunction!(column_step, &m)?)?;
    m.add_function(wrap_pyfunction!(column_initial_state, &m)?)?;
    m.add_function(wrap_pyfunction!(params_from_texture, &m)?)?;
    m.add_function(wrap_pyfunction!(standard_layer_bottoms, &m)?)?;
    m.add_function(wrap_pyfunction!(normalize_config, &m)?)?;
    parent.add_submodule(&m)?;
    py.import("sys")?
        .getattr("modules")?
        .set_item("soilflux._core.column", &m)?;
    Ok(())
}
