/// Convert a `*Timeseries` struct into a `PyDict` of 1D arrays.
macro_rules! timeseries_to_dict {
    ($py:expr, $ts:expr, $($field:ident),+ $(,)?) => {{
        let dict = pyo3::types::PyDict::new($py);
        $(
            dict.set_item(stringify!($field), numpy::PyArray1::from_vec($py, $ts.$field))?;
        )+
        dict
    }};
}

/// Convert a row-major per-layer series into a `PyDict` of `(n_days, n_layers)` arrays.
macro_rules! layer_series_to_dict {
    ($py:expr, $ts:expr, $n_layers:expr, $($field:ident),+ $(,)?) => {{
        let dict = pyo3::types::PyDict::new($py);
        $(
            let values = $ts.$field;
            let rows = values.len() / $n_layers.max(1);
            let flat = numpy::PyArray1::from_vec($py, values);
            dict.set_item(stringify!($field), numpy::PyArrayMethods::reshape(&flat, [rows, $n_layers])?)?;
        )+
        dict
    }};
}

/// Convert a single-day `Fluxes` struct into a `PyDict`.
macro_rules! fluxes_to_dict {
    ($py:expr, $f:expr, $($field:ident),+ $(,)?) => {{
        let dict = pyo3::types::PyDict::new($py);
        $(
            dict.set_item(stringify!($field), $f.$field)?;
        )+
        dict
    }};
}

/// Convert a slice of per-layer `Fluxes` structs into a `PyDict` of 1D arrays.
macro_rules! layers_to_dict {
    ($py:expr, $layers:expr, $($field:ident),+ $(,)?) => {{
        let dict = pyo3::types::PyDict::new($py);
        $(
            let values: Vec<f64> = $layers.iter().map(|l| l.$field).collect();
            dict.set_item(stringify!($field), numpy::PyArray1::from_vec($py, values))?;
        )+
        dict
    }};
}
