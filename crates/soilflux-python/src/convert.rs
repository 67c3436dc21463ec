use numpy::{PyReadonlyArray1, PyReadonlyArray2, PyUntypedArrayMethods};
use pyo3::exceptions::{PyArithmeticError, PyValueError};
use pyo3::prelude::*;

use soilflux_core::WaterError;

/// Numerical faults surface as `ArithmeticError`, bad arguments as `ValueError`.
pub fn to_py_err(e: WaterError) -> PyErr {
    if e.is_numerical() {
        PyArithmeticError::new_err(e.to_string())
    } else {
        PyValueError::new_err(e.to_string())
    }
}

/// Validate that a numpy array is C-contiguous and return its slice.
pub fn contiguous_slice<'py>(arr: &'py PyReadonlyArray1<'py, f64>) -> PyResult<&'py [f64]> {
    arr.as_slice()
        .map_err(|_| PyValueError::new_err("array must be C-contiguous"))
}

/// Validate length + contiguity of a numpy array.
pub fn checked_slice<'py>(
    arr: &'py PyReadonlyArray1<'py, f64>,
    expected_len: usize,
    name: &str,
) -> PyResult<&'py [f64]> {
    let slice = contiguous_slice(arr)?;
    if slice.len() != expected_len {
        return Err(PyValueError::new_err(format!(
            "{} must have {} elements, got {}",
            name,
            expected_len,
            slice.len()
        )));
    }
    Ok(slice)
}

/// Validate the column count + contiguity of a 2D array; returns the
/// row-major slice and the row count.
pub fn checked_rows<'py>(
    arr: &'py PyReadonlyArray2<'py, f64>,
    n_cols: usize,
    name: &str,
) -> PyResult<(&'py [f64], usize)> {
    let shape = arr.shape();
    if shape[1] != n_cols {
        return Err(PyValueError::new_err(format!(
            "{} must have {} columns, got {}",
            name, n_cols, shape[1]
        )));
    }
    let slice = arr
        .as_slice()
        .map_err(|_| PyValueError::new_err(format!("{name} must be C-contiguous")))?;
    Ok((slice, shape[0]))
}
