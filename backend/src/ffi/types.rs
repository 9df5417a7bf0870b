//! Type conversion utilities for FFI boundary
//!
//! Converts between Rust types and PyO3-compatible types (PyDict, PyList).

use pyo3::exceptions::{PyRuntimeError, PyTypeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};
use std::collections::BTreeMap;

use crate::error::CausticsError;
use crate::models::Image;
use crate::sims::{CallParams, ParamRole, SignatureEntry};

// ========================================================================
// Errors
// ========================================================================

/// Map a crate error onto a Python exception.
///
/// Configuration and call-argument problems raise `ValueError`; numeric and
/// I/O failures raise `RuntimeError`.
pub fn to_py_err(err: CausticsError) -> PyErr {
    match err {
        CausticsError::Parse(_)
        | CausticsError::Validation(_)
        | CausticsError::UnknownKind { .. }
        | CausticsError::SignatureMismatch(_)
        | CausticsError::State(_) => PyValueError::new_err(err.to_string()),
        other => PyRuntimeError::new_err(other.to_string()),
    }
}

// ========================================================================
// Python -> Rust
// ========================================================================

/// Call parameters from `None`, a sequence of floats, or a dict keyed
/// `module.param`.
pub fn extract_call_params(params: Option<&Bound<'_, PyAny>>) -> PyResult<CallParams> {
    let Some(params) = params.filter(|p| !p.is_none()) else {
        return Ok(CallParams::none());
    };

    if let Ok(dict) = params.downcast::<PyDict>() {
        let mut named = BTreeMap::new();
        for (key, value) in dict.iter() {
            named.insert(key.extract::<String>()?, value.extract::<f64>()?);
        }
        return Ok(CallParams::Named(named));
    }

    params
        .extract::<Vec<f64>>()
        .map(CallParams::Positional)
        .map_err(|_| {
            PyTypeError::new_err("parameters must be a sequence of floats or a dict of floats")
        })
}

// ========================================================================
// Rust -> Python
// ========================================================================

/// Image as a list of rows.
pub fn image_to_py(py: Python<'_>, image: &Image) -> PyResult<Py<PyList>> {
    let rows = PyList::empty_bound(py);
    for row in image.rows() {
        rows.append(PyList::new_bound(py, row))?;
    }
    Ok(rows.unbind())
}

pub fn signature_entry_to_py(py: Python<'_>, entry: &SignatureEntry) -> PyResult<Py<PyDict>> {
    let dict = PyDict::new_bound(py);
    dict.set_item("module", &entry.module)?;
    dict.set_item("module_kind", &entry.module_kind)?;
    dict.set_item("name", &entry.name)?;
    dict.set_item(
        "role",
        match entry.role {
            ParamRole::Static => "static",
            ParamRole::Dynamic => "dynamic",
        },
    )?;
    dict.set_item("shape", entry.shape.clone())?;
    dict.set_item("value", entry.value)?;
    dict.set_item("description", &entry.description)?;
    dict.set_item("unit", &entry.unit)?;
    Ok(dict.unbind())
}
