//! PyO3 wrapper for Simulator
//!
//! This module provides the Python interface to built simulators.

use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};
use std::path::PathBuf;

use super::types::{extract_call_params, image_to_py, signature_entry_to_py, to_py_err};
use crate::loader::ConfigSource;
use crate::sims::{build_simulator as build, Simulator};

/// Python wrapper for a built simulator
///
/// # Example (from Python)
///
/// ```python
/// from caustics_core_rs import build_simulator
///
/// sim = build_simulator("sim.yaml")
/// names = [e["name"] for e in sim.input_signature() if e["role"] == "dynamic"]
/// image = sim([0.5] * len(names))
/// ```
#[pyclass(name = "Simulator", frozen)]
pub struct PySimulator {
    inner: Simulator,
}

#[pymethods]
impl PySimulator {
    /// Run the simulator
    ///
    /// # Arguments
    ///
    /// * `params` - Dynamic parameters: a list in input signature order, a
    ///   dict keyed `module.param`, or `None` when there are none
    ///
    /// # Returns
    ///
    /// The image as a list of rows
    ///
    /// # Errors
    ///
    /// Raises ValueError if the parameters do not match the input signature
    #[pyo3(signature = (params=None))]
    fn __call__(&self, py: Python<'_>, params: Option<&Bound<'_, PyAny>>) -> PyResult<Py<PyList>> {
        let params = extract_call_params(params)?;
        let image = py
            .allow_threads(|| self.inner.call(params))
            .map_err(to_py_err)?;
        image_to_py(py, &image)
    }

    /// Ordered parameter entries, one dict per parameter
    fn input_signature(&self, py: Python<'_>) -> PyResult<Vec<Py<PyDict>>> {
        self.inner
            .input_signature()
            .entries()
            .iter()
            .map(|entry| signature_entry_to_py(py, entry))
            .collect()
    }

    /// Write `<name>_template.yaml` into `dir` and return its path
    fn write_template(&self, dir: PathBuf) -> PyResult<PathBuf> {
        self.inner.write_template(dir).map_err(to_py_err)
    }

    #[getter]
    fn name(&self) -> String {
        self.inner.name().to_string()
    }

    #[getter]
    fn id(&self) -> String {
        self.inner.id().to_string()
    }

    fn __repr__(&self) -> String {
        format!(
            "Simulator(name='{}', kind='{}', dynamic_params={})",
            self.inner.name(),
            self.inner.kind(),
            self.inner.input_signature().dynamic_len()
        )
    }
}

/// Build a simulator from a YAML configuration file
#[pyfunction]
pub fn build_simulator(path: PathBuf) -> PyResult<PySimulator> {
    let inner = build(path).map_err(to_py_err)?;
    Ok(PySimulator { inner })
}

/// Build a simulator from YAML text
#[pyfunction]
pub fn build_simulator_from_yaml(text: &str) -> PyResult<PySimulator> {
    let inner = build(ConfigSource::yaml(text)).map_err(to_py_err)?;
    Ok(PySimulator { inner })
}
