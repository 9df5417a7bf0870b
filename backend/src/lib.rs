//! Caustics Core - Rust Engine
//!
//! Builds gravitational-lensing simulators from declarative YAML
//! configuration and runs them.
//!
//! # Architecture
//!
//! - **schema**: Configuration records and structural validation
//! - **loader**: YAML/JSON loading and template generation
//! - **registry**: `kind` string to factory mapping, forward routines
//! - **sims**: Simulator builder, input signature, calls, state dictionary
//! - **forward**: Forward routines and the sandboxed script interpreter
//! - **models**: Numeric collaborator (cosmologies, lenses, light profiles)
//!
//! # Critical Invariants
//!
//! 1. Every `kind` resolves in the registry at build time, never a silent
//!    default
//! 2. The input signature order is deterministic for a given configuration
//! 3. A built simulator is immutable; calls never change it
//!
//! # Example
//!
//! ```no_run
//! use caustics_core_rs::build_simulator;
//!
//! let sim = build_simulator("sim.yaml")?;
//! let n = sim.input_signature().dynamic_len();
//! let image = sim.call(vec![0.5; n])?;
//! println!("{}x{} image, total flux {}", image.nx, image.ny, image.total());
//! # Ok::<(), caustics_core_rs::CausticsError>(())
//! ```

// Module declarations
pub mod error;
pub mod forward;
pub mod io;
pub mod loader;
pub mod models;
pub mod registry;
pub mod schema;
pub mod sims;

// Re-exports for convenience
pub use error::{CausticsError, ParseError};
pub use forward::{ForwardError, ForwardRoutine, ForwardScript};
pub use loader::{
    config_from_json, config_from_value, load_config, parse_config_str, render_template,
    write_template, ConfigSource,
};
pub use models::{Image, NumericError};
pub use registry::{Factory, KindCategory, Registry, RegistryError};
pub use schema::{validate_config, Config, ValidationError};
pub use sims::{
    build_simulator, CallParams, InputSignature, ParamRole, SignatureEntry, SignatureMismatch,
    Simulator, SimulatorBuilder, StateDict, StateError,
};

// FFI module (when feature enabled)
#[cfg(feature = "pyo3")]
pub mod ffi;

// PyO3 exports (when feature enabled)
#[cfg(feature = "pyo3")]
use pyo3::prelude::*;

#[cfg(feature = "pyo3")]
#[pymodule]
fn caustics_core_rs(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<ffi::simulator::PySimulator>()?;
    m.add_function(wrap_pyfunction!(ffi::simulator::build_simulator, m)?)?;
    m.add_function(wrap_pyfunction!(ffi::simulator::build_simulator_from_yaml, m)?)?;
    Ok(())
}
