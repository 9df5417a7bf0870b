//! Simulators
//!
//! Building a configuration into a live [`Simulator`], calling it, and
//! introspecting and snapshotting its parameters.

mod builder;
pub mod kwargs;
mod params;
mod signature;
mod simulator;
mod state_dict;

pub use builder::{build_simulator, SimulatorBuilder};
pub use kwargs::{PsfMode, SimulatorKwargs};
pub use params::{ModuleParams, ParamTable};
pub use signature::{CallParams, InputSignature, ParamRole, SignatureEntry, SignatureMismatch};
pub use simulator::Simulator;
pub use state_dict::{compute_structure_hash, StateDict, StateError, StateMetadata};
