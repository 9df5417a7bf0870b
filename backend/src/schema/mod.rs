//! Configuration records
//!
//! Typed records for cosmologies, lenses (leaf and multi-plane), sources and
//! the simulator, plus the structural checks that apply to them regardless
//! of which kinds are registered.

pub mod expr;
mod types;
mod validation;

pub use types::{
    Config, CosmologyConfig, ForwardSpec, KwargMap, LensConfig, LensLeafConfig, MultiplaneConfig,
    ParamMap, ParamSource, ParamValue, SimulatorConfig, SourceConfig, StateLoad, MULTIPLANE_KIND,
};
pub use validation::{validate_config, FieldPath, ValidationError};
