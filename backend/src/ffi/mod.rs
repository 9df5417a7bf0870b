//! Python bindings
//!
//! A thin layer over the Rust API: configurations come in as paths or YAML
//! text, parameters as lists or dicts, images go out as nested lists.

pub mod simulator;
pub mod types;
