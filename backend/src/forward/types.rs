// Forward script - type definitions
//
// Expression-tree format for forward routines supplied as configuration.
// All types deserialize from YAML or JSON and are validated before a
// simulator binds them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// SCRIPT DEFINITION
// ============================================================================

/// A complete forward script
///
/// `image` is evaluated on the fine (upsampled, padded) grid; the result is
/// observed through the simulator's PSF, crop and pooling steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForwardScript {
    /// Optional human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Named constants referenced by `{constant: name}`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub constants: BTreeMap<String, f64>,

    /// Expression producing the image
    pub image: Value,
}

/// Image layers a script (or routine) can read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    /// Source brightness at raytraced positions
    LensedSource,
    /// Brightness of the lens galaxy itself (zero when not configured)
    LensLight,
    /// Source brightness without lensing
    Source,
    /// Lens convergence
    Convergence,
}

// ============================================================================
// VALUES
// ============================================================================

/// A value in an expression
///
/// Layers are pixel fields; everything else is a scalar. Scalars broadcast
/// against fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Image layer, e.g. `{layer: lensed_source}`
    Layer { layer: Layer },

    /// Simulator parameter as `module.name`, e.g. `{param: src.Ie}`
    Param { param: String },

    /// Script constant, e.g. `{constant: sky}`
    Constant { constant: String },

    /// Literal number
    Literal { value: f64 },

    /// Computed value
    Compute { compute: Box<Computation> },
}

// ============================================================================
// COMPUTATIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum Computation {
    // Binary operators
    #[serde(rename = "+")]
    Add { left: Value, right: Value },

    #[serde(rename = "-")]
    Subtract { left: Value, right: Value },

    #[serde(rename = "*")]
    Multiply { left: Value, right: Value },

    /// Division (checked for divide-by-zero at runtime)
    #[serde(rename = "/")]
    Divide { left: Value, right: Value },

    // Elementwise n-ary operators
    #[serde(rename = "max")]
    Max { values: Vec<Value> },

    #[serde(rename = "min")]
    Min { values: Vec<Value> },

    // Elementwise functions
    #[serde(rename = "abs")]
    Abs { value: Value },

    #[serde(rename = "sqrt")]
    Sqrt { value: Value },

    #[serde(rename = "exp")]
    Exp { value: Value },

    #[serde(rename = "log")]
    Log { value: Value },

    /// Clamp value to range [min, max]
    #[serde(rename = "clamp")]
    Clamp {
        value: Value,
        min: Value,
        max: Value,
    },

    /// Safe division - `default` wherever the denominator is zero
    #[serde(rename = "div0")]
    SafeDiv {
        numerator: Value,
        denominator: Value,
        default: Value,
    },

    // Aggregations: reduce a field to a scalar
    #[serde(rename = "sum")]
    Sum { value: Value },

    #[serde(rename = "mean")]
    Mean { value: Value },

    /// Largest element
    #[serde(rename = "peak")]
    Peak { value: Value },
}
