// Forward script interpreter
//
// Evaluates script values and computations against an evaluation scope.
// Operands are scalars or fields (one value per fine grid sample); binary
// and n-ary operators broadcast scalars against fields.

use super::types::{Computation, Layer, Value};
use super::{ForwardContext, ForwardError};
use std::collections::BTreeMap;

/// What a script can read
pub trait EvalScope {
    fn layer(&self, layer: Layer) -> Result<Vec<f64>, ForwardError>;

    /// Parameter by qualified `module.name` key.
    fn param(&self, key: &str) -> Result<f64, ForwardError>;
}

impl EvalScope for ForwardContext<'_> {
    fn layer(&self, layer: Layer) -> Result<Vec<f64>, ForwardError> {
        ForwardContext::layer(self, layer)
    }

    fn param(&self, key: &str) -> Result<f64, ForwardError> {
        match key.split_once('.') {
            Some((module, name)) => ForwardContext::param(self, module, name),
            None => Err(ForwardError::UnknownParameter(key.to_string())),
        }
    }
}

/// Result of evaluating a value
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Scalar(f64),
    Field(Vec<f64>),
}

impl Operand {
    /// Materialize as a field of `len` samples.
    pub fn into_field(self, len: usize) -> Result<Vec<f64>, ForwardError> {
        match self {
            Operand::Scalar(v) => Ok(vec![v; len]),
            Operand::Field(values) if values.len() == len => Ok(values),
            Operand::Field(values) => Err(ForwardError::ShapeMismatch {
                left: len,
                right: values.len(),
            }),
        }
    }

    fn map(self, f: impl Fn(f64) -> f64) -> Operand {
        match self {
            Operand::Scalar(v) => Operand::Scalar(f(v)),
            Operand::Field(values) => Operand::Field(values.into_iter().map(f).collect()),
        }
    }

    fn try_map(
        self,
        f: impl Fn(f64) -> Result<f64, ForwardError>,
    ) -> Result<Operand, ForwardError> {
        Ok(match self {
            Operand::Scalar(v) => Operand::Scalar(f(v)?),
            Operand::Field(values) => {
                Operand::Field(values.into_iter().map(f).collect::<Result<_, _>>()?)
            }
        })
    }

    fn values(&self) -> &[f64] {
        match self {
            Operand::Scalar(v) => std::slice::from_ref(v),
            Operand::Field(values) => values,
        }
    }
}

/// Combine two operands elementwise, broadcasting scalars.
fn zip_with(
    left: Operand,
    right: Operand,
    f: impl Fn(f64, f64) -> Result<f64, ForwardError>,
) -> Result<Operand, ForwardError> {
    match (left, right) {
        (Operand::Scalar(a), Operand::Scalar(b)) => Ok(Operand::Scalar(f(a, b)?)),
        (Operand::Scalar(a), Operand::Field(bs)) => Ok(Operand::Field(
            bs.into_iter().map(|b| f(a, b)).collect::<Result<_, _>>()?,
        )),
        (Operand::Field(as_), Operand::Scalar(b)) => Ok(Operand::Field(
            as_.into_iter().map(|a| f(a, b)).collect::<Result<_, _>>()?,
        )),
        (Operand::Field(as_), Operand::Field(bs)) => {
            if as_.len() != bs.len() {
                return Err(ForwardError::ShapeMismatch {
                    left: as_.len(),
                    right: bs.len(),
                });
            }
            Ok(Operand::Field(
                as_.into_iter()
                    .zip(bs)
                    .map(|(a, b)| f(a, b))
                    .collect::<Result<_, _>>()?,
            ))
        }
    }
}

/// Combine three operands elementwise, broadcasting scalars.
fn zip3_with(
    a: Operand,
    b: Operand,
    c: Operand,
    f: impl Fn(f64, f64, f64) -> f64,
) -> Result<Operand, ForwardError> {
    let operands = [a, b, c];
    let len = operands.iter().find_map(|o| match o {
        Operand::Field(values) => Some(values.len()),
        Operand::Scalar(_) => None,
    });
    let Some(len) = len else {
        let [a, b, c] = operands.map(|o| o.values()[0]);
        return Ok(Operand::Scalar(f(a, b, c)));
    };
    let [a, b, c] = operands.map(|o| o.into_field(len));
    let (a, b, c) = (a?, b?, c?);
    Ok(Operand::Field(
        a.iter()
            .zip(&b)
            .zip(&c)
            .map(|((a, b), c)| f(*a, *b, *c))
            .collect(),
    ))
}

// ============================================================================
// VALUE EVALUATION
// ============================================================================

/// Evaluate a value to an operand
///
/// Resolves layers, parameter references, constants, literals and
/// computations.
pub fn evaluate_value(
    value: &Value,
    scope: &dyn EvalScope,
    constants: &BTreeMap<String, f64>,
) -> Result<Operand, ForwardError> {
    match value {
        Value::Layer { layer } => Ok(Operand::Field(scope.layer(*layer)?)),

        Value::Param { param } => Ok(Operand::Scalar(scope.param(param)?)),

        Value::Constant { constant } => constants
            .get(constant)
            .copied()
            .map(Operand::Scalar)
            .ok_or_else(|| ForwardError::UnknownConstant(constant.clone())),

        Value::Literal { value } => Ok(Operand::Scalar(*value)),

        Value::Compute { compute } => evaluate_computation(compute, scope, constants),
    }
}

// ============================================================================
// COMPUTATION EVALUATION
// ============================================================================

/// Evaluate a computation
pub fn evaluate_computation(
    computation: &Computation,
    scope: &dyn EvalScope,
    constants: &BTreeMap<String, f64>,
) -> Result<Operand, ForwardError> {
    let eval = |value: &Value| evaluate_value(value, scope, constants);

    match computation {
        Computation::Add { left, right } => zip_with(eval(left)?, eval(right)?, |a, b| Ok(a + b)),

        Computation::Subtract { left, right } => {
            zip_with(eval(left)?, eval(right)?, |a, b| Ok(a - b))
        }

        Computation::Multiply { left, right } => {
            zip_with(eval(left)?, eval(right)?, |a, b| Ok(a * b))
        }

        Computation::Divide { left, right } => zip_with(eval(left)?, eval(right)?, |a, b| {
            if b == 0.0 {
                Err(ForwardError::DivisionByZero)
            } else {
                Ok(a / b)
            }
        }),

        Computation::Max { values } => fold(values, "max", &eval, f64::max),

        Computation::Min { values } => fold(values, "min", &eval, f64::min),

        Computation::Abs { value } => Ok(eval(value)?.map(f64::abs)),

        Computation::Sqrt { value } => eval(value)?.try_map(|v| {
            if v < 0.0 {
                Err(ForwardError::Domain("square root"))
            } else {
                Ok(v.sqrt())
            }
        }),

        Computation::Exp { value } => Ok(eval(value)?.map(f64::exp)),

        Computation::Log { value } => eval(value)?.try_map(|v| {
            if v <= 0.0 {
                Err(ForwardError::Domain("logarithm"))
            } else {
                Ok(v.ln())
            }
        }),

        Computation::Clamp { value, min, max } => {
            let lower = zip_with(eval(value)?, eval(min)?, |v, lo| Ok(v.max(lo)))?;
            zip_with(lower, eval(max)?, |v, hi| Ok(v.min(hi)))
        }

        Computation::SafeDiv {
            numerator,
            denominator,
            default,
        } => {
            zip3_with(
                eval(numerator)?,
                eval(denominator)?,
                eval(default)?,
                |a, b, d| if b == 0.0 { d } else { a / b },
            )
        }

        Computation::Sum { value } => Ok(Operand::Scalar(eval(value)?.values().iter().sum())),

        Computation::Mean { value } => {
            let operand = eval(value)?;
            let values = operand.values();
            if values.is_empty() {
                return Err(ForwardError::EmptyValueList("mean"));
            }
            Ok(Operand::Scalar(
                values.iter().sum::<f64>() / values.len() as f64,
            ))
        }

        Computation::Peak { value } => {
            let operand = eval(value)?;
            operand
                .values()
                .iter()
                .copied()
                .reduce(f64::max)
                .map(Operand::Scalar)
                .ok_or(ForwardError::EmptyValueList("peak"))
        }
    }
}

fn fold(
    values: &[Value],
    op: &'static str,
    eval: &dyn Fn(&Value) -> Result<Operand, ForwardError>,
    f: fn(f64, f64) -> f64,
) -> Result<Operand, ForwardError> {
    let mut iter = values.iter();
    let first = iter.next().ok_or(ForwardError::EmptyValueList(op))?;
    let mut acc = eval(first)?;
    for value in iter {
        acc = zip_with(acc, eval(value)?, |a, b| Ok(f(a, b)))?;
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scope;

    impl EvalScope for Scope {
        fn layer(&self, layer: Layer) -> Result<Vec<f64>, ForwardError> {
            match layer {
                Layer::LensedSource => Ok(vec![1.0, 2.0, 0.0]),
                _ => Ok(vec![0.5; 3]),
            }
        }

        fn param(&self, key: &str) -> Result<f64, ForwardError> {
            match key {
                "src.Ie" => Ok(4.0),
                _ => Err(ForwardError::UnknownParameter(key.to_string())),
            }
        }
    }

    fn layer() -> Value {
        Value::Layer {
            layer: Layer::LensedSource,
        }
    }

    fn lit(value: f64) -> Value {
        Value::Literal { value }
    }

    fn compute(c: Computation) -> Value {
        Value::Compute {
            compute: Box::new(c),
        }
    }

    fn eval(value: &Value) -> Result<Operand, ForwardError> {
        evaluate_value(value, &Scope, &BTreeMap::new())
    }

    #[test]
    fn test_scalar_broadcasts_against_field() {
        let v = compute(Computation::Multiply {
            left: layer(),
            right: Value::Param {
                param: "src.Ie".into(),
            },
        });
        assert_eq!(eval(&v).unwrap(), Operand::Field(vec![4.0, 8.0, 0.0]));
    }

    #[test]
    fn test_division_by_zero_field_sample() {
        let v = compute(Computation::Divide {
            left: lit(1.0),
            right: layer(),
        });
        assert_eq!(eval(&v), Err(ForwardError::DivisionByZero));
    }

    #[test]
    fn test_safe_division_substitutes_default() {
        let v = compute(Computation::SafeDiv {
            numerator: lit(2.0),
            denominator: layer(),
            default: lit(-1.0),
        });
        assert_eq!(eval(&v).unwrap(), Operand::Field(vec![2.0, 1.0, -1.0]));
    }

    #[test]
    fn test_safe_division_keeps_genuine_nan() {
        let huge = || compute(Computation::Exp { value: lit(1000.0) });
        let v = compute(Computation::SafeDiv {
            numerator: huge(),
            denominator: huge(),
            default: lit(-1.0),
        });
        match eval(&v).unwrap() {
            Operand::Scalar(q) => assert!(q.is_nan()),
            other => panic!("expected a scalar, got {other:?}"),
        }

        // Only the zero sample takes the default
        let v = compute(Computation::SafeDiv {
            numerator: huge(),
            denominator: layer(),
            default: lit(-1.0),
        });
        assert_eq!(
            eval(&v).unwrap(),
            Operand::Field(vec![f64::INFINITY, f64::INFINITY, -1.0])
        );
    }

    #[test]
    fn test_aggregations() {
        let sum = compute(Computation::Sum { value: layer() });
        let mean = compute(Computation::Mean { value: layer() });
        let peak = compute(Computation::Peak { value: layer() });
        assert_eq!(eval(&sum).unwrap(), Operand::Scalar(3.0));
        assert_eq!(eval(&mean).unwrap(), Operand::Scalar(1.0));
        assert_eq!(eval(&peak).unwrap(), Operand::Scalar(2.0));
    }

    #[test]
    fn test_clamp_and_max() {
        let v = compute(Computation::Clamp {
            value: layer(),
            min: lit(0.5),
            max: lit(1.5),
        });
        assert_eq!(eval(&v).unwrap(), Operand::Field(vec![1.0, 1.5, 0.5]));

        let empty = compute(Computation::Max { values: vec![] });
        assert_eq!(eval(&empty), Err(ForwardError::EmptyValueList("max")));
    }

    #[test]
    fn test_log_domain_and_missing_refs() {
        let v = compute(Computation::Log { value: layer() });
        assert_eq!(eval(&v), Err(ForwardError::Domain("logarithm")));
        assert_eq!(
            eval(&Value::Constant {
                constant: "sky".into()
            }),
            Err(ForwardError::UnknownConstant("sky".into()))
        );
        assert_eq!(
            eval(&Value::Param {
                param: "lens.b".into()
            }),
            Err(ForwardError::UnknownParameter("lens.b".into()))
        );
    }
}
