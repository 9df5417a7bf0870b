use super::NumericError;
use std::collections::HashMap;

/// Parameter values for one invocation, grouped per module
///
/// Values are stored in the module's declared parameter order, so numeric
/// code indexes them positionally. Names ride along for lookups by the
/// forward interpreter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Packed {
    modules: HashMap<String, PackedModule>,
}

#[derive(Debug, Clone, PartialEq)]
struct PackedModule {
    names: Vec<String>,
    values: Vec<f64>,
}

impl Packed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the values of one module. `names` and `values` must be parallel.
    pub fn insert(&mut self, module: impl Into<String>, names: Vec<String>, values: Vec<f64>) {
        debug_assert_eq!(names.len(), values.len());
        self.modules
            .insert(module.into(), PackedModule { names, values });
    }

    /// Values of `module` in declaration order.
    pub fn module(&self, module: &str) -> Result<&[f64], NumericError> {
        self.modules
            .get(module)
            .map(|m| m.values.as_slice())
            .ok_or_else(|| NumericError::MissingParameters(module.to_string()))
    }

    /// Single value by module and parameter name.
    pub fn get(&self, module: &str, name: &str) -> Result<f64, NumericError> {
        let entry = self
            .modules
            .get(module)
            .ok_or_else(|| NumericError::MissingParameters(module.to_string()))?;
        entry
            .names
            .iter()
            .position(|n| n == name)
            .map(|i| entry.values[i])
            .ok_or_else(|| NumericError::UnknownParameter {
                module: module.to_string(),
                name: name.to_string(),
            })
    }

    pub fn contains(&self, module: &str) -> bool {
        self.modules.contains_key(module)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name_and_position() {
        let mut packed = Packed::new();
        packed.insert("lens", vec!["x0".into(), "y0".into()], vec![0.1, -0.2]);

        assert_eq!(packed.module("lens").unwrap(), &[0.1, -0.2]);
        assert_eq!(packed.get("lens", "y0").unwrap(), -0.2);
        assert!(matches!(
            packed.get("lens", "q"),
            Err(NumericError::UnknownParameter { .. })
        ));
        assert_eq!(
            packed.module("src"),
            Err(NumericError::MissingParameters("src".into()))
        );
    }
}
