// Parameter table
//
// Every module of a built simulator, in signature order, with its declared
// parameters and their configured values. The input signature, packing,
// the state dictionary and templates all read from here.

use crate::registry::ParamDecl;
use crate::schema::ParamValue;
use std::collections::HashSet;

/// Parameters of one module
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleParams {
    pub module: String,
    pub kind: String,
    pub decls: Vec<ParamDecl>,
    /// Parallel to `decls`
    pub values: Vec<ParamValue>,
    /// Whether the bound forward routine reads this module
    pub consumed: bool,
}

impl ModuleParams {
    pub fn iter(&self) -> impl Iterator<Item = (&ParamDecl, &ParamValue)> {
        self.decls.iter().zip(&self.values)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.decls.iter().position(|d| d.name == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamTable {
    modules: Vec<ModuleParams>,
}

impl ParamTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, module: ModuleParams) {
        self.modules.push(module);
    }

    pub fn modules(&self) -> &[ModuleParams] {
        &self.modules
    }

    pub fn get(&self, module: &str) -> Option<&ModuleParams> {
        self.modules.iter().find(|m| m.module == module)
    }

    pub(crate) fn get_mut(&mut self, module: &str) -> Option<&mut ModuleParams> {
        self.modules.iter_mut().find(|m| m.module == module)
    }

    pub fn contains(&self, module: &str) -> bool {
        self.get(module).is_some()
    }

    pub(crate) fn mark_consumed(&mut self, module: &str) {
        if let Some(entry) = self.get_mut(module) {
            entry.consumed = true;
        }
    }

    /// Every `module.name` key, consumed or not.
    pub fn qualified_keys(&self) -> HashSet<String> {
        self.modules
            .iter()
            .flat_map(|m| m.decls.iter().map(move |d| format!("{}.{}", m.module, d.name)))
            .collect()
    }

    /// Module names in table order.
    pub fn module_names(&self) -> Vec<String> {
        self.modules.iter().map(|m| m.module.clone()).collect()
    }
}
