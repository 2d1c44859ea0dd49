use serde::{Deserialize, Serialize};

/// Tunables for one decompilation run, loadable from YAML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompileOptions {
    /// Passes over the reverse postorder before the dataflow analysis gives up.
    pub max_dataflow_iterations: usize,
    /// Applications of one rewrite on one block before giving up. Every
    /// application removes a block, so the cap is raised to the live block
    /// count when the method is larger.
    pub max_rewrite_iterations: usize,
    /// Recover `switch (s)` from the `hashCode()` form.
    pub string_switch: bool,
    /// Recover `switch (e)` from the `$SwitchMap$` form.
    pub enum_switch: bool,
    /// Fold `a.f = a.f + x` into `a.f += x`.
    pub compound_assignments: bool,
}

impl Default for DecompileOptions {
    fn default() -> Self {
        DecompileOptions {
            max_dataflow_iterations: 1000,
            max_rewrite_iterations: 100,
            string_switch: true,
            enum_switch: true,
            compound_assignments: true,
        }
    }
}
