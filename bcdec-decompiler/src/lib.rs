//! Stack-bytecode decompiler core: CFG construction, dataflow, expression
//! reconstruction and control-structure recovery for one method at a time.

pub mod cfg_builder;
pub mod dataflow;
pub mod error;
pub mod expr_recovery;
pub mod options;
pub mod render;
pub mod rewrite;
pub mod structuring;
pub mod switch_types;

pub use error::{DecompileError, Diagnostic, Diagnostics, Severity};
pub use expr_recovery::{ClassResolver, NoResolver};
pub use options::DecompileOptions;

use bcdec_ir::{Cfg, MethodInput};

/// Result of decompiling one method.
#[derive(Debug)]
pub struct DecompiledMethod {
    pub name: String,
    /// The CFG with statements and structs, unless construction itself failed.
    pub cfg: Option<Cfg>,
    pub diagnostics: Vec<Diagnostic>,
    /// Set when any error-severity diagnostic was reported.
    pub error: bool,
}

/// Decompile a method. Never fails: input corruption and internal limits
/// become error diagnostics on the returned method.
pub fn decompile_method(
    input: &MethodInput,
    resolver: &dyn ClassResolver,
    options: &DecompileOptions,
) -> DecompiledMethod {
    let name = input.info.name.clone();
    let mut diags = Diagnostics::new();
    let cfg = match cfg_builder::build(input) {
        Ok(cfg) => Some(cfg),
        Err(err) => {
            diags.error(&name, err.pc(), err.to_string());
            None
        }
    };
    let cfg = cfg.map(|mut cfg| {
        if let Err(err) = run_passes(&mut cfg, resolver, options, &mut diags) {
            diags.error(&name, err.pc(), err.to_string());
        }
        cfg
    });
    let error = diags.has_errors();
    DecompiledMethod {
        name,
        cfg,
        diagnostics: diags.into_vec(),
        error,
    }
}

fn run_passes(
    cfg: &mut Cfg,
    resolver: &dyn ClassResolver,
    options: &DecompileOptions,
    diags: &mut Diagnostics,
) -> error::Result<()> {
    dataflow::analyze(cfg, options)?;
    let dead = cfg.remove_unreachable();
    if dead > 0 {
        log::debug!("{}: removed {dead} unreachable blocks", cfg.info.name);
    }
    cfg.calculate_postorder();
    expr_recovery::reconstruct(cfg, resolver, options, diags)?;
    structuring::analyze(cfg, diags);
    Ok(())
}

/// Build the CFG and run the dataflow analysis only.
pub fn analyze_frames(input: &MethodInput, options: &DecompileOptions) -> error::Result<Cfg> {
    let mut cfg = cfg_builder::build(input)?;
    dataflow::analyze(&mut cfg, options)?;
    Ok(cfg)
}
