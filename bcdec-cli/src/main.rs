use clap::{Parser, Subcommand};
use memmap2::Mmap;
use rayon::prelude::*;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs::File;
use std::path::{Path, PathBuf};

use bcdec_decompiler::{ClassResolver, DecompileOptions, DecompiledMethod, render};
use bcdec_ir::{MethodInput, Type};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[cfg(target_env = "msvc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "bcdec", about = "Stack bytecode decompiler core, driven by YAML method fixtures")]
struct Cli {
    /// Decompiler options file (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Only process methods with this name
    #[arg(long, global = true)]
    method: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print reconstructed statements and structures of every method
    Decompile {
        /// Path to the fixture
        input: PathBuf,
    },
    /// Print the control flow graph
    Cfg {
        /// Path to the fixture
        input: PathBuf,
        /// Graphviz output
        #[arg(long)]
        dot: bool,
    },
    /// Print the dataflow frame before each operation
    Frames {
        /// Path to the fixture
        input: PathBuf,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let options = match &cli.config {
        Some(path) => or_exit(load_yaml::<DecompileOptions>(path), path),
        None => DecompileOptions::default(),
    };
    let filter = cli.method.as_deref();

    match &cli.command {
        Commands::Decompile { input } => cmd_decompile(input, filter, &options),
        Commands::Cfg { input, dot } => cmd_cfg(input, filter, &options, *dot),
        Commands::Frames { input } => cmd_frames(input, filter, &options),
    }
}

// === Fixture loading ===

/// A fixture file: methods plus the class-level facts a resolver would supply.
#[derive(Deserialize)]
struct Fixture {
    #[serde(default)]
    declaring_type: Option<Type>,
    #[serde(default)]
    enum_maps: Vec<EnumMap>,
    methods: Vec<MethodInput>,
}

/// Contents of one `$SwitchMap$` array: case index to constant name.
#[derive(Deserialize)]
struct EnumMap {
    owner: Type,
    member: String,
    #[serde(rename = "enum")]
    enum_type: Type,
    cases: BTreeMap<i32, String>,
}

struct FixtureResolver<'a> {
    fixture: &'a Fixture,
}

impl ClassResolver for FixtureResolver<'_> {
    fn declaring_type(&self) -> Option<Type> {
        self.fixture.declaring_type.clone()
    }

    fn enum_switch_map(
        &self,
        owner: &Type,
        member: &str,
        enum_type: &Type,
    ) -> Option<BTreeMap<i32, String>> {
        self.fixture
            .enum_maps
            .iter()
            .find(|m| &m.owner == owner && m.member == member && &m.enum_type == enum_type)
            .map(|m| m.cases.clone())
    }
}

fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, String> {
    let file = File::open(path).map_err(|e| e.to_string())?;
    let mmap = unsafe { Mmap::map(&file) }.map_err(|e| e.to_string())?;
    serde_yaml::from_slice(&mmap).map_err(|e| e.to_string())
}

fn or_exit<T, E: Display>(result: Result<T, E>, path: &Path) -> T {
    match result {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Error: {}: {e}", path.display());
            std::process::exit(1);
        }
    }
}

fn selected<'a>(fixture: &'a Fixture, filter: Option<&str>) -> Vec<&'a MethodInput> {
    fixture
        .methods
        .iter()
        .filter(|m| filter.is_none_or(|name| m.info.name == name))
        .collect()
}

// === Commands ===

fn cmd_decompile(path: &Path, filter: Option<&str>, options: &DecompileOptions) {
    let fixture: Fixture = or_exit(load_yaml(path), path);
    let resolver = FixtureResolver { fixture: &fixture };
    let methods = selected(&fixture, filter);
    log::debug!(
        "{}: decompiling {} of {} methods",
        path.display(),
        methods.len(),
        fixture.methods.len()
    );

    let results: Vec<DecompiledMethod> = methods
        .par_iter()
        .map(|m| bcdec_decompiler::decompile_method(m, &resolver, options))
        .collect();

    let mut failed = 0;
    for result in &results {
        if let Some(cfg) = &result.cfg {
            print!("{}", render::method(cfg));
        } else {
            println!("method {}: no CFG", result.name);
        }
        for diag in &result.diagnostics {
            println!("  # {diag}");
        }
        if result.error {
            failed += 1;
        }
        println!();
    }
    if failed > 0 {
        eprintln!("{failed} of {} methods had errors", results.len());
    }
}

fn cmd_cfg(path: &Path, filter: Option<&str>, options: &DecompileOptions, dot: bool) {
    let fixture: Fixture = or_exit(load_yaml(path), path);
    for method in selected(&fixture, filter) {
        match bcdec_decompiler::analyze_frames(method, options) {
            Ok(cfg) if dot => print!("{}", cfg.to_dot()),
            Ok(cfg) => print!("{}", render::cfg_listing(&cfg)),
            Err(e) => eprintln!("{}: {e}", method.info.name),
        }
    }
}

fn cmd_frames(path: &Path, filter: Option<&str>, options: &DecompileOptions) {
    let fixture: Fixture = or_exit(load_yaml(path), path);
    for method in selected(&fixture, filter) {
        match bcdec_decompiler::analyze_frames(method, options) {
            Ok(cfg) => print!("{}", render::frames(&cfg)),
            Err(e) => eprintln!("{}: {e}", method.info.name),
        }
    }
}
