//! caustics
//!
//! Command-line front end: validate configurations, inspect input
//! signatures, write templates and run simulators.
//!
//! Usage: `caustics <command> [args]`

use anyhow::{bail, Context, Result};
use caustics_core_rs::{build_simulator, load_config, CallParams, KindCategory, Registry};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "caustics")]
#[command(about = "Build and run gravitational lensing simulators from YAML")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that a configuration loads and builds
    Validate { config: PathBuf },

    /// Print the input signature of a simulator as JSON
    Signature { config: PathBuf },

    /// Write a configuration template for a simulator
    Template {
        config: PathBuf,
        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },

    /// Run a simulator and print (or write) the image as JSON
    Run {
        config: PathBuf,
        /// Dynamic parameters in signature order, comma separated
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        params: Vec<f64>,
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// List registered kinds and forward routines
    Kinds,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,caustics=info,caustics_core_rs=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    match args.command {
        Command::Validate { config } => {
            load_config(&config)
                .with_context(|| format!("failed to load '{}'", config.display()))?;
            // Building resolves kinds and checks params against declarations
            let sim = build_simulator(&config)?;
            info!(config = %config.display(), "configuration is valid");
            println!(
                "ok: {} ({}), {} dynamic parameters",
                sim.name(),
                sim.kind(),
                sim.input_signature().dynamic_len()
            );
        }
        Command::Signature { config } => {
            let sim = build_simulator(&config)?;
            println!("{}", serde_json::to_string_pretty(sim.input_signature())?);
        }
        Command::Template { config, out } => {
            let sim = build_simulator(&config)?;
            let path = sim.write_template(&out)?;
            println!("{}", path.display());
        }
        Command::Run {
            config,
            params,
            output,
        } => {
            let sim = build_simulator(&config)?;
            let expected = sim.input_signature().dynamic_len();
            if params.len() != expected {
                bail!(
                    "expected {expected} parameters ({}), received {}",
                    sim.input_signature().dynamic_keys().join(", "),
                    params.len()
                );
            }
            let image = sim.call(CallParams::Positional(params))?;
            let json = serde_json::to_string(&image)?;
            match output {
                Some(path) => {
                    fs::write(&path, json)
                        .with_context(|| format!("failed to write '{}'", path.display()))?;
                    info!(path = %path.display(), "wrote image");
                }
                None => println!("{json}"),
            }
        }
        Command::Kinds => {
            let registry = Registry::global();
            for category in [
                KindCategory::Simulator,
                KindCategory::Lens,
                KindCategory::Source,
                KindCategory::Cosmology,
            ] {
                for factory in registry.kinds_of(category) {
                    let dynamic = factory
                        .params
                        .iter()
                        .filter(|p| p.default.is_none())
                        .count();
                    println!(
                        "{:<10} {:<14} {} ({} params, {dynamic} without default)",
                        category.to_string(),
                        factory.kind,
                        factory.description,
                        factory.params.len()
                    );
                }
            }
            for name in registry.forward_names() {
                println!("{:<10} {name}", "forward");
            }
        }
    }
    Ok(())
}
