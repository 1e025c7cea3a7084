//! Membership-inference probe CLI
//!
//! The `mia-probe` command stands in for the host harness: it reads the
//! harness input JSON, takes the CI token out-of-band, runs the three-stage
//! probe and prints the run record (including the result object) as JSON.
//!
//! The exit status is 0 whenever a result object was produced, whatever its
//! outcome code; only internal defects exit non-zero.

use anyhow::{Context, Result};
use clap::Parser;
use probe_artifacts::{Credential, HttpProviderFactory, ProviderFactory};
use probe_core::{
    InferenceEngine, PipelineOptions, ProbeInput, ProbePipeline, ProbeRun, TractEngine,
};
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(name = "mia-probe")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Screen a CI-built ONNX model for membership-inference exposure",
    long_about = None
)]
struct Cli {
    /// Harness input JSON (`{"config": {...}}` or the bare option map); `-` reads stdin
    #[arg(short, long)]
    config: PathBuf,

    /// CI access token
    #[arg(long, env = "MIA_PROBE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Seed for the probe input, for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Parent directory for the per-run scratch directory
    #[arg(long)]
    scratch_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    probe_core::init_tracing(cli.json, level);

    let config = read_config(&cli.config)?;
    let options = PipelineOptions {
        seed: cli.seed,
        scratch_root: cli.scratch_dir.clone(),
    };

    let run = cmd_probe(
        &HttpProviderFactory,
        &TractEngine::new(),
        config,
        cli.token,
        &options,
    )
    .await?;

    println!(
        "{}",
        serde_json::to_string_pretty(&run).context("Failed to serialize probe run")?
    );
    Ok(())
}

/// Read the harness input from a file, or stdin for `-`.
fn read_config(path: &Path) -> Result<Value> {
    let text = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read configuration from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration {}", path.display()))?
    };
    serde_json::from_str(&text).context("Configuration is not valid JSON")
}

/// Run the probe for one harness input
async fn cmd_probe(
    factory: &dyn ProviderFactory,
    engine: &dyn InferenceEngine,
    config: Value,
    token: Option<String>,
    options: &PipelineOptions,
) -> Result<ProbeRun> {
    let input = ProbeInput {
        config,
        credential: token.map(Credential::new),
    };

    let run = ProbePipeline::run(factory, engine, input, options)
        .await
        .context("Probe pipeline failed to run")?;

    info!(
        run_id = %run.run_id,
        result = %run.integer_result(),
        summary = %run.result.pretty_result,
        "Probe complete"
    );
    Ok(run)
}
