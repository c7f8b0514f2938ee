//! CLI commands for xg-api.
//!
//! Supports API server mode, offline prediction, and heatmap generation.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

use crate::config::AppConfig;
use crate::heatmap;
use crate::registry::create_shared_registry;
use crate::service::PredictionService;
use crate::types::{ErrorResponse, PredictResponse, ShotInput};

#[derive(Parser)]
#[command(name = "xg-api")]
#[command(version, about = "Expected goals prediction API and CLI", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Predict xG for one shot or an array of shots in a JSON file
    Predict {
        /// Path to shot JSON file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output format (json, table)
        #[arg(short, long, default_value = "json")]
        format: String,

        /// Models directory override
        #[arg(short, long)]
        models: Option<PathBuf>,
    },

    /// Precompute heatmaps for every situation / shot type pair
    Heatmaps {
        /// Output file (defaults to heatmaps.path)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Grid resolution between 0.01 and 1 (defaults to heatmaps.resolution)
        #[arg(short, long)]
        resolution: Option<f64>,

        /// Models directory override
        #[arg(short, long)]
        models: Option<PathBuf>,
    },

    /// List loaded model variants
    Models {
        /// Models directory override
        #[arg(short, long)]
        models: Option<PathBuf>,
    },
}

/// Shot file contents: a single shot or a list.
#[derive(Deserialize)]
#[serde(untagged)]
enum ShotFile {
    Many(Vec<ShotInput>),
    One(ShotInput),
}

impl ShotFile {
    fn into_vec(self) -> Vec<ShotInput> {
        match self {
            ShotFile::Many(shots) => shots,
            ShotFile::One(shot) => vec![shot],
        }
    }
}

/// Per-shot CLI result.
#[derive(Serialize)]
#[serde(untagged)]
enum PredictLine {
    Ok(PredictResponse),
    Err(ErrorResponse),
}

fn load_service(models: Option<PathBuf>) -> anyhow::Result<(AppConfig, PredictionService)> {
    let mut config = AppConfig::load()?;
    if let Some(dir) = models {
        config.models.dir = dir.to_string_lossy().to_string();
    }

    eprintln!("Loading models from: {}", config.models.dir);
    let registry = create_shared_registry(&config.models.dir)?;
    eprintln!("Loaded {} model variant(s)", registry.len());

    Ok((config, PredictionService::new(registry)))
}

/// Run CLI prediction from file.
pub fn run_predict(input: PathBuf, format: String, models: Option<PathBuf>) -> anyhow::Result<()> {
    let (_, service) = load_service(models)?;

    let content = std::fs::read_to_string(&input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let shots = serde_json::from_str::<ShotFile>(&content)
        .with_context(|| format!("Invalid shot JSON in {}", input.display()))?
        .into_vec();

    eprintln!("Shots: {}", shots.len());

    let results: Vec<PredictLine> = shots
        .iter()
        .map(|shot| match service.predict(shot) {
            Ok(outcome) => {
                let normalisation = shot
                    .normalisation
                    .clone()
                    .unwrap_or_else(|| Value::Object(Default::default()));
                PredictLine::Ok(outcome.into_response(normalisation))
            }
            Err(e) => PredictLine::Err(ErrorResponse {
                error: e.code().to_string(),
                message: e.to_string(),
            }),
        })
        .collect();

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        "table" => {
            print_table(&results);
        }
        _ => {
            eprintln!("Unknown format: {}. Using JSON.", format);
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
    }

    Ok(())
}

/// Print prediction results in table format.
fn print_table(results: &[PredictLine]) {
    println!(
        "  {:>3}  {:>6}  {:>6}  {:<14}  {:<13}  {:<16}  {:>5}",
        "#", "x", "y", "situation", "shot_type", "model", "xG"
    );
    for (i, line) in results.iter().enumerate() {
        match line {
            PredictLine::Ok(r) => println!(
                "  {:>3}  {:>6.3}  {:>6.3}  {:<14}  {:<13}  {:<16}  {:>5.2}",
                i + 1,
                r.inputs.x,
                r.inputs.y,
                r.inputs.situation.map_or("-", |s| s.name()),
                r.inputs.shot_type.map_or("-", |t| t.name()),
                r.chosen_model,
                r.xg
            ),
            PredictLine::Err(e) => println!("  {:>3}  error: {} ({})", i + 1, e.message, e.error),
        }
    }
}

/// Generate the heatmap file.
pub fn run_heatmaps(
    output: Option<PathBuf>,
    resolution: Option<f64>,
    models: Option<PathBuf>,
) -> anyhow::Result<()> {
    let (config, service) = load_service(models)?;

    let output = output.unwrap_or_else(|| PathBuf::from(&config.heatmaps.path));
    let resolution = resolution.unwrap_or(config.heatmaps.resolution);

    eprintln!("Generating heatmaps at resolution {}", resolution);
    let data = heatmap::generate(&service, resolution)?;
    data.to_file(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    let count: usize = data.heatmaps.values().map(|m| m.len()).sum();
    eprintln!("Wrote {} heatmaps to {}", count, output.display());

    Ok(())
}

/// Print the loaded model variants.
pub fn run_models(models: Option<PathBuf>) -> anyhow::Result<()> {
    let (_, service) = load_service(models)?;
    let registry = service.registry();

    if registry.is_empty() {
        println!("No models loaded from {}", registry.dir().display());
        return Ok(());
    }

    for (name, entry) in registry.iter() {
        println!("=== {} ({}) ===", name, entry.model.kind());
        for feature in entry.schema.names() {
            println!("  {}", feature);
        }
        println!();
    }

    Ok(())
}
