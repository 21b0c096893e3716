//! PlateGate - license plate recognition from still images
//!
//! Reads an image file, runs the recognition engine and prints the plates found.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use plategate::config::{load_config, save_config, EngineConfig};
use plategate::overlay::annotate;
use plategate::storage::default_config_path;
use plategate::vision::{ModelManager, PlateEngine};
use plategate::Frame;

/// PlateGate - license plate recognition
#[derive(Parser, Debug)]
#[command(name = "plategate")]
#[command(about = "Detect and read license plates in an image")]
struct Args {
    /// Image to analyze
    #[arg(required_unless_present = "write_default_config")]
    image: Option<PathBuf>,

    /// Engine config file (defaults to the per-user config.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Text recognizer ONNX model (overrides the config)
    #[arg(long)]
    recognizer_model: Option<PathBuf>,

    /// Recognizer vocabulary, CTC blank excluded (overrides the config)
    #[arg(long)]
    vocab: Option<String>,

    /// Plate locator ONNX model (overrides the config)
    #[arg(long)]
    locator_model: Option<PathBuf>,

    /// Save a copy of the image with detection boxes drawn
    #[arg(long, value_name = "OUT")]
    annotate: Option<PathBuf>,

    /// Print detections as JSON
    #[arg(long)]
    json: bool,

    /// Write the default config to FILE and exit
    #[arg(long, value_name = "FILE")]
    write_default_config: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Initialize logging (RUST_LOG overrides the default level)
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    if let Some(path) = &args.write_default_config {
        save_config(&EngineConfig::default(), path)
            .with_context(|| format!("Failed to write config to {:?}", path))?;
        println!("Wrote default config to {}", path.display());
        return Ok(());
    }

    let image_path = args.image.as_deref().context("No image given")?;

    let config = resolve_config(&args)?;
    let models = ModelManager::new().context("Failed to locate models directory")?;
    let engine = PlateEngine::from_models(config, &models).context("Failed to initialize engine")?;
    if !engine.has_locator() {
        info!("Running without plate locator");
    }

    let frame = Frame::open(image_path)
        .with_context(|| format!("Failed to read image {:?}", image_path))?;
    let (width, height) = frame.dimensions();
    info!("Loaded {:?} ({}x{})", image_path, width, height);

    let results = engine.detect_frame(&frame)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else if results.is_empty() {
        println!("No plates found");
    } else {
        for result in &results {
            let b = result.bbox;
            println!(
                "{}\t({}, {}, {}, {})\tregion {:.2}\treading {:.2}",
                result.plate_text,
                b.x1,
                b.y1,
                b.x2,
                b.y2,
                result.region_confidence,
                result.reading_confidence
            );
        }
    }

    if let Some(out) = &args.annotate {
        annotate(frame.image(), &results)
            .save(out)
            .with_context(|| format!("Failed to save annotated image to {:?}", out))?;
        info!("Annotated image saved to {:?}", out);
    }

    Ok(())
}

/// Load the config file and apply command-line overrides
fn resolve_config(args: &Args) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => load_config(path).with_context(|| format!("Failed to load config {:?}", path))?,
        None => load_default_config(),
    };

    // Paths given on the command line are relative to the working directory
    let cwd = std::env::current_dir().context("Failed to read working directory")?;

    if let Some(path) = &args.recognizer_model {
        config.model.recognizer.path = Some(cwd.join(path));
    }
    if let Some(vocab) = &args.vocab {
        config.model.recognizer.vocabulary = vocab.clone();
    }
    if let Some(path) = &args.locator_model {
        config.model.locator_path = Some(cwd.join(path));
        config.model.use_locator = true;
    }

    Ok(config)
}

/// The per-user config if present and valid, otherwise defaults
fn load_default_config() -> EngineConfig {
    let path = match default_config_path() {
        Ok(path) => path,
        Err(e) => {
            warn!("Could not determine config path, using defaults: {}", e);
            return EngineConfig::default();
        }
    };

    if !path.exists() {
        return EngineConfig::default();
    }

    match load_config(&path) {
        Ok(config) => {
            info!("Loaded config from {:?}", path);
            config
        }
        Err(e) => {
            warn!("Ignoring invalid config {:?}: {}", path, e);
            EngineConfig::default()
        }
    }
}
