use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use clap::Parser;
use log::{info, warn};
use teachable::{
    BurnEngine, EpochReport, FeatureExtractor, ImageSource, ModelManager, OnnxFeatureExtractor, RuntimeConfig,
    TeachableConfig, TrainingSession,
};
use tokio::sync::mpsc;

const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "gif", "webp"];

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the ONNX embedding model (defaults to the managed model directory)
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long, default_value = "teachable.json")]
    config: PathBuf,

    /// A class and the directory holding its examples, as NAME=DIR
    #[arg(long = "class", value_name = "NAME=DIR", value_parser = parse_class)]
    classes: Vec<(String, PathBuf)>,

    /// Image to classify after training
    #[arg(short, long = "predict", value_name = "FILE")]
    predict: Vec<PathBuf>,

    /// Seed for the training shuffle
    #[arg(long)]
    seed: Option<u64>,
}

fn parse_class(arg: &str) -> Result<(String, PathBuf), String> {
    match arg.split_once('=') {
        Some((name, dir)) if !name.trim().is_empty() && !dir.is_empty() => {
            Ok((name.to_string(), PathBuf::from(dir)))
        }
        _ => Err(format!("expected NAME=DIR, got \"{}\"", arg)),
    }
}

/// Image files in `dir`, sorted by file name.
fn list_images(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut images: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(images)
}

fn load_extractor(args: &Args, config: &TeachableConfig) -> anyhow::Result<OnnxFeatureExtractor> {
    let mut settings = config.model.clone();
    if args.model.is_some() {
        settings.path = args.model.clone();
    }
    let extractor = ModelManager::new_default()
        .load_extractor(&settings, &RuntimeConfig::from(&config.runtime))
        .context("Embedding model unavailable")?;
    Ok(extractor)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    info!("=== Starting Image Classifier Demo ===");

    if args.classes.len() < 2 {
        bail!("At least two --class NAME=DIR arguments are required");
    }

    let mut config = TeachableConfig::load_or_default(&args.config);
    if args.seed.is_some() {
        config.training.seed = args.seed;
    }

    let start_time = Instant::now();
    let extractor = load_extractor(&args, &config)?;
    info!(
        "Embedding model ready ({} features, took {:.2?})",
        extractor.feature_size(),
        start_time.elapsed()
    );

    let mut session = TrainingSession::from_settings(&config.training);
    for (name, dir) in &args.classes {
        let label = session.add_class(name)?;
        let images = list_images(dir)?;
        let report = session.add_examples(label.as_str(), images, &extractor)?;
        println!("{}: {} of {} images added", report.label, report.succeeded, report.attempted);
        for failure in &report.failures {
            warn!("Skipped {}: {}", failure.source, failure.error);
        }
    }

    let train_start = Instant::now();
    let job = session.begin_training()?;
    info!(
        "=== Training on {} examples ({} classes) ===",
        job.num_examples(),
        job.spec().num_classes
    );

    let (tx, mut rx) = mpsc::unbounded_channel::<EpochReport>();
    let worker = tokio::task::spawn_blocking(move || {
        let engine = BurnEngine::new();
        job.run(&engine, &mut |report| {
            let _ = tx.send(report);
        })
    });

    while let Some(report) = rx.recv().await {
        println!(
            "Epoch {}/{}: loss {:.4}, accuracy {:.1}%",
            report.epoch,
            report.total_epochs,
            report.loss,
            report.accuracy * 100.0
        );
    }

    let outcome = worker.await.context("Training worker panicked")?;
    session.finish_training(outcome)?;
    info!("=== Training Complete (took {:.2?}) ===", train_start.elapsed());

    for path in &args.predict {
        process_input(&session, &extractor, path)?;
    }

    info!("Total time: {:.2?}", start_time.elapsed());
    Ok(())
}

fn process_input(
    session: &TrainingSession,
    extractor: &OnnxFeatureExtractor,
    path: &Path,
) -> anyhow::Result<()> {
    info!("Processing: {}", path.display());

    match session.predict(Some(ImageSource::from(path)), extractor) {
        Ok(prediction) => {
            let mut scores: Vec<_> = prediction.scores.into_iter().collect();
            scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

            println!("\n{}", path.display());
            println!("  Predicted class: {} ({:.1}%)", prediction.label, prediction.confidence * 100.0);
            for (label, score) in scores {
                println!("    {}: {:.1}%", label, score * 100.0);
            }
        }
        Err(e) => {
            eprintln!("\nError classifying {}: {}", path.display(), e);
            return Err(e.into());
        }
    }

    Ok(())
}
