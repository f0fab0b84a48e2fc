//! Shopper Spectrum CLI entrypoint
//!
//! Loads every artifact once, then answers a single request. Startup failures
//! abort with context; request failures are reported and turn into exit status 1.

use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use shopper_spectrum::config::{AppConfig, LogFormat};
use shopper_spectrum::data::{load_rfm_requests, ProductCatalog};
use shopper_spectrum::{Args, Artifacts, Command, RfmRecord};

fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config
        .logging
        .level
        .parse::<Level>()
        .unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn main() -> Result<ExitCode> {
    // Parse command-line arguments
    let args = Args::parse();

    let config = AppConfig::load(args.load_options()).context("failed to load configuration")?;
    init_logging(&config);

    let start_time = Instant::now();
    let artifacts = Artifacts::load(&config.artifacts).context("failed to load model artifacts")?;
    tracing::info!(
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "artifacts ready"
    );

    let outcome = match &args.command {
        Command::Segment { rfm } => run_segment(&artifacts, rfm, args.verbose),
        Command::SegmentBatch { input } => {
            if run_segment_batch(&artifacts, input)? > 0 {
                return Ok(ExitCode::FAILURE);
            }
            Ok(())
        }
        Command::Recommend { product, top_n } => run_recommend(
            &artifacts,
            product,
            top_n.unwrap_or(config.recommend.default_top_n),
        ),
        Command::Products { search, limit } => {
            run_products(&artifacts, search.as_deref(), *limit);
            Ok(())
        }
        Command::Clusters => {
            run_clusters(&artifacts);
            Ok(())
        }
    };

    match outcome {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            tracing::warn!(error = %err, "request failed");
            eprintln!("error: {err}");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Predict and print the segment of one customer
fn run_segment(artifacts: &Artifacts, rfm: &RfmRecord, verbose: bool) -> shopper_spectrum::Result<()> {
    println!(
        "Input RFM values: R={}, F={}, M={}",
        rfm.recency, rfm.frequency, rfm.monetary
    );

    let predictor = artifacts.predictor();
    let segment = predictor.predict(rfm)?;

    println!("\n✓ The customer belongs to the {segment} segment.");
    if verbose {
        let cluster = predictor.assign(rfm);
        println!("  Cluster: {cluster}");
        if let Some(profile) = artifacts.profiles().iter().find(|p| p.cluster == cluster) {
            println!(
                "  Cluster means: R={:.1}, F={:.1}, M={:.2} ({} customers)",
                profile.mean_recency, profile.mean_frequency, profile.mean_monetary, profile.size
            );
        }
    }

    Ok(())
}

/// Predict segments for every row of a CSV file and return the number of rejected rows
fn run_segment_batch(artifacts: &Artifacts, input: &Path) -> Result<usize> {
    let requests = load_rfm_requests(input)
        .with_context(|| format!("failed to read batch input {}", input.display()))?;

    let outcomes = artifacts.predict_batch(requests);
    let mut failed = 0usize;
    for (key, segment) in &outcomes {
        match segment {
            Ok(segment) => println!("{key}: {segment}"),
            Err(err) => {
                failed += 1;
                println!("{key}: error: {err}");
            }
        }
    }

    println!(
        "\n✓ {} of {} customers segmented",
        outcomes.len() - failed,
        outcomes.len()
    );

    Ok(failed)
}

/// Print recommendations for one product
fn run_recommend(artifacts: &Artifacts, product: &str, top_n: usize) -> shopper_spectrum::Result<()> {
    let recommendations = artifacts.recommend_with_scores(product, top_n)?;

    if recommendations.is_empty() {
        println!("No recommendations found for \"{product}\". Try another product.");
        return Ok(());
    }

    println!("Recommended Products:");
    for (idx, rec) in recommendations.iter().enumerate() {
        println!("{}. {} (similarity {:.3})", idx + 1, rec.product, rec.score);
    }

    Ok(())
}

/// Print catalog products, falling back to the similarity matrix keys
fn run_products(artifacts: &Artifacts, search: Option<&str>, limit: Option<usize>) {
    let fallback;
    let catalog = match artifacts.catalog() {
        Some(catalog) => catalog,
        None => {
            fallback = ProductCatalog::from_names(artifacts.similarity().products());
            &fallback
        }
    };

    let matches: Vec<&String> = match search {
        Some(query) => catalog.search(query).collect(),
        None => catalog.products().iter().collect(),
    };
    let shown = limit.unwrap_or(matches.len()).min(matches.len());

    for product in &matches[..shown] {
        println!("{product}");
    }
    if shown < matches.len() {
        println!("... {} more", matches.len() - shown);
    }
}

/// Print cluster statistics in segment order
fn run_clusters(artifacts: &Artifacts) {
    println!("=== Cluster Statistics ===");
    let total: usize = artifacts.profiles().iter().map(|p| p.size).sum();

    for (cluster, segment) in artifacts.labels().iter() {
        let Some(profile) = artifacts.profiles().iter().find(|p| p.cluster == cluster) else {
            continue;
        };
        let percentage = (profile.size as f64 / total as f64) * 100.0;
        println!(
            "{segment:<10} cluster {cluster}: {} customers ({percentage:.1}%), R={:.1}, F={:.1}, M={:.2}",
            profile.size, profile.mean_recency, profile.mean_frequency, profile.mean_monetary
        );
    }
}
