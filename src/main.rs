use anyhow::Context;
use clap::Parser;
use geogroove_curator::config::Config;
use geogroove_curator::models::CurationRequest;
use geogroove_curator::services::{
    Catalog, CandidateSource, CatalogCandidateSource, CurationEngine, StopSignal, SupabaseCandidateSource,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Build a route-aware playlist for one journey.
#[derive(Parser, Debug)]
#[command(name = "geogroove-curator")]
#[command(version)]
struct Args {
    /// Curation request JSON file, or `-` for stdin
    #[arg(short, long, default_value = "-")]
    request: String,

    /// Local catalog JSON; without it candidates come from the Supabase RPC
    #[arg(short, long, env = "CATALOG_PATH")]
    catalog: Option<PathBuf>,

    /// Seed for reproducible picks
    #[arg(long)]
    seed: Option<u64>,

    /// Print the full outcome (fill, radius attempts) instead of just the playlist
    #[arg(long)]
    report: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    // Logs go to stderr, stdout carries the playlist.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,geogroove_curator=debug".into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();

    let args = Args::parse();

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    let raw = read_request(&args.request).await?;
    let request: CurationRequest = serde_json::from_str(&raw).context("Failed to parse curation request")?;

    let source: Arc<dyn CandidateSource> = match &args.catalog {
        Some(path) => {
            let catalog = Catalog::load(path)
                .with_context(|| format!("Failed to load catalog from {}", path.display()))?;
            tracing::info!("Loaded catalog with {} tracks", catalog.tracks.len());
            Arc::new(CatalogCandidateSource::new(
                catalog,
                config.curation.max_tag_symmetric_difference,
            ))
        }
        None => {
            let (url, key) = config.supabase_credentials()?;
            Arc::new(SupabaseCandidateSource::new(url, key, config.candidate_rpc.clone()))
        }
    };

    let engine = CurationEngine::new(source, config.curation.clone());

    let token = CancellationToken::new();
    let ctrl_c = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, returning what has been assembled so far");
            ctrl_c.cancel();
        }
    });
    let stop = StopSignal::with_timeout(token, config.curation_timeout);

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let outcome = match engine.curate(&request, &mut rng, &stop).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!("Curation failed: {}", e);
            return Err(e.into());
        }
    };

    let output = if args.report {
        serde_json::to_string_pretty(&outcome)?
    } else {
        serde_json::to_string_pretty(&outcome.playlist)?
    };
    println!("{}", output);

    Ok(())
}

async fn read_request(source: &str) -> anyhow::Result<String> {
    if source == "-" {
        let mut raw = String::new();
        tokio::io::stdin()
            .read_to_string(&mut raw)
            .await
            .context("Failed to read request from stdin")?;
        Ok(raw)
    } else {
        tokio::fs::read_to_string(source)
            .await
            .with_context(|| format!("Failed to read request from {}", source))
    }
}
