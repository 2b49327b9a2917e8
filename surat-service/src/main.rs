use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use serde_json::json;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use surat_service::backend::{BackendClient, CostRates, GeminiBackend, RetryPolicy};
use surat_service::config::load_config;
use surat_service::db::Database;
use surat_service::kode::{KodeMatcher, ReferenceSource, ReferenceTable};
use surat_service::{ExtractionMode, Pipeline};

/// Extract archive records from scanned letters
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Letter category (masuk_biasa, undangan, masuk_penting, keluar, keluar_sekwan, rahasia)
    category: String,

    /// Scanned pages to process (JPEG, PNG or TIFF; only page one of a PDF is read)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Extraction strategy; defaults to the configured mode
    #[arg(long)]
    mode: Option<ExtractionMode>,

    /// Directory for processed artifacts; defaults to the uploads directory
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Configuration file (without extension)
    #[arg(long, env = "SURAT_CONFIG", default_value = "config")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let cli = Cli::parse();

    info!(
        "Starting surat extraction service v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = load_config(&cli.config)?;
    let mode = cli.mode.unwrap_or(config.extraction.mode);

    let db_path = config.storage.database_path();
    let db = Arc::new(Database::open(&db_path)?);
    info!(path = %db_path.display(), "Database initialized");

    let reference = Arc::new(ReferenceTable::new(
        Some(db.clone() as Arc<dyn ReferenceSource>),
        config.storage.reference_file.clone(),
    ));
    let kode = KodeMatcher::new(config.extraction.kode_matching_enabled, reference);
    if kode.is_enabled() {
        info!("Classification code suggestions enabled");
    }

    let gemini = GeminiBackend::new(config.gemini.clone())?;
    if !gemini.is_configured() {
        warn!("No Gemini api key configured; every backend call will fail");
    } else if !gemini.health_check().await {
        warn!(model = gemini.model(), "Gemini model not reachable, continuing anyway");
    }
    info!(model = gemini.model(), mode = %mode, "Backend ready");

    let client = BackendClient::new(
        Arc::new(gemini),
        RetryPolicy::from(&config.retry),
        CostRates::from(&config.gemini),
        db.clone(),
    );

    let artifacts_dir = cli
        .output_dir
        .clone()
        .unwrap_or_else(|| config.storage.uploads_dir());
    let pipeline = Arc::new(Pipeline::new(client, kode, artifacts_dir));

    // Each file is an independent submission
    let mut tasks = JoinSet::new();
    for path in cli.files {
        let pipeline = pipeline.clone();
        let category = cli.category.clone();
        tasks.spawn(async move {
            let output = match tokio::fs::read(&path).await {
                Ok(bytes) => match pipeline.run_pipeline(&bytes, &category, mode).await {
                    Ok(result) => serde_json::to_value(&result).unwrap_or_else(|e| {
                        json!({ "code": "internal_error", "message": e.to_string() })
                    }),
                    Err(e) => {
                        error!(file = %path.display(), code = e.error_code(), error = %e, "Submission failed");
                        serde_json::to_value(e.to_response()).unwrap_or_default()
                    }
                },
                Err(e) => {
                    error!(file = %path.display(), error = %e, "Failed to read upload");
                    json!({ "code": "io_error", "message": e.to_string() })
                }
            };
            (path, output)
        });
    }

    let mut failures = 0usize;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((path, output)) => {
                if output.get("code").is_some() {
                    failures += 1;
                }
                let report = json!({ "file": path.display().to_string(), "result": output });
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            Err(e) => {
                failures += 1;
                error!(error = %e, "Submission task panicked");
            }
        }
    }

    match db.daily_cost() {
        Ok(cost) => info!(daily_cost_usd = cost, failures, "Batch complete"),
        Err(e) => warn!(error = %e, "Failed to read daily backend cost"),
    }

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let format = fmt::format()
        .with_target(true)
        .with_thread_ids(true)
        .compact();

    // RUST_LOG wins; otherwise info for this crate. Results own stdout.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("surat_service=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().event_format(format).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
