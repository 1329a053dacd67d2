//! Brain-gen: combinatorial alpha generator for the WorldQuant BRAIN platform.
//!
//! Usage:
//!   brain-gen [OPTIONS]
//!
//! Options:
//!   -c, --config <FILE>     Config file path (default: config/generate.toml)
//!   --dataset <ID>          Dataset id to list fields from (overrides config)
//!   --search <TERM>         Free-text field search (overrides config)
//!   --output-dir <DIR>      Output directory (overrides config)
//!   --credentials <FILE>    Credentials JSON path (overrides config)

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use brain_client::{
    Credentials, FieldFetcher, RequestExecutor, SessionManager, SessionProvider,
};
use brain_gen::catalog::select_field_ids;
use brain_gen::config::GenerateConfig;
use brain_gen::output::{ManifestInfo, TaskWriter};
use brain_gen::task::build_tasks;

/// CLI arguments for brain-gen.
#[derive(Parser, Debug)]
#[command(name = "brain-gen")]
#[command(about = "Combinatorial alpha generator for the WorldQuant BRAIN platform")]
#[command(version)]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "config/generate.toml")]
    config: PathBuf,

    /// Dataset id to list fields from (overrides config file)
    #[arg(long)]
    dataset: Option<String>,

    /// Free-text field search; switches the fetch to search mode
    #[arg(long)]
    search: Option<String>,

    /// Output directory (overrides config file)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Credentials JSON path (overrides config file)
    #[arg(long)]
    credentials: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration
    let mut config = if args.config.exists() {
        GenerateConfig::from_file(&args.config)?
    } else {
        warn!("Config file not found at {:?}, using defaults", args.config);
        GenerateConfig::default()
    };

    // Apply CLI overrides
    config.apply_overrides(args.dataset, args.search, args.output_dir, args.credentials);

    // Initialize logging
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting brain-gen alpha generator");
    info!("API: {}", config.base_url);
    info!(
        "Dataset: {:?}, search: {:?}",
        config.query.dataset_id, config.query.search
    );

    // Sign in; without a session nothing else can run.
    let credentials = Credentials::from_file(&config.credentials_file).with_context(|| {
        format!("Failed to load credentials from {:?}", config.credentials_file)
    })?;
    let manager = SessionManager::with_base_url(credentials, config.base_url.clone())
        .with_login_policy(config.login_timeout, config.login_retry_delay);
    let mut session = manager.sign_in().await.context("No session available")?;

    // Drain the field catalog through the retrying executor.
    let executor = RequestExecutor::new(&manager, config.retry.clone());
    let fetcher = FieldFetcher::new(&executor, config.base_url.clone())
        .with_page_size(config.query.page_size)
        .with_search_result_cap(config.query.search_result_cap);
    let fields = fetcher
        .fetch_all(&mut session, &config.query.to_query())
        .await
        .context("Failed to fetch data fields")?;

    // Catalog fields -> expression grid -> shuffled task list.
    let field_ids = select_field_ids(&fields, &config.query.dataset_type);
    let grid = config.grid.clone().into_grid(field_ids);
    info!(expressions = grid.len(), "expression grid sized");

    let expressions = grid.generate(&mut rand::thread_rng());
    let tasks = build_tasks(expressions, &config.settings);

    // Persist the run.
    let writer = TaskWriter::new(config.output_dir.clone())?;
    let csv_path = writer.write_tasks(&tasks)?;
    writer.write_manifest(
        &ManifestInfo {
            generated_at: Utc::now(),
            dataset: config.query.dataset_id.clone(),
            search: config.query.search.clone(),
            field_count: fields.len(),
        },
        tasks.len(),
    )?;

    info!(
        tasks = tasks.len(),
        path = %csv_path.display(),
        "alpha generation complete"
    );
    Ok(())
}
