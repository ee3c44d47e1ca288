mod app;
mod backend;
mod config;
mod graph;
mod interaction;
mod lod;
mod perf;
mod simulation;
mod util;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use backend::{GraphBackend, GraphClient, Vault, VaultBackend};
use config::ViewerConfig;
use graph::GraphStore;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Vault file (JSON with `notes` and `links`).
    #[arg(long, conflicts_with = "demo")]
    vault: Option<PathBuf>,

    /// Generate a synthetic vault with this many notes instead.
    #[arg(long, value_name = "NOTES")]
    demo: Option<usize>,

    /// Nodes requested by the initial fetch.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    limit: Option<u64>,

    /// Tuning file for cache, retry and notification timings.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "notegraph=debug"
    } else {
        "notegraph=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = match &args.config {
        Some(path) => ViewerConfig::load(path)?,
        None => ViewerConfig::default(),
    };
    let limit = match args.limit {
        Some(limit) => usize::try_from(limit).context("--limit is too large")?,
        None => config.graph_limit.max(1),
    };

    let backend: Arc<dyn GraphBackend> = match (&args.vault, args.demo) {
        (Some(path), _) => {
            let vault = Vault::load(path).context("cannot start without a readable vault")?;
            info!(path = %path.display(), notes = vault.notes.len(), "serving vault file");
            Arc::new(VaultBackend::from_file(path))
        }
        (None, notes) => {
            let notes = notes.unwrap_or(120);
            info!(notes, "serving generated demo vault");
            Arc::new(VaultBackend::from_vault(Vault::demo(notes)))
        }
    };
    let client = GraphClient::new(backend);
    let store = GraphStore::new(client.clone(), config.store_policy());
    let notification_lifetime = config.notification_lifetime();

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    eframe::run_native(
        "notegraph",
        options,
        Box::new(move |cc| {
            Ok(Box::new(app::NotegraphApp::new(
                cc,
                client,
                store,
                limit,
                notification_lifetime,
            )))
        }),
    )
    .map_err(|error| anyhow!("viewer exited with an error: {error}"))
}
