use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, Instrument};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod db;
mod identity;
mod ingest;
mod models;
mod parser;
mod roster;
mod status;
mod store;
mod trigger;

use crate::ingest::ReportIngestor;
use crate::parser::HttpParserClient;
use crate::store::DocumentStore;
use crate::trigger::UploadKind;

#[derive(Parser)]
#[command(name = "dsp-scorecard-ingest")]
#[command(about = "Ingests DSP roster CSVs and weekly scorecard PDFs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Process one finalized upload
    Ingest {
        /// Bucket the object was finalized in
        #[arg(long, env = "BUCKET", default_value = "uploads")]
        bucket: String,
        /// Object path within the upload bucket
        #[arg(long)]
        object_path: String,
        /// Declared content type of the upload
        #[arg(long, default_value = "application/octet-stream")]
        content_type: String,
        /// Local file holding the uploaded bytes
        #[arg(long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Ingest {
            bucket,
            object_path,
            content_type,
            file,
        } => {
            let Some(kind) = trigger::route(&object_path, &content_type) else {
                println!("Ignored: {object_path} ({content_type})");
                return Ok(());
            };

            let bytes = std::fs::read(&file)
                .with_context(|| format!("failed to read upload from {}", file.display()))?;
            let store = db::PgStore::new(pool);

            let invocation = Uuid::new_v4();
            handle_upload(store, kind, &object_path, bytes)
                .instrument(tracing::info_span!("upload", %invocation, %bucket))
                .await?;
        }
    }

    Ok(())
}

async fn handle_upload(
    store: db::PgStore,
    kind: UploadKind,
    object_path: &str,
    bytes: Vec<u8>,
) -> anyhow::Result<()> {
    info!(object_path, ?kind, "processing upload");

    match kind {
        UploadKind::GlobalRoster => {
            let rows = roster::read_rows(&bytes)?;
            let resolved = roster::resolve_names(&rows);
            let count = roster::apply_global(&store, &resolved).await?;
            println!("Upserted {count} drivers from {object_path}.");
        }
        UploadKind::ReportRoster { report_id } => {
            let rows = roster::read_rows(&bytes)?;
            let resolved = roster::resolve_names(&rows);
            let count = roster::apply_for_report(&store, &report_id, &resolved).await?;
            println!("Stored {count} driver names for report {report_id}.");
        }
        UploadKind::Report => {
            let parser = HttpParserClient::new(std::env::var("PARSER_URL").ok())?;
            let store: Arc<dyn DocumentStore> = Arc::new(store);
            let ingestor = ReportIngestor::new(store, Arc::new(parser));
            let outcome = ingestor.ingest(object_path, bytes).await?;
            println!(
                "Report {} ingested: {} scores written, {} rows skipped.",
                outcome.report_id, outcome.scores_written, outcome.rows_skipped
            );
        }
    }

    Ok(())
}
