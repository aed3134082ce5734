//! Registry Importer - bulk CSV import for the community registry
//!
//! Normalizes people, event, attendance and admin spreadsheets and writes
//! each file to the registry store in a single batch.

mod cli;
mod config;
mod db;
mod services;
mod types;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};
use crate::config::{Config, StoreBackend};
use crate::services::csv_pipeline::CsvNormalizationPipeline;
use crate::services::import_service::ImportService;
use crate::services::samples::{sample_csv, sample_file_name};
use crate::services::store::{create_store, RecordStore};
use crate::types::{ImportError, ImportKind};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let logs_dir = std::env::var("LOGS_DIR").unwrap_or_else(|_| "./logs".to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &logs_dir, "importer.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // stderr keeps stdout clean for records and results
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,registry_importer=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Import { kind, file, allow_update, json } => {
            run_import(kind, &file, allow_update, json).await
        }
        Command::Preview { kind, file } => run_preview(kind, &file),
        Command::Sample { kind, output } => write_sample(kind, output),
        Command::Migrate => run_migrate().await,
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}

async fn run_import(kind: ImportKind, file: &Path, allow_update: bool, json: bool) -> Result<ExitCode> {
    let raw_text = read_csv(file)?;

    let config = Config::from_env()?;
    info!("Configuration loaded: {:?}", config.store.backend);

    let store: Arc<dyn RecordStore> = Arc::from(create_store(&config.store).await?);
    let service = ImportService::new(store);

    let result = service.run(&raw_text, kind, allow_update).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.message);
        if let Some(details) = &result.details {
            println!("{}", details);
        }
    }

    Ok(if result.success { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn run_preview(kind: ImportKind, file: &Path) -> Result<ExitCode> {
    let raw_text = read_csv(file)?;

    match CsvNormalizationPipeline::new(kind).normalize_batch(&raw_text) {
        Ok(batch) if !batch.records.is_empty() => {
            if !batch.ignored_columns.is_empty() {
                info!("Ignored columns: {}", batch.ignored_columns.join(", "));
            }
            info!("{} records, {} rows skipped", batch.records.len(), batch.skipped_rows);
            println!("{}", serde_json::to_string_pretty(&batch.records)?);
            Ok(ExitCode::SUCCESS)
        }
        Ok(_) | Err(ImportError::EmptyInput) => {
            println!("{}", ImportError::EmptyInput);
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}

fn write_sample(kind: ImportKind, output: Option<PathBuf>) -> Result<ExitCode> {
    let content = sample_csv(kind);
    let path = output.unwrap_or_else(|| PathBuf::from(sample_file_name(kind)));

    if path.as_os_str() == "-" {
        print!("{}", content);
    } else {
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote {} sample to {}", kind, path.display());
    }

    Ok(ExitCode::SUCCESS)
}

async fn run_migrate() -> Result<ExitCode> {
    let config = Config::from_env()?;

    let database_url = match &config.store.backend {
        StoreBackend::Postgres { database_url } => database_url,
        other => bail!("migrate needs STORE_BACKEND=postgres (current: {:?})", other),
    };

    let pool = db::create_pool(database_url).await?;
    info!("Connected to PostgreSQL");

    db::run_migrations(&pool).await?;
    Ok(ExitCode::SUCCESS)
}

fn read_csv(file: &Path) -> Result<String> {
    std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))
}
