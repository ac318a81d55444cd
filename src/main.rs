use std::process::ExitCode;
use std::sync::Arc;

use shared_file_finder::{
    FinderConfig, FinderError, GoogleDriveSource, GoogleSheetsWriter, ListingAggregator,
    ReportBuilder, Result, SheetWriter,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn required_env(key: &str) -> Result<String> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(FinderError::InvalidConfig {
            message: format!("{} must be set", key),
        }),
    }
}

async fn run() -> Result<()> {
    let config = FinderConfig::from_env()?;
    let access_token = required_env("SFF_ACCESS_TOKEN")?;

    let source = Arc::new(GoogleDriveSource::new(
        access_token.clone(),
        config.request_timeout,
    )?);
    let report = ListingAggregator::new(source, config.clone()).scan().await?;

    if report.is_partial() {
        warn!(
            "{} errors were skipped; the listing may be incomplete",
            report.errors.len()
        );
    }
    info!(
        items = report.items_processed,
        pages = report.pages_fetched,
        "{} shared items found",
        report.summaries.len()
    );

    if report.summaries.is_empty() {
        info!("Nothing shared, no report written");
        return Ok(());
    }

    match std::env::var("SFF_SPREADSHEET_ID") {
        Ok(spreadsheet_id) if !spreadsheet_id.is_empty() => {
            let today = chrono::Local::now().date_naive();
            let sheet = ReportBuilder::new(&config).build(&report.summaries, today);
            let writer =
                GoogleSheetsWriter::new(access_token, spreadsheet_id, config.request_timeout)?;
            writer.write_sheet(&sheet).await?;
            info!("Report written to sheet '{}'", sheet.title);
        }
        _ => {
            println!("{}", serde_json::to_string_pretty(&report.summaries)?);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_logging();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Failed with error: {}", e);
            ExitCode::FAILURE
        }
    }
}
