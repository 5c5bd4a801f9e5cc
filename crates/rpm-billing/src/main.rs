mod bootstrap;
mod render;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use billing_core::settings::Settings;
use billing_data::snapshot;
use billing_runtime::service::BillingReportService;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::parse();

    bootstrap::setup_logging(&settings.log_level)?;

    tracing::info!("rpm-billing v{} starting", env!("CARGO_PKG_VERSION"));

    let period = settings.period()?;
    tracing::info!("Clinic: {}, Period: {}", settings.clinic, period);

    let data_path = settings
        .data_path
        .clone()
        .or_else(bootstrap::discover_data_path)
        .context("no snapshot directory found; pass --data-path")?;

    let dataset = snapshot::load_snapshots(&data_path)?;

    let service = BillingReportService::new(
        Arc::new(dataset.enrollments),
        Arc::new(dataset.time_entries),
        Arc::new(dataset.transmissions),
        Arc::new(dataset.initial_setup),
    );

    let report = service.clinic_report(settings.clinic, period).await?;

    match settings.output.as_str() {
        "json" => println!("{}", render::render_json(&report)?),
        _ => print!("{}", render::render_text(&report)),
    }

    Ok(())
}
