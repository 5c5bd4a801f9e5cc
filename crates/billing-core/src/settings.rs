use chrono::{Datelike, NaiveDate, Utc};
use clap::Parser;
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::{BillingError, Result};
use crate::models::BillingPeriod;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Clinic billing eligibility reporting for remote-monitoring programs
#[derive(Parser, Debug, Clone)]
#[command(
    name = "rpm-billing",
    about = "Clinic billing eligibility reporting for remote-monitoring programs",
    version
)]
pub struct Settings {
    /// Clinic to report on
    #[arg(long)]
    pub clinic: Uuid,

    /// Billing month as YYYY-MM (defaults to the current month)
    #[arg(long, conflicts_with_all = ["from", "to"])]
    pub month: Option<String>,

    /// Explicit period start (inclusive)
    #[arg(long, requires = "to")]
    pub from: Option<NaiveDate>,

    /// Explicit period end (inclusive)
    #[arg(long, requires = "from")]
    pub to: Option<NaiveDate>,

    /// Directory of JSON snapshot files (auto-discovered if not specified)
    #[arg(long)]
    pub data_path: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub output: String,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,
}

impl Settings {
    /// Resolve the billing period from `--month` or `--from`/`--to`.
    ///
    /// Falls back to the current calendar month when neither is given.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::Validation`] for an unparseable month string
    /// or an inverted explicit range.
    pub fn period(&self) -> Result<BillingPeriod> {
        if let Some(month) = &self.month {
            return parse_month(month);
        }
        if let (Some(from), Some(to)) = (self.from, self.to) {
            return BillingPeriod::new(from, to);
        }
        let today = Utc::now().date_naive();
        BillingPeriod::month(today.year(), today.month())
    }
}

/// Parse a `YYYY-MM` string into the period covering that month.
fn parse_month(value: &str) -> Result<BillingPeriod> {
    let (year, month) = value
        .split_once('-')
        .and_then(|(y, m)| Some((y.parse::<i32>().ok()?, m.parse::<u32>().ok()?)))
        .ok_or_else(|| BillingError::Validation(format!("invalid month: {value}")))?;
    BillingPeriod::month(year, month)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
