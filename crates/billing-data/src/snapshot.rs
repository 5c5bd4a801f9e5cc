//! JSON snapshot ingestion.
//!
//! Loads clinic datasets exported by the upstream record system: enrollments,
//! logged time entries, device measurements, and lifetime initial-setup
//! states. Raw device measurements carry UTC timestamps; they are localised
//! to each enrollment's timezone and deduplicated into distinct transmission
//! calendar-days here, so downstream code only ever sees date sets.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use billing_core::error::{BillingError, Result};
use billing_core::models::{
    ActivityKind, BillingProgram, Enrollment, InitialSetupState, PerformerType, TimeEntry,
};

use crate::repository::{
    InMemoryEnrollments, InMemoryInitialSetupStates, InMemoryTimeEntries, InMemoryTransmissions,
};

// ── Raw snapshot records ──────────────────────────────────────────────────────

/// One snapshot file as written by the exporter.
#[derive(Debug, Default, Deserialize)]
struct Snapshot {
    #[serde(default)]
    enrollments: Vec<RawEnrollment>,
    #[serde(default)]
    time_entries: Vec<RawTimeEntry>,
    /// Raw device readings; localised and deduplicated at load time.
    #[serde(default)]
    device_measurements: Vec<RawMeasurement>,
    /// Pre-deduplicated transmission days, for exporters that already derive
    /// them.
    #[serde(default)]
    transmission_dates: Vec<RawTransmissionDate>,
    #[serde(default)]
    initial_setup: Vec<RawInitialSetup>,
}

#[derive(Debug, Deserialize)]
struct RawEnrollment {
    id: Uuid,
    patient_id: Uuid,
    patient_name: String,
    clinic_id: Uuid,
    clinician_id: Uuid,
    billing_program: String,
    #[serde(default)]
    timezone: Option<String>,
    enrolled_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct RawTimeEntry {
    patient_id: Uuid,
    clinic_id: Uuid,
    clinician_id: Uuid,
    entry_date: NaiveDate,
    /// Signed on the wire so corrupt exports are caught here instead of
    /// wrapping silently.
    duration_minutes: i64,
    activity: ActivityKind,
    performer: PerformerType,
}

#[derive(Debug, Deserialize)]
struct RawMeasurement {
    enrollment_id: Uuid,
    measured_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct RawTransmissionDate {
    enrollment_id: Uuid,
    date: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct RawInitialSetup {
    enrollment_id: Uuid,
    #[serde(default)]
    billed_at: Option<DateTime<Utc>>,
}

// ── ClinicDataSet ─────────────────────────────────────────────────────────────

/// All repositories loaded from a snapshot directory.
#[derive(Debug, Default)]
pub struct ClinicDataSet {
    pub enrollments: InMemoryEnrollments,
    pub time_entries: InMemoryTimeEntries,
    pub transmissions: InMemoryTransmissions,
    pub initial_setup: InMemoryInitialSetupStates,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Find all `.json` snapshot files recursively under `data_path`, sorted by
/// path.
pub fn find_snapshot_files(data_path: &Path) -> Vec<PathBuf> {
    if !data_path.exists() {
        warn!("Data path does not exist: {}", data_path.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(data_path)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .map(|ext| ext == "json")
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Load and merge every snapshot file under `data_path`.
///
/// # Errors
///
/// Fails on unreadable files, malformed JSON, unknown billing program
/// strings (`Validation`), or non-positive logged durations
/// (`InvalidAggregate`). Missing sections are fine; an empty directory
/// yields an empty dataset.
pub fn load_snapshots(data_path: &Path) -> Result<ClinicDataSet> {
    let files = find_snapshot_files(data_path);
    debug!(count = files.len(), "loading snapshot files");

    let mut enrollments: Vec<Enrollment> = Vec::new();
    let mut time_entries: Vec<TimeEntry> = Vec::new();
    let mut transmissions = InMemoryTransmissions::new();
    let initial_setup = InMemoryInitialSetupStates::new();

    // Enrollment timezones collected first so measurements from any file can
    // be localised, regardless of file order.
    let mut snapshots: Vec<Snapshot> = Vec::with_capacity(files.len());
    for path in &files {
        let content = std::fs::read_to_string(path).map_err(|source| BillingError::FileRead {
            path: path.clone(),
            source,
        })?;
        snapshots.push(serde_json::from_str(&content)?);
    }

    let mut timezones: HashMap<Uuid, Tz> = HashMap::new();
    for snapshot in &snapshots {
        for raw in &snapshot.enrollments {
            timezones.insert(raw.id, parse_timezone(raw.timezone.as_deref()));
        }
    }

    for snapshot in snapshots {
        for raw in snapshot.enrollments {
            enrollments.push(convert_enrollment(raw)?);
        }
        for raw in snapshot.time_entries {
            time_entries.push(convert_time_entry(raw)?);
        }
        for raw in snapshot.device_measurements {
            let tz = timezones
                .get(&raw.enrollment_id)
                .copied()
                .unwrap_or(Tz::UTC);
            let local_date = raw.measured_at.with_timezone(&tz).date_naive();
            transmissions.add_date(raw.enrollment_id, local_date);
        }
        for raw in snapshot.transmission_dates {
            transmissions.add_date(raw.enrollment_id, raw.date);
        }
        for raw in snapshot.initial_setup {
            initial_setup.insert(InitialSetupState {
                enrollment_id: raw.enrollment_id,
                billed_at: raw.billed_at,
            });
        }
    }

    debug!(
        enrollments = enrollments.len(),
        time_entries = time_entries.len(),
        "snapshot load complete"
    );

    Ok(ClinicDataSet {
        enrollments: InMemoryEnrollments::new(enrollments),
        time_entries: InMemoryTimeEntries::new(time_entries),
        transmissions,
        initial_setup,
    })
}

// ── Private helpers ───────────────────────────────────────────────────────────

/// Parse an IANA timezone name, falling back to UTC with a warning.
fn parse_timezone(name: Option<&str>) -> Tz {
    let Some(name) = name else {
        return Tz::UTC;
    };
    name.parse::<Tz>().unwrap_or_else(|_| {
        warn!("unrecognised timezone \"{name}\", falling back to UTC");
        Tz::UTC
    })
}

fn convert_enrollment(raw: RawEnrollment) -> Result<Enrollment> {
    let billing_program: BillingProgram = raw.billing_program.parse()?;
    Ok(Enrollment {
        id: raw.id,
        patient_id: raw.patient_id,
        patient_name: raw.patient_name,
        clinic_id: raw.clinic_id,
        clinician_id: raw.clinician_id,
        billing_program,
        timezone: raw.timezone.unwrap_or_else(|| "UTC".to_string()),
        enrolled_at: raw.enrolled_at,
    })
}

fn convert_time_entry(raw: RawTimeEntry) -> Result<TimeEntry> {
    if raw.duration_minutes <= 0 {
        return Err(BillingError::InvalidAggregate(format!(
            "non-positive duration {} minutes for patient {} on {}",
            raw.duration_minutes, raw.patient_id, raw.entry_date
        )));
    }
    Ok(TimeEntry {
        patient_id: raw.patient_id,
        clinic_id: raw.clinic_id,
        clinician_id: raw.clinician_id,
        entry_date: raw.entry_date,
        duration_minutes: raw.duration_minutes as u32,
        activity: raw.activity,
        performer: raw.performer,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
