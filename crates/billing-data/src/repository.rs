//! Repository seams between the engine and its data sources.
//!
//! The aggregators and evaluator depend only on plain value types; these
//! traits are the read-only feeds named in the engine's external interface,
//! plus the single explicit write path for the lifetime initial-setup flag.
//! The in-memory implementations back both unit tests and the snapshot-file
//! ingestion path.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use billing_core::error::{BillingError, Result};
use billing_core::models::{BillingPeriod, BillingProgram, Enrollment, InitialSetupState, TimeEntry};

// ── Traits ────────────────────────────────────────────────────────────────────

/// Read access to logged clinician time.
pub trait TimeEntryRepository: Send + Sync {
    /// All entries for one patient whose `entry_date` falls in the period.
    fn list_by_patient_and_period(
        &self,
        patient_id: Uuid,
        period: &BillingPeriod,
    ) -> Result<Vec<TimeEntry>>;
}

/// Read access to device-transmission calendar days.
pub trait DeviceTransmissionRepository: Send + Sync {
    /// Deduplicated, sorted transmission dates for the enrollment within the
    /// period. A day is present at most once regardless of reading count.
    fn distinct_dates(&self, enrollment_id: Uuid, period: &BillingPeriod)
        -> Result<Vec<NaiveDate>>;
}

/// Read access to enrollments.
pub trait EnrollmentRepository: Send + Sync {
    /// All active enrollments for a clinic.
    fn active_for_clinic(&self, clinic_id: Uuid) -> Result<Vec<Enrollment>>;

    /// The billing program governing one enrollment.
    fn billing_program(&self, enrollment_id: Uuid) -> Result<BillingProgram>;
}

/// Lifetime initial-setup (99453) state, looked up independent of period.
pub trait InitialSetupStateRepository: Send + Sync {
    /// Current state; an enrollment with no record reads as never billed.
    fn get(&self, enrollment_id: Uuid) -> Result<InitialSetupState>;

    /// Record that 99453 was billed. This is the explicit "confirm billed"
    /// operation; report generation never calls it. Marking an
    /// already-billed enrollment is a no-op returning the existing state.
    fn mark_billed(&self, enrollment_id: Uuid, at: DateTime<Utc>) -> Result<InitialSetupState>;
}

// ── In-memory implementations ─────────────────────────────────────────────────

/// In-memory [`TimeEntryRepository`] over a fixed entry set.
#[derive(Debug, Default)]
pub struct InMemoryTimeEntries {
    entries: Vec<TimeEntry>,
}

impl InMemoryTimeEntries {
    pub fn new(entries: Vec<TimeEntry>) -> Self {
        Self { entries }
    }
}

impl TimeEntryRepository for InMemoryTimeEntries {
    fn list_by_patient_and_period(
        &self,
        patient_id: Uuid,
        period: &BillingPeriod,
    ) -> Result<Vec<TimeEntry>> {
        Ok(self
            .entries
            .iter()
            .filter(|e| e.patient_id == patient_id && period.contains(e.entry_date))
            .cloned()
            .collect())
    }
}

/// In-memory [`DeviceTransmissionRepository`] over per-enrollment date sets.
#[derive(Debug, Default)]
pub struct InMemoryTransmissions {
    dates: HashMap<Uuid, BTreeSet<NaiveDate>>,
}

impl InMemoryTransmissions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a transmission day; duplicate dates collapse into one.
    pub fn add_date(&mut self, enrollment_id: Uuid, date: NaiveDate) {
        self.dates.entry(enrollment_id).or_default().insert(date);
    }
}

impl DeviceTransmissionRepository for InMemoryTransmissions {
    fn distinct_dates(
        &self,
        enrollment_id: Uuid,
        period: &BillingPeriod,
    ) -> Result<Vec<NaiveDate>> {
        Ok(self
            .dates
            .get(&enrollment_id)
            .map(|set| {
                set.iter()
                    .copied()
                    .filter(|d| period.contains(*d))
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// In-memory [`EnrollmentRepository`] over a fixed enrollment set.
#[derive(Debug, Default)]
pub struct InMemoryEnrollments {
    enrollments: Vec<Enrollment>,
}

impl InMemoryEnrollments {
    pub fn new(enrollments: Vec<Enrollment>) -> Self {
        Self { enrollments }
    }
}

impl EnrollmentRepository for InMemoryEnrollments {
    fn active_for_clinic(&self, clinic_id: Uuid) -> Result<Vec<Enrollment>> {
        Ok(self
            .enrollments
            .iter()
            .filter(|e| e.clinic_id == clinic_id)
            .cloned()
            .collect())
    }

    fn billing_program(&self, enrollment_id: Uuid) -> Result<BillingProgram> {
        self.enrollments
            .iter()
            .find(|e| e.id == enrollment_id)
            .map(|e| e.billing_program)
            .ok_or_else(|| {
                BillingError::Validation(format!("unknown enrollment: {enrollment_id}"))
            })
    }
}

/// In-memory [`InitialSetupStateRepository`].
///
/// The only mutable state in the engine's vicinity; guarded by an `RwLock`
/// because `mark_billed` is a write while report generation only reads.
#[derive(Debug, Default)]
pub struct InMemoryInitialSetupStates {
    states: RwLock<HashMap<Uuid, InitialSetupState>>,
}

impl InMemoryInitialSetupStates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a pre-existing state (fixture loading).
    pub fn insert(&self, state: InitialSetupState) {
        let mut states = self.states.write().unwrap_or_else(|e| e.into_inner());
        states.insert(state.enrollment_id, state);
    }
}

impl InitialSetupStateRepository for InMemoryInitialSetupStates {
    fn get(&self, enrollment_id: Uuid) -> Result<InitialSetupState> {
        let states = self.states.read().unwrap_or_else(|e| e.into_inner());
        Ok(states
            .get(&enrollment_id)
            .cloned()
            .unwrap_or_else(|| InitialSetupState::unbilled(enrollment_id)))
    }

    fn mark_billed(&self, enrollment_id: Uuid, at: DateTime<Utc>) -> Result<InitialSetupState> {
        let mut states = self.states.write().unwrap_or_else(|e| e.into_inner());
        let state = states
            .entry(enrollment_id)
            .or_insert_with(|| InitialSetupState::unbilled(enrollment_id));
        if state.billed_at.is_none() {
            state.billed_at = Some(at);
            tracing::info!(%enrollment_id, billed_at = %at, "initial setup marked billed");
        }
        Ok(state.clone())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
