//! Clinic report generation service.
//!
//! Coordinates the repositories, aggregators, and the eligibility evaluator.
//! Clinic reports fan out one tokio task per enrollment and collect the
//! per-patient results over an `mpsc` channel; ordering is normalised by
//! patient id afterwards so the output is deterministic regardless of task
//! completion order.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use billing_core::error::Result;
use billing_core::models::{
    BillingPeriod, ClinicBillingSummary, Enrollment, InitialSetupState, PatientBillingSummary,
};
use billing_core::rules::CptEligibilityEvaluator;
use billing_data::aggregator::{DeviceTransmissionAggregator, TimeEntryAggregator};
use billing_data::repository::{
    DeviceTransmissionRepository, EnrollmentRepository, InitialSetupStateRepository,
    TimeEntryRepository,
};

// ── Public types ──────────────────────────────────────────────────────────────

/// A full clinic report: every active patient's summary plus the roll-up.
///
/// This is the primary data contract between the engine and the rendering
/// layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicBillingReport {
    pub clinic_id: Uuid,
    pub period: BillingPeriod,
    /// When the report was computed; audit metadata, not a billing input.
    pub generated_at: DateTime<Utc>,
    /// Per-patient summaries, sorted by patient id.
    pub patients: Vec<PatientBillingSummary>,
    pub summary: ClinicBillingSummary,
}

// ── BillingReportService ──────────────────────────────────────────────────────

/// Report generation over pluggable data sources.
pub struct BillingReportService {
    enrollments: Arc<dyn EnrollmentRepository>,
    time_entries: Arc<dyn TimeEntryRepository>,
    transmissions: Arc<dyn DeviceTransmissionRepository>,
    initial_setup: Arc<dyn InitialSetupStateRepository>,
}

impl BillingReportService {
    pub fn new(
        enrollments: Arc<dyn EnrollmentRepository>,
        time_entries: Arc<dyn TimeEntryRepository>,
        transmissions: Arc<dyn DeviceTransmissionRepository>,
        initial_setup: Arc<dyn InitialSetupStateRepository>,
    ) -> Self {
        Self {
            enrollments,
            time_entries,
            transmissions,
            initial_setup,
        }
    }

    /// Evaluate one enrollment for one period.
    ///
    /// Reads are bulk lookups against the repositories; the evaluation itself
    /// is pure, so calling this twice with unchanged data yields identical
    /// summaries and never mutates initial-setup state.
    pub fn patient_summary(
        &self,
        enrollment: &Enrollment,
        period: &BillingPeriod,
    ) -> Result<PatientBillingSummary> {
        evaluate_enrollment(
            enrollment,
            period,
            self.time_entries.as_ref(),
            self.transmissions.as_ref(),
            self.initial_setup.as_ref(),
        )
    }

    /// Generate the full report for a clinic.
    ///
    /// Each active enrollment is evaluated in its own tokio task; the first
    /// failure aborts the report. A clinic with no active enrollments yields
    /// an empty patient list and an all-zero summary.
    pub async fn clinic_report(
        &self,
        clinic_id: Uuid,
        period: BillingPeriod,
    ) -> Result<ClinicBillingReport> {
        let enrollments = self.enrollments.active_for_clinic(clinic_id)?;
        tracing::debug!(%clinic_id, enrollments = enrollments.len(), "generating clinic report");

        let (tx, mut rx) = mpsc::channel(enrollments.len().max(1));
        let pending = enrollments.len();

        for enrollment in enrollments {
            let tx = tx.clone();
            let time_entries = Arc::clone(&self.time_entries);
            let transmissions = Arc::clone(&self.transmissions);
            let initial_setup = Arc::clone(&self.initial_setup);

            tokio::spawn(async move {
                let result = evaluate_enrollment(
                    &enrollment,
                    &period,
                    time_entries.as_ref(),
                    transmissions.as_ref(),
                    initial_setup.as_ref(),
                );
                // A send error only means the report was abandoned early.
                let _ = tx.send(result).await;
            });
        }
        drop(tx);

        let mut patients = Vec::with_capacity(pending);
        while let Some(result) = rx.recv().await {
            patients.push(result?);
        }

        patients.sort_by_key(|p| p.patient_id);
        let summary = crate::assembler::ClinicBillingReportAssembler::assemble(&patients);

        Ok(ClinicBillingReport {
            clinic_id,
            period,
            generated_at: Utc::now(),
            patients,
            summary,
        })
    }

    /// Record that the one-time initial setup (99453) was actually billed.
    ///
    /// This is the only write path; report generation never calls it.
    pub fn confirm_initial_setup_billed(
        &self,
        enrollment_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<InitialSetupState> {
        self.initial_setup.mark_billed(enrollment_id, at)
    }
}

// ── Private helpers ───────────────────────────────────────────────────────────

/// One enrollment's fetch-aggregate-evaluate pipeline, shared by the fan-out
/// tasks.
fn evaluate_enrollment(
    enrollment: &Enrollment,
    period: &BillingPeriod,
    time_entries: &dyn TimeEntryRepository,
    transmissions: &dyn DeviceTransmissionRepository,
    initial_setup: &dyn InitialSetupStateRepository,
) -> Result<PatientBillingSummary> {
    let entries = time_entries.list_by_patient_and_period(enrollment.patient_id, period)?;
    let dates = transmissions.distinct_dates(enrollment.id, period)?;
    let setup = initial_setup.get(enrollment.id)?;

    let time = TimeEntryAggregator::aggregate(&entries);
    let device = DeviceTransmissionAggregator::aggregate(&dates);

    CptEligibilityEvaluator::evaluate(enrollment, period, &time, &device, &setup)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use billing_core::codes::CptCode;
    use billing_core::models::{ActivityKind, BillingProgram, PerformerType, TimeEntry};
    use billing_data::repository::{
        InMemoryEnrollments, InMemoryInitialSetupStates, InMemoryTimeEntries,
        InMemoryTransmissions,
    };
    use chrono::{NaiveDate, TimeZone};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn january() -> BillingPeriod {
        BillingPeriod::month(2026, 1).unwrap()
    }

    fn make_enrollment(clinic_id: Uuid, program: BillingProgram) -> Enrollment {
        Enrollment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            patient_name: "Pat Doe".to_string(),
            clinic_id,
            clinician_id: Uuid::new_v4(),
            billing_program: program,
            timezone: "UTC".to_string(),
            enrolled_at: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
        }
    }

    fn make_entry(patient_id: Uuid, minutes: u32) -> TimeEntry {
        TimeEntry {
            patient_id,
            clinic_id: Uuid::new_v4(),
            clinician_id: Uuid::new_v4(),
            entry_date: date(2026, 1, 10),
            duration_minutes: minutes,
            activity: ActivityKind::PatientReview,
            performer: PerformerType::ClinicalStaff,
        }
    }

    struct Fixture {
        service: BillingReportService,
        clinic_id: Uuid,
        enrollment: Enrollment,
    }

    /// One RPM_ONLY patient with 25 RPM minutes and 16 transmission days.
    fn make_fixture() -> Fixture {
        let clinic_id = Uuid::new_v4();
        let enrollment = make_enrollment(clinic_id, BillingProgram::RpmOnly);

        let entries =
            InMemoryTimeEntries::new(vec![make_entry(enrollment.patient_id, 25)]);
        let mut transmissions = InMemoryTransmissions::new();
        for day in 1..=16 {
            transmissions.add_date(enrollment.id, date(2026, 1, day));
        }

        let service = BillingReportService::new(
            Arc::new(InMemoryEnrollments::new(vec![enrollment.clone()])),
            Arc::new(entries),
            Arc::new(transmissions),
            Arc::new(InMemoryInitialSetupStates::new()),
        );

        Fixture {
            service,
            clinic_id,
            enrollment,
        }
    }

    // ── patient_summary ───────────────────────────────────────────────────

    #[test]
    fn test_patient_summary_pipeline() {
        let fx = make_fixture();
        let summary = fx
            .service
            .patient_summary(&fx.enrollment, &january())
            .unwrap();

        assert_eq!(summary.device_transmission.total_days, 16);
        assert!(summary.device_transmission.eligible_99454);
        assert!(summary.time.eligible_99457);
        assert!(summary.initial_setup.eligible_99453);
        assert_eq!(
            summary.eligible_codes,
            vec![CptCode::Cpt99453, CptCode::Cpt99454, CptCode::Cpt99457]
        );
    }

    #[test]
    fn test_patient_summary_is_idempotent() {
        let fx = make_fixture();
        let first = fx
            .service
            .patient_summary(&fx.enrollment, &january())
            .unwrap();
        let second = fx
            .service
            .patient_summary(&fx.enrollment, &january())
            .unwrap();
        assert_eq!(first, second);
        // Report generation must not have marked the setup billed.
        assert!(second.initial_setup.billed_at.is_none());
    }

    // ── clinic_report ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_clinic_report_empty_clinic() {
        let fx = make_fixture();
        let report = fx
            .service
            .clinic_report(Uuid::new_v4(), january())
            .await
            .unwrap();

        assert!(report.patients.is_empty());
        assert_eq!(report.summary, ClinicBillingSummary::default());
    }

    #[tokio::test]
    async fn test_clinic_report_single_patient() {
        let fx = make_fixture();
        let report = fx
            .service
            .clinic_report(fx.clinic_id, january())
            .await
            .unwrap();

        assert_eq!(report.clinic_id, fx.clinic_id);
        assert_eq!(report.patients.len(), 1);
        assert_eq!(report.summary.total_patients, 1);
        assert_eq!(report.summary.patients_with_99454, 1);
        assert_eq!(report.summary.total_rpm_minutes, 25);
    }

    #[tokio::test]
    async fn test_clinic_report_sorted_by_patient_id() {
        let clinic_id = Uuid::new_v4();
        let enrollments: Vec<Enrollment> = (0..5)
            .map(|_| make_enrollment(clinic_id, BillingProgram::RpmOnly))
            .collect();

        let service = BillingReportService::new(
            Arc::new(InMemoryEnrollments::new(enrollments)),
            Arc::new(InMemoryTimeEntries::default()),
            Arc::new(InMemoryTransmissions::new()),
            Arc::new(InMemoryInitialSetupStates::new()),
        );

        let report = service.clinic_report(clinic_id, january()).await.unwrap();
        assert_eq!(report.patients.len(), 5);
        let ids: Vec<Uuid> = report.patients.iter().map(|p| p.patient_id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[tokio::test]
    async fn test_clinic_report_patient_with_no_data_is_all_false() {
        let clinic_id = Uuid::new_v4();
        let enrollment = make_enrollment(clinic_id, BillingProgram::RpmCcm);

        let service = BillingReportService::new(
            Arc::new(InMemoryEnrollments::new(vec![enrollment])),
            Arc::new(InMemoryTimeEntries::default()),
            Arc::new(InMemoryTransmissions::new()),
            Arc::new(InMemoryInitialSetupStates::new()),
        );

        let report = service.clinic_report(clinic_id, january()).await.unwrap();
        assert_eq!(report.patients.len(), 1);
        let patient = &report.patients[0];
        assert_eq!(patient.device_transmission.total_days, 0);
        assert!(!patient.device_transmission.eligible_99445);
        assert!(patient.eligible_codes.is_empty());
    }

    // ── confirm_initial_setup_billed ──────────────────────────────────────

    #[tokio::test]
    async fn test_confirm_billed_flips_future_reports() {
        let fx = make_fixture();

        let before = fx
            .service
            .patient_summary(&fx.enrollment, &january())
            .unwrap();
        assert!(before.initial_setup.eligible_99453);

        let at = Utc.with_ymd_and_hms(2026, 1, 31, 12, 0, 0).unwrap();
        let state = fx
            .service
            .confirm_initial_setup_billed(fx.enrollment.id, at)
            .unwrap();
        assert_eq!(state.billed_at, Some(at));

        let after = fx
            .service
            .patient_summary(&fx.enrollment, &january())
            .unwrap();
        assert!(!after.initial_setup.eligible_99453);
        assert!(after.initial_setup.already_billed);
        assert!(!after.eligible_codes.contains(&CptCode::Cpt99453));
    }
}
