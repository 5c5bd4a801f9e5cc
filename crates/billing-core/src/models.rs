use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

use crate::codes::CptCode;
use crate::error::{BillingError, Result};

// ── Closed enums ──────────────────────────────────────────────────────────────

/// Category of logged clinical work on a [`TimeEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityKind {
    /// Review of transmitted device readings.
    PatientReview,
    /// Charting and documentation time.
    Documentation,
    /// Any other monitoring-related activity.
    Other,
    /// Updating the patient's care plan.
    CarePlanUpdate,
    /// Phone contact with the patient or caregiver.
    PhoneCall,
    /// Care coordination with other providers.
    Coordination,
}

impl ActivityKind {
    /// The canonical wire string for this activity.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::PatientReview => "PATIENT_REVIEW",
            ActivityKind::Documentation => "DOCUMENTATION",
            ActivityKind::Other => "OTHER",
            ActivityKind::CarePlanUpdate => "CARE_PLAN_UPDATE",
            ActivityKind::PhoneCall => "PHONE_CALL",
            ActivityKind::Coordination => "COORDINATION",
        }
    }

    /// `true` for activities that count toward the RPM time family.
    pub fn is_rpm(&self) -> bool {
        matches!(
            self,
            ActivityKind::PatientReview | ActivityKind::Documentation | ActivityKind::Other
        )
    }

    /// `true` for activities that count toward the CCM/PCM care-management
    /// family.
    pub fn is_care_management(&self) -> bool {
        matches!(
            self,
            ActivityKind::CarePlanUpdate | ActivityKind::PhoneCall | ActivityKind::Coordination
        )
    }
}

/// Who performed the logged work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PerformerType {
    /// Clinical staff working under general supervision.
    ClinicalStaff,
    /// A physician or other qualified healthcare professional.
    PhysicianQhp,
}

impl PerformerType {
    /// The canonical wire string for this performer type.
    pub fn as_str(&self) -> &'static str {
        match self {
            PerformerType::ClinicalStaff => "CLINICAL_STAFF",
            PerformerType::PhysicianQhp => "PHYSICIAN_QHP",
        }
    }
}

/// Which code families an enrollment can bill beyond the device family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingProgram {
    /// RPM plus Chronic Care Management.
    RpmCcm,
    /// RPM plus Principal Care Management.
    RpmPcm,
    /// RPM only; CCM/PCM fields stay zero/false.
    RpmOnly,
}

impl BillingProgram {
    /// The canonical wire string for this program.
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingProgram::RpmCcm => "RPM_CCM",
            BillingProgram::RpmPcm => "RPM_PCM",
            BillingProgram::RpmOnly => "RPM_ONLY",
        }
    }
}

impl FromStr for BillingProgram {
    type Err = BillingError;

    /// Case-insensitive construction from a wire string.
    ///
    /// Accepts `"RPM_CCM"`, `"RPM_PCM"`, and `"RPM_ONLY"`. Returns
    /// [`BillingError::Validation`] for unrecognised strings.
    fn from_str(value: &str) -> Result<Self> {
        match value.to_uppercase().as_str() {
            "RPM_CCM" => Ok(BillingProgram::RpmCcm),
            "RPM_PCM" => Ok(BillingProgram::RpmPcm),
            "RPM_ONLY" => Ok(BillingProgram::RpmOnly),
            other => Err(BillingError::Validation(format!(
                "unknown billing program: {other}"
            ))),
        }
    }
}

// ── Input records ─────────────────────────────────────────────────────────────

/// A single logged block of clinician time.
///
/// Immutable once aggregated for a closed period; the engine only ever reads
/// these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub patient_id: Uuid,
    pub clinic_id: Uuid,
    pub clinician_id: Uuid,
    /// Calendar date the work was performed.
    pub entry_date: NaiveDate,
    /// Logged duration; ingestion rejects non-positive values.
    pub duration_minutes: u32,
    pub activity: ActivityKind,
    pub performer: PerformerType,
}

/// The relationship binding a patient, clinic, and billing program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub clinic_id: Uuid,
    pub clinician_id: Uuid,
    pub billing_program: BillingProgram,
    /// IANA timezone name used to localise device measurement timestamps.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    pub enrolled_at: DateTime<Utc>,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// An inclusive calendar range over which activity is aggregated for claims,
/// typically one month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPeriod {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl BillingPeriod {
    /// Create a period, enforcing `from <= to`.
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self> {
        if from > to {
            return Err(BillingError::Validation(format!(
                "billing period from {from} is after to {to}"
            )));
        }
        Ok(Self { from, to })
    }

    /// The period covering one whole calendar month.
    pub fn month(year: i32, month: u32) -> Result<Self> {
        let from = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
            BillingError::Validation(format!("invalid billing month: {year}-{month:02}"))
        })?;
        let to = from
            .checked_add_months(Months::new(1))
            .and_then(|d| d.pred_opt())
            .ok_or_else(|| {
                BillingError::Validation(format!("invalid billing month: {year}-{month:02}"))
            })?;
        Ok(Self { from, to })
    }

    /// `true` when `date` falls inside the inclusive range.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }

    /// Number of calendar days in the period (inclusive, so at least 1).
    pub fn num_days(&self) -> u32 {
        ((self.to - self.from).num_days() + 1) as u32
    }
}

impl std::fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.from, self.to)
    }
}

/// Lifetime (cross-period) record of whether the one-time initial-setup code
/// has already been billed for an enrollment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialSetupState {
    pub enrollment_id: Uuid,
    /// When 99453 was confirmed billed, or `None` if never.
    pub billed_at: Option<DateTime<Utc>>,
}

impl InitialSetupState {
    /// A never-billed state for the given enrollment.
    pub fn unbilled(enrollment_id: Uuid) -> Self {
        Self {
            enrollment_id,
            billed_at: None,
        }
    }
}

// ── Aggregates (evaluator inputs) ─────────────────────────────────────────────

/// Minute totals for one patient over one period, bucketed by code family
/// and performer type.
///
/// Care-management minutes are accumulated once; the evaluator maps them onto
/// the CCM or PCM fields according to the enrollment's billing program.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeAggregate {
    /// Sum of all entries regardless of family.
    pub total_minutes: u32,
    /// Per-activity breakdown, for display.
    pub by_activity: BTreeMap<ActivityKind, u32>,
    /// RPM-family minutes, any performer.
    pub rpm_minutes: u32,
    /// RPM-family minutes performed by a physician/QHP.
    pub rpm_physician_minutes: u32,
    /// Care-management minutes performed by clinical staff.
    pub care_clinical_staff_minutes: u32,
    /// Care-management minutes performed by a physician/QHP.
    pub care_physician_minutes: u32,
}

/// Distinct transmission calendar-days for one enrollment over one period.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransmissionAggregate {
    /// Cardinality of the deduplicated date set.
    pub total_days: u32,
    /// Sorted unique dates, kept for display and audit.
    pub dates: Vec<NaiveDate>,
}

// ── Output summaries ──────────────────────────────────────────────────────────

/// Device-family portion of a patient summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceTransmissionSummary {
    pub total_days: u32,
    pub dates: Vec<NaiveDate>,
    pub eligible_99445: bool,
    pub eligible_99454: bool,
}

/// Time-family portion of a patient summary.
///
/// CCM/PCM minute fields are program-gated: families the enrollment's program
/// does not cover report zero even when matching entries were logged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSummary {
    pub total_minutes: u32,
    pub by_activity: BTreeMap<ActivityKind, u32>,
    pub rpm_minutes: u32,
    pub rpm_physician_minutes: u32,
    pub ccm_clinical_staff_minutes: u32,
    pub ccm_physician_minutes: u32,
    pub pcm_clinical_staff_minutes: u32,
    pub pcm_physician_minutes: u32,
    pub eligible_99470: bool,
    pub eligible_99457: bool,
    pub eligible_99458_count: u8,
    pub eligible_99091: bool,
    pub eligible_99490: bool,
    pub eligible_99439_count: u8,
    pub eligible_99491: bool,
    pub eligible_99437_count: u8,
    pub eligible_99424: bool,
    pub eligible_99425_count: u8,
    pub eligible_99426: bool,
    pub eligible_99427_count: u8,
}

/// Initial-setup portion of a patient summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialSetupSummary {
    pub eligible_99453: bool,
    pub already_billed: bool,
    pub billed_at: Option<DateTime<Utc>>,
}

/// One patient's complete eligibility picture for a billing period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientBillingSummary {
    pub patient_id: Uuid,
    pub patient_name: String,
    pub period: BillingPeriod,
    pub device_transmission: DeviceTransmissionSummary,
    pub time: TimeSummary,
    pub initial_setup: InitialSetupSummary,
    /// Ordered codes: each base code once, each add-on repeated per block.
    pub eligible_codes: Vec<CptCode>,
}

/// Clinic-level roll-up: per-code patient counts plus straight minute sums.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicBillingSummary {
    pub total_patients: u32,
    pub patients_with_99453: u32,
    pub patients_with_99445: u32,
    pub patients_with_99454: u32,
    pub patients_with_99470: u32,
    pub patients_with_99457: u32,
    pub patients_with_99091: u32,
    pub patients_with_99490: u32,
    pub patients_with_99491: u32,
    pub patients_with_99424: u32,
    pub patients_with_99426: u32,
    pub total_rpm_minutes: u64,
    pub total_ccm_minutes: u64,
    pub total_pcm_minutes: u64,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // ── ActivityKind families ─────────────────────────────────────────────

    #[test]
    fn test_activity_rpm_family() {
        assert!(ActivityKind::PatientReview.is_rpm());
        assert!(ActivityKind::Documentation.is_rpm());
        assert!(ActivityKind::Other.is_rpm());
        assert!(!ActivityKind::CarePlanUpdate.is_rpm());
        assert!(!ActivityKind::PhoneCall.is_rpm());
        assert!(!ActivityKind::Coordination.is_rpm());
    }

    #[test]
    fn test_activity_care_management_family() {
        assert!(ActivityKind::CarePlanUpdate.is_care_management());
        assert!(ActivityKind::PhoneCall.is_care_management());
        assert!(ActivityKind::Coordination.is_care_management());
        assert!(!ActivityKind::PatientReview.is_care_management());
    }

    #[test]
    fn test_activity_families_partition() {
        // Every activity belongs to exactly one family.
        for kind in [
            ActivityKind::PatientReview,
            ActivityKind::Documentation,
            ActivityKind::Other,
            ActivityKind::CarePlanUpdate,
            ActivityKind::PhoneCall,
            ActivityKind::Coordination,
        ] {
            assert_ne!(kind.is_rpm(), kind.is_care_management(), "{kind:?}");
        }
    }

    #[test]
    fn test_activity_serde_wire_strings() {
        let json = serde_json::to_string(&ActivityKind::CarePlanUpdate).unwrap();
        assert_eq!(json, r#""CARE_PLAN_UPDATE""#);
        let back: ActivityKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ActivityKind::CarePlanUpdate);
    }

    // ── PerformerType ─────────────────────────────────────────────────────

    #[test]
    fn test_performer_serde_wire_strings() {
        let json = serde_json::to_string(&PerformerType::PhysicianQhp).unwrap();
        assert_eq!(json, r#""PHYSICIAN_QHP""#);
        assert_eq!(PerformerType::ClinicalStaff.as_str(), "CLINICAL_STAFF");
    }

    // ── BillingProgram ────────────────────────────────────────────────────

    #[test]
    fn test_billing_program_from_str_all_valid() {
        assert_eq!(
            "RPM_CCM".parse::<BillingProgram>().unwrap(),
            BillingProgram::RpmCcm
        );
        assert_eq!(
            "rpm_pcm".parse::<BillingProgram>().unwrap(),
            BillingProgram::RpmPcm
        );
        assert_eq!(
            "Rpm_Only".parse::<BillingProgram>().unwrap(),
            BillingProgram::RpmOnly
        );
    }

    #[test]
    fn test_billing_program_from_str_invalid() {
        let err = "RPM_TCM".parse::<BillingProgram>().unwrap_err();
        assert!(matches!(err, BillingError::Validation(_)));
        assert!(err.to_string().contains("RPM_TCM"));
    }

    #[test]
    fn test_billing_program_round_trip() {
        for program in [
            BillingProgram::RpmCcm,
            BillingProgram::RpmPcm,
            BillingProgram::RpmOnly,
        ] {
            assert_eq!(program.as_str().parse::<BillingProgram>().unwrap(), program);
        }
    }

    // ── BillingPeriod ─────────────────────────────────────────────────────

    #[test]
    fn test_period_new_valid() {
        let p = BillingPeriod::new(date(2026, 1, 1), date(2026, 1, 31)).unwrap();
        assert_eq!(p.num_days(), 31);
    }

    #[test]
    fn test_period_new_inverted_rejected() {
        let err = BillingPeriod::new(date(2026, 2, 1), date(2026, 1, 1)).unwrap_err();
        assert!(matches!(err, BillingError::Validation(_)));
    }

    #[test]
    fn test_period_single_day() {
        let p = BillingPeriod::new(date(2026, 3, 15), date(2026, 3, 15)).unwrap();
        assert_eq!(p.num_days(), 1);
        assert!(p.contains(date(2026, 3, 15)));
        assert!(!p.contains(date(2026, 3, 16)));
    }

    #[test]
    fn test_period_month_january() {
        let p = BillingPeriod::month(2026, 1).unwrap();
        assert_eq!(p.from, date(2026, 1, 1));
        assert_eq!(p.to, date(2026, 1, 31));
    }

    #[test]
    fn test_period_month_february_leap() {
        let p = BillingPeriod::month(2028, 2).unwrap();
        assert_eq!(p.to, date(2028, 2, 29));
    }

    #[test]
    fn test_period_month_invalid() {
        assert!(BillingPeriod::month(2026, 13).is_err());
        assert!(BillingPeriod::month(2026, 0).is_err());
    }

    #[test]
    fn test_period_contains_bounds_inclusive() {
        let p = BillingPeriod::month(2026, 4).unwrap();
        assert!(p.contains(date(2026, 4, 1)));
        assert!(p.contains(date(2026, 4, 30)));
        assert!(!p.contains(date(2026, 3, 31)));
        assert!(!p.contains(date(2026, 5, 1)));
    }

    // ── InitialSetupState ─────────────────────────────────────────────────

    #[test]
    fn test_initial_setup_unbilled() {
        let id = Uuid::new_v4();
        let state = InitialSetupState::unbilled(id);
        assert_eq!(state.enrollment_id, id);
        assert!(state.billed_at.is_none());
    }

    // ── Summary serialization shape ───────────────────────────────────────

    #[test]
    fn test_summary_serde_camel_case_keys() {
        let summary = DeviceTransmissionSummary {
            total_days: 16,
            dates: vec![date(2026, 1, 2)],
            eligible_99445: false,
            eligible_99454: true,
        };
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["totalDays"], 16);
        assert_eq!(value["eligible99454"], true);
        assert_eq!(value["eligible99445"], false);
    }

    #[test]
    fn test_time_summary_serde_add_on_count_keys() {
        let summary = TimeSummary {
            eligible_99458_count: 2,
            ..Default::default()
        };
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["eligible99458Count"], 2);
        assert_eq!(value["eligible99439Count"], 0);
    }

    #[test]
    fn test_clinic_summary_default_all_zero() {
        let summary = ClinicBillingSummary::default();
        assert_eq!(summary.total_patients, 0);
        assert_eq!(summary.patients_with_99454, 0);
        assert_eq!(summary.total_rpm_minutes, 0);
        assert_eq!(summary.total_ccm_minutes, 0);
    }

    #[test]
    fn test_enrollment_timezone_defaults_to_utc() {
        let json = serde_json::json!({
            "id": Uuid::new_v4(),
            "patient_id": Uuid::new_v4(),
            "patient_name": "Pat Doe",
            "clinic_id": Uuid::new_v4(),
            "clinician_id": Uuid::new_v4(),
            "billing_program": "RPM_ONLY",
            "enrolled_at": "2026-01-01T00:00:00Z",
        });
        let enrollment: Enrollment = serde_json::from_value(json).unwrap();
        assert_eq!(enrollment.timezone, "UTC");
    }
}
