//! The CPT eligibility rule table.
//!
//! Pure functions from per-patient aggregates to a
//! [`PatientBillingSummary`]. Every threshold, band, and cap lives here so
//! the regulatory definitions are encoded in exactly one place.

use crate::codes::CptCode;
use crate::error::{BillingError, Result};
use crate::models::{
    BillingPeriod, BillingProgram, DeviceTransmissionSummary, Enrollment, InitialSetupState,
    InitialSetupSummary, PatientBillingSummary, TimeAggregate, TimeSummary, TransmissionAggregate,
};

// ── Thresholds ────────────────────────────────────────────────────────────────

/// Minimum distinct transmission days for the low device band (99445).
pub const DEVICE_LOW_BAND_MIN_DAYS: u32 = 2;

/// Minimum distinct transmission days for the high device band (99454),
/// which is also the 99453 initial-setup trigger.
pub const DEVICE_HIGH_BAND_MIN_DAYS: u32 = 16;

/// Lower bound of the short RPM treatment band (99470).
pub const RPM_SHORT_BAND_MIN_MINUTES: u32 = 10;

/// Base threshold for RPM treatment management (99457); also the 99458
/// add-on block size.
pub const RPM_BASE_MINUTES: u32 = 20;

/// Physician/QHP data-review threshold (99091).
pub const RPM_PHYSICIAN_REVIEW_MINUTES: u32 = 30;

/// CCM clinical-staff base threshold (99490); also the 99439 block size.
pub const CCM_STAFF_MINUTES: u32 = 20;

/// CCM physician/QHP base threshold (99491); also the 99437 block size.
pub const CCM_PHYSICIAN_MINUTES: u32 = 30;

/// PCM base threshold for both performer splits (99424/99426); also the
/// 99425/99427 block size.
pub const PCM_MINUTES: u32 = 30;

/// Maximum add-on blocks billable per period for any add-on code.
pub const ADD_ON_BLOCK_CAP: u8 = 2;

// ── Device day bands ──────────────────────────────────────────────────────────

/// Mutually exclusive transmission-day bands; a day total belongs to exactly
/// one band by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceDayBand {
    /// Fewer than 2 distinct transmission days; no device code.
    None,
    /// 2–15 distinct days; 99445.
    Low,
    /// 16 or more distinct days; 99454.
    High,
}

impl DeviceDayBand {
    /// Classify a distinct-day total into its single band.
    pub fn classify(total_days: u32) -> Self {
        if total_days >= DEVICE_HIGH_BAND_MIN_DAYS {
            DeviceDayBand::High
        } else if total_days >= DEVICE_LOW_BAND_MIN_DAYS {
            DeviceDayBand::Low
        } else {
            DeviceDayBand::None
        }
    }
}

// ── Shared add-on helper ──────────────────────────────────────────────────────

/// Number of billable add-on blocks above a base threshold, capped at
/// [`ADD_ON_BLOCK_CAP`].
///
/// `min(2, (minutes - threshold) / block_size)` once `minutes >= threshold`,
/// zero below the threshold. Every add-on code reuses this one shape.
pub fn add_on_blocks(minutes: u32, threshold: u32, block_size: u32) -> u8 {
    if minutes < threshold {
        return 0;
    }
    let blocks = (minutes - threshold) / block_size;
    (blocks.min(u32::from(ADD_ON_BLOCK_CAP))) as u8
}

// ── InitialSetupTracker ───────────────────────────────────────────────────────

/// Evaluates the one-time, lifetime initial-setup (99453) state.
///
/// Read-only: marking `billed_at` is an explicit external write, never a side
/// effect of report generation.
pub struct InitialSetupTracker;

impl InitialSetupTracker {
    /// `eligible_99453 = total_days >= 16 && !already_billed`.
    pub fn evaluate(state: &InitialSetupState, total_days: u32) -> InitialSetupSummary {
        let already_billed = state.billed_at.is_some();
        InitialSetupSummary {
            eligible_99453: total_days >= DEVICE_HIGH_BAND_MIN_DAYS && !already_billed,
            already_billed,
            billed_at: state.billed_at,
        }
    }
}

// ── CptEligibilityEvaluator ───────────────────────────────────────────────────

/// Stateless application of the full rule table to one patient's aggregates.
pub struct CptEligibilityEvaluator;

impl CptEligibilityEvaluator {
    /// Produce a patient's eligibility summary for one period.
    ///
    /// Pure: identical inputs always yield identical output, and no state
    /// persists between calls. Fails fast with
    /// [`BillingError::InvalidAggregate`] when the aggregates are internally
    /// inconsistent (an upstream data bug), never silently clamps.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAggregate` when the physician split exceeds its family
    /// total, when the transmission-day count exceeds the period length, or
    /// when the retained date list disagrees with the day count.
    pub fn evaluate(
        enrollment: &Enrollment,
        period: &BillingPeriod,
        time: &TimeAggregate,
        transmissions: &TransmissionAggregate,
        setup: &InitialSetupState,
    ) -> Result<PatientBillingSummary> {
        Self::validate_aggregates(period, time, transmissions)?;

        let program = enrollment.billing_program;

        // ── Device family ─────────────────────────────────────────────────
        let band = DeviceDayBand::classify(transmissions.total_days);
        let device = DeviceTransmissionSummary {
            total_days: transmissions.total_days,
            dates: transmissions.dates.clone(),
            eligible_99445: band == DeviceDayBand::Low,
            eligible_99454: band == DeviceDayBand::High,
        };

        let initial_setup = InitialSetupTracker::evaluate(setup, transmissions.total_days);

        // ── RPM time family (independent of program) ──────────────────────
        let rpm = time.rpm_minutes;
        let eligible_99470 = (RPM_SHORT_BAND_MIN_MINUTES..RPM_BASE_MINUTES).contains(&rpm);
        let eligible_99457 = rpm >= RPM_BASE_MINUTES;
        let eligible_99458_count = if eligible_99457 {
            add_on_blocks(rpm, RPM_BASE_MINUTES, RPM_BASE_MINUTES)
        } else {
            0
        };
        let eligible_99091 = time.rpm_physician_minutes >= RPM_PHYSICIAN_REVIEW_MINUTES;

        // ── CCM / PCM families (program-gated) ────────────────────────────
        let mut summary = TimeSummary {
            total_minutes: time.total_minutes,
            by_activity: time.by_activity.clone(),
            rpm_minutes: rpm,
            rpm_physician_minutes: time.rpm_physician_minutes,
            eligible_99470,
            eligible_99457,
            eligible_99458_count,
            eligible_99091,
            ..TimeSummary::default()
        };

        match program {
            BillingProgram::RpmCcm => {
                let staff = time.care_clinical_staff_minutes;
                let physician = time.care_physician_minutes;
                summary.ccm_clinical_staff_minutes = staff;
                summary.ccm_physician_minutes = physician;
                summary.eligible_99490 = staff >= CCM_STAFF_MINUTES;
                if summary.eligible_99490 {
                    summary.eligible_99439_count =
                        add_on_blocks(staff, CCM_STAFF_MINUTES, CCM_STAFF_MINUTES);
                }
                summary.eligible_99491 = physician >= CCM_PHYSICIAN_MINUTES;
                if summary.eligible_99491 {
                    summary.eligible_99437_count =
                        add_on_blocks(physician, CCM_PHYSICIAN_MINUTES, CCM_PHYSICIAN_MINUTES);
                }
            }
            BillingProgram::RpmPcm => {
                let staff = time.care_clinical_staff_minutes;
                let physician = time.care_physician_minutes;
                summary.pcm_clinical_staff_minutes = staff;
                summary.pcm_physician_minutes = physician;
                summary.eligible_99424 = physician >= PCM_MINUTES;
                if summary.eligible_99424 {
                    summary.eligible_99425_count = add_on_blocks(physician, PCM_MINUTES, PCM_MINUTES);
                }
                summary.eligible_99426 = staff >= PCM_MINUTES;
                if summary.eligible_99426 {
                    summary.eligible_99427_count = add_on_blocks(staff, PCM_MINUTES, PCM_MINUTES);
                }
            }
            // Care-management entries may have accumulated, but RPM_ONLY never
            // surfaces them as CCM/PCM minutes or eligibility.
            BillingProgram::RpmOnly => {}
        }

        let eligible_codes = Self::collect_codes(&device, &summary, &initial_setup);
        tracing::debug!(
            patient_id = %enrollment.patient_id,
            program = enrollment.billing_program.as_str(),
            codes = eligible_codes.len(),
            "evaluated patient eligibility"
        );

        Ok(PatientBillingSummary {
            patient_id: enrollment.patient_id,
            patient_name: enrollment.patient_name.clone(),
            period: *period,
            device_transmission: device,
            time: summary,
            initial_setup,
            eligible_codes,
        })
    }

    // ── Private helpers ───────────────────────────────────────────────────

    /// Defensive consistency checks on the incoming aggregates.
    fn validate_aggregates(
        period: &BillingPeriod,
        time: &TimeAggregate,
        transmissions: &TransmissionAggregate,
    ) -> Result<()> {
        if time.rpm_physician_minutes > time.rpm_minutes {
            return Err(BillingError::InvalidAggregate(format!(
                "rpm physician minutes {} exceed rpm family total {}",
                time.rpm_physician_minutes, time.rpm_minutes
            )));
        }
        if transmissions.total_days > period.num_days() {
            return Err(BillingError::InvalidAggregate(format!(
                "{} transmission days exceed the {}-day period",
                transmissions.total_days,
                period.num_days()
            )));
        }
        if transmissions.dates.len() != transmissions.total_days as usize {
            return Err(BillingError::InvalidAggregate(format!(
                "transmission date list has {} entries but total_days is {}",
                transmissions.dates.len(),
                transmissions.total_days
            )));
        }
        Ok(())
    }

    /// Build the ordered eligible-code sequence: each base code appended once
    /// when its condition holds, each add-on appended once per block so a
    /// count of 2 appears as two repeated entries.
    fn collect_codes(
        device: &DeviceTransmissionSummary,
        time: &TimeSummary,
        setup: &InitialSetupSummary,
    ) -> Vec<CptCode> {
        let mut codes = Vec::new();

        if setup.eligible_99453 {
            codes.push(CptCode::Cpt99453);
        }
        if device.eligible_99445 {
            codes.push(CptCode::Cpt99445);
        }
        if device.eligible_99454 {
            codes.push(CptCode::Cpt99454);
        }

        if time.eligible_99470 {
            codes.push(CptCode::Cpt99470);
        }
        if time.eligible_99457 {
            codes.push(CptCode::Cpt99457);
        }
        push_repeated(&mut codes, CptCode::Cpt99458, time.eligible_99458_count);
        if time.eligible_99091 {
            codes.push(CptCode::Cpt99091);
        }

        if time.eligible_99490 {
            codes.push(CptCode::Cpt99490);
        }
        push_repeated(&mut codes, CptCode::Cpt99439, time.eligible_99439_count);
        if time.eligible_99491 {
            codes.push(CptCode::Cpt99491);
        }
        push_repeated(&mut codes, CptCode::Cpt99437, time.eligible_99437_count);

        if time.eligible_99424 {
            codes.push(CptCode::Cpt99424);
        }
        push_repeated(&mut codes, CptCode::Cpt99425, time.eligible_99425_count);
        if time.eligible_99426 {
            codes.push(CptCode::Cpt99426);
        }
        push_repeated(&mut codes, CptCode::Cpt99427, time.eligible_99427_count);

        codes
    }
}

fn push_repeated(codes: &mut Vec<CptCode>, code: CptCode, count: u8) {
    for _ in 0..count {
        codes.push(code);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
