//! Per-patient aggregation of raw clinical-activity records.
//!
//! Two independent, pure read-and-sum passes: logged minutes bucketed by code
//! family and performer type, and distinct device-transmission days. Band
//! classification and all threshold logic stay in `billing_core::rules` so
//! the mutual-exclusion rules live in one place.

use chrono::NaiveDate;

use billing_core::models::{PerformerType, TimeAggregate, TimeEntry, TransmissionAggregate};

// ── TimeEntryAggregator ───────────────────────────────────────────────────────

/// Stateless helper that sums logged minutes per family and performer.
pub struct TimeEntryAggregator;

impl TimeEntryAggregator {
    /// Aggregate all entries for one patient and period.
    ///
    /// Care-management minutes (care-plan update, phone call, coordination)
    /// accumulate regardless of the enrollment's billing program; the
    /// evaluator decides whether they surface as CCM or PCM.
    pub fn aggregate(entries: &[TimeEntry]) -> TimeAggregate {
        let mut agg = TimeAggregate::default();
        for entry in entries {
            Self::add_entry(&mut agg, entry);
        }
        agg
    }

    /// Add a single entry's minutes to the running totals.
    fn add_entry(agg: &mut TimeAggregate, entry: &TimeEntry) {
        let minutes = entry.duration_minutes;
        agg.total_minutes += minutes;
        *agg.by_activity.entry(entry.activity).or_insert(0) += minutes;

        if entry.activity.is_rpm() {
            agg.rpm_minutes += minutes;
            if entry.performer == PerformerType::PhysicianQhp {
                agg.rpm_physician_minutes += minutes;
            }
        } else {
            match entry.performer {
                PerformerType::ClinicalStaff => agg.care_clinical_staff_minutes += minutes,
                PerformerType::PhysicianQhp => agg.care_physician_minutes += minutes,
            }
        }
    }
}

// ── DeviceTransmissionAggregator ──────────────────────────────────────────────

/// Counts distinct transmission calendar-days for one enrollment and period.
pub struct DeviceTransmissionAggregator;

impl DeviceTransmissionAggregator {
    /// Aggregate an already-deduplicated date set.
    ///
    /// Sorts and re-deduplicates defensively so `total_days` is always the
    /// cardinality of the retained date list.
    pub fn aggregate(dates: &[NaiveDate]) -> TransmissionAggregate {
        let mut unique: Vec<NaiveDate> = dates.to_vec();
        unique.sort_unstable();
        unique.dedup();
        TransmissionAggregate {
            total_days: unique.len() as u32,
            dates: unique,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
