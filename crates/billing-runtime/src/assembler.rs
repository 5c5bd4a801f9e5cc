//! Clinic-level roll-up of patient summaries.

use billing_core::models::{ClinicBillingSummary, PatientBillingSummary};

// ── ClinicBillingReportAssembler ──────────────────────────────────────────────

/// Folds per-patient summaries into one [`ClinicBillingSummary`].
///
/// The fold is a plain sum over independent patients, so it is associative
/// and order-independent: combining partial roll-ups gives the same result
/// as one pass over all patients. An empty input yields all zeros.
pub struct ClinicBillingReportAssembler;

impl ClinicBillingReportAssembler {
    /// Roll up a slice of patient summaries.
    pub fn assemble(patients: &[PatientBillingSummary]) -> ClinicBillingSummary {
        patients
            .iter()
            .fold(ClinicBillingSummary::default(), |acc, p| {
                Self::fold_patient(acc, p)
            })
    }

    /// Combine two partial roll-ups.
    pub fn combine(a: ClinicBillingSummary, b: &ClinicBillingSummary) -> ClinicBillingSummary {
        ClinicBillingSummary {
            total_patients: a.total_patients + b.total_patients,
            patients_with_99453: a.patients_with_99453 + b.patients_with_99453,
            patients_with_99445: a.patients_with_99445 + b.patients_with_99445,
            patients_with_99454: a.patients_with_99454 + b.patients_with_99454,
            patients_with_99470: a.patients_with_99470 + b.patients_with_99470,
            patients_with_99457: a.patients_with_99457 + b.patients_with_99457,
            patients_with_99091: a.patients_with_99091 + b.patients_with_99091,
            patients_with_99490: a.patients_with_99490 + b.patients_with_99490,
            patients_with_99491: a.patients_with_99491 + b.patients_with_99491,
            patients_with_99424: a.patients_with_99424 + b.patients_with_99424,
            patients_with_99426: a.patients_with_99426 + b.patients_with_99426,
            total_rpm_minutes: a.total_rpm_minutes + b.total_rpm_minutes,
            total_ccm_minutes: a.total_ccm_minutes + b.total_ccm_minutes,
            total_pcm_minutes: a.total_pcm_minutes + b.total_pcm_minutes,
        }
    }

    fn fold_patient(
        mut acc: ClinicBillingSummary,
        patient: &PatientBillingSummary,
    ) -> ClinicBillingSummary {
        let time = &patient.time;

        acc.total_patients += 1;
        acc.patients_with_99453 += u32::from(patient.initial_setup.eligible_99453);
        acc.patients_with_99445 += u32::from(patient.device_transmission.eligible_99445);
        acc.patients_with_99454 += u32::from(patient.device_transmission.eligible_99454);
        acc.patients_with_99470 += u32::from(time.eligible_99470);
        acc.patients_with_99457 += u32::from(time.eligible_99457);
        acc.patients_with_99091 += u32::from(time.eligible_99091);
        acc.patients_with_99490 += u32::from(time.eligible_99490);
        acc.patients_with_99491 += u32::from(time.eligible_99491);
        acc.patients_with_99424 += u32::from(time.eligible_99424);
        acc.patients_with_99426 += u32::from(time.eligible_99426);

        acc.total_rpm_minutes += u64::from(time.rpm_minutes);
        acc.total_ccm_minutes +=
            u64::from(time.ccm_clinical_staff_minutes) + u64::from(time.ccm_physician_minutes);
        acc.total_pcm_minutes +=
            u64::from(time.pcm_clinical_staff_minutes) + u64::from(time.pcm_physician_minutes);

        acc
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use billing_core::codes::CptCode;
    use billing_core::models::{
        BillingPeriod, DeviceTransmissionSummary, InitialSetupSummary, TimeSummary,
    };
    use uuid::Uuid;

    fn make_patient(rpm_minutes: u32, eligible_99454: bool, eligible_99457: bool) -> PatientBillingSummary {
        PatientBillingSummary {
            patient_id: Uuid::new_v4(),
            patient_name: "Pat Doe".to_string(),
            period: BillingPeriod::month(2026, 1).unwrap(),
            device_transmission: DeviceTransmissionSummary {
                total_days: if eligible_99454 { 16 } else { 0 },
                dates: vec![],
                eligible_99445: false,
                eligible_99454,
            },
            time: TimeSummary {
                total_minutes: rpm_minutes,
                rpm_minutes,
                eligible_99457,
                ..TimeSummary::default()
            },
            initial_setup: InitialSetupSummary::default(),
            eligible_codes: if eligible_99454 {
                vec![CptCode::Cpt99454]
            } else {
                vec![]
            },
        }
    }

    #[test]
    fn test_empty_input_is_all_zeros() {
        let summary = ClinicBillingReportAssembler::assemble(&[]);
        assert_eq!(summary, ClinicBillingSummary::default());
        assert_eq!(summary.total_patients, 0);
        assert_eq!(summary.total_rpm_minutes, 0);
    }

    #[test]
    fn test_counts_and_sums() {
        let patients = vec![
            make_patient(25, true, true),
            make_patient(10, false, false),
            make_patient(40, true, true),
        ];

        let summary = ClinicBillingReportAssembler::assemble(&patients);
        assert_eq!(summary.total_patients, 3);
        assert_eq!(summary.patients_with_99454, 2);
        assert_eq!(summary.patients_with_99457, 2);
        assert_eq!(summary.total_rpm_minutes, 75);
    }

    #[test]
    fn test_ccm_and_pcm_minutes_sum_both_performer_splits() {
        let mut patient = make_patient(0, false, false);
        patient.time.ccm_clinical_staff_minutes = 20;
        patient.time.ccm_physician_minutes = 30;
        patient.time.pcm_clinical_staff_minutes = 5;
        patient.time.pcm_physician_minutes = 7;

        let summary = ClinicBillingReportAssembler::assemble(&[patient]);
        assert_eq!(summary.total_ccm_minutes, 50);
        assert_eq!(summary.total_pcm_minutes, 12);
    }

    #[test]
    fn test_fold_is_order_independent() {
        let a = make_patient(25, true, true);
        let b = make_patient(10, false, false);
        let c = make_patient(40, true, false);

        let forward = ClinicBillingReportAssembler::assemble(&[a.clone(), b.clone(), c.clone()]);
        let reversed = ClinicBillingReportAssembler::assemble(&[c, b, a]);
        assert_eq!(forward, reversed);
    }

    #[test]
    fn test_fold_is_associative() {
        let a = make_patient(25, true, true);
        let b = make_patient(10, false, false);
        let c = make_patient(40, true, false);

        let whole = ClinicBillingReportAssembler::assemble(&[a.clone(), b.clone(), c.clone()]);

        let left = ClinicBillingReportAssembler::assemble(&[a, b]);
        let right = ClinicBillingReportAssembler::assemble(&[c]);
        let combined = ClinicBillingReportAssembler::combine(left, &right);

        assert_eq!(whole, combined);
    }
}
