//! Report rendering for the CLI.

use std::fmt::Write;

use billing_core::codes::Codes;
use billing_core::models::PatientBillingSummary;
use billing_runtime::service::ClinicBillingReport;

/// Render a report as pretty-printed JSON.
pub fn render_json(report: &ClinicBillingReport) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Render a report as a plain-text summary for the terminal.
pub fn render_text(report: &ClinicBillingReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Clinic billing report");
    let _ = writeln!(out, "Clinic:    {}", report.clinic_id);
    let _ = writeln!(out, "Period:    {}", report.period);
    let _ = writeln!(
        out,
        "Generated: {}",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out);

    if report.patients.is_empty() {
        let _ = writeln!(out, "No active enrollments for this clinic.");
        return out;
    }

    let _ = writeln!(out, "Patients ({}):", report.patients.len());
    for patient in &report.patients {
        render_patient(&mut out, patient);
    }

    let s = &report.summary;
    let _ = writeln!(out, "Clinic totals:");
    let _ = writeln!(out, "  Patients:            {}", s.total_patients);
    let _ = writeln!(out, "  With 99453 eligible: {}", s.patients_with_99453);
    let _ = writeln!(out, "  With 99445:          {}", s.patients_with_99445);
    let _ = writeln!(out, "  With 99454:          {}", s.patients_with_99454);
    let _ = writeln!(out, "  With 99470:          {}", s.patients_with_99470);
    let _ = writeln!(out, "  With 99457:          {}", s.patients_with_99457);
    let _ = writeln!(out, "  With 99091:          {}", s.patients_with_99091);
    let _ = writeln!(out, "  With 99490:          {}", s.patients_with_99490);
    let _ = writeln!(out, "  With 99491:          {}", s.patients_with_99491);
    let _ = writeln!(out, "  With 99424:          {}", s.patients_with_99424);
    let _ = writeln!(out, "  With 99426:          {}", s.patients_with_99426);
    let _ = writeln!(out, "  RPM minutes:         {}", s.total_rpm_minutes);
    let _ = writeln!(out, "  CCM minutes:         {}", s.total_ccm_minutes);
    let _ = writeln!(out, "  PCM minutes:         {}", s.total_pcm_minutes);

    out
}

fn render_patient(out: &mut String, patient: &PatientBillingSummary) {
    let _ = writeln!(out, "  {} ({})", patient.patient_name, patient.patient_id);
    let _ = writeln!(
        out,
        "    Transmission days: {}",
        patient.device_transmission.total_days
    );
    let _ = writeln!(
        out,
        "    Minutes: {} total, {} RPM ({} physician review)",
        patient.time.total_minutes, patient.time.rpm_minutes, patient.time.rpm_physician_minutes
    );
    if patient.initial_setup.already_billed {
        let _ = writeln!(out, "    Initial setup: already billed");
    }

    if patient.eligible_codes.is_empty() {
        let _ = writeln!(out, "    Eligible codes: none");
    } else {
        let _ = writeln!(out, "    Eligible codes:");
        for code in &patient.eligible_codes {
            let label = Codes::label_for(code.as_str()).unwrap_or("unlisted code");
            let marker = if code.is_add_on() { " (add-on)" } else { "" };
            let _ = writeln!(out, "      {} - {}{}", code.as_str(), label, marker);
        }
    }
    let _ = writeln!(out);
}

// ── Tests ─────────────────────────────────────────────────────────────────────
