use crate::error::{BillingError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The fixed menu of remote-monitoring CPT codes this engine evaluates.
///
/// Serializes as the bare numeric code string (e.g. `"99454"`), which is the
/// form the claims layer and the reporting UI both expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CptCode {
    /// Initial setup and patient education (one-time per enrollment).
    #[serde(rename = "99453")]
    Cpt99453,
    /// Device supply, 2–15 transmission days (new 2026 code).
    #[serde(rename = "99445")]
    Cpt99445,
    /// Device supply, 16+ transmission days.
    #[serde(rename = "99454")]
    Cpt99454,
    /// Treatment management, 10–19 minutes (new 2026 code).
    #[serde(rename = "99470")]
    Cpt99470,
    /// Treatment management, first 20 minutes.
    #[serde(rename = "99457")]
    Cpt99457,
    /// Treatment management, each additional 20 minutes.
    #[serde(rename = "99458")]
    Cpt99458,
    /// Physician/QHP collection and interpretation, 30 minutes.
    #[serde(rename = "99091")]
    Cpt99091,
    /// CCM clinical staff, first 20 minutes.
    #[serde(rename = "99490")]
    Cpt99490,
    /// CCM clinical staff, each additional 20 minutes.
    #[serde(rename = "99439")]
    Cpt99439,
    /// CCM physician/QHP, first 30 minutes.
    #[serde(rename = "99491")]
    Cpt99491,
    /// CCM physician/QHP, each additional 30 minutes.
    #[serde(rename = "99437")]
    Cpt99437,
    /// PCM physician/QHP, first 30 minutes.
    #[serde(rename = "99424")]
    Cpt99424,
    /// PCM physician/QHP, each additional 30 minutes.
    #[serde(rename = "99425")]
    Cpt99425,
    /// PCM clinical staff, first 30 minutes.
    #[serde(rename = "99426")]
    Cpt99426,
    /// PCM clinical staff, each additional 30 minutes.
    #[serde(rename = "99427")]
    Cpt99427,
}

impl CptCode {
    /// The numeric code string as it appears on a claim.
    pub fn as_str(&self) -> &'static str {
        match self {
            CptCode::Cpt99453 => "99453",
            CptCode::Cpt99445 => "99445",
            CptCode::Cpt99454 => "99454",
            CptCode::Cpt99470 => "99470",
            CptCode::Cpt99457 => "99457",
            CptCode::Cpt99458 => "99458",
            CptCode::Cpt99091 => "99091",
            CptCode::Cpt99490 => "99490",
            CptCode::Cpt99439 => "99439",
            CptCode::Cpt99491 => "99491",
            CptCode::Cpt99437 => "99437",
            CptCode::Cpt99424 => "99424",
            CptCode::Cpt99425 => "99425",
            CptCode::Cpt99426 => "99426",
            CptCode::Cpt99427 => "99427",
        }
    }

    /// Human-readable label for display next to the code.
    pub fn label(&self) -> &'static str {
        match self {
            CptCode::Cpt99453 => "Remote monitoring initial setup and patient education",
            CptCode::Cpt99445 => "Remote monitoring device supply, 2-15 days of transmissions",
            CptCode::Cpt99454 => "Remote monitoring device supply, 16+ days of transmissions",
            CptCode::Cpt99470 => "Remote monitoring treatment management, 10-19 minutes",
            CptCode::Cpt99457 => "Remote monitoring treatment management, first 20 minutes",
            CptCode::Cpt99458 => {
                "Remote monitoring treatment management, each additional 20 minutes"
            }
            CptCode::Cpt99091 => {
                "Physician/QHP collection and interpretation of physiologic data, 30 minutes"
            }
            CptCode::Cpt99490 => "Chronic care management, clinical staff, first 20 minutes",
            CptCode::Cpt99439 => {
                "Chronic care management, clinical staff, each additional 20 minutes"
            }
            CptCode::Cpt99491 => "Chronic care management, physician/QHP, first 30 minutes",
            CptCode::Cpt99437 => {
                "Chronic care management, physician/QHP, each additional 30 minutes"
            }
            CptCode::Cpt99424 => "Principal care management, physician/QHP, first 30 minutes",
            CptCode::Cpt99425 => {
                "Principal care management, physician/QHP, each additional 30 minutes"
            }
            CptCode::Cpt99426 => "Principal care management, clinical staff, first 30 minutes",
            CptCode::Cpt99427 => {
                "Principal care management, clinical staff, each additional 30 minutes"
            }
        }
    }

    /// `true` for incremental add-on codes stacked on a base code.
    pub fn is_add_on(&self) -> bool {
        matches!(
            self,
            CptCode::Cpt99458 | CptCode::Cpt99439 | CptCode::Cpt99437 | CptCode::Cpt99425 | CptCode::Cpt99427
        )
    }
}

impl FromStr for CptCode {
    type Err = BillingError;

    fn from_str(value: &str) -> Result<Self> {
        Codes::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == value)
            .ok_or_else(|| BillingError::Validation(format!("unknown CPT code: {value}")))
    }
}

impl std::fmt::Display for CptCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Reference table ───────────────────────────────────────────────────────────

/// Static CPT reference table with helper look-ups.
pub struct Codes;

impl Codes {
    /// Every code the engine can emit, in rule-table order: device family,
    /// RPM time family, CCM family, PCM family.
    pub const ALL: &'static [CptCode] = &[
        CptCode::Cpt99453,
        CptCode::Cpt99445,
        CptCode::Cpt99454,
        CptCode::Cpt99470,
        CptCode::Cpt99457,
        CptCode::Cpt99458,
        CptCode::Cpt99091,
        CptCode::Cpt99490,
        CptCode::Cpt99439,
        CptCode::Cpt99491,
        CptCode::Cpt99437,
        CptCode::Cpt99424,
        CptCode::Cpt99425,
        CptCode::Cpt99426,
        CptCode::Cpt99427,
    ];

    /// Label for a code given by string, or `None` if unrecognised.
    pub fn label_for(code: &str) -> Option<&'static str> {
        code.parse::<CptCode>().ok().map(|c| c.label())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
