//! Display-ready prescription records produced by the pipeline.
//!
//! These are the only types that outlive a scan: once the session hands a
//! [`NormalizedPrescription`] to the caller, the caller owns it and may edit
//! a working copy before committing it to the medicine list.

use serde::{Deserialize, Serialize};

/// Placeholder used when a required field is missing from the service response.
///
/// Distinct from absence: optional fields are `None`, required text fields
/// fall back to this value.
pub const UNKNOWN: &str = "알 수 없음";

/// A normalized prescription / pharmacy receipt.
///
/// `pharmacy_name`, `dispensing_date` and `medicines` are always present;
/// `medicines` may be empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedPrescription {
    pub pharmacy_name: String,
    /// `YYYY-MM-DD` when the service reported a recognisable date, today otherwise.
    pub dispensing_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pharmacy_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pharmacy_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prescribing_doctor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copayment: Option<f64>,
    /// In the order the service reported them.
    #[serde(default)]
    pub medicines: Vec<MedicineLine>,
}

/// One dispensed drug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicineLine {
    pub name: String,
    #[serde(default)]
    pub dosage_per_intake: String,
    #[serde(default)]
    pub daily_frequency: String,
    #[serde(default)]
    pub total_days: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_instruction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
}

impl MedicineLine {
    /// A line with every field at its default.
    pub fn unknown() -> Self {
        Self {
            name: UNKNOWN.to_string(),
            dosage_per_intake: String::new(),
            daily_frequency: String::new(),
            total_days: String::new(),
            usage_instruction: None,
            effect: None,
        }
    }
}

impl NormalizedPrescription {
    /// Whether the pharmacy name fell back to [`UNKNOWN`].
    pub fn pharmacy_is_unknown(&self) -> bool {
        self.pharmacy_name == UNKNOWN
    }
}

/// Format an amount in won with thousands separators, e.g. `15,000원`.
///
/// Fractional amounts are rounded to the nearest won.
pub fn format_won(amount: f64) -> String {
    let rounded = amount.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0 {
        format!("-{grouped}원")
    } else {
        format!("{grouped}원")
    }
}
