//! Normalization: loosely typed service JSON → [`NormalizedPrescription`].
//!
//! The OCR service returns whatever it managed to read. Any key may be
//! missing, `null`, an empty string, or of the wrong type. This module maps
//! that onto the strict display record field by field, each with its own
//! default, and never fails: missing data degrades to defaults.
//!
//! ## Field policy
//!
//! | Source path | Target | When absent |
//! |---|---|---|
//! | `pharmacy.name` | `pharmacy_name` | [`UNKNOWN`] |
//! | `dispensingDate` | `dispensing_date` | today, `YYYY-MM-DD` |
//! | `patient.name` | `patient_name` | `None` |
//! | `pharmacy.address` | `pharmacy_address` | `None` |
//! | `pharmacy.phoneNumber` | `pharmacy_phone` | `None` |
//! | `prescribingDoctor` | `prescribing_doctor` | `None` |
//! | `totalAmount` / `copayment` | same | `None` (finite numbers only) |
//! | `medicines[]` | `medicines` | empty |
//! | `medicines[].name` | `name` | [`UNKNOWN`] |
//! | `medicines[].dosagePerIntake` / `dailyFrequency` / `totalDays` | same | `""` |
//! | `medicines[].usageInstruction` / `effect` | same | `None` |
//!
//! Text is cleaned before the policy applies: invisible characters are
//! stripped and whitespace collapsed, so a value that is only whitespace is
//! absent. A number supplied where text is expected is kept as its decimal
//! rendering.

use crate::output::{MedicineLine, NormalizedPrescription, UNKNOWN};
use crate::pipeline::extract::RawExtractionResult;
use chrono::{Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// Normalize against today's local date.
pub fn normalize(raw: &RawExtractionResult) -> NormalizedPrescription {
    normalize_with_today(raw, Local::now().date_naive())
}

/// Normalize, using `today` when the response carries no dispensing date.
pub fn normalize_with_today(raw: &RawExtractionResult, today: NaiveDate) -> NormalizedPrescription {
    let pharmacy = raw.get("pharmacy");
    let patient = raw.get("patient");

    let pharmacy_name = text(field(pharmacy, "name")).unwrap_or_else(|| {
        debug!("pharmacy.name missing, using placeholder");
        UNKNOWN.to_string()
    });

    let dispensing_date = match text(raw.get("dispensingDate")) {
        Some(date) => canonical_date(&date).unwrap_or(date),
        None => {
            debug!("dispensingDate missing, using {}", today);
            today.format("%Y-%m-%d").to_string()
        }
    };

    let medicines = match raw.get("medicines") {
        Some(Value::Array(items)) => items.iter().map(medicine_line).collect(),
        _ => Vec::new(),
    };

    NormalizedPrescription {
        pharmacy_name,
        dispensing_date,
        patient_name: text(field(patient, "name")),
        pharmacy_address: text(field(pharmacy, "address")),
        pharmacy_phone: text(field(pharmacy, "phoneNumber")),
        prescribing_doctor: text(raw.get("prescribingDoctor")),
        total_amount: amount(raw.get("totalAmount")),
        copayment: amount(raw.get("copayment")),
        medicines,
    }
}

fn medicine_line(item: &Value) -> MedicineLine {
    match item {
        Value::Object(_) => MedicineLine {
            name: text(item.get("name")).unwrap_or_else(|| UNKNOWN.to_string()),
            dosage_per_intake: text(item.get("dosagePerIntake")).unwrap_or_default(),
            daily_frequency: text(item.get("dailyFrequency")).unwrap_or_default(),
            total_days: text(item.get("totalDays")).unwrap_or_default(),
            usage_instruction: text(item.get("usageInstruction")),
            effect: text(item.get("effect")),
        },
        // The service occasionally lists bare drug names.
        Value::String(_) => MedicineLine {
            name: text(Some(item)).unwrap_or_else(|| UNKNOWN.to_string()),
            ..MedicineLine::unknown()
        },
        _ => MedicineLine::unknown(),
    }
}

/// `parent.key`, when `parent` is an object.
fn field<'a>(parent: Option<&'a Value>, key: &str) -> Option<&'a Value> {
    parent.and_then(|p| p.as_object()).and_then(|o| o.get(key))
}

/// Cleaned text, or `None` when absent, empty or not text-like.
fn text(value: Option<&Value>) -> Option<String> {
    let raw = match value? {
        Value::String(s) => clean_text(s),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!raw.is_empty()).then_some(raw)
}

/// Finite numbers only; everything else is absent.
fn amount(value: Option<&Value>) -> Option<f64> {
    value?.as_f64().filter(|v| v.is_finite())
}

// ── Text cleanup ────────────────────────────────────────────────────────────

static INVISIBLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x{200B}-\x{200D}\x{2060}\x{FEFF}\x{00AD}]").unwrap());

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Strip zero-width characters, collapse whitespace runs, trim.
pub fn clean_text(input: &str) -> String {
    let visible = INVISIBLE_RE.replace_all(input, "");
    WHITESPACE_RE.replace_all(&visible, " ").trim().to_string()
}

// ── Dates ───────────────────────────────────────────────────────────────────

/// `2025-11-20`, `2025.11.20.`, `2025/11/20`, `2025년 11월 20일`
static DATE_SEPARATED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})\s*(?:[./-]|년)\s*(\d{1,2})\s*(?:[./-]|월)\s*(\d{1,2})\s*(?:일)?\s*\.?$")
        .unwrap()
});

/// `20251120`
static DATE_COMPACT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})(\d{2})(\d{2})$").unwrap());

/// `2025-11-20T09:30:00+09:00`, `2025-11-20 09:30`
static DATE_TIMESTAMP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})[T ]").unwrap());

/// Canonicalise a recognised date to `YYYY-MM-DD`.
///
/// Returns `None` for unrecognised shapes and for impossible dates such as
/// `2025-02-30`; the caller keeps the original text in that case.
pub fn canonical_date(input: &str) -> Option<String> {
    let caps = DATE_SEPARATED_RE
        .captures(input)
        .or_else(|| DATE_COMPACT_RE.captures(input))
        .or_else(|| DATE_TIMESTAMP_RE.captures(input))?;

    let year: i32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let day: u32 = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day).map(|d| d.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawExtractionResult {
        RawExtractionResult::try_from(value).expect("test input is an object")
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 20).unwrap()
    }

    #[test]
    fn empty_object_gets_all_defaults() {
        let p = normalize_with_today(&raw(json!({})), today());
        assert_eq!(p.pharmacy_name, UNKNOWN);
        assert_eq!(p.dispensing_date, "2025-11-20");
        assert!(p.medicines.is_empty());
        assert_eq!(p.patient_name, None);
        assert_eq!(p.pharmacy_address, None);
        assert_eq!(p.pharmacy_phone, None);
        assert_eq!(p.prescribing_doctor, None);
        assert_eq!(p.total_amount, None);
        assert_eq!(p.copayment, None);
    }

    #[test]
    fn single_empty_medicine_gets_defaults() {
        let p = normalize_with_today(&raw(json!({"medicines": [{}]})), today());
        assert_eq!(p.medicines.len(), 1);
        let m = &p.medicines[0];
        assert_eq!(m.name, UNKNOWN);
        assert_eq!(m.dosage_per_intake, "");
        assert_eq!(m.daily_frequency, "");
        assert_eq!(m.total_days, "");
        assert_eq!(m.usage_instruction, None);
        assert_eq!(m.effect, None);
    }

    #[test]
    fn pharmacy_and_amount_only() {
        let input = raw(json!({"pharmacy": {"name": "행복약국"}, "totalAmount": 15000}));
        let p = normalize(&input);
        assert_eq!(p.pharmacy_name, "행복약국");
        assert_eq!(p.total_amount, Some(15000.0));
        assert_eq!(p.copayment, None);
        assert_eq!(
            p.dispensing_date,
            Local::now().date_naive().format("%Y-%m-%d").to_string()
        );
    }

    #[test]
    fn absent_or_wrong_typed_medicines_is_empty() {
        for input in [
            json!({}),
            json!({"medicines": []}),
            json!({"medicines": null}),
            json!({"medicines": "타이레놀"}),
            json!({"medicines": {"name": "x"}}),
        ] {
            let p = normalize_with_today(&raw(input.clone()), today());
            assert!(p.medicines.is_empty(), "input: {input}");
        }
    }

    #[test]
    fn medicine_order_is_preserved() {
        let input = raw(json!({"medicines": [
            {"name": "아모잘탄정"},
            {"name": "가스모틴정"},
            {"name": "아모잘탄정"},
        ]}));
        let names: Vec<_> = normalize_with_today(&input, today())
            .medicines
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["아모잘탄정", "가스모틴정", "아모잘탄정"]);
    }

    #[test]
    fn full_response_maps_every_field() {
        let input = raw(json!({
            "pharmacy": {"name": "온누리약국", "address": "서울시 종로구 1", "phoneNumber": "02-123-4567"},
            "patient": {"name": "김영희"},
            "dispensingDate": "2025.11.18",
            "prescribingDoctor": "박지성",
            "totalAmount": 12300,
            "copayment": 3700.5,
            "medicines": [{
                "name": "노바스크정 5mg",
                "dosagePerIntake": "1정",
                "dailyFrequency": "1회",
                "totalDays": "30일",
                "usageInstruction": "아침 식후 30분",
                "effect": "혈압 강하"
            }]
        }));
        let p = normalize_with_today(&input, today());
        assert_eq!(p.pharmacy_name, "온누리약국");
        assert_eq!(p.pharmacy_address.as_deref(), Some("서울시 종로구 1"));
        assert_eq!(p.pharmacy_phone.as_deref(), Some("02-123-4567"));
        assert_eq!(p.patient_name.as_deref(), Some("김영희"));
        assert_eq!(p.prescribing_doctor.as_deref(), Some("박지성"));
        assert_eq!(p.dispensing_date, "2025-11-18");
        assert_eq!(p.total_amount, Some(12300.0));
        assert_eq!(p.copayment, Some(3700.5));
        let m = &p.medicines[0];
        assert_eq!(m.name, "노바스크정 5mg");
        assert_eq!(m.dosage_per_intake, "1정");
        assert_eq!(m.daily_frequency, "1회");
        assert_eq!(m.total_days, "30일");
        assert_eq!(m.usage_instruction.as_deref(), Some("아침 식후 30분"));
        assert_eq!(m.effect.as_deref(), Some("혈압 강하"));
    }

    #[test]
    fn non_numeric_amounts_are_absent() {
        let p = normalize_with_today(
            &raw(json!({"totalAmount": "15,000원", "copayment": null})),
            today(),
        );
        assert_eq!(p.total_amount, None);
        assert_eq!(p.copayment, None);

        let zero = normalize_with_today(&raw(json!({"copayment": 0})), today());
        assert_eq!(zero.copayment, Some(0.0));
    }

    #[test]
    fn overflowing_amounts_are_absent() {
        let input = RawExtractionResult::from_slice(
            br#"{"pharmacy":{"name":"A"},"totalAmount":1e400,"copayment":-1e400}"#,
        )
        .expect("out-of-range numbers still decode");
        let p = normalize_with_today(&input, today());
        assert_eq!(p.pharmacy_name, "A");
        assert_eq!(p.total_amount, None);
        assert_eq!(p.copayment, None);
    }

    #[test]
    fn blank_and_wrong_typed_text_is_absent() {
        let input = raw(json!({
            "pharmacy": {"name": "   ", "address": false},
            "patient": "김영희",
            "prescribingDoctor": ["x"],
            "medicines": [{"name": "\u{200B}", "usageInstruction": ""}]
        }));
        let p = normalize_with_today(&input, today());
        assert_eq!(p.pharmacy_name, UNKNOWN);
        assert_eq!(p.pharmacy_address, None);
        assert_eq!(p.patient_name, None);
        assert_eq!(p.prescribing_doctor, None);
        assert_eq!(p.medicines[0].name, UNKNOWN);
        assert_eq!(p.medicines[0].usage_instruction, None);
    }

    #[test]
    fn numbers_in_text_fields_are_rendered() {
        let input = raw(json!({"medicines": [{"name": "A", "dailyFrequency": 3, "totalDays": 7}]}));
        let m = &normalize_with_today(&input, today()).medicines[0];
        assert_eq!(m.daily_frequency, "3");
        assert_eq!(m.total_days, "7");
    }

    #[test]
    fn bare_string_and_scalar_entries_keep_position() {
        let input = raw(json!({"medicines": ["타이레놀", 42, {"name": "B"}]}));
        let meds = normalize_with_today(&input, today()).medicines;
        assert_eq!(meds.len(), 3);
        assert_eq!(meds[0].name, "타이레놀");
        assert_eq!(meds[1], MedicineLine::unknown());
        assert_eq!(meds[2].name, "B");
    }

    #[test]
    fn text_is_cleaned() {
        assert_eq!(clean_text("  아침\n  식후\t30분 "), "아침 식후 30분");
        assert_eq!(clean_text("타이\u{200B}레놀\u{FEFF}"), "타이레놀");
        assert_eq!(clean_text(" \u{00AD} "), "");
    }

    #[test]
    fn date_shapes() {
        assert_eq!(canonical_date("2025-11-20").as_deref(), Some("2025-11-20"));
        assert_eq!(canonical_date("2025.1.5").as_deref(), Some("2025-01-05"));
        assert_eq!(canonical_date("2025.11.20.").as_deref(), Some("2025-11-20"));
        assert_eq!(canonical_date("2025/11/20").as_deref(), Some("2025-11-20"));
        assert_eq!(canonical_date("20251120").as_deref(), Some("2025-11-20"));
        assert_eq!(canonical_date("2025년 11월 20일").as_deref(), Some("2025-11-20"));
        assert_eq!(
            canonical_date("2025-11-20T09:30:00+09:00").as_deref(),
            Some("2025-11-20")
        );
        assert_eq!(canonical_date("2025-02-30"), None);
        assert_eq!(canonical_date("어제"), None);
    }

    #[test]
    fn unrecognised_date_text_is_kept() {
        let p = normalize_with_today(&raw(json!({"dispensingDate": "11월 20일"})), today());
        assert_eq!(p.dispensing_date, "11월 20일");
    }

    #[test]
    fn never_panics_on_odd_shapes() {
        for input in [
            json!({"pharmacy": null, "patient": 1, "medicines": [null, [], {}]}),
            json!({"dispensingDate": 20251120}),
            json!({"totalAmount": 1e308, "copayment": -0.0}),
            json!({"medicines": [{"name": {"ko": "x"}, "totalDays": true}]}),
        ] {
            let _ = normalize_with_today(&raw(input), today());
        }
    }
}
