//! Hand-off boundary to the medicine list.
//!
//! The scan pipeline never assigns identifiers or stores anything. On commit
//! it passes the prescription to a [`MedicineSink`], which owns identity and
//! persistence. [`MedicineList`] is the in-memory sink the CLI and tests use.

use crate::output::{NormalizedPrescription, UNKNOWN};
use chrono::{Days, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Identifier assigned by the sink.
pub type MedicineId = u64;

/// Receives committed prescriptions.
pub trait MedicineSink {
    /// Store every medicine line of `prescription` and return the new ids,
    /// in line order.
    fn add_prescription(&mut self, prescription: NormalizedPrescription) -> Vec<MedicineId>;
}

/// A medicine as shown in the user's list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicineEntry {
    pub id: MedicineId,
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    /// Dispensing date, `YYYY-MM-DD` when it was recognised.
    pub start_date: String,
    /// Last day of the course, when the day count and start date are known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    /// Where it was dispensed; empty when the pharmacy was not read.
    pub pharmacy: String,
    pub notes: String,
}

/// In-memory medicine list. Ids start at 1 and are never reused.
#[derive(Debug, Default, Clone)]
pub struct MedicineList {
    entries: Vec<MedicineEntry>,
    next_id: MedicineId,
}

impl MedicineList {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MedicineEntry> {
        self.entries.iter()
    }

    pub fn get(&self, id: MedicineId) -> Option<&MedicineEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Remove an entry; returns it if it existed.
    pub fn remove(&mut self, id: MedicineId) -> Option<MedicineEntry> {
        let pos = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(pos))
    }

    /// Days from `today` until the course ends; negative once it has ended.
    pub fn days_remaining(&self, id: MedicineId, today: NaiveDate) -> Option<i64> {
        let end = self.get(id)?.end_date?;
        Some((end - today).num_days())
    }

    fn allocate_id(&mut self) -> MedicineId {
        // `Default` leaves next_id at 0.
        if self.next_id == 0 {
            self.next_id = 1;
        }
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl MedicineSink for MedicineList {
    fn add_prescription(&mut self, prescription: NormalizedPrescription) -> Vec<MedicineId> {
        let start = NaiveDate::parse_from_str(&prescription.dispensing_date, "%Y-%m-%d").ok();
        let pharmacy = if prescription.pharmacy_is_unknown() {
            String::new()
        } else {
            prescription.pharmacy_name.clone()
        };

        let mut ids = Vec::with_capacity(prescription.medicines.len());
        for line in prescription.medicines {
            let id = self.allocate_id();
            let end_date = start.zip(course_days(&line.total_days)).and_then(|(s, d)| {
                s.checked_add_days(Days::new(d.saturating_sub(1)))
            });
            self.entries.push(MedicineEntry {
                id,
                name: if line.name.is_empty() {
                    UNKNOWN.to_string()
                } else {
                    line.name
                },
                dosage: line.dosage_per_intake,
                frequency: line.daily_frequency,
                start_date: prescription.dispensing_date.clone(),
                end_date,
                pharmacy: pharmacy.clone(),
                notes: line.usage_instruction.unwrap_or_default(),
            });
            ids.push(id);
        }
        debug!("Medicine list now holds {} entries", self.entries.len());
        ids
    }
}

static DIGITS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

/// First positive number in a free-text day count: `"7일"` → 7, `"30 days"` → 30.
fn course_days(total_days: &str) -> Option<u64> {
    DIGITS_RE
        .find(total_days)
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .filter(|&d| d > 0)
}
