use crate::category::{Category, MegaCategory};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Delimiter of the persisted identity key. Previously written stores use
/// `"{date}|{client}|{service}"`, so this must not change.
pub const KEY_DELIMITER: &str = "|";

/// One booked service on one day for one client.
///
/// Immutable once parsed: appointments are merged into the store once and
/// never edited afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub date: NaiveDate,
    pub client: String,
    pub service: String,
    pub category: Category,
    pub mega_category: MegaCategory,
    /// Non-negative amount in the configured currency
    pub price: f64,
}

impl Appointment {
    pub fn new(date: NaiveDate, client: &str, service: &str, category: Category, price: f64) -> Self {
        Appointment {
            date,
            client: client.to_string(),
            service: service.to_string(),
            category,
            mega_category: category.mega_category(),
            price,
        }
    }

    /// Deduplication key. Price is deliberately not part of it: a later,
    /// corrected price for the same booking counts as a duplicate.
    pub fn identity_key(&self) -> String {
        identity_key(self.date, &self.client, &self.service)
    }
}

/// Key for a (date, client, service) triple, matching the persisted format
pub fn identity_key(date: NaiveDate, client: &str, service: &str) -> String {
    format!(
        "{}{delim}{}{delim}{}",
        date.format("%Y-%m-%d"),
        client,
        service,
        delim = KEY_DELIMITER
    )
}
