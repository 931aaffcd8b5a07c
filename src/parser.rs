// 🏗️ Entry Parser - calendar API entries → flat appointments
//
// The calendar API hands back loosely structured JSON. Everything is
// deserialized into an explicit schema first; absent fields become `None`
// and are resolved by fixed rules below. A malformed entry only loses that
// entry, never the batch.

use crate::appointment::Appointment;
use crate::error::RevenueError;
use crate::rules::RuleEngine;
use chrono::NaiveDate;
use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;

/// `type` discriminator value marking an appointment entry
pub const APPOINTMENT_ENTRY_TYPE: i64 = 0;

/// `price.type` value for a plain fixed list price
pub const FIXED_LIST_PRICE_TYPE: i64 = 1;

// ============================================================================
// RAW SCHEMA
// ============================================================================

/// Calendar API response envelope: `{"calendars": [{"entries": [...]}]}`
///
/// Entries stay as raw JSON values so that each one is validated on its own.
#[derive(Debug, Deserialize)]
pub struct CalendarResponse {
    #[serde(default)]
    pub calendars: Option<Vec<CalendarEntries>>,
}

#[derive(Debug, Deserialize)]
pub struct CalendarEntries {
    #[serde(default)]
    pub entries: Option<Vec<Value>>,
}

impl CalendarResponse {
    /// All entries of all calendars, in response order
    pub fn from_slice(body: &[u8]) -> Result<Vec<Value>, RevenueError> {
        let response: CalendarResponse = serde_json::from_slice(body)?;
        let calendars = response.calendars.ok_or(RevenueError::MissingCalendars)?;

        Ok(calendars
            .into_iter()
            .flat_map(|c| c.entries.unwrap_or_default())
            .collect())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEntry {
    #[serde(rename = "type", default)]
    pub kind: Option<i64>,

    #[serde(default)]
    pub local_start: Option<LocalStart>,

    #[serde(default)]
    pub payload: Option<EntryPayload>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalStart {
    #[serde(default)]
    pub date_str: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPayload {
    #[serde(default)]
    pub client: Option<RawClient>,

    #[serde(default)]
    pub booked_services: Option<Vec<BookedService>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawClient {
    #[serde(default)]
    pub firstname: Option<String>,

    #[serde(default)]
    pub lastname: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookedService {
    #[serde(default)]
    pub name: Option<String>,

    /// Kept raw; typed in `resolve_price` so a bad shape prices only this service at 0
    #[serde(default)]
    pub custom_price: Option<Value>,

    #[serde(default)]
    pub price: Option<Value>,
}

/// Per-booking price override, tagged by its `type` field
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum CustomPrice {
    Fixed {
        #[serde(default)]
        fixed: Option<FixedPrice>,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FixedPrice {
    #[serde(default)]
    pub amount: Option<ScaledAmount>,
}

/// Decimal encoded as integer `value` with `scale` implied decimal places
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScaledAmount {
    #[serde(default)]
    pub value: f64,

    #[serde(default)]
    pub scale: i64,
}

impl ScaledAmount {
    /// `scale <= 0` leaves the value as is
    pub fn to_decimal(&self) -> f64 {
        if self.scale <= 0 {
            self.value
        } else {
            self.value / 10f64.powi(self.scale.min(i32::MAX as i64) as i32)
        }
    }
}

/// Catalogue price of the service: `{type, fixed}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListPrice {
    #[serde(rename = "type", default)]
    pub kind: Option<i64>,

    #[serde(default)]
    pub fixed: Option<f64>,
}

// ============================================================================
// ENTRY KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Appointment,
    Other(i64),
    Missing,
}

impl RawEntry {
    pub fn kind(&self) -> EntryKind {
        match self.kind {
            Some(APPOINTMENT_ENTRY_TYPE) => EntryKind::Appointment,
            Some(other) => EntryKind::Other(other),
            None => EntryKind::Missing,
        }
    }

    pub fn date_str(&self) -> Option<&str> {
        self.local_start
            .as_ref()
            .and_then(|s| s.date_str.as_deref())
            .filter(|s| !s.trim().is_empty())
    }

    /// "First Last", trimmed; empty when the client record is absent
    pub fn client_name(&self) -> String {
        let client = self.payload.as_ref().and_then(|p| p.client.as_ref());
        match client {
            Some(c) => format!(
                "{} {}",
                c.firstname.as_deref().unwrap_or(""),
                c.lastname.as_deref().unwrap_or("")
            )
            .trim()
            .to_string(),
            None => String::new(),
        }
    }

    pub fn booked_services(&self) -> &[BookedService] {
        self.payload
            .as_ref()
            .and_then(|p| p.booked_services.as_deref())
            .unwrap_or(&[])
    }
}

impl BookedService {
    /// Outer `None`: no custom price. Inner `None`: present but malformed.
    pub fn custom_price(&self) -> Option<Option<CustomPrice>> {
        self.custom_price.as_ref().map(|v| typed_price(v, "customPrice"))
    }

    pub fn list_price(&self) -> Option<Option<ListPrice>> {
        self.price.as_ref().map(|v| typed_price(v, "price"))
    }

    /// Custom fixed price wins over the list price; anything else is 0.
    ///
    /// A present custom price still shadows the list price, even when it is
    /// not fixed or does not match any known shape.
    pub fn resolve_price(&self) -> f64 {
        let price = match (self.custom_price(), self.list_price()) {
            (Some(Some(CustomPrice::Fixed { fixed })), _) => fixed
                .as_ref()
                .and_then(|f| f.amount.as_ref())
                .map(ScaledAmount::to_decimal)
                .unwrap_or(0.0),
            (Some(_), _) => 0.0,
            (None, Some(Some(list))) if list.kind == Some(FIXED_LIST_PRICE_TYPE) => list.fixed.unwrap_or(0.0),
            _ => 0.0,
        };

        if price.is_finite() && price >= 0.0 {
            price
        } else {
            0.0
        }
    }
}

fn typed_price<T: serde::de::DeserializeOwned>(value: &Value, field: &str) -> Option<T> {
    if value.is_null() {
        return None;
    }
    match T::deserialize(value) {
        Ok(price) => Some(price),
        Err(e) => {
            debug!("Unreadable {} {}: {}", field, value, e);
            None
        }
    }
}

// ============================================================================
// REJECTION
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    NotAppointment(EntryKind),
    MissingDate,
    BadDate(String),
    Malformed(String),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::NotAppointment(kind) => write!(f, "not an appointment ({:?})", kind),
            Rejection::MissingDate => write!(f, "no localStart.dateStr"),
            Rejection::BadDate(s) => write!(f, "unparseable date '{}'", s),
            Rejection::Malformed(e) => write!(f, "malformed entry: {}", e),
        }
    }
}

// ============================================================================
// PARSER
// ============================================================================

pub struct EntryParser<'a> {
    rules: &'a RuleEngine,
}

impl<'a> EntryParser<'a> {
    pub fn new(rules: &'a RuleEngine) -> Self {
        EntryParser { rules }
    }

    /// One appointment per booked service, or the reason the entry was dropped
    pub fn parse_entry(&self, entry: &RawEntry) -> Result<Vec<Appointment>, Rejection> {
        let kind = entry.kind();
        if kind != EntryKind::Appointment {
            return Err(Rejection::NotAppointment(kind));
        }

        let date_str = entry.date_str().ok_or(Rejection::MissingDate)?;
        let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
            .map_err(|_| Rejection::BadDate(date_str.to_string()))?;

        let client = entry.client_name();

        Ok(entry
            .booked_services()
            .iter()
            .map(|service| {
                let name = service.name.as_deref().unwrap_or("");
                let classification = self.rules.classify(name);
                Appointment {
                    date,
                    client: client.clone(),
                    service: name.to_string(),
                    category: classification.category,
                    mega_category: classification.mega_category,
                    price: service.resolve_price(),
                }
            })
            .collect())
    }

    /// Validate a raw JSON entry against the schema, then parse it
    pub fn parse_value(&self, value: &Value) -> Result<Vec<Appointment>, Rejection> {
        let entry = RawEntry::deserialize(value).map_err(|e| Rejection::Malformed(e.to_string()))?;
        self.parse_entry(&entry)
    }

    /// Lenient form: rejections are logged and yield nothing
    pub fn parse(&self, value: &Value) -> Vec<Appointment> {
        match self.parse_value(value) {
            Ok(appointments) => appointments,
            Err(Rejection::NotAppointment(kind)) => {
                debug!("Skipping non-appointment entry {:?}", kind);
                Vec::new()
            }
            Err(rejection) => {
                warn!("Error parsing appointment: {}", rejection);
                Vec::new()
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
