// 🗄️ Appointment Store - the persisted "Raw Data" sheet
//
// In memory the store is a date-ordered list with a key index. On disk it
// is read completely before use and rewritten completely after a merge.

use crate::appointment::Appointment;
use crate::category::{Category, MegaCategory};
use crate::deduplication::sort_by_date;
use crate::error::RevenueError;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::{info, warn};
use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Header row of the raw appointment sheet
pub const RAW_DATA_HEADER: [&str; 6] = ["Date", "Client", "Service", "Category", "Mega Category", "Price"];

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// Invariant: no two appointments share an identity key; ordered by date.
#[derive(Debug, Clone, Default)]
pub struct AppointmentStore {
    appointments: Vec<Appointment>,
    keys: HashSet<String>,
}

impl AppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from persisted rows. Repeated keys keep the first row.
    pub fn from_appointments(rows: Vec<Appointment>) -> Self {
        let mut store = AppointmentStore::new();
        let mut repeated = 0;

        for appt in rows {
            if store.keys.insert(appt.identity_key()) {
                store.appointments.push(appt);
            } else {
                repeated += 1;
            }
        }

        if repeated > 0 {
            warn!("Store contained {} rows with repeated identity keys; kept first of each", repeated);
        }

        sort_by_date(&mut store.appointments);
        store
    }

    pub fn keys(&self) -> &HashSet<String> {
        &self.keys
    }

    pub fn appointments(&self) -> &[Appointment] {
        &self.appointments
    }

    pub fn len(&self) -> usize {
        self.appointments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.appointments.is_empty()
    }

    /// Append merged appointments and restore date order. Returns how many
    /// were actually added; keys already present are ignored.
    pub fn append(&mut self, new: Vec<Appointment>) -> usize {
        let mut added = 0;
        for appt in new {
            if self.keys.insert(appt.identity_key()) {
                self.appointments.push(appt);
                added += 1;
            }
        }
        sort_by_date(&mut self.appointments);
        added
    }
}

// ============================================================================
// BACKENDS
// ============================================================================

/// Where the store lives between runs
pub trait StoreBackend {
    /// Read the whole store
    fn load(&self) -> Result<AppointmentStore>;

    /// Persist the whole store
    fn save(&self, store: &AppointmentStore) -> Result<()>;

    /// Human-readable location for logs
    fn describe(&self) -> String;
}

/// CSV rendition of the "Raw Data" sheet
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        CsvStore {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl StoreBackend for CsvStore {
    fn load(&self) -> Result<AppointmentStore> {
        if !self.path.exists() {
            info!("No store at {}, starting empty", self.path.display());
            return Ok(AppointmentStore::new());
        }

        info!("Loading existing data from: {}", self.path.display());
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open store: {}", self.path.display()))?;
        let rows = read_raw_sheet(file)
            .with_context(|| format!("Failed to read store: {}", self.path.display()))?;

        let store = AppointmentStore::from_appointments(rows);
        info!("  Loaded {} existing appointments", store.len());
        Ok(store)
    }

    fn save(&self, store: &AppointmentStore) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        // Write next to the target, then swap in
        let tmp = self.path.with_extension("csv.tmp");
        let file = File::create(&tmp)
            .with_context(|| format!("Failed to create file: {}", tmp.display()))?;
        write_raw_sheet(file, store.appointments())?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace store: {}", self.path.display()))?;

        info!("✓ Saved {} appointments to {}", store.len(), self.path.display());
        Ok(())
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}

// ============================================================================
// SHEET CODEC
// ============================================================================

struct Columns {
    date: usize,
    client: usize,
    service: usize,
    category: usize,
    mega: Option<usize>,
    price: usize,
}

impl Columns {
    fn locate(headers: &csv::StringRecord) -> std::result::Result<Self, RevenueError> {
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(RevenueError::BadHeader {
                expected: RAW_DATA_HEADER.join(","),
            });
        }

        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        let require = |name: &str| find(name).ok_or_else(|| RevenueError::MissingColumn(name.to_string()));

        Ok(Columns {
            date: require("Date")?,
            client: require("Client")?,
            service: require("Service")?,
            category: require("Category")?,
            mega: find("Mega Category"),
            // Older sheets label it "Price (RON)"
            price: headers
                .iter()
                .position(|h| h.trim().starts_with("Price"))
                .ok_or_else(|| RevenueError::MissingColumn("Price".to_string()))?,
        })
    }
}

/// Parse a raw sheet. Rows with an empty date are skipped; anything else
/// that does not parse is an error naming the line.
pub fn read_raw_sheet<R: std::io::Read>(reader: R) -> std::result::Result<Vec<Appointment>, RevenueError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let cols = Columns::locate(&headers)?;

    let mut rows = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let record = record?;
        // +2: 1-indexed and header row
        let line = idx + 2;
        let field = |i: usize| record.get(i).unwrap_or("").trim();

        let date_field = field(cols.date);
        if date_field.is_empty() {
            continue;
        }
        let malformed = |reason: String| RevenueError::MalformedRow { line, reason };

        // Spreadsheet exports may append a time part
        let date = NaiveDate::parse_from_str(date_field.get(..10).unwrap_or(date_field), "%Y-%m-%d")
            .map_err(|_| malformed(format!("bad date '{}'", date_field)))?;

        let category = Category::from_label(field(cols.category))
            .map_err(|e| malformed(e.to_string()))?;

        let mega_category = match cols.mega.map(field) {
            Some(label) if !label.is_empty() => MegaCategory::from_label(label),
            _ => category.mega_category(),
        };

        let price_field = field(cols.price);
        let price = if price_field.is_empty() {
            0.0
        } else {
            price_field
                .parse::<f64>()
                .map_err(|_| malformed(format!("bad price '{}'", price_field)))?
        };

        rows.push(Appointment {
            date,
            client: field(cols.client).to_string(),
            service: field(cols.service).to_string(),
            category,
            mega_category,
            price,
        });
    }

    Ok(rows)
}

pub fn write_raw_sheet<W: std::io::Write>(writer: W, appointments: &[Appointment]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(RAW_DATA_HEADER)?;

    for appt in appointments {
        wtr.write_record([
            appt.date.format("%Y-%m-%d").to_string(),
            appt.client.clone(),
            appt.service.clone(),
            appt.category.as_str().to_string(),
            appt.mega_category.as_str().to_string(),
            format!("{:.2}", appt.price),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
