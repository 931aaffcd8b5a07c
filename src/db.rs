use crate::appointment::Appointment;
use crate::category::{Category, MegaCategory};
use crate::store::{AppointmentStore, StoreBackend};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use log::info;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Audit trail entry, one per import run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(event_type: &str, data: serde_json::Value, actor: &str) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Appointments Table
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS appointments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            identity_key TEXT UNIQUE NOT NULL,
            date TEXT NOT NULL,
            client TEXT NOT NULL,
            service TEXT NOT NULL,
            category TEXT NOT NULL,
            mega_category TEXT NOT NULL,
            price REAL NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (import runs)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_appointments_date ON appointments(date)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp)",
        [],
    )?;

    Ok(())
}

/// Insert appointments, skipping any whose identity key is already stored.
/// Returns how many rows were inserted.
pub fn insert_appointments(conn: &Connection, appointments: &[Appointment]) -> Result<usize> {
    let mut inserted = 0;
    let mut duplicates = 0;

    for appt in appointments {
        let result = conn.execute(
            "INSERT INTO appointments (
                identity_key, date, client, service, category, mega_category, price
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                appt.identity_key(),
                appt.date.format("%Y-%m-%d").to_string(),
                appt.client,
                appt.service,
                appt.category.as_str(),
                appt.mega_category.as_str(),
                appt.price,
            ],
        );

        match result {
            Ok(_) => inserted += 1,
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                duplicates += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!("✓ Inserted: {} appointments", inserted);
    info!("✓ Skipped duplicates: {}", duplicates);

    Ok(inserted)
}

/// All appointments ordered by date, then insertion order
pub fn get_all_appointments(conn: &Connection) -> Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(
        "SELECT date, client, service, category, mega_category, price
         FROM appointments
         ORDER BY date ASC, id ASC",
    )?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, f64>(5)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(date, client, service, category, mega, price)| -> Result<Appointment> {
            let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .with_context(|| format!("Bad date in appointments table: {}", date))?;
            let category = Category::from_label(&category)?;
            Ok(Appointment {
                date,
                client,
                service,
                category,
                mega_category: MegaCategory::from_label(&mega),
                price,
            })
        })
        .collect()
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM appointments", [], |row| row.get(0))?;
    Ok(count)
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (event_id, timestamp, event_type, data, actor)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Most recent events first
pub fn get_events(conn: &Connection, limit: usize) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, data, actor
         FROM events
         ORDER BY timestamp DESC, id DESC
         LIMIT ?1",
    )?;

    let raw = stmt
        .query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(event_id, timestamp, event_type, data, actor)| -> Result<Event> {
            Ok(Event {
                event_id,
                timestamp: DateTime::parse_from_rfc3339(&timestamp)
                    .with_context(|| format!("Bad event timestamp: {}", timestamp))?
                    .with_timezone(&Utc),
                event_type,
                data: serde_json::from_str(&data).context("Bad event payload")?,
                actor,
            })
        })
        .collect()
}

// ============================================================================
// SQLITE BACKEND
// ============================================================================

pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        SqliteStore {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn open(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)
            .with_context(|| format!("Failed to open database: {}", self.path.display()))?;
        setup_database(&conn)?;
        Ok(conn)
    }

    /// Record one import run in the audit trail
    pub fn record_run(&self, event: &Event) -> Result<()> {
        let conn = self.open()?;
        insert_event(&conn, event)
    }

    pub fn runs(&self, limit: usize) -> Result<Vec<Event>> {
        let conn = self.open()?;
        get_events(&conn, limit)
    }
}

impl StoreBackend for SqliteStore {
    fn load(&self) -> Result<AppointmentStore> {
        let conn = self.open()?;
        let rows = get_all_appointments(&conn)?;
        info!("  Loaded {} existing appointments", rows.len());
        Ok(AppointmentStore::from_appointments(rows))
    }

    fn save(&self, store: &AppointmentStore) -> Result<()> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        insert_appointments(&tx, store.appointments())?;
        tx.commit()?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }
}
