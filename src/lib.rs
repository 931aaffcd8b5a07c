// Booking Revenue - Core Library
// Capture → parse → merge → aggregate → forecast → report.
// Exposes all modules for use in the CLI and tests.

pub mod error;
pub mod category;
pub mod rules;          // Category classifier: ordered regex rules
pub mod appointment;
pub mod parser;         // Raw calendar entries → appointments
pub mod capture;        // Accumulates intercepted calendar responses
pub mod deduplication;  // Incremental merge by identity key
pub mod store;          // Raw Data sheet (CSV backend)
pub mod db;             // SQLite backend + import-run events
pub mod temporal;
pub mod stats;
pub mod aggregation;
pub mod forecast;
pub mod report;
pub mod config;

// Re-export commonly used types
pub use error::RevenueError;
pub use category::{Category, MegaCategory};
pub use rules::{ClassificationRule, Classification, RuleEngine, default_rules};
pub use appointment::{Appointment, identity_key};
pub use parser::{CalendarResponse, EntryParser, RawEntry, Rejection};
pub use capture::{CaptureAccumulator, CaptureStats, CapturedResponse};
pub use deduplication::{DeduplicationEngine, MergeReport};
pub use store::{AppointmentStore, CsvStore, StoreBackend};
pub use db::{Event, SqliteStore};
pub use temporal::{IsoWeek, YearMonth};
pub use aggregation::{AggregateBundle, AggregationEngine, ClientTier, aggregate};
pub use forecast::{
    ForecastConfig, ForecastEngine, ForecastOutcome, ForecastResult, MonthlyPoint, FORECAST_HORIZON,
};
pub use report::{Cell, Column, ColumnKind, Report, ReportBuilder, Table};
pub use config::{Settings, StoreKind};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
