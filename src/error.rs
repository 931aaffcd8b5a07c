// ⚠️ Typed errors - structural failures the caller must be able to tell apart
// from "no data". I/O plumbing above this layer wraps these in anyhow.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RevenueError {
    #[error("Store sheet is missing required column '{0}'")]
    MissingColumn(String),

    #[error("Store sheet has no header row (expected: {expected})")]
    BadHeader { expected: String },

    #[error("Malformed store row {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    #[error("Calendar response has no 'calendars' list")]
    MissingCalendars,

    #[error("Invalid classification rule '{id}': {reason}")]
    InvalidRule { id: String, reason: String },

    #[error("Unknown category label: {0}")]
    UnknownCategory(String),

    #[error("Invalid month '{0}': expected YYYY-MM")]
    InvalidMonth(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RevenueError>;
