// 📡 Capture Accumulator - collects appointments from intercepted responses
//
// The browser layer intercepts network responses and hands them over here,
// either directly (`ingest_response`) or through a channel (`drain`). The
// accumulator owns everything it collects; nothing is process-global.

use crate::appointment::Appointment;
use crate::parser::{CalendarResponse, EntryParser, Rejection};
use crate::rules::RuleEngine;
use anyhow::{Context, Result};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::mpsc::Receiver;

/// URL fragment of the calendar entries endpoint
pub const CALENDAR_ENTRIES_ENDPOINT: &str = "calendars-entries";

/// One intercepted network response
#[derive(Debug, Clone)]
pub struct CapturedResponse {
    pub url: String,
    pub body: Vec<u8>,
}

impl CapturedResponse {
    pub fn new(url: &str, body: Vec<u8>) -> Self {
        CapturedResponse {
            url: url.to_string(),
            body,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureStats {
    pub responses_seen: usize,
    pub responses_matched: usize,
    pub responses_failed: usize,
    pub entries_seen: usize,
    pub entries_rejected: usize,
    pub appointments: usize,
}

pub struct CaptureAccumulator<'a> {
    parser: EntryParser<'a>,
    appointments: Vec<Appointment>,
    stats: CaptureStats,
}

impl<'a> CaptureAccumulator<'a> {
    pub fn new(rules: &'a RuleEngine) -> Self {
        CaptureAccumulator {
            parser: EntryParser::new(rules),
            appointments: Vec::new(),
            stats: CaptureStats::default(),
        }
    }

    /// Feed one intercepted response. Non-calendar URLs are ignored; a
    /// broken calendar body is logged and counted, never propagated.
    pub fn ingest_response(&mut self, response: &CapturedResponse) {
        self.stats.responses_seen += 1;

        if !response.url.contains(CALENDAR_ENTRIES_ENDPOINT) {
            return;
        }
        self.stats.responses_matched += 1;
        info!("📡 Captured calendar API call");

        match CalendarResponse::from_slice(&response.body) {
            Ok(entries) => self.ingest_entries(&entries),
            Err(e) => {
                self.stats.responses_failed += 1;
                error!("Error parsing API response from {}: {}", response.url, e);
            }
        }
    }

    /// Feed raw entries already extracted from a response envelope
    pub fn ingest_entries(&mut self, entries: &[Value]) {
        for entry in entries {
            self.stats.entries_seen += 1;

            match self.parser.parse_value(entry) {
                Ok(parsed) => {
                    if !parsed.is_empty() {
                        info!("  → Parsed {} appointments", parsed.len());
                    }
                    self.stats.appointments += parsed.len();
                    self.appointments.extend(parsed);
                }
                Err(Rejection::NotAppointment(_)) => {
                    self.stats.entries_rejected += 1;
                }
                Err(rejection) => {
                    self.stats.entries_rejected += 1;
                    warn!("Error parsing appointment: {}", rejection);
                }
            }
        }
    }

    /// Consume responses until every sender has hung up
    pub fn drain(&mut self, rx: &Receiver<CapturedResponse>) {
        for response in rx.iter() {
            self.ingest_response(&response);
        }
    }

    /// Load a dump written by the capture layer: one response envelope or
    /// a JSON array of them. An unreadable file is an error; a broken
    /// envelope inside it is only counted.
    pub fn ingest_dump(&mut self, path: &Path) -> Result<()> {
        let content = fs::read(path)
            .with_context(|| format!("Failed to read capture dump: {}", path.display()))?;
        let value: Value = serde_json::from_slice(&content)
            .with_context(|| format!("Capture dump is not JSON: {}", path.display()))?;

        let url = format!("file://{}/{}", path.display(), CALENDAR_ENTRIES_ENDPOINT);
        let envelopes = match value {
            Value::Array(items) => items,
            other => vec![other],
        };

        for envelope in envelopes {
            let body = serde_json::to_vec(&envelope)?;
            self.ingest_response(&CapturedResponse::new(&url, body));
        }

        Ok(())
    }

    pub fn appointments(&self) -> &[Appointment] {
        &self.appointments
    }

    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }

    /// Hand the collected batch to the merge step
    pub fn finish(self) -> (Vec<Appointment>, CaptureStats) {
        info!(
            "=== TOTAL APPOINTMENTS CAPTURED: {} ({} entries rejected) ===",
            self.appointments.len(),
            self.stats.entries_rejected
        );
        (self.appointments, self.stats)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::mpsc;
    use std::thread;

    fn calendar_body(date: &str, client: &str, service: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "calendars": [{
                "entries": [
                    {
                        "type": 0,
                        "localStart": {"dateStr": date},
                        "payload": {
                            "client": {"firstname": client, "lastname": ""},
                            "bookedServices": [{"name": service, "price": {"type": 1, "fixed": 100}}]
                        }
                    },
                    {"type": 2, "localStart": {"dateStr": date}}
                ]
            }]
        }))
        .unwrap()
    }

    #[test]
    fn test_only_calendar_urls_are_parsed() {
        let rules = RuleEngine::new();
        let mut acc = CaptureAccumulator::new(&rules);

        acc.ingest_response(&CapturedResponse::new(
            "https://app.example/api/v1/calendars-entries?week=3",
            calendar_body("2024-03-01", "Ana", "Pensat"),
        ));
        acc.ingest_response(&CapturedResponse::new(
            "https://app.example/api/v1/profile",
            calendar_body("2024-03-01", "Ana", "Pensat"),
        ));

        let stats = acc.stats().clone();
        assert_eq!(stats.responses_seen, 2);
        assert_eq!(stats.responses_matched, 1);
        assert_eq!(stats.entries_seen, 2);
        assert_eq!(stats.entries_rejected, 1);
        assert_eq!(acc.appointments().len(), 1);
    }

    #[test]
    fn test_broken_body_is_counted_not_fatal() {
        let rules = RuleEngine::new();
        let mut acc = CaptureAccumulator::new(&rules);

        acc.ingest_response(&CapturedResponse::new("/calendars-entries", b"<html>".to_vec()));
        acc.ingest_response(&CapturedResponse::new("/calendars-entries", br#"{"x": 1}"#.to_vec()));
        acc.ingest_response(&CapturedResponse::new(
            "/calendars-entries",
            calendar_body("2024-03-02", "Ioana", "Epilat"),
        ));

        let (appointments, stats) = acc.finish();
        assert_eq!(stats.responses_failed, 2);
        assert_eq!(appointments.len(), 1);
        assert_eq!(appointments[0].client, "Ioana");
    }

    #[test]
    fn test_drain_channel() {
        let rules = RuleEngine::new();
        let mut acc = CaptureAccumulator::new(&rules);
        let (tx, rx) = mpsc::channel();

        let producer = thread::spawn(move || {
            for day in 1..=3 {
                let date = format!("2024-03-0{}", day);
                tx.send(CapturedResponse::new(
                    "/calendars-entries",
                    calendar_body(&date, "Ana", "Pensat"),
                ))
                .unwrap();
            }
        });

        producer.join().unwrap();
        acc.drain(&rx);

        assert_eq!(acc.appointments().len(), 3);
    }

    #[test]
    fn test_ingest_dump_array() {
        let rules = RuleEngine::new();
        let mut acc = CaptureAccumulator::new(&rules);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("week.json");
        let first: Value = serde_json::from_slice(&calendar_body("2024-03-01", "Ana", "Pensat")).unwrap();
        let second: Value = serde_json::from_slice(&calendar_body("2024-03-08", "Ana", "Pensat")).unwrap();
        fs::write(&path, serde_json::to_vec(&json!([first, second])).unwrap()).unwrap();

        acc.ingest_dump(&path).unwrap();

        assert_eq!(acc.stats().responses_matched, 2);
        assert_eq!(acc.appointments().len(), 2);
    }

    #[test]
    fn test_ingest_dump_missing_file() {
        let rules = RuleEngine::new();
        let mut acc = CaptureAccumulator::new(&rules);

        assert!(acc.ingest_dump(Path::new("/nonexistent/capture.json")).is_err());
    }
}
