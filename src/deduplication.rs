// 🔍 Deduplication Engine - Incremental merge of captured appointments
// Identity = (date, client, service). Price is not part of identity.

use crate::appointment::Appointment;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ============================================================================
// MERGE REPORT
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeReport {
    /// Captured appointments not yet in the store, in capture order
    pub new: Vec<Appointment>,

    /// Captured appointments skipped because their key was already known
    pub duplicates: usize,
}

impl MergeReport {
    pub fn is_empty(&self) -> bool {
        self.new.is_empty()
    }

    pub fn summary(&self) -> String {
        format!("{} new, {} duplicates skipped", self.new.len(), self.duplicates)
    }
}

// ============================================================================
// DEDUPLICATION ENGINE
// ============================================================================

pub struct DeduplicationEngine;

impl DeduplicationEngine {
    pub fn new() -> Self {
        DeduplicationEngine
    }

    /// Subset of `captured` whose identity key is in neither `existing_keys`
    /// nor earlier in `captured` itself (first capture wins).
    pub fn merge(&self, existing_keys: &HashSet<String>, captured: &[Appointment]) -> MergeReport {
        let mut seen: HashSet<String> = HashSet::new();
        let mut report = MergeReport::default();

        for appt in captured {
            let key = appt.identity_key();
            if existing_keys.contains(&key) || !seen.insert(key) {
                report.duplicates += 1;
                continue;
            }
            report.new.push(appt.clone());
        }

        info!("Found {} NEW appointments", report.new.len());
        for appt in &report.new {
            info!(
                "  + {} - {} - {} - {:.2}",
                appt.date, appt.client, appt.service, appt.price
            );
        }

        report
    }
}

impl Default for DeduplicationEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Stable sort by date: equal dates keep their original relative order
pub fn sort_by_date(appointments: &mut [Appointment]) {
    appointments.sort_by_key(|a| a.date);
}

// ============================================================================
// TESTS
// ============================================================================
