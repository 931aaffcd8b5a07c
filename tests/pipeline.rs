// End-to-end: capture → merge → store → aggregate → forecast → report

use booking_revenue::{
    aggregate, AppointmentStore, CaptureAccumulator, CapturedResponse, Category, CsvStore,
    DeduplicationEngine, ForecastEngine, ForecastOutcome, ReportBuilder, RuleEngine, SqliteStore,
    StoreBackend,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::fs;

const SERVICES: [(&str, i64); 4] = [
    ("Pensat + vopsit", 6000),
    ("Epilat inghinal", 9000),
    ("Laminare sprancene", 15000),
    ("Tratament Oxygeneo", 20000),
];

fn entry(date: &str, client: &str, service: &str, value: i64) -> Value {
    json!({
        "type": 0,
        "localStart": {"dateStr": date},
        "payload": {
            "client": {"firstname": client, "lastname": "Test"},
            "bookedServices": [{
                "name": service,
                "customPrice": {"type": "Fixed", "fixed": {"amount": {"value": value, "scale": 2}}}
            }]
        }
    })
}

/// One calendar envelope per month, 2024-01 through 2024-08, ten bookings each
fn monthly_envelopes() -> Vec<Value> {
    (1..=8)
        .map(|month| {
            let mut entries: Vec<Value> = (0..10)
                .map(|i| {
                    let (service, value) = SERVICES[i % SERVICES.len()];
                    let date = format!("2024-{:02}-{:02}", month, i + 1);
                    let client = format!("Client{}", i % 6);
                    entry(&date, &client, service, value + month as i64 * 100)
                })
                .collect();
            // Non-appointment entries are ignored
            entries.push(json!({"type": 3, "localStart": {"dateStr": "2024-01-01"}}));
            json!({"calendars": [{"entries": entries}]})
        })
        .collect()
}

fn capture(rules: &RuleEngine, envelopes: &[Value]) -> Vec<booking_revenue::Appointment> {
    let mut acc = CaptureAccumulator::new(rules);
    for envelope in envelopes {
        acc.ingest_response(&CapturedResponse::new(
            "https://calendar.example/api/calendars-entries?from=2024-01-01",
            serde_json::to_vec(envelope).unwrap(),
        ));
    }
    let (appointments, stats) = acc.finish();
    assert_eq!(stats.responses_failed, 0);
    appointments
}

#[test]
fn test_full_pipeline_with_csv_store() {
    let dir = tempfile::tempdir().unwrap();
    let backend = CsvStore::new(dir.path().join("revenue_raw_data.csv"));
    let rules = RuleEngine::new();
    let dedup = DeduplicationEngine::new();

    // First import
    let captured = capture(&rules, &monthly_envelopes());
    assert_eq!(captured.len(), 80);

    let mut store = backend.load().unwrap();
    assert!(store.is_empty());
    let merge = dedup.merge(store.keys(), &captured);
    assert_eq!(merge.new.len(), 80);
    store.append(merge.new);
    backend.save(&store).unwrap();

    // Re-import the same captures: nothing new
    let mut reloaded = backend.load().unwrap();
    assert_eq!(reloaded.appointments(), store.appointments());
    let again = dedup.merge(reloaded.keys(), &captured);
    assert!(again.is_empty());
    assert_eq!(reloaded.append(again.new), 0);

    // Classification flowed through
    let laminare = reloaded
        .appointments()
        .iter()
        .find(|a| a.service == "Laminare sprancene")
        .unwrap();
    assert_eq!(laminare.category, Category::Laminare);
    assert_eq!(laminare.price, 151.0);

    // Aggregate + forecast
    let bundle = aggregate(&reloaded);
    assert_eq!(bundle.monthly_totals.len(), 8);
    assert_eq!(bundle.total.count, 80);

    let today = NaiveDate::from_ymd_opt(2024, 8, 20).unwrap();
    let forecast = ForecastEngine::new().forecast(&bundle.monthly_points(), today);
    let result = match &forecast {
        ForecastOutcome::Forecast(r) => r,
        other => panic!("expected a forecast, got {:?}", other),
    };
    let months: Vec<String> = result.months.iter().map(|m| m.month.to_string()).collect();
    assert_eq!(months, vec!["2024-09", "2024-10", "2024-11"]);
    for m in &result.months {
        assert!(m.conservative <= m.moderate && m.moderate <= m.optimistic);
    }

    // Report
    let report = ReportBuilder::new("RON").build(&reloaded, &bundle, &forecast, today);
    let out = dir.path().join("report");
    report.write_to_dir(&out).unwrap();

    let raw = fs::read_to_string(out.join("raw_data.csv")).unwrap();
    assert!(raw.starts_with("Date,Client,Service,Category,Mega Category,Price"));
    assert_eq!(raw.lines().count(), 81);
    assert!(out.join("revenue_forecast.csv").exists());
    assert!(out.join("report.json").exists());

    // Rebuilding from the same store is identical
    let second = ReportBuilder::new("RON").build(&reloaded, &aggregate(&reloaded), &forecast, today);
    assert_eq!(report, second);
}

#[test]
fn test_sqlite_store_incremental_imports() {
    let dir = tempfile::tempdir().unwrap();
    let backend = SqliteStore::new(dir.path().join("revenue.db"));
    let rules = RuleEngine::new();
    let dedup = DeduplicationEngine::new();
    let envelopes = monthly_envelopes();

    // Import the first half, then everything
    for batch in [&envelopes[..4], &envelopes[..]] {
        let captured = capture(&rules, batch);
        let mut store = backend.load().unwrap();
        let merge = dedup.merge(store.keys(), &captured);
        if store.append(merge.new) > 0 {
            backend.save(&store).unwrap();
        }
    }

    let store = backend.load().unwrap();
    assert_eq!(store.len(), 80);
    let dates: Vec<NaiveDate> = store.appointments().iter().map(|a| a.date).collect();
    assert!(dates.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_short_history_reports_insufficient() {
    let rules = RuleEngine::new();
    let captured = capture(&rules, &monthly_envelopes()[..3]);
    let store = AppointmentStore::from_appointments(captured);

    let bundle = aggregate(&store);
    let today = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
    let forecast = ForecastEngine::new().forecast(&bundle.monthly_points(), today);

    assert!(matches!(forecast, ForecastOutcome::Insufficient { available: 3, required: 6 }));

    let report = ReportBuilder::default().build(&store, &bundle, &forecast, today);
    assert_eq!(report.table("Revenue Forecast").unwrap().rows.len(), 1);
}
