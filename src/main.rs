mod cli;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use std::path::PathBuf;

use booking_revenue::{
    aggregate, AppointmentStore, CaptureAccumulator, DeduplicationEngine, Event, ForecastEngine,
    ForecastOutcome, ReportBuilder, Settings, SqliteStore, StoreKind,
};
use cli::{Cli, Commands};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Import { captures, no_report } => run_import(&settings, &captures, no_report)?,
        Commands::Report => run_report(&settings)?,
        Commands::Classify { name } => run_classify(&settings, &name)?,
        Commands::History { limit } => run_history(&settings, limit)?,
    }

    Ok(())
}

fn run_import(settings: &Settings, captures: &[PathBuf], no_report: bool) -> Result<()> {
    println!("📡 Import - captured calendar responses → store");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Parse captures
    println!("\n📂 Reading {} capture file(s)...", captures.len());
    let rules = settings.rule_engine()?;
    let mut accumulator = CaptureAccumulator::new(&rules);
    for path in captures {
        accumulator.ingest_dump(path)?;
    }
    let (captured, stats) = accumulator.finish();
    println!(
        "✓ Parsed {} appointments from {} entries ({} rejected)",
        captured.len(),
        stats.entries_seen,
        stats.entries_rejected
    );

    // 2. Load store
    let backend = settings.backend();
    println!("\n🗄️  Loading store ({})...", backend.describe());
    let mut store = backend.load()?;
    println!("✓ Store contains {} appointments", store.len());

    // 3. Merge
    println!("\n🔍 Merging...");
    let merge = DeduplicationEngine::new().merge(store.keys(), &captured);
    println!("✓ {}", merge.summary());

    // 4. Persist
    let added = store.append(merge.new);
    if added > 0 {
        backend.save(&store)?;
        println!("💾 Saved {} appointments ({} new)", store.len(), added);
    } else {
        println!("✓ No new appointments to add");
    }

    if settings.store.backend == StoreKind::Sqlite {
        let event = Event::new(
            "import",
            serde_json::json!({
                "captures": captures.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
                "entries_seen": stats.entries_seen,
                "entries_rejected": stats.entries_rejected,
                "captured": captured.len(),
                "new": added,
                "duplicates": merge.duplicates,
                "store_size": store.len(),
            }),
            "cli",
        );
        SqliteStore::new(&settings.store.path).record_run(&event)?;
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if no_report {
        println!("✅ Import complete");
        return Ok(());
    }

    build_report(settings, &store)
}

fn run_report(settings: &Settings) -> Result<()> {
    let backend = settings.backend();
    println!("📊 Loading store ({})...", backend.describe());
    let store = backend.load()?;
    println!("✓ Loaded {} appointments\n", store.len());

    build_report(settings, &store)
}

fn build_report(settings: &Settings, store: &AppointmentStore) -> Result<()> {
    let today = Local::now().date_naive();

    let bundle = aggregate(store);
    let forecast = ForecastEngine::with_config(settings.forecast.clone()).forecast(&bundle.monthly_points(), today);
    let report = ReportBuilder::new(&settings.currency).build(store, &bundle, &forecast, today);

    let written = report
        .write_to_dir(&settings.report.output_dir)
        .with_context(|| format!("Failed to write report to {}", settings.report.output_dir.display()))?;

    println!("📋 Report: {} files in {}", written.len(), settings.report.output_dir.display());
    println!(
        "   Total: {:.2} {} from {} bookings",
        bundle.total.revenue, settings.currency, bundle.total.count
    );

    match &forecast {
        ForecastOutcome::Forecast(result) => {
            println!(
                "🔮 Forecast (baseline {:.2}, growth {:.2}%/month):",
                result.statistics.baseline,
                result.statistics.applied_growth * 100.0
            );
            for m in &result.months {
                println!(
                    "   {}  conservative {:>10.2}  moderate {:>10.2}  optimistic {:>10.2}",
                    m.month, m.conservative, m.moderate, m.optimistic
                );
            }
        }
        ForecastOutcome::Insufficient { available, required } => {
            println!(
                "⚠️  Forecast skipped: {} full months of data, need {}",
                available, required
            );
        }
    }

    println!("✅ Done");
    Ok(())
}

fn run_classify(settings: &Settings, name: &str) -> Result<()> {
    let rules = settings.rule_engine()?;
    let result = rules.classify(name);

    println!("🏷️  {}", name);
    println!("   Category:      {}", result.category);
    println!("   Mega category: {}", result.mega_category);
    match &result.rule_id {
        Some(id) => println!("   Rule:          {}", id),
        None => println!("   Rule:          (no match, default)"),
    }

    Ok(())
}

fn run_history(settings: &Settings, limit: usize) -> Result<()> {
    if settings.store.backend != StoreKind::Sqlite {
        eprintln!("❌ Import history is only recorded with the sqlite backend");
        eprintln!("   Set [store] backend = \"sqlite\" in BookingRevenue.toml");
        std::process::exit(1);
    }

    let runs = SqliteStore::new(&settings.store.path).runs(limit)?;
    if runs.is_empty() {
        println!("No import runs recorded yet");
        return Ok(());
    }

    println!("🕐 Last {} import runs", runs.len());
    for run in &runs {
        println!(
            "   {}  {}  new={}  duplicates={}  store={}",
            run.timestamp.format("%Y-%m-%d %H:%M:%S"),
            run.event_type,
            run.data["new"],
            run.data["duplicates"],
            run.data["store_size"]
        );
    }

    Ok(())
}
