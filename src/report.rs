// 📋 Report Builder - named tables with typed columns
//
// Every column carries a semantic tag, so renderers format by tag instead
// of guessing from header text. Writers: one CSV per table plus report.json.

use crate::aggregation::AggregateBundle;
use crate::forecast::ForecastOutcome;
use crate::stats::round_to;
use crate::store::{AppointmentStore, RAW_DATA_HEADER};
use crate::temporal::YearMonth;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::info;
use serde::{Serialize, Serializer};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

pub const RAW_DATA: &str = "Raw Data";
pub const MONTHLY_SUMMARY: &str = "Monthly Summary";
pub const MONTHLY_MEGA_SUMMARY: &str = "Monthly Mega Summary";
pub const CATEGORY_TOTALS: &str = "Category Totals";
pub const MEGA_CATEGORY_TOTALS: &str = "Mega Category Totals";
pub const DAILY_SUMMARY: &str = "Daily Summary";
pub const WEEKLY_SUMMARY: &str = "Weekly Summary";
pub const CLIENT_ANALYSIS: &str = "Client Analysis";
pub const SERVICE_ANALYSIS: &str = "Service Analysis";
pub const REVENUE_TRENDS: &str = "Revenue Trends";
pub const TREND_SUMMARY: &str = "Trend Summary";
pub const PEAK_PERFORMANCE: &str = "Peak Performance";
pub const TOP_DAYS: &str = "Top Days";
pub const REVENUE_FORECAST: &str = "Revenue Forecast";
pub const FORECAST_STATISTICS: &str = "Forecast Statistics";

// ============================================================================
// TABLE MODEL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Text,
    Date,
    Month,
    Currency,
    /// Values are 0-100
    Percentage,
    Count,
    Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn new(name: &str, kind: ColumnKind) -> Self {
        Column {
            name: name.to_string(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Date(NaiveDate),
    Month(YearMonth),
    Number(f64),
    Count(u64),
    /// A derived value that is undefined for this row
    Empty,
}

impl Cell {
    pub fn text(s: &str) -> Self {
        Cell::Text(s.to_string())
    }

    /// Rounded to 2 decimals
    pub fn number(v: f64) -> Self {
        Cell::Number(round_to(v, 2))
    }

    pub fn count(n: usize) -> Self {
        Cell::Count(n as u64)
    }

    pub fn optional(v: Option<f64>) -> Self {
        v.map_or(Cell::Empty, Cell::number)
    }

    /// Display form under the given column tag
    pub fn render(&self, kind: ColumnKind) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Date(d) => d.format("%Y-%m-%d").to_string(),
            Cell::Month(m) => m.to_string(),
            Cell::Count(n) => n.to_string(),
            Cell::Empty => String::new(),
            Cell::Number(v) => match kind {
                ColumnKind::Percentage => format!("{:.1}%", v),
                ColumnKind::Count => format!("{:.0}", v),
                _ => format!("{:.2}", v),
            },
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Cell::Text(s) => serializer.serialize_str(s),
            Cell::Date(d) => serializer.collect_str(&d.format("%Y-%m-%d")),
            Cell::Month(m) => serializer.collect_str(m),
            Cell::Number(v) => serializer.serialize_f64(*v),
            Cell::Count(n) => serializer.serialize_u64(*n),
            Cell::Empty => serializer.serialize_none(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(name: &str, columns: Vec<Column>) -> Self {
        Table {
            name: name.to_string(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Short rows are padded with `Cell::Empty`
    pub fn push(&mut self, mut row: Vec<Cell>) {
        debug_assert!(row.len() <= self.columns.len(), "row wider than table {}", self.name);
        row.resize(self.columns.len(), Cell::Empty);
        self.rows.push(row);
    }

    pub fn header(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn rendered_rows(&self) -> impl Iterator<Item = Vec<String>> + '_ {
        self.rows.iter().map(move |row| {
            row.iter()
                .zip(&self.columns)
                .map(|(cell, col)| cell.render(col.kind))
                .collect()
        })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// File stem used by the CSV writer, e.g. "monthly_summary"
    pub fn file_stem(&self) -> String {
        self.name.to_lowercase().replace(' ', "_")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub generated_on: NaiveDate,
    pub currency: String,
    pub tables: Vec<Table>,
}

impl Report {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Write `<stem>.csv` for every table and `report.json`. Returns the
    /// paths written.
    pub fn write_to_dir(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create report directory: {}", dir.display()))?;

        let mut written = Vec::with_capacity(self.tables.len() + 1);
        for table in &self.tables {
            let path = dir.join(format!("{}.csv", table.file_stem()));
            write_table_csv(table, &path)?;
            written.push(path);
        }

        let json_path = dir.join("report.json");
        let file = File::create(&json_path)
            .with_context(|| format!("Failed to create file: {}", json_path.display()))?;
        serde_json::to_writer_pretty(file, self)?;
        written.push(json_path);

        info!("✓ Wrote {} report tables to {}", self.tables.len(), dir.display());
        Ok(written)
    }
}

fn write_table_csv(table: &Table, path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;

    wtr.write_record(table.header())?;
    for row in table.rendered_rows() {
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

// ============================================================================
// REPORT BUILDER
// ============================================================================

pub struct ReportBuilder {
    currency: String,
}

impl ReportBuilder {
    pub fn new(currency: &str) -> Self {
        ReportBuilder {
            currency: currency.to_string(),
        }
    }

    fn money(&self, label: &str) -> Column {
        Column::new(&format!("{} ({})", label, self.currency), ColumnKind::Currency)
    }

    pub fn build(
        &self,
        store: &AppointmentStore,
        bundle: &AggregateBundle,
        forecast: &ForecastOutcome,
        generated_on: NaiveDate,
    ) -> Report {
        let tables = vec![
            self.raw_data(store),
            self.monthly_summary(bundle),
            self.monthly_mega_summary(bundle),
            self.category_totals(bundle),
            self.mega_category_totals(bundle),
            self.daily_summary(bundle),
            self.weekly_summary(bundle),
            self.client_analysis(bundle),
            self.service_analysis(bundle),
            self.revenue_trends(bundle),
            self.trend_summary(bundle),
            self.peak_performance(bundle),
            self.top_days(bundle),
            self.revenue_forecast(forecast),
            self.forecast_statistics(forecast),
        ];

        Report {
            generated_on,
            currency: self.currency.clone(),
            tables,
        }
    }

    fn raw_data(&self, store: &AppointmentStore) -> Table {
        let kinds = [
            ColumnKind::Date,
            ColumnKind::Text,
            ColumnKind::Text,
            ColumnKind::Text,
            ColumnKind::Text,
            ColumnKind::Currency,
        ];
        let columns = RAW_DATA_HEADER
            .iter()
            .zip(kinds)
            .map(|(name, kind)| Column::new(name, kind))
            .collect();

        let mut table = Table::new(RAW_DATA, columns);
        for a in store.appointments() {
            table.push(vec![
                Cell::Date(a.date),
                Cell::text(&a.client),
                Cell::text(&a.service),
                Cell::text(a.category.as_str()),
                Cell::text(a.mega_category.as_str()),
                Cell::number(a.price),
            ]);
        }
        table
    }

    fn monthly_summary(&self, bundle: &AggregateBundle) -> Table {
        let mut table = Table::new(
            MONTHLY_SUMMARY,
            vec![
                Column::new("Month", ColumnKind::Month),
                Column::new("Category", ColumnKind::Text),
                Column::new("Bookings", ColumnKind::Count),
                self.money("Revenue"),
                self.money("Average"),
            ],
        );
        for r in &bundle.monthly_by_category {
            table.push(vec![
                Cell::Month(r.month),
                Cell::text(r.category.as_str()),
                Cell::count(r.count),
                Cell::number(r.revenue),
                Cell::number(r.average),
            ]);
        }
        table
    }

    fn monthly_mega_summary(&self, bundle: &AggregateBundle) -> Table {
        let mut table = Table::new(
            MONTHLY_MEGA_SUMMARY,
            vec![
                Column::new("Month", ColumnKind::Month),
                Column::new("Mega Category", ColumnKind::Text),
                Column::new("Bookings", ColumnKind::Count),
                self.money("Revenue"),
                self.money("Average"),
            ],
        );
        for r in &bundle.monthly_by_mega {
            table.push(vec![
                Cell::Month(r.month),
                Cell::text(r.mega_category.as_str()),
                Cell::count(r.count),
                Cell::number(r.revenue),
                Cell::number(r.average),
            ]);
        }
        table
    }

    fn category_totals(&self, bundle: &AggregateBundle) -> Table {
        let mut table = Table::new(
            CATEGORY_TOTALS,
            vec![
                Column::new("Category", ColumnKind::Text),
                Column::new("Bookings", ColumnKind::Count),
                self.money("Revenue"),
                self.money("Average"),
                Column::new("Revenue Share", ColumnKind::Percentage),
                Column::new("Unique Clients", ColumnKind::Count),
                Column::new("Unique Services", ColumnKind::Count),
                self.money("Revenue per Client"),
                Column::new("Retention Rate", ColumnKind::Percentage),
            ],
        );
        for r in &bundle.categories {
            table.push(vec![
                Cell::text(r.category.as_str()),
                Cell::count(r.count),
                Cell::number(r.revenue),
                Cell::number(r.average),
                Cell::number(r.share_pct),
                Cell::count(r.unique_clients),
                Cell::count(r.unique_services),
                Cell::number(r.revenue_per_client),
                Cell::number(r.retention_pct),
            ]);
        }
        table
    }

    fn mega_category_totals(&self, bundle: &AggregateBundle) -> Table {
        let mut table = Table::new(
            MEGA_CATEGORY_TOTALS,
            vec![
                Column::new("Mega Category", ColumnKind::Text),
                Column::new("Bookings", ColumnKind::Count),
                self.money("Revenue"),
                self.money("Average"),
                Column::new("Revenue Share", ColumnKind::Percentage),
                Column::new("Bookings Share", ColumnKind::Percentage),
                Column::new("Unique Clients", ColumnKind::Count),
                Column::new("Unique Services", ColumnKind::Count),
                self.money("Revenue per Client"),
            ],
        );
        for r in &bundle.mega_categories {
            table.push(vec![
                Cell::text(r.mega_category.as_str()),
                Cell::count(r.count),
                Cell::number(r.revenue),
                Cell::number(r.average),
                Cell::number(r.share_pct),
                Cell::number(r.bookings_share_pct),
                Cell::count(r.unique_clients),
                Cell::count(r.unique_services),
                Cell::number(r.revenue_per_client),
            ]);
        }
        table
    }

    fn daily_summary(&self, bundle: &AggregateBundle) -> Table {
        let mut table = Table::new(
            DAILY_SUMMARY,
            vec![
                Column::new("Date", ColumnKind::Date),
                Column::new("Weekday", ColumnKind::Text),
                self.money("Revenue"),
                Column::new("Services", ColumnKind::Count),
                self.money("Average"),
                Column::new("Unique Clients", ColumnKind::Count),
            ],
        );
        for r in &bundle.daily {
            table.push(vec![
                Cell::Date(r.date),
                Cell::text(&r.weekday),
                Cell::number(r.revenue),
                Cell::count(r.services),
                Cell::number(r.average),
                Cell::count(r.unique_clients),
            ]);
        }
        table
    }

    fn weekly_summary(&self, bundle: &AggregateBundle) -> Table {
        let mut table = Table::new(
            WEEKLY_SUMMARY,
            vec![
                Column::new("Week", ColumnKind::Text),
                Column::new("Start", ColumnKind::Date),
                Column::new("End", ColumnKind::Date),
                self.money("Revenue"),
                Column::new("Services", ColumnKind::Count),
                Column::new("Unique Clients", ColumnKind::Count),
                self.money("4-Week Moving Average"),
                Column::new("Deviation from Average", ColumnKind::Percentage),
            ],
        );
        for r in &bundle.weekly {
            table.push(vec![
                Cell::Text(r.week.to_string()),
                Cell::Date(r.start_date),
                Cell::Date(r.end_date),
                Cell::number(r.revenue),
                Cell::count(r.services),
                Cell::count(r.unique_clients),
                Cell::number(r.moving_average),
                Cell::optional(r.deviation_pct),
            ]);
        }
        table
    }

    fn client_analysis(&self, bundle: &AggregateBundle) -> Table {
        let mut table = Table::new(
            CLIENT_ANALYSIS,
            vec![
                Column::new("Client", ColumnKind::Text),
                Column::new("First Visit", ColumnKind::Date),
                Column::new("Last Visit", ColumnKind::Date),
                Column::new("Visits", ColumnKind::Count),
                self.money("Total Spent"),
                self.money("Average Spend"),
                Column::new("Days Since Last Visit", ColumnKind::Count),
                Column::new("Revenue Percentile", ColumnKind::Percentage),
                Column::new("Tier", ColumnKind::Text),
            ],
        );
        for r in &bundle.clients {
            table.push(vec![
                Cell::text(&r.client),
                Cell::Date(r.first_visit),
                Cell::Date(r.last_visit),
                Cell::count(r.visits),
                Cell::number(r.total_spent),
                Cell::number(r.average_spend),
                Cell::Count(r.days_since_last_visit.max(0) as u64),
                Cell::number(r.revenue_percentile_pct),
                Cell::text(r.tier.as_str()),
            ]);
        }
        table
    }

    fn service_analysis(&self, bundle: &AggregateBundle) -> Table {
        let mut table = Table::new(
            SERVICE_ANALYSIS,
            vec![
                Column::new("Service", ColumnKind::Text),
                Column::new("Category", ColumnKind::Text),
                Column::new("Bookings", ColumnKind::Count),
                self.money("Revenue"),
                self.money("Average"),
                Column::new("Unique Clients", ColumnKind::Count),
                Column::new("Revenue Contribution", ColumnKind::Percentage),
            ],
        );
        for r in &bundle.services {
            table.push(vec![
                Cell::text(&r.service),
                Cell::text(r.category.as_str()),
                Cell::count(r.bookings),
                Cell::number(r.revenue),
                Cell::number(r.average),
                Cell::count(r.unique_clients),
                Cell::number(r.contribution_pct),
            ]);
        }
        table
    }

    fn revenue_trends(&self, bundle: &AggregateBundle) -> Table {
        let mut table = Table::new(
            REVENUE_TRENDS,
            vec![
                Column::new("Month", ColumnKind::Month),
                self.money("Revenue"),
                Column::new("Bookings", ColumnKind::Count),
                self.money("Average Booking Value"),
                Column::new("Unique Clients", ColumnKind::Count),
                Column::new("Revenue Growth", ColumnKind::Percentage),
                Column::new("Bookings Growth", ColumnKind::Percentage),
            ],
        );
        for r in &bundle.monthly_totals {
            table.push(vec![
                Cell::Month(r.month),
                Cell::number(r.revenue),
                Cell::count(r.bookings),
                Cell::number(r.average_booking_value),
                Cell::count(r.unique_clients),
                Cell::optional(r.revenue_growth_pct),
                Cell::optional(r.bookings_growth_pct),
            ]);
        }
        table
    }

    fn trend_summary(&self, bundle: &AggregateBundle) -> Table {
        let trend = &bundle.trend;
        let mut table = Table::new(
            TREND_SUMMARY,
            vec![
                Column::new("Metric", ColumnKind::Text),
                self.money("Revenue"),
                Column::new("Period", ColumnKind::Text),
            ],
        );

        table.push(vec![
            Cell::text("Average Monthly Revenue"),
            Cell::number(trend.average_monthly_revenue),
            Cell::text("all months"),
        ]);
        table.push(vec![
            Cell::text("Average Weekly Revenue"),
            Cell::number(trend.average_weekly_revenue),
            Cell::text("last 12 weeks"),
        ]);

        if let Some(best) = trend
            .best_month
            .and_then(|m| bundle.monthly_totals.iter().find(|r| r.month == m))
        {
            table.push(vec![
                Cell::text("Best Month"),
                Cell::number(best.revenue),
                Cell::Text(best.month.long_name()),
            ]);
        }
        if let Some(best) = trend
            .best_week
            .and_then(|w| bundle.weekly.iter().find(|r| r.week == w))
        {
            table.push(vec![
                Cell::text("Best Week"),
                Cell::number(best.revenue),
                Cell::Text(best.week.to_string()),
            ]);
        }
        table
    }

    fn peak_performance(&self, bundle: &AggregateBundle) -> Table {
        let mut table = Table::new(
            PEAK_PERFORMANCE,
            vec![
                Column::new("Weekday", ColumnKind::Text),
                self.money("Average Daily Revenue"),
                self.money("Total Revenue"),
                Column::new("Average Daily Bookings", ColumnKind::Decimal),
            ],
        );
        for r in &bundle.weekdays {
            table.push(vec![
                Cell::text(&r.weekday),
                Cell::number(r.average_daily_revenue),
                Cell::number(r.total_revenue),
                Cell::number(r.average_daily_bookings),
            ]);
        }
        table
    }

    fn top_days(&self, bundle: &AggregateBundle) -> Table {
        let mut table = Table::new(
            TOP_DAYS,
            vec![
                Column::new("Rank", ColumnKind::Count),
                Column::new("Date", ColumnKind::Date),
                Column::new("Weekday", ColumnKind::Text),
                self.money("Revenue"),
                Column::new("Bookings", ColumnKind::Count),
            ],
        );
        for (i, r) in bundle.top_days.iter().enumerate() {
            table.push(vec![
                Cell::count(i + 1),
                Cell::Date(r.date),
                Cell::text(&r.weekday),
                Cell::number(r.revenue),
                Cell::count(r.bookings),
            ]);
        }
        table
    }

    fn revenue_forecast(&self, forecast: &ForecastOutcome) -> Table {
        let mut table = Table::new(
            REVENUE_FORECAST,
            vec![
                Column::new("Forecast Month", ColumnKind::Month),
                Column::new("Months Ahead", ColumnKind::Count),
                self.money("Conservative"),
                self.money("Moderate"),
                self.money("Optimistic"),
                Column::new("Monthly Growth Rate", ColumnKind::Percentage),
            ],
        );

        match forecast {
            ForecastOutcome::Forecast(result) => {
                for m in &result.months {
                    table.push(vec![
                        Cell::Month(m.month),
                        Cell::count(m.months_ahead as usize),
                        Cell::number(m.conservative),
                        Cell::number(m.moderate),
                        Cell::number(m.optimistic),
                        Cell::number(m.growth_rate * 100.0),
                    ]);
                }
            }
            ForecastOutcome::Insufficient { available, required } => {
                table.push(vec![Cell::Text(format!(
                    "Insufficient data for forecasting: {} full months available, {} required",
                    available, required
                ))]);
            }
        }
        table
    }

    fn forecast_statistics(&self, forecast: &ForecastOutcome) -> Table {
        let mut table = Table::new(
            FORECAST_STATISTICS,
            vec![
                Column::new("Metric", ColumnKind::Text),
                self.money("Amount"),
                Column::new("Rate", ColumnKind::Percentage),
                Column::new("Months", ColumnKind::Count),
            ],
        );

        let amount = |label: &str, v: f64| vec![Cell::text(label), Cell::number(v)];
        let rate = |label: &str, v: Option<f64>| vec![Cell::text(label), Cell::Empty, Cell::optional(v)];
        let months = |label: &str, n: usize| vec![Cell::text(label), Cell::Empty, Cell::Empty, Cell::count(n)];

        match forecast {
            ForecastOutcome::Forecast(result) => {
                let s = &result.statistics;
                table.push(amount("All-Time Average", s.all_time_average));
                table.push(amount("Last 3 Months Average", s.last_3_average));
                table.push(amount("Last 6 Months Average", s.last_6_average));
                table.push(amount("Baseline (Recent Median)", s.baseline));
                table.push(amount("Stable Period Std Dev", s.stable_std_dev));
                table.push(amount("Stable Period Min", s.stable_min));
                table.push(amount("Stable Period Max", s.stable_max));
                table.push(rate("Median Monthly Growth", s.median_growth.map(|g| g * 100.0)));
                table.push(rate("Applied Growth Rate", Some(s.applied_growth * 100.0)));
                table.push(rate("Coefficient of Variation", Some(s.coefficient_of_variation_pct)));
                table.push(months("Months Used", s.months_used));
                table.push(months("Stable Period Months", s.stable_months));
                table.push(months("Growth Samples", s.growth_samples));
                for removed in &result.removed_partial_months {
                    table.push(vec![
                        Cell::Text(format!(
                            "Removed Partial Month {} ({} bookings)",
                            removed.month, removed.bookings
                        )),
                        Cell::number(removed.revenue),
                    ]);
                }
            }
            ForecastOutcome::Insufficient { available, required } => {
                table.push(months("Months Available", *available));
                table.push(months("Months Required", *required));
            }
        }
        table
    }
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new("RON")
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::aggregate;
    use crate::appointment::Appointment;
    use crate::category::Category;
    use crate::forecast::ForecastEngine;

    fn create_test_appointment(date: &str, client: &str, service: &str, category: Category, price: f64) -> Appointment {
        Appointment::new(
            NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            client,
            service,
            category,
            price,
        )
    }

    fn build_report(store: &AppointmentStore, today: &str) -> Report {
        let today = NaiveDate::parse_from_str(today, "%Y-%m-%d").unwrap();
        let bundle = aggregate(store);
        let forecast = ForecastEngine::new().forecast(&bundle.monthly_points(), today);
        ReportBuilder::new("RON").build(store, &bundle, &forecast, today)
    }

    fn small_store() -> AppointmentStore {
        AppointmentStore::from_appointments(vec![
            create_test_appointment("2024-01-02", "Ana", "Pensat", Category::Pensat, 50.0),
            create_test_appointment("2024-01-09", "Maria", "Epilat", Category::Epilat, 80.5),
        ])
    }

    #[test]
    fn test_all_tables_present() {
        let report = build_report(&small_store(), "2024-02-01");
        let names: Vec<&str> = report.tables.iter().map(|t| t.name.as_str()).collect();

        assert_eq!(names.len(), 15);
        assert_eq!(names[0], RAW_DATA);
        assert!(names.contains(&REVENUE_FORECAST));
        for table in &report.tables {
            assert!(table.rows.iter().all(|r| r.len() == table.columns.len()), "{}", table.name);
        }
    }

    #[test]
    fn test_raw_data_header_and_rendering() {
        let report = build_report(&small_store(), "2024-02-01");
        let raw = report.table(RAW_DATA).unwrap();

        assert_eq!(raw.header(), RAW_DATA_HEADER.to_vec());
        let rows: Vec<Vec<String>> = raw.rendered_rows().collect();
        assert_eq!(rows[1], vec!["2024-01-09", "Maria", "Epilat", "Epilat", "Epilare", "80.50"]);
    }

    #[test]
    fn test_percentage_rendering_and_tags() {
        let report = build_report(&small_store(), "2024-02-01");
        let totals = report.table(CATEGORY_TOTALS).unwrap();
        let share = totals.column_index("Revenue Share").unwrap();

        assert_eq!(totals.columns[share].kind, ColumnKind::Percentage);
        assert_eq!(totals.columns[2].name, "Revenue (RON)");
        assert_eq!(totals.columns[2].kind, ColumnKind::Currency);

        let first: Vec<String> = totals.rendered_rows().next().unwrap();
        assert_eq!(first[0], "Epilat");
        assert_eq!(first[share], "61.7%");
    }

    #[test]
    fn test_insufficient_forecast_is_one_explanatory_row() {
        let report = build_report(&small_store(), "2024-02-01");
        let forecast = report.table(REVENUE_FORECAST).unwrap();

        assert_eq!(forecast.rows.len(), 1);
        match &forecast.rows[0][0] {
            Cell::Text(msg) => assert!(msg.starts_with("Insufficient data")),
            other => panic!("expected text, got {:?}", other),
        }
        assert!(forecast.rows[0][1..].iter().all(|c| *c == Cell::Empty));
    }

    #[test]
    fn test_empty_cells_render_blank_and_null() {
        let report = build_report(&small_store(), "2024-02-01");
        let trends = report.table(REVENUE_TRENDS).unwrap();
        let growth = trends.column_index("Revenue Growth").unwrap();

        let first: Vec<String> = trends.rendered_rows().next().unwrap();
        assert_eq!(first[growth], "");

        let json = serde_json::to_value(trends).unwrap();
        assert!(json["rows"][0][growth].is_null());
        assert_eq!(json["columns"][growth]["kind"], "percentage");
    }

    #[test]
    fn test_write_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        let report = build_report(&small_store(), "2024-02-01");

        let written = report.write_to_dir(&dir.path().join("out")).unwrap();

        assert_eq!(written.len(), report.tables.len() + 1);
        let monthly = fs::read_to_string(dir.path().join("out").join("monthly_summary.csv")).unwrap();
        assert!(monthly.starts_with("Month,Category,Bookings,Revenue (RON),Average (RON)"));
        assert!(monthly.contains("2024-01,Epilat,1,80.50,80.50"));

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("out").join("report.json")).unwrap()).unwrap();
        assert_eq!(json["currency"], "RON");
        assert_eq!(json["tables"].as_array().unwrap().len(), 15);
    }
}
