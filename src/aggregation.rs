// 📊 Aggregation Engine - every derived table, rebuilt from the store
//
// All groupings go through BTreeMap/BTreeSet or an explicit sort key, so the
// same store always yields the same bundle, field for field.

use crate::appointment::Appointment;
use crate::category::{Category, MegaCategory};
use crate::forecast::MonthlyPoint;
use crate::stats::{mean, percent, percent_ranks, quantile, ratio_or_zero};
use crate::store::AppointmentStore;
use crate::temporal::{weekday_name, IsoWeek, YearMonth};
use chrono::{Datelike, Duration, NaiveDate};
use log::info;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// ROW TYPES
// ============================================================================

/// Count and summed revenue of a group
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Tally {
    pub count: usize,
    pub revenue: f64,
}

impl Tally {
    fn add(&mut self, price: f64) {
        self.count += 1;
        self.revenue += price;
    }

    /// Revenue per booking, 0 for an empty group
    pub fn average(&self) -> f64 {
        ratio_or_zero(self.revenue, self.count as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyCategoryStat {
    pub month: YearMonth,
    pub category: Category,
    pub count: usize,
    pub revenue: f64,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyMegaStat {
    pub month: YearMonth,
    pub mega_category: MegaCategory,
    pub count: usize,
    pub revenue: f64,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTotal {
    pub month: YearMonth,
    pub revenue: f64,
    pub bookings: usize,
    pub average_booking_value: f64,
    pub unique_clients: usize,
    /// None for the first month or when the previous month was 0
    pub revenue_growth_pct: Option<f64>,
    pub bookings_growth_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStat {
    pub category: Category,
    pub count: usize,
    pub revenue: f64,
    pub average: f64,
    pub share_pct: f64,
    pub unique_clients: usize,
    pub unique_services: usize,
    pub revenue_per_client: f64,
    pub retention_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MegaCategoryStat {
    pub mega_category: MegaCategory,
    pub count: usize,
    pub revenue: f64,
    pub average: f64,
    pub share_pct: f64,
    pub bookings_share_pct: f64,
    pub unique_clients: usize,
    pub unique_services: usize,
    pub revenue_per_client: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStat {
    pub date: NaiveDate,
    pub weekday: String,
    pub revenue: f64,
    pub services: usize,
    pub average: f64,
    pub unique_clients: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyStat {
    pub week: IsoWeek,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub revenue: f64,
    pub services: usize,
    pub unique_clients: usize,
    pub moving_average: f64,
    /// Omitted when the moving average or the week's revenue is 0
    pub deviation_pct: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ClientTier {
    #[serde(rename = "VIP")]
    Vip,
    Regular,
    Occasional,
    #[serde(rename = "New/Low")]
    NewLow,
}

impl ClientTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientTier::Vip => "VIP",
            ClientTier::Regular => "Regular",
            ClientTier::Occasional => "Occasional",
            ClientTier::NewLow => "New/Low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientStat {
    pub client: String,
    pub first_visit: NaiveDate,
    pub last_visit: NaiveDate,
    pub visits: usize,
    pub total_spent: f64,
    pub average_spend: f64,
    pub days_since_last_visit: i64,
    pub revenue_percentile_pct: f64,
    pub tier: ClientTier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStat {
    pub service: String,
    pub bookings: usize,
    pub revenue: f64,
    pub average: f64,
    pub unique_clients: usize,
    pub category: Category,
    pub contribution_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekdayStat {
    pub weekday: String,
    pub average_daily_revenue: f64,
    pub total_revenue: f64,
    pub average_daily_bookings: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopDay {
    pub date: NaiveDate,
    pub weekday: String,
    pub revenue: f64,
    pub bookings: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    pub average_monthly_revenue: f64,
    /// Over the trailing window of recent weeks
    pub average_weekly_revenue: f64,
    pub best_month: Option<YearMonth>,
    pub best_week: Option<IsoWeek>,
}

/// Everything the report needs, derived from one store snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateBundle {
    pub total: Tally,
    pub monthly_by_category: Vec<MonthlyCategoryStat>,
    pub monthly_by_mega: Vec<MonthlyMegaStat>,
    pub monthly_totals: Vec<MonthlyTotal>,
    pub categories: Vec<CategoryStat>,
    pub mega_categories: Vec<MegaCategoryStat>,
    pub daily: Vec<DailyStat>,
    pub weekly: Vec<WeeklyStat>,
    pub clients: Vec<ClientStat>,
    pub services: Vec<ServiceStat>,
    pub weekdays: Vec<WeekdayStat>,
    pub top_days: Vec<TopDay>,
    pub trend: TrendSummary,
}

impl AggregateBundle {
    /// Monthly series in the shape the forecast engine consumes
    pub fn monthly_points(&self) -> Vec<MonthlyPoint> {
        self.monthly_totals
            .iter()
            .map(|m| MonthlyPoint {
                month: m.month,
                revenue: m.revenue,
                bookings: m.bookings,
            })
            .collect()
    }
}

// ============================================================================
// GROUP ACCUMULATOR
// ============================================================================

#[derive(Debug, Default)]
struct Bucket<'a> {
    tally: Tally,
    /// Bookings per named client; blank names are not counted as clients
    clients: BTreeMap<&'a str, usize>,
    services: BTreeSet<&'a str>,
    first: Option<NaiveDate>,
    last: Option<NaiveDate>,
}

impl<'a> Bucket<'a> {
    fn add(&mut self, appt: &'a Appointment) {
        self.tally.add(appt.price);
        if !appt.client.is_empty() {
            *self.clients.entry(appt.client.as_str()).or_insert(0) += 1;
        }
        self.services.insert(appt.service.as_str());
        self.first = Some(self.first.map_or(appt.date, |d| d.min(appt.date)));
        self.last = Some(self.last.map_or(appt.date, |d| d.max(appt.date)));
    }

    fn unique_clients(&self) -> usize {
        self.clients.len()
    }

    fn repeat_clients(&self) -> usize {
        self.clients.values().filter(|&&n| n > 1).count()
    }
}

fn group_by<'a, K, F>(appointments: &'a [Appointment], key: F) -> BTreeMap<K, Bucket<'a>>
where
    K: Ord,
    F: Fn(&'a Appointment) -> K,
{
    let mut groups: BTreeMap<K, Bucket<'a>> = BTreeMap::new();
    for appt in appointments {
        groups.entry(key(appt)).or_default().add(appt);
    }
    groups
}

/// Revenue descending, ties resolved by the caller's key
fn by_revenue_desc(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

fn growth_pct(current: f64, previous: f64) -> Option<f64> {
    (previous != 0.0).then(|| (current - previous) / previous * 100.0)
}

// ============================================================================
// AGGREGATION ENGINE
// ============================================================================

pub struct AggregationEngine {
    moving_average_window: usize,
    top_days: usize,
    recent_weeks: i64,
}

impl AggregationEngine {
    pub fn new() -> Self {
        AggregationEngine {
            moving_average_window: 4,
            top_days: 10,
            recent_weeks: 12,
        }
    }

    pub fn aggregate(&self, store: &AppointmentStore) -> AggregateBundle {
        self.aggregate_appointments(store.appointments())
    }

    pub fn aggregate_appointments(&self, appointments: &[Appointment]) -> AggregateBundle {
        info!("Aggregating {} appointments", appointments.len());

        let total = appointments.iter().fold(Tally::default(), |mut t, a| {
            t.add(a.price);
            t
        });

        let monthly_totals = self.monthly_totals(appointments);
        let daily = self.daily(appointments);
        let weekly = self.weekly(appointments);
        let (weekdays, top_days) = self.peak_performance(&daily);
        let trend = self.trend_summary(appointments, &monthly_totals);

        AggregateBundle {
            total,
            monthly_by_category: self.monthly_by_category(appointments),
            monthly_by_mega: self.monthly_by_mega(appointments),
            monthly_totals,
            categories: self.categories(appointments, &total),
            mega_categories: self.mega_categories(appointments, &total),
            daily,
            weekly,
            clients: self.clients(appointments),
            services: self.services(appointments, &total),
            weekdays,
            top_days,
            trend,
        }
    }

    // ------------------------------------------------------------------------
    // Monthly
    // ------------------------------------------------------------------------

    fn monthly_by_category(&self, appointments: &[Appointment]) -> Vec<MonthlyCategoryStat> {
        let mut rows: Vec<MonthlyCategoryStat> =
            group_by(appointments, |a| (YearMonth::from_date(a.date), a.category))
                .into_iter()
                .map(|((month, category), b)| MonthlyCategoryStat {
                    month,
                    category,
                    count: b.tally.count,
                    revenue: b.tally.revenue,
                    average: b.tally.average(),
                })
                .collect();

        rows.sort_by(|a, b| {
            a.month
                .cmp(&b.month)
                .then(by_revenue_desc(a.revenue, b.revenue))
                .then(a.category.cmp(&b.category))
        });
        rows
    }

    fn monthly_by_mega(&self, appointments: &[Appointment]) -> Vec<MonthlyMegaStat> {
        let mut rows: Vec<MonthlyMegaStat> =
            group_by(appointments, |a| (YearMonth::from_date(a.date), a.mega_category))
                .into_iter()
                .map(|((month, mega_category), b)| MonthlyMegaStat {
                    month,
                    mega_category,
                    count: b.tally.count,
                    revenue: b.tally.revenue,
                    average: b.tally.average(),
                })
                .collect();

        rows.sort_by(|a, b| {
            a.month
                .cmp(&b.month)
                .then(by_revenue_desc(a.revenue, b.revenue))
                .then(a.mega_category.cmp(&b.mega_category))
        });
        rows
    }

    fn monthly_totals(&self, appointments: &[Appointment]) -> Vec<MonthlyTotal> {
        let mut rows: Vec<MonthlyTotal> = Vec::new();

        for (month, b) in group_by(appointments, |a| YearMonth::from_date(a.date)) {
            let (revenue_growth_pct, bookings_growth_pct) = match rows.last() {
                Some(prev) => (
                    growth_pct(b.tally.revenue, prev.revenue),
                    growth_pct(b.tally.count as f64, prev.bookings as f64),
                ),
                None => (None, None),
            };

            rows.push(MonthlyTotal {
                month,
                revenue: b.tally.revenue,
                bookings: b.tally.count,
                average_booking_value: b.tally.average(),
                unique_clients: b.unique_clients(),
                revenue_growth_pct,
                bookings_growth_pct,
            });
        }

        rows
    }

    // ------------------------------------------------------------------------
    // Category totals
    // ------------------------------------------------------------------------

    fn categories(&self, appointments: &[Appointment], total: &Tally) -> Vec<CategoryStat> {
        let mut rows: Vec<CategoryStat> = group_by(appointments, |a| a.category)
            .into_iter()
            .map(|(category, b)| {
                let clients = b.unique_clients();
                CategoryStat {
                    category,
                    count: b.tally.count,
                    revenue: b.tally.revenue,
                    average: b.tally.average(),
                    share_pct: percent(b.tally.revenue, total.revenue),
                    unique_clients: clients,
                    unique_services: b.services.len(),
                    revenue_per_client: ratio_or_zero(b.tally.revenue, clients as f64),
                    retention_pct: percent(b.repeat_clients() as f64, clients as f64),
                }
            })
            .collect();

        rows.sort_by(|a, b| by_revenue_desc(a.revenue, b.revenue).then(a.category.cmp(&b.category)));
        rows
    }

    fn mega_categories(&self, appointments: &[Appointment], total: &Tally) -> Vec<MegaCategoryStat> {
        let mut rows: Vec<MegaCategoryStat> = group_by(appointments, |a| a.mega_category)
            .into_iter()
            .map(|(mega_category, b)| {
                let clients = b.unique_clients();
                MegaCategoryStat {
                    mega_category,
                    count: b.tally.count,
                    revenue: b.tally.revenue,
                    average: b.tally.average(),
                    share_pct: percent(b.tally.revenue, total.revenue),
                    bookings_share_pct: percent(b.tally.count as f64, total.count as f64),
                    unique_clients: clients,
                    unique_services: b.services.len(),
                    revenue_per_client: ratio_or_zero(b.tally.revenue, clients as f64),
                }
            })
            .collect();

        rows.sort_by(|a, b| {
            by_revenue_desc(a.revenue, b.revenue).then(a.mega_category.cmp(&b.mega_category))
        });
        rows
    }

    // ------------------------------------------------------------------------
    // Daily / weekly
    // ------------------------------------------------------------------------

    /// One row per day with bookings, newest first
    fn daily(&self, appointments: &[Appointment]) -> Vec<DailyStat> {
        group_by(appointments, |a| a.date)
            .into_iter()
            .rev()
            .map(|(date, b)| DailyStat {
                date,
                weekday: weekday_name(date.weekday()).to_string(),
                revenue: b.tally.revenue,
                services: b.tally.count,
                average: b.tally.average(),
                unique_clients: b.unique_clients(),
            })
            .collect()
    }

    /// One row per ISO week with bookings, oldest first
    fn weekly(&self, appointments: &[Appointment]) -> Vec<WeeklyStat> {
        let groups = group_by(appointments, |a| IsoWeek::from_date(a.date));
        let mut rows: Vec<WeeklyStat> = Vec::with_capacity(groups.len());
        let mut window: Vec<f64> = Vec::with_capacity(groups.len());

        for (week, b) in groups {
            let (Some(start_date), Some(end_date)) = (b.first, b.last) else {
                continue;
            };

            window.push(b.tally.revenue);
            let from = window.len().saturating_sub(self.moving_average_window);
            let moving_average = mean(&window[from..]).unwrap_or(0.0);

            let deviation_pct = (moving_average > 0.0 && b.tally.revenue > 0.0)
                .then(|| (b.tally.revenue - moving_average) / moving_average * 100.0);

            rows.push(WeeklyStat {
                week,
                start_date,
                end_date,
                revenue: b.tally.revenue,
                services: b.tally.count,
                unique_clients: b.unique_clients(),
                moving_average,
                deviation_pct,
            });
        }

        rows
    }

    // ------------------------------------------------------------------------
    // Clients / services
    // ------------------------------------------------------------------------

    /// Named clients ranked by total spend
    fn clients(&self, appointments: &[Appointment]) -> Vec<ClientStat> {
        let latest = match appointments.iter().map(|a| a.date).max() {
            Some(d) => d,
            None => return Vec::new(),
        };

        let groups: Vec<(&str, Bucket)> = group_by(appointments, |a| a.client.as_str())
            .into_iter()
            .filter(|(client, _)| !client.is_empty())
            .collect();

        let spends: Vec<f64> = groups.iter().map(|(_, b)| b.tally.revenue).collect();
        let ranks = percent_ranks(&spends);
        let q80 = quantile(&spends, 0.8).unwrap_or(0.0);
        let q50 = quantile(&spends, 0.5).unwrap_or(0.0);
        let q20 = quantile(&spends, 0.2).unwrap_or(0.0);

        let tier_for = |spent: f64| {
            if spent >= q80 {
                ClientTier::Vip
            } else if spent >= q50 {
                ClientTier::Regular
            } else if spent >= q20 {
                ClientTier::Occasional
            } else {
                ClientTier::NewLow
            }
        };

        let mut rows: Vec<ClientStat> = groups
            .into_iter()
            .zip(ranks)
            .filter_map(|((name, b), rank)| {
                let (first_visit, last_visit) = (b.first?, b.last?);
                Some(ClientStat {
                    client: name.to_string(),
                    first_visit,
                    last_visit,
                    visits: b.tally.count,
                    total_spent: b.tally.revenue,
                    average_spend: b.tally.average(),
                    days_since_last_visit: (latest - last_visit).num_days(),
                    revenue_percentile_pct: rank * 100.0,
                    tier: tier_for(b.tally.revenue),
                })
            })
            .collect();

        rows.sort_by(|a, b| by_revenue_desc(a.total_spent, b.total_spent).then(a.client.cmp(&b.client)));
        rows
    }

    /// Services ranked by revenue, each tagged with the category it was
    /// first booked under
    fn services(&self, appointments: &[Appointment], total: &Tally) -> Vec<ServiceStat> {
        let mut first_category: BTreeMap<&str, Category> = BTreeMap::new();
        for appt in appointments {
            first_category.entry(appt.service.as_str()).or_insert(appt.category);
        }

        let mut rows: Vec<ServiceStat> = group_by(appointments, |a| a.service.as_str())
            .into_iter()
            .map(|(service, b)| {
                let category = first_category.get(service).copied().unwrap_or(Category::Other);
                ServiceStat {
                    bookings: b.tally.count,
                    revenue: b.tally.revenue,
                    average: b.tally.average(),
                    unique_clients: b.unique_clients(),
                    category,
                    contribution_pct: percent(b.tally.revenue, total.revenue),
                    service: service.to_string(),
                }
            })
            .collect();

        rows.sort_by(|a, b| by_revenue_desc(a.revenue, b.revenue).then(a.service.cmp(&b.service)));
        rows
    }

    // ------------------------------------------------------------------------
    // Peaks and trends
    // ------------------------------------------------------------------------

    fn peak_performance(&self, daily: &[DailyStat]) -> (Vec<WeekdayStat>, Vec<TopDay>) {
        // Keyed by weekday number so ties fall back to Monday-first order
        let mut per_weekday: BTreeMap<u32, (String, Vec<&DailyStat>)> = BTreeMap::new();
        for day in daily {
            per_weekday
                .entry(day.date.weekday().num_days_from_monday())
                .or_insert_with(|| (day.weekday.clone(), Vec::new()))
                .1
                .push(day);
        }

        let mut weekdays: Vec<WeekdayStat> = per_weekday
            .into_values()
            .map(|(weekday, days)| {
                let revenues: Vec<f64> = days.iter().map(|d| d.revenue).collect();
                let bookings: Vec<f64> = days.iter().map(|d| d.services as f64).collect();
                WeekdayStat {
                    weekday,
                    average_daily_revenue: mean(&revenues).unwrap_or(0.0),
                    total_revenue: revenues.iter().sum(),
                    average_daily_bookings: mean(&bookings).unwrap_or(0.0),
                }
            })
            .collect();
        // Stable sort keeps Monday-first order among equal averages
        weekdays.sort_by(|a, b| by_revenue_desc(a.average_daily_revenue, b.average_daily_revenue));

        let mut ranked: Vec<&DailyStat> = daily.iter().collect();
        ranked.sort_by(|a, b| by_revenue_desc(a.revenue, b.revenue).then(a.date.cmp(&b.date)));
        let top_days = ranked
            .into_iter()
            .take(self.top_days)
            .map(|d| TopDay {
                date: d.date,
                weekday: d.weekday.clone(),
                revenue: d.revenue,
                bookings: d.services,
            })
            .collect();

        (weekdays, top_days)
    }

    fn trend_summary(&self, appointments: &[Appointment], monthly: &[MonthlyTotal]) -> TrendSummary {
        let latest = match appointments.iter().map(|a| a.date).max() {
            Some(d) => d,
            None => return TrendSummary::default(),
        };

        let cutoff = latest - Duration::weeks(self.recent_weeks);
        let recent: Vec<Appointment> = appointments
            .iter()
            .filter(|a| a.date >= cutoff)
            .cloned()
            .collect();
        let recent_weeks: Vec<(IsoWeek, f64)> = group_by(&recent, |a| IsoWeek::from_date(a.date))
            .into_iter()
            .map(|(week, b)| (week, b.tally.revenue))
            .collect();
        let weekly_revenues: Vec<f64> = recent_weeks.iter().map(|(_, r)| *r).collect();

        let monthly_revenues: Vec<f64> = monthly.iter().map(|m| m.revenue).collect();

        TrendSummary {
            average_monthly_revenue: mean(&monthly_revenues).unwrap_or(0.0),
            average_weekly_revenue: mean(&weekly_revenues).unwrap_or(0.0),
            best_month: first_max(monthly.iter().map(|m| (m.month, m.revenue))),
            best_week: first_max(recent_weeks.into_iter()),
        }
    }
}

impl Default for AggregationEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Key of the largest value; the earliest key wins a tie
fn first_max<K, I>(items: I) -> Option<K>
where
    I: Iterator<Item = (K, f64)>,
{
    let mut best: Option<(K, f64)> = None;
    for (key, value) in items {
        match &best {
            Some((_, top)) if value <= *top => {}
            _ => best = Some((key, value)),
        }
    }
    best.map(|(k, _)| k)
}

/// Convenience wrapper around the default engine
pub fn aggregate(store: &AppointmentStore) -> AggregateBundle {
    AggregationEngine::new().aggregate(store)
}

// ============================================================================
// TESTS
// ============================================================================
