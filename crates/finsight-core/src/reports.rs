//! Dashboard aggregates and chart data
//!
//! Stateless computations over an already-loaded transaction collection.
//! Nothing here consults a model; it is grouping and arithmetic.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::insights::{generate_insights, Insight};
use crate::models::{Category, Transaction};

/// Key metrics across a user's whole history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverviewTotals {
    pub total_income: f64,
    pub total_expenses: f64,
    pub net_worth_change: f64,
    /// Percent of income kept, 0 when there is no income
    pub savings_rate: f64,
    pub recent_30_days: RecentWindow,
    pub transaction_count: usize,
    pub anomaly_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentWindow {
    pub income: f64,
    pub expenses: f64,
    pub net: f64,
}

/// One month of income vs expenses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyTrend {
    /// YYYY-MM
    pub month: String,
    pub income: f64,
    pub expenses: f64,
    pub net: f64,
}

/// One category's share of total spending
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySlice {
    pub category: String,
    pub amount: f64,
    pub percentage: f64,
    pub transaction_count: usize,
}

/// One day of spending
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelinePoint {
    /// YYYY-MM-DD
    pub date: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardCharts {
    pub monthly_trends: Vec<MonthlyTrend>,
    pub category_breakdown: Vec<CategorySlice>,
    pub spending_timeline: Vec<TimelinePoint>,
}

/// Full dashboard payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardOverview {
    pub user_id: String,
    pub overview: OverviewTotals,
    pub charts: DashboardCharts,
    pub insights: Vec<Insight>,
}

/// Per-category statistics for the stats endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryStat {
    pub total: f64,
    pub average: f64,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryStats {
    pub categories: BTreeMap<String, CategoryStat>,
    pub total_spending: f64,
    pub transaction_count: usize,
}

fn label_of(tx: &Transaction) -> String {
    tx.category.unwrap_or(Category::Other).as_str().to_string()
}

fn month_key(tx: &Transaction) -> String {
    format!("{:04}-{:02}", tx.date.year(), tx.date.month())
}

/// Build the full dashboard for a user's history
pub fn dashboard_overview(user_id: &str, transactions: &[Transaction]) -> DashboardOverview {
    let expenses: Vec<&Transaction> = transactions.iter().filter(|t| !t.is_income).collect();
    let income: Vec<&Transaction> = transactions.iter().filter(|t| t.is_income).collect();

    let total_income: f64 = income.iter().map(|t| t.amount).sum();
    let total_expenses: f64 = expenses.iter().map(|t| t.amount).sum();
    let net_worth_change = total_income - total_expenses;
    let savings_rate = if total_income > 0.0 {
        net_worth_change / total_income * 100.0
    } else {
        0.0
    };

    let recent_30_days = transactions
        .iter()
        .map(|t| t.date)
        .max()
        .map(|latest| {
            let cutoff = latest - Duration::days(30);
            let recent: Vec<&Transaction> =
                transactions.iter().filter(|t| t.date >= cutoff).collect();
            let recent_income: f64 = recent
                .iter()
                .filter(|t| t.is_income)
                .map(|t| t.amount)
                .sum();
            let recent_expenses: f64 = recent
                .iter()
                .filter(|t| !t.is_income)
                .map(|t| t.amount)
                .sum();
            RecentWindow {
                income: recent_income,
                expenses: recent_expenses,
                net: recent_income - recent_expenses,
            }
        })
        .unwrap_or(RecentWindow {
            income: 0.0,
            expenses: 0.0,
            net: 0.0,
        });

    let anomaly_count = transactions.iter().filter(|t| t.is_anomaly).count();

    DashboardOverview {
        user_id: user_id.to_string(),
        overview: OverviewTotals {
            total_income,
            total_expenses,
            net_worth_change,
            savings_rate,
            recent_30_days,
            transaction_count: transactions.len(),
            anomaly_count,
        },
        charts: DashboardCharts {
            monthly_trends: monthly_trends(transactions),
            category_breakdown: category_breakdown(transactions),
            spending_timeline: spending_timeline(transactions),
        },
        insights: generate_insights(transactions),
    }
}

/// Monthly income/expense rollup, months in order
pub fn monthly_trends(transactions: &[Transaction]) -> Vec<MonthlyTrend> {
    let mut months: BTreeMap<String, (f64, f64)> = BTreeMap::new();
    for tx in transactions {
        let entry = months.entry(month_key(tx)).or_insert((0.0, 0.0));
        if tx.is_income {
            entry.0 += tx.amount;
        } else {
            entry.1 += tx.amount;
        }
    }
    months
        .into_iter()
        .map(|(month, (income, expenses))| MonthlyTrend {
            month,
            income,
            expenses,
            net: income - expenses,
        })
        .collect()
}

/// Spending per category, largest first; percentages sum to 100 when there
/// is any spending
pub fn category_breakdown(transactions: &[Transaction]) -> Vec<CategorySlice> {
    let expenses: Vec<&Transaction> = transactions.iter().filter(|t| !t.is_income).collect();
    if expenses.is_empty() {
        return vec![];
    }

    let mut totals: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for tx in &expenses {
        let entry = totals.entry(label_of(tx)).or_insert((0.0, 0));
        entry.0 += tx.amount;
        entry.1 += 1;
    }
    let total_spending: f64 = totals.values().map(|(amount, _)| amount).sum();

    let mut breakdown: Vec<CategorySlice> = totals
        .into_iter()
        .map(|(category, (amount, count))| CategorySlice {
            category,
            amount,
            percentage: if total_spending > 0.0 {
                amount / total_spending * 100.0
            } else {
                0.0
            },
            transaction_count: count,
        })
        .collect();
    breakdown.sort_by(|a, b| {
        b.amount
            .partial_cmp(&a.amount)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    breakdown
}

/// Daily spending totals for the trailing 30 days
pub fn spending_timeline(transactions: &[Transaction]) -> Vec<TimelinePoint> {
    let expenses: Vec<&Transaction> = transactions.iter().filter(|t| !t.is_income).collect();
    let Some(latest) = expenses.iter().map(|t| t.date).max() else {
        return vec![];
    };
    let cutoff = latest - Duration::days(30);

    let mut days: BTreeMap<String, f64> = BTreeMap::new();
    for tx in expenses.iter().filter(|t| t.date >= cutoff) {
        *days
            .entry(tx.date.format("%Y-%m-%d").to_string())
            .or_insert(0.0) += tx.amount;
    }
    days.into_iter()
        .map(|(date, amount)| TimelinePoint { date, amount })
        .collect()
}

/// Per-category totals/averages for the stats endpoint (spending only)
pub fn category_stats(transactions: &[Transaction]) -> CategoryStats {
    let expenses: Vec<&Transaction> = transactions.iter().filter(|t| !t.is_income).collect();
    let total_spending: f64 = expenses.iter().map(|t| t.amount).sum();

    let mut totals: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for tx in &expenses {
        let entry = totals.entry(label_of(tx)).or_insert((0.0, 0));
        entry.0 += tx.amount;
        entry.1 += 1;
    }

    let categories = totals
        .into_iter()
        .map(|(label, (total, count))| {
            (
                label,
                CategoryStat {
                    total,
                    average: total / count as f64,
                    count,
                    percentage: if total_spending > 0.0 {
                        total / total_spending * 100.0
                    } else {
                        0.0
                    },
                },
            )
        })
        .collect();

    CategoryStats {
        categories,
        total_spending,
        transaction_count: expenses.len(),
    }
}

// ---------------------------------------------------------------------------
// Chart endpoint
// ---------------------------------------------------------------------------

/// Supported chart types for the charts endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartType {
    SpendingByDayOfWeek,
    MonthlyComparison,
    CategoryTrends,
}

impl std::str::FromStr for ChartType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "spending_by_day_of_week" => Ok(Self::SpendingByDayOfWeek),
            "monthly_comparison" => Ok(Self::MonthlyComparison),
            "category_trends" => Ok(Self::CategoryTrends),
            _ => Err(format!("Unknown chart type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayOfWeekSpending {
    pub day: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryTrend {
    pub category: String,
    pub data: Vec<TimelinePoint>,
}

/// Chart payloads, one variant per chart type
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ChartData {
    SpendingByDayOfWeek(Vec<DayOfWeekSpending>),
    MonthlyComparison(Vec<MonthlyTrend>),
    CategoryTrends(Vec<CategoryTrend>),
}

const DAY_ORDER: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Build chart data of the requested type
pub fn chart_data(transactions: &[Transaction], chart_type: ChartType) -> Result<ChartData> {
    match chart_type {
        ChartType::SpendingByDayOfWeek => {
            let mut sums = [0.0f64; 7];
            let mut counts = [0usize; 7];
            for tx in transactions.iter().filter(|t| !t.is_income) {
                let day = tx.date.weekday().num_days_from_monday() as usize;
                sums[day] += tx.amount;
                counts[day] += 1;
            }
            let data = DAY_ORDER
                .iter()
                .enumerate()
                .map(|(i, day)| DayOfWeekSpending {
                    day: day.to_string(),
                    amount: if counts[i] > 0 {
                        sums[i] / counts[i] as f64
                    } else {
                        0.0
                    },
                })
                .collect();
            Ok(ChartData::SpendingByDayOfWeek(data))
        }
        ChartType::MonthlyComparison => Ok(ChartData::MonthlyComparison(monthly_trends(
            transactions,
        ))),
        ChartType::CategoryTrends => {
            let expenses: Vec<&Transaction> =
                transactions.iter().filter(|t| !t.is_income).collect();

            // Top 5 categories by total spend
            let mut totals: BTreeMap<String, f64> = BTreeMap::new();
            for tx in &expenses {
                *totals.entry(label_of(tx)).or_insert(0.0) += tx.amount;
            }
            let mut ranked: Vec<(String, f64)> = totals.into_iter().collect();
            ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            ranked.truncate(5);

            let mut trends = Vec::new();
            for (category, _) in ranked {
                let mut months: BTreeMap<String, f64> = BTreeMap::new();
                for tx in expenses.iter().filter(|t| label_of(t) == category) {
                    *months.entry(month_key(tx)).or_insert(0.0) += tx.amount;
                }
                trends.push(CategoryTrend {
                    category,
                    data: months
                        .into_iter()
                        .map(|(date, amount)| TimelinePoint { date, amount })
                        .collect(),
                });
            }
            Ok(ChartData::CategoryTrends(trends))
        }
    }
}

/// Parse and dispatch a chart-type string, for the HTTP layer
pub fn chart_data_for(transactions: &[Transaction], chart_type: &str) -> Result<ChartData> {
    let parsed: ChartType = chart_type
        .parse()
        .map_err(Error::InvalidData)?;
    chart_data(transactions, parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn tx(day: u32, amount: f64, category: Category, is_income: bool) -> Transaction {
        let date = Utc.with_ymd_and_hms(2025, 6, day, 12, 0, 0).unwrap();
        Transaction {
            id: day as i64,
            user_id: "u1".into(),
            amount,
            description: "tx".into(),
            category: Some(category),
            predicted_category: None,
            confidence_score: None,
            date,
            is_income,
            is_anomaly: false,
            content_hash: String::new(),
            created_at: date,
        }
    }

    #[test]
    fn percentages_sum_to_100() {
        let history = vec![
            tx(1, 100.0, Category::FoodDining, false),
            tx(2, 50.0, Category::Shopping, false),
            tx(3, 25.0, Category::Entertainment, false),
            tx(4, 4500.0, Category::Income, true),
        ];

        let breakdown = category_breakdown(&history);
        let total: f64 = breakdown.iter().map(|c| c.percentage).sum();
        assert!((total - 100.0).abs() < 1e-9);
        // Largest first
        assert_eq!(breakdown[0].category, "Food & Dining");
    }

    #[test]
    fn overview_totals() {
        let history = vec![
            tx(1, 4500.0, Category::Income, true),
            tx(2, 1000.0, Category::BillsUtilities, false),
            tx(3, 2000.0, Category::FoodDining, false),
        ];

        let dashboard = dashboard_overview("u1", &history);
        assert_eq!(dashboard.overview.total_income, 4500.0);
        assert_eq!(dashboard.overview.total_expenses, 3000.0);
        assert!((dashboard.overview.savings_rate - 33.333333).abs() < 1e-3);
        assert_eq!(dashboard.overview.transaction_count, 3);
    }

    #[test]
    fn monthly_trends_rollup() {
        let mut history = vec![
            tx(1, 4500.0, Category::Income, true),
            tx(15, 500.0, Category::Shopping, false),
        ];
        let july = Utc.with_ymd_and_hms(2025, 7, 2, 9, 0, 0).unwrap();
        let mut next_month = tx(2, 300.0, Category::FoodDining, false);
        next_month.date = july;
        history.push(next_month);

        let trends = monthly_trends(&history);
        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0].month, "2025-06");
        assert_eq!(trends[0].net, 4000.0);
        assert_eq!(trends[1].expenses, 300.0);
    }

    #[test]
    fn timeline_covers_trailing_window_only() {
        let mut history: Vec<Transaction> = (1..=28)
            .map(|d| tx(d, 10.0, Category::FoodDining, false))
            .collect();
        let old = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let mut stale = tx(1, 99.0, Category::Shopping, false);
        stale.date = old;
        history.push(stale);

        let timeline = spending_timeline(&history);
        assert_eq!(timeline.len(), 28);
        assert!(timeline.iter().all(|p| p.date.starts_with("2025-06")));
    }

    #[test]
    fn unknown_chart_type_is_invalid_data() {
        let history = vec![tx(1, 10.0, Category::FoodDining, false)];
        match chart_data_for(&history, "pie_of_everything") {
            Err(Error::InvalidData(_)) => {}
            other => panic!("expected InvalidData, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn day_of_week_chart_has_seven_rows() {
        let history = vec![
            tx(2, 30.0, Category::FoodDining, false), // Monday 2025-06-02
            tx(7, 90.0, Category::Shopping, false),   // Saturday
        ];
        let ChartData::SpendingByDayOfWeek(rows) =
            chart_data(&history, ChartType::SpendingByDayOfWeek).unwrap()
        else {
            panic!("wrong variant");
        };
        assert_eq!(rows.len(), 7);
        assert_eq!(rows[0].day, "Monday");
        assert_eq!(rows[0].amount, 30.0);
        assert_eq!(rows[5].amount, 90.0);
    }
}
