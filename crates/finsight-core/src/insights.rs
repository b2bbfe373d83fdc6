//! Textual insight rules for the dashboard
//!
//! A fixed battery of threshold rules over the loaded history. Each rule
//! either fires with a typed insight + human-readable message or stays
//! silent; there is no model behind any of them.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::models::Transaction;

/// Kinds of insight the rule battery can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightType {
    TopCategory,
    LowSavings,
    HighSavings,
    SpendingTrend,
    Anomalies,
    WeekendSpending,
}

impl InsightType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TopCategory => "top_category",
            Self::LowSavings => "low_savings",
            Self::HighSavings => "high_savings",
            Self::SpendingTrend => "spending_trend",
            Self::Anomalies => "anomalies",
            Self::WeekendSpending => "weekend_spending",
        }
    }
}

impl std::fmt::Display for InsightType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One generated insight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    #[serde(rename = "type")]
    pub insight_type: InsightType,
    pub title: String,
    pub message: String,
    pub actionable: bool,
    pub suggestion: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub savings_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anomaly_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekend_avg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekday_avg: Option<f64>,
}

impl Insight {
    fn new(insight_type: InsightType, title: &str, message: String, suggestion: &str) -> Self {
        Self {
            insight_type,
            title: title.to_string(),
            message,
            actionable: true,
            suggestion: suggestion.to_string(),
            category: None,
            amount: None,
            savings_rate: None,
            change_percent: None,
            anomaly_count: None,
            weekend_avg: None,
            weekday_avg: None,
        }
    }
}

/// Run the full rule battery over a history
pub fn generate_insights(transactions: &[Transaction]) -> Vec<Insight> {
    let expenses: Vec<&Transaction> = transactions.iter().filter(|t| !t.is_income).collect();
    let income: Vec<&Transaction> = transactions.iter().filter(|t| t.is_income).collect();

    let mut insights = Vec::new();
    if expenses.is_empty() {
        return insights;
    }

    let total_expenses: f64 = expenses.iter().map(|t| t.amount).sum();

    // Top spending category
    let mut by_category: std::collections::BTreeMap<String, f64> = Default::default();
    for tx in &expenses {
        let label = tx
            .category
            .unwrap_or(crate::models::Category::Other)
            .as_str()
            .to_string();
        *by_category.entry(label).or_insert(0.0) += tx.amount;
    }
    if let Some((top_category, top_amount)) = by_category
        .iter()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
    {
        let mut insight = Insight::new(
            InsightType::TopCategory,
            "Highest Spending Category",
            format!(
                "You spend the most on {} (${:.0}, {:.1}% of total)",
                top_category,
                top_amount,
                top_amount / total_expenses * 100.0
            ),
            &format!(
                "Consider reviewing your {} expenses for potential savings",
                top_category
            ),
        );
        insight.category = Some(top_category.clone());
        insight.amount = Some(*top_amount);
        insights.push(insight);
    }

    // Savings rate
    let total_income: f64 = income.iter().map(|t| t.amount).sum();
    if total_income > 0.0 {
        let savings_rate = (total_income - total_expenses) / total_income * 100.0;

        if savings_rate < 10.0 {
            let mut insight = Insight::new(
                InsightType::LowSavings,
                "Low Savings Rate",
                format!("Your savings rate is {:.1}%. Aim for at least 20%", savings_rate),
                "Try the 50/30/20 rule: 50% needs, 30% wants, 20% savings",
            );
            insight.savings_rate = Some(savings_rate);
            insights.push(insight);
        } else if savings_rate > 30.0 {
            let mut insight = Insight::new(
                InsightType::HighSavings,
                "Excellent Savings Rate",
                format!("Great job! Your savings rate is {:.1}%", savings_rate),
                "Consider investing your surplus for long-term growth",
            );
            insight.savings_rate = Some(savings_rate);
            insight.actionable = false;
            insights.push(insight);
        }
    }

    // Spending trend between the two trailing 30-day windows
    if let Some(latest) = transactions.iter().map(|t| t.date).max() {
        let recent_cutoff = latest - Duration::days(30);
        let previous_cutoff = latest - Duration::days(60);

        let recent: f64 = expenses
            .iter()
            .filter(|t| t.date >= recent_cutoff)
            .map(|t| t.amount)
            .sum();
        let previous: f64 = expenses
            .iter()
            .filter(|t| t.date >= previous_cutoff && t.date < recent_cutoff)
            .map(|t| t.amount)
            .sum();

        if previous > 0.0 {
            let change_percent = (recent - previous) / previous * 100.0;
            if change_percent.abs() > 10.0 {
                let trend = if change_percent > 0.0 {
                    "increased"
                } else {
                    "decreased"
                };
                let suggestion = if change_percent > 0.0 {
                    "Review recent purchases to understand the change"
                } else {
                    "Keep up the good work on reducing expenses!"
                };
                let mut insight = Insight::new(
                    InsightType::SpendingTrend,
                    if change_percent > 0.0 {
                        "Spending Increased"
                    } else {
                        "Spending Decreased"
                    },
                    format!(
                        "Your spending has {} by {:.1}% in the last 30 days",
                        trend,
                        change_percent.abs()
                    ),
                    suggestion,
                );
                insight.change_percent = Some(change_percent);
                insight.actionable = change_percent > 0.0;
                insights.push(insight);
            }
        }
    }

    // Anomalies detected
    let anomaly_count = transactions.iter().filter(|t| t.is_anomaly).count();
    if anomaly_count > 0 {
        let mut insight = Insight::new(
            InsightType::Anomalies,
            "Unusual Transactions Detected",
            format!(
                "Found {} unusual transactions worth reviewing",
                anomaly_count
            ),
            "Review flagged transactions for potential fraud or errors",
        );
        insight.anomaly_count = Some(anomaly_count);
        insights.push(insight);
    }

    // Weekend vs weekday spending
    let weekend: Vec<f64> = expenses
        .iter()
        .filter(|t| {
            use chrono::Datelike;
            t.date.weekday().num_days_from_monday() >= 5
        })
        .map(|t| t.amount)
        .collect();
    let weekday: Vec<f64> = expenses
        .iter()
        .filter(|t| {
            use chrono::Datelike;
            t.date.weekday().num_days_from_monday() < 5
        })
        .map(|t| t.amount)
        .collect();

    if !weekend.is_empty() && !weekday.is_empty() {
        let weekend_avg = weekend.iter().sum::<f64>() / weekend.len() as f64;
        let weekday_avg = weekday.iter().sum::<f64>() / weekday.len() as f64;

        if weekend_avg > weekday_avg * 1.5 {
            let mut insight = Insight::new(
                InsightType::WeekendSpending,
                "Higher Weekend Spending",
                format!(
                    "You spend {:.1}x more on weekends (${:.0} vs ${:.0})",
                    weekend_avg / weekday_avg,
                    weekend_avg,
                    weekday_avg
                ),
                "Plan weekend activities with a budget to control spending",
            );
            insight.weekend_avg = Some(weekend_avg);
            insight.weekday_avg = Some(weekday_avg);
            insights.push(insight);
        }
    }

    insights
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
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
    fn high_savings_scenario() {
        // Monthly income $4500, monthly spend $3000 -> 33.3% savings rate
        let history = vec![
            tx(1, 4500.0, Category::Income, true),
            tx(5, 1200.0, Category::BillsUtilities, false),
            tx(12, 1000.0, Category::FoodDining, false),
            tx(20, 800.0, Category::Shopping, false),
        ];

        let insights = generate_insights(&history);
        let savings = insights
            .iter()
            .find(|i| i.insight_type == InsightType::HighSavings)
            .expect("high savings insight");
        let rate = savings.savings_rate.unwrap();
        assert!((rate - 33.3).abs() < 0.1, "rate {}", rate);
        assert!(!savings.actionable);
    }

    #[test]
    fn low_savings_fires_below_ten_percent() {
        let history = vec![
            tx(1, 1000.0, Category::Income, true),
            tx(5, 950.0, Category::Shopping, false),
        ];
        let insights = generate_insights(&history);
        assert!(insights
            .iter()
            .any(|i| i.insight_type == InsightType::LowSavings));
    }

    #[test]
    fn anomaly_insight_reports_count() {
        let mut history = vec![
            tx(1, 100.0, Category::FoodDining, false),
            tx(2, 50.0, Category::Shopping, false),
        ];
        history[1].is_anomaly = true;

        let insights = generate_insights(&history);
        let anomaly = insights
            .iter()
            .find(|i| i.insight_type == InsightType::Anomalies)
            .expect("anomaly insight");
        assert_eq!(anomaly.anomaly_count, Some(1));
    }

    #[test]
    fn empty_spending_means_no_insights() {
        let history = vec![tx(1, 4500.0, Category::Income, true)];
        assert!(generate_insights(&history).is_empty());
    }

    #[test]
    fn top_category_is_reported() {
        let history = vec![
            tx(1, 300.0, Category::FoodDining, false),
            tx(2, 100.0, Category::Shopping, false),
        ];
        let insights = generate_insights(&history);
        let top = insights
            .iter()
            .find(|i| i.insight_type == InsightType::TopCategory)
            .expect("top category insight");
        assert_eq!(top.category.as_deref(), Some("Food & Dining"));
        assert_eq!(top.amount, Some(300.0));
    }
}
