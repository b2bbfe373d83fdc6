//! Budget, investment, savings-goal, and optimization recommendations
//!
//! Fixed percentage rules (50/30/20, risk-profile allocation tables,
//! goal-priority ordering) applied to the same in-memory aggregates the
//! dashboard uses. No learned model is involved.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration};
use serde::{Deserialize, Serialize};

use crate::models::{Category, RiskTolerance, Transaction};

/// Mean of per-month amount sums, 0 when there are no rows
fn monthly_mean(rows: &[&Transaction]) -> f64 {
    let mut months: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for tx in rows {
        *months
            .entry((tx.date.year(), tx.date.month()))
            .or_insert(0.0) += tx.amount;
    }
    if months.is_empty() {
        return 0.0;
    }
    months.values().sum::<f64>() / months.len() as f64
}

fn label_of(tx: &Transaction) -> String {
    tx.category.unwrap_or(Category::Other).as_str().to_string()
}

fn split_by_direction(transactions: &[Transaction]) -> (Vec<&Transaction>, Vec<&Transaction>) {
    transactions.iter().partition(|t| !t.is_income)
}

// ---------------------------------------------------------------------------
// Budget recommendation (50/30/20)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    Need,
    Want,
}

/// Categories counted as needs for the 50/30/20 split
const NEED_CATEGORIES: [Category; 4] = [
    Category::BillsUtilities,
    Category::FoodDining,
    Category::Transportation,
    Category::Healthcare,
];

/// Categories counted as wants
const WANT_CATEGORIES: [Category; 3] = [
    Category::Entertainment,
    Category::Shopping,
    Category::Travel,
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetSplit {
    pub needs: f64,
    pub wants: f64,
    pub savings: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryBudget {
    pub current_amount: f64,
    pub percentage_of_spending: f64,
    pub monthly_average: f64,
    pub category_type: CategoryKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BudgetAdvice {
    ReduceNeeds { message: String, priority: Priority },
    ReduceWants { message: String, priority: Priority },
    IncreaseSavings { message: String, priority: Priority },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetRecommendation {
    pub monthly_income: f64,
    pub current_monthly_spending: f64,
    pub savings_rate: f64,
    pub recommended_budget: BudgetSplit,
    pub category_analysis: BTreeMap<String, CategoryBudget>,
    pub recommendations: Vec<BudgetAdvice>,
}

/// 50/30/20 budget recommendation against observed monthly spending
pub fn budget_recommendation(
    transactions: &[Transaction],
    monthly_income_override: Option<f64>,
) -> BudgetRecommendation {
    let (spending, income) = split_by_direction(transactions);

    let monthly_spending = monthly_mean(&spending);
    let monthly_income = match monthly_income_override {
        Some(v) if v > 0.0 => v,
        _ => {
            let observed = monthly_mean(&income);
            if observed > 0.0 {
                observed
            } else {
                // No income data: estimate from spending
                monthly_spending * 1.5
            }
        }
    };

    let savings_rate = if monthly_income > 0.0 {
        (monthly_income - monthly_spending) / monthly_income * 100.0
    } else {
        0.0
    };

    let recommended_budget = BudgetSplit {
        needs: monthly_income * 0.50,
        wants: monthly_income * 0.30,
        savings: monthly_income * 0.20,
    };

    // Months spanned, for monthly category averages
    let mut month_set: std::collections::BTreeSet<(i32, u32)> = Default::default();
    for tx in &spending {
        month_set.insert((tx.date.year(), tx.date.month()));
    }
    let n_months = month_set.len().max(1) as f64;

    let total_spending: f64 = spending.iter().map(|t| t.amount).sum();
    let mut by_category: BTreeMap<String, (f64, Option<Category>)> = BTreeMap::new();
    for tx in &spending {
        let entry = by_category
            .entry(label_of(tx))
            .or_insert((0.0, tx.category));
        entry.0 += tx.amount;
    }

    let mut category_analysis = BTreeMap::new();
    let mut monthly_needs = 0.0;
    let mut monthly_wants = 0.0;
    for (label, (amount, category)) in &by_category {
        let kind = match category {
            Some(c) if NEED_CATEGORIES.contains(c) => CategoryKind::Need,
            _ => CategoryKind::Want,
        };
        let monthly_average = amount / n_months;
        match kind {
            CategoryKind::Need => monthly_needs += monthly_average,
            CategoryKind::Want => {
                if matches!(category, Some(c) if WANT_CATEGORIES.contains(c)) {
                    monthly_wants += monthly_average;
                }
            }
        }
        category_analysis.insert(
            label.clone(),
            CategoryBudget {
                current_amount: *amount,
                percentage_of_spending: if total_spending > 0.0 {
                    amount / total_spending * 100.0
                } else {
                    0.0
                },
                monthly_average,
                category_type: kind,
            },
        );
    }

    let mut recommendations = Vec::new();
    if monthly_needs > recommended_budget.needs {
        recommendations.push(BudgetAdvice::ReduceNeeds {
            message: format!(
                "Consider reducing essential expenses by ${:.0}",
                monthly_needs - recommended_budget.needs
            ),
            priority: Priority::High,
        });
    }
    if monthly_wants > recommended_budget.wants {
        recommendations.push(BudgetAdvice::ReduceWants {
            message: format!(
                "Consider reducing discretionary spending by ${:.0}",
                monthly_wants - recommended_budget.wants
            ),
            priority: Priority::Medium,
        });
    }
    if savings_rate < 20.0 {
        recommendations.push(BudgetAdvice::IncreaseSavings {
            message: format!(
                "Try to increase savings rate to 20% (currently {:.1}%)",
                savings_rate
            ),
            priority: Priority::High,
        });
    }

    BudgetRecommendation {
        monthly_income,
        current_monthly_spending: monthly_spending,
        savings_rate,
        recommended_budget,
        category_analysis,
        recommendations,
    }
}

// ---------------------------------------------------------------------------
// Investment recommendations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskProfile {
    /// Allocation percentages
    pub stocks: u32,
    pub bonds: u32,
    pub cash: u32,
    pub expected_return: f64,
    pub volatility: f64,
}

/// Fixed allocation tables per risk tolerance
pub fn risk_profile(tolerance: RiskTolerance) -> RiskProfile {
    match tolerance {
        RiskTolerance::Conservative => RiskProfile {
            stocks: 30,
            bonds: 60,
            cash: 10,
            expected_return: 0.06,
            volatility: 0.08,
        },
        RiskTolerance::Moderate => RiskProfile {
            stocks: 60,
            bonds: 30,
            cash: 10,
            expected_return: 0.08,
            volatility: 0.12,
        },
        RiskTolerance::Aggressive => RiskProfile {
            stocks: 80,
            bonds: 15,
            cash: 5,
            expected_return: 0.10,
            volatility: 0.16,
        },
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestorProfile {
    pub monthly_income: f64,
    pub monthly_spending: f64,
    pub monthly_surplus: f64,
    pub risk_tolerance: RiskTolerance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyPriority {
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyFund {
    pub recommended_amount: f64,
    pub priority: EmergencyPriority,
    pub timeline: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InvestmentAdvice {
    EmergencyFund {
        allocation: f64,
        description: String,
        priority: u32,
    },
    IndexFunds {
        allocation: f64,
        description: String,
        priority: u32,
        examples: Vec<String>,
    },
    Bonds {
        allocation: f64,
        description: String,
        priority: u32,
        examples: Vec<String>,
    },
    BudgetOptimization {
        description: String,
        priority: u32,
        suggested_actions: Vec<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrowthProjection {
    pub total_invested: f64,
    pub projected_value: f64,
    pub growth: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestmentRecommendations {
    pub user_profile: InvestorProfile,
    pub emergency_fund: EmergencyFund,
    pub investment_allocation: RiskProfile,
    pub specific_recommendations: Vec<InvestmentAdvice>,
    pub projected_growth: BTreeMap<String, GrowthProjection>,
}

/// Personalized investment recommendations from spending patterns
pub fn investment_recommendations(
    transactions: &[Transaction],
    risk_tolerance: RiskTolerance,
) -> InvestmentRecommendations {
    let (spending, income) = split_by_direction(transactions);

    let monthly_spending = monthly_mean(&spending);
    let observed_income = monthly_mean(&income);
    let monthly_income = if observed_income > 0.0 {
        observed_income
    } else {
        // Conservative estimate when no income data exists
        monthly_spending * 1.3
    };

    let monthly_surplus = monthly_income - monthly_spending;
    let emergency_fund_needed = monthly_spending * 6.0;
    let profile = risk_profile(risk_tolerance);

    let mut specific_recommendations = Vec::new();
    if monthly_surplus > 0.0 {
        let building_emergency = monthly_surplus < emergency_fund_needed / 6.0;
        if building_emergency {
            specific_recommendations.push(InvestmentAdvice::EmergencyFund {
                allocation: (monthly_surplus * 0.8).min(emergency_fund_needed / 6.0),
                description: "Build emergency fund first (high-yield savings account)".to_string(),
                priority: 1,
            });
        }

        let investment_amount = if building_emergency {
            monthly_surplus * 0.2
        } else {
            monthly_surplus * 0.8
        };

        if investment_amount > 0.0 {
            specific_recommendations.push(InvestmentAdvice::IndexFunds {
                allocation: investment_amount * (profile.stocks as f64 / 100.0),
                description: format!(
                    "Low-cost index funds (S&P 500, Total Market) - {}%",
                    profile.stocks
                ),
                priority: 2,
                examples: vec!["VTSAX".into(), "FZROX".into(), "SWTSX".into()],
            });
            specific_recommendations.push(InvestmentAdvice::Bonds {
                allocation: investment_amount * (profile.bonds as f64 / 100.0),
                description: format!("Bond funds for stability - {}%", profile.bonds),
                priority: 3,
                examples: vec!["VBTLX".into(), "FXNAX".into(), "SWAGX".into()],
            });
        }
    } else {
        specific_recommendations.push(InvestmentAdvice::BudgetOptimization {
            description: "Focus on reducing expenses before investing".to_string(),
            priority: 1,
            suggested_actions: vec![
                "Review and cut unnecessary subscriptions".into(),
                "Optimize food and entertainment spending".into(),
                "Consider increasing income through side work".into(),
            ],
        });
    }

    // Compound growth of the investable surplus over time
    let mut projected_growth = BTreeMap::new();
    if monthly_surplus > 0.0 {
        let investment_monthly = monthly_surplus * 0.8;
        let monthly_rate = profile.expected_return / 12.0;
        for years in [1u32, 5, 10, 20, 30] {
            let months = (years * 12) as f64;
            let future_value =
                investment_monthly * (((1.0 + monthly_rate).powf(months) - 1.0) / monthly_rate);
            let total_invested = investment_monthly * months;
            projected_growth.insert(
                format!("{}_years", years),
                GrowthProjection {
                    total_invested,
                    projected_value: future_value,
                    growth: future_value - total_invested,
                },
            );
        }
    }

    InvestmentRecommendations {
        user_profile: InvestorProfile {
            monthly_income,
            monthly_spending,
            monthly_surplus,
            risk_tolerance,
        },
        emergency_fund: EmergencyFund {
            recommended_amount: emergency_fund_needed,
            priority: if monthly_surplus > 0.0 {
                EmergencyPriority::High
            } else {
                EmergencyPriority::Critical
            },
            timeline: "3-6 months".to_string(),
        },
        investment_allocation: profile,
        specific_recommendations,
        projected_growth,
    }
}

// ---------------------------------------------------------------------------
// Savings goals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SavingsCapacity {
    Good,
    Limited,
    Deficit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Recommended,
    StretchGoal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavingsGoal {
    pub name: String,
    pub target_amount: f64,
    pub monthly_needed: f64,
    pub timeline_months: u32,
    pub priority: u32,
    pub description: String,
    pub feasible: bool,
    pub status: GoalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjusted_timeline_months: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaverProfile {
    pub monthly_income: f64,
    pub monthly_spending: f64,
    pub monthly_surplus: f64,
    pub savings_capacity: SavingsCapacity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum SavingsStrategy {
    AutomatedSavings {
        total_monthly_allocation: f64,
        allocation_percentage: f64,
        tips: Vec<String>,
    },
    ExpenseReductionFirst {
        deficit_amount: f64,
        tips: Vec<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavingsGoalsRecommendation {
    pub user_profile: SaverProfile,
    pub savings_goals: Vec<SavingsGoal>,
    pub recommended_strategy: SavingsStrategy,
}

/// Personalized savings goals ordered by priority, with feasibility against
/// the available monthly surplus
pub fn savings_goals(transactions: &[Transaction]) -> SavingsGoalsRecommendation {
    let (spending, income) = split_by_direction(transactions);

    let monthly_spending = monthly_mean(&spending);
    let observed_income = monthly_mean(&income);
    let monthly_income = if observed_income > 0.0 {
        observed_income
    } else {
        monthly_spending * 1.2
    };
    let monthly_surplus = monthly_income - monthly_spending;

    // (name, target, priority, timeline months, description)
    let templates: [(&str, f64, u32, u32, &str); 5] = [
        (
            "Emergency Fund",
            monthly_spending * 6.0,
            1,
            12,
            "6 months of expenses for financial security",
        ),
        (
            "Home Down Payment",
            monthly_income * 24.0,
            2,
            60,
            "20% down payment for home purchase",
        ),
        (
            "Retirement Boost",
            monthly_income * 12.0,
            2,
            24,
            "Additional retirement savings beyond regular contributions",
        ),
        (
            "Vacation Fund",
            monthly_spending * 0.5,
            3,
            6,
            "Annual vacation or travel fund",
        ),
        (
            "Car Replacement",
            monthly_income * 6.0,
            4,
            36,
            "Replace vehicle when needed",
        ),
    ];

    let mut savings_goals = Vec::new();
    let mut allocated = 0.0;
    for (name, target_amount, priority, timeline_months, description) in templates {
        let monthly_needed = target_amount / timeline_months as f64;
        let feasible = monthly_surplus > 0.0 && monthly_needed <= monthly_surplus - allocated;

        let mut goal = SavingsGoal {
            name: name.to_string(),
            target_amount,
            monthly_needed,
            timeline_months,
            priority,
            description: description.to_string(),
            feasible,
            status: if feasible {
                GoalStatus::Recommended
            } else {
                GoalStatus::StretchGoal
            },
            adjusted_timeline_months: None,
        };

        if feasible {
            allocated += monthly_needed;
        } else if monthly_surplus - allocated > 0.0 {
            // Stretch the timeline to what the remaining surplus can fund
            let adjusted = target_amount / (monthly_surplus - allocated);
            goal.adjusted_timeline_months = Some(adjusted.max(timeline_months as f64));
        }

        savings_goals.push(goal);
    }

    let savings_capacity = if monthly_surplus > monthly_income * 0.2 {
        SavingsCapacity::Good
    } else if monthly_surplus > 0.0 {
        SavingsCapacity::Limited
    } else {
        SavingsCapacity::Deficit
    };

    let recommended_strategy = if monthly_surplus > 0.0 {
        let total_monthly_allocation = allocated.min(monthly_surplus);
        SavingsStrategy::AutomatedSavings {
            total_monthly_allocation,
            allocation_percentage: if monthly_income > 0.0 {
                total_monthly_allocation / monthly_income * 100.0
            } else {
                0.0
            },
            tips: vec![
                "Set up automatic transfers on payday".into(),
                "Use separate savings accounts for each goal".into(),
                "Review and adjust monthly based on spending changes".into(),
                "Consider high-yield savings accounts for better returns".into(),
            ],
        }
    } else {
        SavingsStrategy::ExpenseReductionFirst {
            deficit_amount: monthly_surplus.abs(),
            tips: vec![
                "Focus on reducing expenses before setting savings goals".into(),
                "Track spending for 30 days to identify areas to cut".into(),
                "Consider increasing income through side work".into(),
                "Start with a small emergency fund ($500-1000) first".into(),
            ],
        }
    };

    SavingsGoalsRecommendation {
        user_profile: SaverProfile {
            monthly_income,
            monthly_spending,
            monthly_surplus,
            savings_capacity,
        },
        savings_goals,
        recommended_strategy,
    }
}

// ---------------------------------------------------------------------------
// Spending optimization
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrequencyTier {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendingAnalysis {
    pub total_spending: f64,
    pub average_transaction: f64,
    pub transaction_count: usize,
    /// Top five categories by total spend
    pub top_categories: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryInsight {
    pub total_spent: f64,
    pub percentage_of_total: f64,
    pub transaction_count: usize,
    pub average_per_transaction: f64,
    pub frequency: FrequencyTier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionGuess {
    pub description: String,
    pub monthly_cost: f64,
    pub frequency: usize,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OptimizationOpportunity {
    HighSpending {
        category: String,
        current_amount: f64,
        suggested_reduction: f64,
        potential_monthly_savings: f64,
        tips: Vec<String>,
    },
    SpendingIncrease {
        message: String,
        suggested_action: String,
        priority: Priority,
    },
    SubscriptionReview {
        subscriptions: Vec<SubscriptionGuess>,
        suggested_action: String,
        potential_savings: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub recent_30_days: f64,
    pub previous_30_days: f64,
    pub change_percent: f64,
    pub trend: TrendDirection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendingOptimization {
    pub spending_analysis: SpendingAnalysis,
    pub category_insights: BTreeMap<String, CategoryInsight>,
    pub optimization_opportunities: Vec<OptimizationOpportunity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend_analysis: Option<TrendAnalysis>,
}

/// Discretionary categories worth a reduction nudge when they dominate
const REDUCIBLE_CATEGORIES: [Category; 3] = [
    Category::FoodDining,
    Category::Entertainment,
    Category::Shopping,
];

/// Per-category money-saving tips
fn category_tips(category: &str) -> Vec<String> {
    match category {
        "Food & Dining" => vec![
            "Cook more meals at home".into(),
            "Use grocery store loyalty programs".into(),
            "Plan meals and make shopping lists".into(),
            "Limit restaurant visits to special occasions".into(),
        ],
        "Entertainment" => vec![
            "Look for free local events".into(),
            "Share streaming subscriptions with family".into(),
            "Take advantage of happy hour pricing".into(),
            "Consider library resources for books/movies".into(),
        ],
        "Shopping" => vec![
            "Wait 24 hours before non-essential purchases".into(),
            "Use price comparison apps".into(),
            "Shop with a list and stick to it".into(),
            "Look for sales and use coupons".into(),
        ],
        "Transportation" => vec![
            "Use public transportation when possible".into(),
            "Combine errands into single trips".into(),
            "Consider carpooling or ride-sharing".into(),
            "Keep up with vehicle maintenance".into(),
        ],
        _ => vec!["Review spending in this category for potential savings".into()],
    }
}

/// Detect likely recurring subscriptions: similar amounts recurring at
/// roughly monthly intervals
pub fn detect_subscriptions(spending: &[&Transaction]) -> Vec<SubscriptionGuess> {
    let mut groups: BTreeMap<i64, Vec<&&Transaction>> = BTreeMap::new();
    for tx in spending {
        // Bucket amounts to the nearest $5
        let rounded = ((tx.amount / 5.0).round() * 5.0) as i64;
        groups.entry(rounded).or_default().push(tx);
    }

    let mut subscriptions = Vec::new();
    for (rounded, members) in groups {
        if members.len() < 3 {
            continue;
        }
        let mut dates: Vec<chrono::NaiveDate> =
            members.iter().map(|t| t.date.date_naive()).collect();
        dates.sort();
        let intervals: Vec<i64> = dates
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).num_days())
            .collect();
        if intervals.is_empty() {
            continue;
        }
        let mean_interval = intervals.iter().sum::<i64>() as f64 / intervals.len() as f64;
        if (25.0..=35.0).contains(&mean_interval) {
            subscriptions.push(SubscriptionGuess {
                description: members[0].description.clone(),
                monthly_cost: rounded as f64,
                frequency: members.len(),
                category: members[0].category.map(|c| c.as_str().to_string()),
            });
        }
    }
    subscriptions
}

/// Analyze spending patterns and suggest optimizations
pub fn spending_optimization(transactions: &[Transaction]) -> SpendingOptimization {
    let (spending, _) = split_by_direction(transactions);

    let total_spending: f64 = spending.iter().map(|t| t.amount).sum();
    let transaction_count = spending.len();
    let average_transaction = if transaction_count > 0 {
        total_spending / transaction_count as f64
    } else {
        0.0
    };

    let mut by_category: BTreeMap<String, (f64, usize, Option<Category>)> = BTreeMap::new();
    for tx in &spending {
        let entry = by_category
            .entry(label_of(tx))
            .or_insert((0.0, 0, tx.category));
        entry.0 += tx.amount;
        entry.1 += 1;
    }

    let mut ranked: Vec<(String, f64)> = by_category
        .iter()
        .map(|(label, (amount, _, _))| (label.clone(), *amount))
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let top_categories: BTreeMap<String, f64> = ranked.into_iter().take(5).collect();

    let mut category_insights = BTreeMap::new();
    let mut optimization_opportunities = Vec::new();
    for (label, (amount, count, category)) in &by_category {
        let frequency = if *count as f64 > transaction_count as f64 * 0.2 {
            FrequencyTier::High
        } else if *count as f64 > transaction_count as f64 * 0.1 {
            FrequencyTier::Medium
        } else {
            FrequencyTier::Low
        };

        category_insights.insert(
            label.clone(),
            CategoryInsight {
                total_spent: *amount,
                percentage_of_total: if total_spending > 0.0 {
                    amount / total_spending * 100.0
                } else {
                    0.0
                },
                transaction_count: *count,
                average_per_transaction: amount / (*count).max(1) as f64,
                frequency,
            },
        );

        // High-share discretionary categories get a reduction target
        let reducible = matches!(category, Some(c) if REDUCIBLE_CATEGORIES.contains(c));
        if reducible && *amount > total_spending * 0.15 {
            optimization_opportunities.push(OptimizationOpportunity::HighSpending {
                category: label.clone(),
                current_amount: *amount,
                suggested_reduction: amount * 0.1,
                potential_monthly_savings: amount * 0.1,
                tips: category_tips(label),
            });
        }
    }

    // Trailing 30 days vs the 30 before that
    let trend_analysis = spending.iter().map(|t| t.date).max().and_then(|latest| {
        let recent_cutoff = latest - Duration::days(30);
        let previous_cutoff = latest - Duration::days(60);

        let recent: f64 = spending
            .iter()
            .filter(|t| t.date >= recent_cutoff)
            .map(|t| t.amount)
            .sum();
        let previous: f64 = spending
            .iter()
            .filter(|t| t.date >= previous_cutoff && t.date < recent_cutoff)
            .map(|t| t.amount)
            .sum();

        if previous <= 0.0 {
            return None;
        }
        let change_percent = (recent - previous) / previous * 100.0;
        Some(TrendAnalysis {
            recent_30_days: recent,
            previous_30_days: previous,
            change_percent,
            trend: if change_percent > 5.0 {
                TrendDirection::Increasing
            } else if change_percent < -5.0 {
                TrendDirection::Decreasing
            } else {
                TrendDirection::Stable
            },
        })
    });

    if let Some(trend) = &trend_analysis {
        if trend.change_percent > 10.0 {
            optimization_opportunities.push(OptimizationOpportunity::SpendingIncrease {
                message: format!(
                    "Spending increased by {:.1}% in the last 30 days",
                    trend.change_percent
                ),
                suggested_action: "Review recent purchases and identify causes of increase"
                    .to_string(),
                priority: Priority::High,
            });
        }
    }

    let subscriptions = detect_subscriptions(&spending);
    if !subscriptions.is_empty() {
        let potential_savings = subscriptions.iter().map(|s| s.monthly_cost).sum();
        optimization_opportunities.push(OptimizationOpportunity::SubscriptionReview {
            subscriptions,
            suggested_action: "Review and cancel unused subscriptions".to_string(),
            potential_savings,
        });
    }

    SpendingOptimization {
        spending_analysis: SpendingAnalysis {
            total_spending,
            average_transaction,
            transaction_count,
            top_categories,
        },
        category_insights,
        optimization_opportunities,
        trend_analysis,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn tx(day: i64, amount: f64, category: Category, is_income: bool) -> Transaction {
        let date =
            Utc.with_ymd_and_hms(2025, 4, 1, 12, 0, 0).unwrap() + Duration::days(day);
        Transaction {
            id: day,
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

    fn month_of_history() -> Vec<Transaction> {
        vec![
            tx(0, 4500.0, Category::Income, true),
            tx(2, 1200.0, Category::BillsUtilities, false),
            tx(5, 600.0, Category::FoodDining, false),
            tx(10, 400.0, Category::Shopping, false),
            tx(15, 300.0, Category::Entertainment, false),
            tx(20, 500.0, Category::Transportation, false),
        ]
    }

    #[test]
    fn budget_follows_50_30_20() {
        let rec = budget_recommendation(&month_of_history(), None);
        assert_eq!(rec.monthly_income, 4500.0);
        assert_eq!(rec.recommended_budget.needs, 2250.0);
        assert_eq!(rec.recommended_budget.wants, 1350.0);
        assert_eq!(rec.recommended_budget.savings, 900.0);
        // $3000 of $4500 spent -> 33.3% savings rate, above the 20% nudge
        assert!(rec.savings_rate > 20.0);
        assert!(!rec
            .recommendations
            .iter()
            .any(|r| matches!(r, BudgetAdvice::IncreaseSavings { .. })));
    }

    #[test]
    fn income_override_is_used() {
        let rec = budget_recommendation(&month_of_history(), Some(10_000.0));
        assert_eq!(rec.monthly_income, 10_000.0);
        assert_eq!(rec.recommended_budget.savings, 2000.0);
    }

    #[test]
    fn surplus_gets_investment_allocations() {
        let rec = investment_recommendations(&month_of_history(), RiskTolerance::Moderate);
        assert_eq!(rec.investment_allocation.stocks, 60);
        assert!(rec.user_profile.monthly_surplus > 0.0);
        assert!(rec
            .specific_recommendations
            .iter()
            .any(|r| matches!(r, InvestmentAdvice::IndexFunds { .. })));
        assert!(rec.projected_growth.contains_key("10_years"));
        let ten = &rec.projected_growth["10_years"];
        assert!(ten.projected_value > ten.total_invested);
    }

    #[test]
    fn deficit_gets_budget_optimization() {
        let history = vec![
            tx(0, 1000.0, Category::Income, true),
            tx(2, 2000.0, Category::Shopping, false),
        ];
        let rec = investment_recommendations(&history, RiskTolerance::Conservative);
        assert!(rec.user_profile.monthly_surplus < 0.0);
        assert_eq!(rec.emergency_fund.priority, EmergencyPriority::Critical);
        assert!(matches!(
            rec.specific_recommendations[0],
            InvestmentAdvice::BudgetOptimization { .. }
        ));
        assert!(rec.projected_growth.is_empty());
    }

    #[test]
    fn goals_are_priority_ordered_and_statused() {
        let rec = savings_goals(&month_of_history());
        assert_eq!(rec.savings_goals.len(), 5);
        for pair in rec.savings_goals.windows(2) {
            assert!(pair[0].priority <= pair[1].priority);
        }
        assert!(matches!(
            rec.recommended_strategy,
            SavingsStrategy::AutomatedSavings { .. }
        ));
        // Emergency fund: 6 * $3000 over 12 months = $1500/mo, within surplus
        let emergency = &rec.savings_goals[0];
        assert_eq!(emergency.name, "Emergency Fund");
        assert!(emergency.feasible);
    }

    #[test]
    fn subscriptions_detected_from_monthly_cadence() {
        let mut history = Vec::new();
        for month in 0..4i64 {
            history.push(tx(month * 30, 15.99, Category::Entertainment, false));
        }
        // Noise that should not group
        history.push(tx(7, 250.0, Category::Shopping, false));

        let spending: Vec<&Transaction> = history.iter().collect();
        let subs = detect_subscriptions(&spending);
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].frequency, 4);
        assert_eq!(subs[0].monthly_cost, 15.0);
    }

    #[test]
    fn optimization_flags_dominant_discretionary_category() {
        let mut history = month_of_history();
        // Push Food & Dining above 15% of spending
        history.push(tx(22, 900.0, Category::FoodDining, false));

        let opt = spending_optimization(&history);
        assert!(opt
            .optimization_opportunities
            .iter()
            .any(|o| matches!(o, OptimizationOpportunity::HighSpending { category, .. } if category == "Food & Dining")));
        assert!(opt.spending_analysis.total_spending > 0.0);
        assert!(opt.category_insights.contains_key("Food & Dining"));
    }
}
