//! Integration tests for finsight-core
//!
//! These tests exercise the full insert → train → predict/detect → report
//! workflow over a realistic synthetic history.

use chrono::{Duration, TimeZone, Utc};

use finsight_core::{
    db::Database,
    ml::ModelRegistry,
    models::{Category, NewTransaction},
    reports, TransactionInsertResult,
};

/// Build ~3 months of history for one user: steady daytime spending in a few
/// categories plus a monthly salary deposit.
fn seed_user(db: &Database, user_id: &str) -> usize {
    let base = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
    let mut inserted = 0;

    for i in 0..45i64 {
        let (amount, description, category, is_income) = match i % 9 {
            0 => (45.67, "Whole Foods Market", Category::FoodDining, false),
            1 => (12.50, "Starbucks Coffee", Category::FoodDining, false),
            2 => (67.89, "Shell Gas Station", Category::Transportation, false),
            3 => (78.90, "Target Store", Category::Shopping, false),
            4 => (15.99, "Netflix Subscription", Category::Entertainment, false),
            5 => (89.45, "Electric Bill PG&E", Category::BillsUtilities, false),
            6 => (25.00, "Pharmacy CVS", Category::Healthcare, false),
            7 => (34.56, "Water Utility Bill", Category::BillsUtilities, false),
            _ => (4500.00, "Salary Deposit", Category::Income, true),
        };

        let tx = NewTransaction {
            user_id: user_id.to_string(),
            amount,
            description: description.to_string(),
            category: Some(category),
            predicted_category: None,
            confidence_score: None,
            date: base + Duration::days(i * 2) + Duration::hours((i % 5) as i64),
            is_income,
        };
        if let TransactionInsertResult::Inserted(_) = db.insert_transaction(&tx).unwrap() {
            inserted += 1;
        }
    }

    inserted
}

#[test]
fn test_full_train_and_forecast_workflow() {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    let registry = ModelRegistry::new();

    let inserted = seed_user(&db, "demo_user");
    assert_eq!(inserted, 45);

    let history = db.user_history("demo_user").unwrap();
    let spending: Vec<_> = history.iter().filter(|t| !t.is_income).cloned().collect();

    // Train and forecast
    let (trained, metrics) = registry.train_predictor("demo_user", &spending).unwrap();
    assert!(metrics.mae.is_finite());
    assert!(metrics.r2_score <= 1.0);

    let forecast = trained
        .model
        .predict_future_spending(&spending, 30)
        .unwrap();
    assert_eq!(forecast.daily_predictions.len(), 30);
    assert!(forecast
        .daily_predictions
        .iter()
        .all(|d| d.predicted_amount >= 0.0));

    // Category breakdown agrees with the model's own total
    let breakdown_total: f64 = forecast
        .category_breakdown
        .values()
        .map(|c| c.predicted_total)
        .sum();
    assert!((breakdown_total - forecast.total_predicted).abs() < 1e-6);
}

#[test]
fn test_full_anomaly_workflow_flags_stored_rows() {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    let registry = ModelRegistry::new();

    seed_user(&db, "demo_user");

    // Inject one blatant outlier: a large night-time purchase
    let outlier = NewTransaction {
        user_id: "demo_user".to_string(),
        amount: 5200.0,
        description: "Wire Transfer Unknown".to_string(),
        category: Some(Category::Travel),
        predicted_category: None,
        confidence_score: None,
        date: Utc.with_ymd_and_hms(2025, 5, 28, 2, 13, 0).unwrap(),
        is_income: false,
    };
    db.insert_transaction(&outlier).unwrap();

    let history = db.user_history("demo_user").unwrap();
    let (trained, metrics) = registry.train_detector("demo_user", &history).unwrap();
    assert!(metrics.detected_anomalies > 0);

    let reports = trained.model.detect_anomalies(&history).unwrap();
    assert!(!reports.is_empty());

    // The injected outlier must be among the flagged rows, with reasons
    let flagged_outlier = reports
        .iter()
        .find(|r| r.description == "Wire Transfer Unknown")
        .expect("outlier should be flagged");
    assert!(!flagged_outlier.reasons.is_empty());

    // Persist flags and confirm the mutation
    let ids: Vec<i64> = reports.iter().map(|r| r.transaction_id).collect();
    let updated = db.mark_anomalies(&ids).unwrap();
    assert_eq!(updated, ids.len());

    let flagged_count = db
        .user_history("demo_user")
        .unwrap()
        .iter()
        .filter(|t| t.is_anomaly)
        .count();
    assert_eq!(flagged_count, ids.len());
}

#[test]
fn test_dashboard_over_stored_history() {
    let db = Database::in_memory().expect("Failed to create in-memory database");

    seed_user(&db, "demo_user");
    let history = db.user_history("demo_user").unwrap();

    let dashboard = reports::dashboard_overview("demo_user", &history);
    assert_eq!(dashboard.overview.transaction_count, history.len());
    assert!(dashboard.overview.total_income > 0.0);
    assert!(dashboard.overview.total_expenses > 0.0);

    let percentage_total: f64 = dashboard
        .charts
        .category_breakdown
        .iter()
        .map(|c| c.percentage)
        .sum();
    assert!((percentage_total - 100.0).abs() < 1e-6);

    // Salary dwarfs spending here, so the savings-rate rule lands on the
    // high-savings side
    assert!(dashboard
        .insights
        .iter()
        .any(|i| i.insight_type == finsight_core::InsightType::HighSavings));
}

#[test]
fn test_lazy_categorizer_shared_across_users() {
    let registry = ModelRegistry::new();

    let first = registry.categorizer().unwrap();
    let (category, confidence) = first.model.predict("starbucks coffee").unwrap();
    assert_eq!(category, Category::FoodDining);
    assert!(confidence > 0.5);

    // Second fetch reuses the same fitted model
    let second = registry.categorizer().unwrap();
    assert_eq!(first.version, second.version);
}
