//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{Duration, TimeZone, Utc};
use finsight_core::db::Database;
use finsight_core::models::{Category, NewTransaction};
use http_body_util::BodyExt;
use tower::ServiceExt;

fn setup_test_app() -> (Router, Database) {
    let db = Database::in_memory().unwrap();
    let app = create_router(db.clone(), ServerConfig::default());
    (app, db)
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Seed a spread of daytime transactions over ~90 days, one income row per
/// 10 spending rows
fn seed_history(db: &Database, user_id: &str, count: usize) {
    let base = Utc.with_ymd_and_hms(2025, 1, 1, 13, 0, 0).unwrap();
    for i in 0..count {
        let category = match i % 4 {
            0 => Category::FoodDining,
            1 => Category::Shopping,
            2 => Category::BillsUtilities,
            _ => Category::Transportation,
        };
        let is_income = i % 10 == 9;
        let tx = NewTransaction {
            user_id: user_id.to_string(),
            amount: if is_income {
                4500.0
            } else {
                20.0 + (i % 7) as f64 * 12.0
            },
            description: format!("seeded transaction {}", i),
            category: Some(if is_income { Category::Income } else { category }),
            predicted_category: None,
            confidence_score: None,
            date: base + Duration::days((i as i64 * 90) / count as i64),
            is_income,
        };
        db.insert_transaction(&tx).unwrap();
    }
}

async fn get(app: &Router, uri: &str) -> axum::response::Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap()
}

// ========== Meta ==========

#[tokio::test]
async fn test_health_check() {
    let (app, _db) = setup_test_app();

    let response = get(&app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["status"], "healthy");
}

// ========== Transaction API ==========

#[tokio::test]
async fn test_create_transaction_auto_categorizes() {
    let (app, _db) = setup_test_app();

    let body = serde_json::json!({
        "user_id": "demo_user",
        "amount": 12.50,
        "description": "starbucks coffee",
        "date": "2025-06-01T09:30:00Z"
    });

    let response = post_json(&app, "/api/transactions", body).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["category"], "Food & Dining");
    assert_eq!(json["predicted_category"], "Food & Dining");
    assert!(json["confidence_score"].as_f64().unwrap() > 0.5);
    assert_eq!(json["is_anomaly"], false);
}

#[tokio::test]
async fn test_create_transaction_keeps_user_category() {
    let (app, _db) = setup_test_app();

    let body = serde_json::json!({
        "user_id": "demo_user",
        "amount": 50.0,
        "description": "starbucks coffee",
        "category": "Entertainment",
        "date": "2025-06-01T09:30:00Z"
    });

    let response = post_json(&app, "/api/transactions", body).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    // User-supplied label wins; no prediction is recorded
    assert_eq!(json["category"], "Entertainment");
    assert!(json["predicted_category"].is_null());
}

#[tokio::test]
async fn test_create_transaction_rejects_bad_amount() {
    let (app, _db) = setup_test_app();

    for amount in [-5.0, 2_000_000.0] {
        let body = serde_json::json!({
            "user_id": "demo_user",
            "amount": amount,
            "description": "bad amount"
        });
        let response = post_json(&app, "/api/transactions", body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_create_transaction_rejects_bad_user_id() {
    let (app, _db) = setup_test_app();

    let body = serde_json::json!({
        "user_id": "not a valid id!",
        "amount": 10.0,
        "description": "coffee"
    });
    let response = post_json(&app, "/api/transactions", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bulk_create_reports_duplicates() {
    let (app, _db) = setup_test_app();

    let tx = serde_json::json!({
        "user_id": "demo_user",
        "amount": 15.0,
        "description": "netflix subscription",
        "date": "2025-06-02T20:00:00Z"
    });
    let body = serde_json::json!([tx, tx]);

    let response = post_json(&app, "/api/transactions/bulk", body).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["duplicates"], 1);
}

#[tokio::test]
async fn test_list_transactions_newest_first() {
    let (app, db) = setup_test_app();
    seed_history(&db, "demo_user", 10);

    let response = get(&app, "/api/transactions?user_id=demo_user&limit=5").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    let rows = json.as_array().unwrap();
    assert_eq!(rows.len(), 5);
    let first = rows[0]["date"].as_str().unwrap().to_string();
    let last = rows[4]["date"].as_str().unwrap().to_string();
    assert!(first >= last);
}

#[tokio::test]
async fn test_get_missing_transaction_is_404() {
    let (app, _db) = setup_test_app();

    let response = get(&app, "/api/transactions/9999").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_category_stats_percentages() {
    let (app, db) = setup_test_app();
    seed_history(&db, "demo_user", 20);

    let response = get(&app, "/api/transactions/categories/stats?user_id=demo_user").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    let total: f64 = json["categories"]
        .as_object()
        .unwrap()
        .values()
        .map(|c| c["percentage"].as_f64().unwrap())
        .sum();
    assert!((total - 100.0).abs() < 1e-6);
}

// ========== Dashboard API ==========

#[tokio::test]
async fn test_dashboard_overview() {
    let (app, db) = setup_test_app();
    seed_history(&db, "demo_user", 40);

    let response = get(&app, "/api/dashboard/overview/demo_user").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["user_id"], "demo_user");
    assert_eq!(json["overview"]["transaction_count"], 40);
    assert!(json["overview"]["total_income"].as_f64().unwrap() > 0.0);
    assert!(json["charts"]["monthly_trends"].as_array().unwrap().len() >= 2);
    assert!(!json["insights"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_chart_unknown_type_is_400() {
    let (app, db) = setup_test_app();
    seed_history(&db, "demo_user", 10);

    let response = get(&app, "/api/dashboard/charts/demo_user?chart_type=nope").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chart_day_of_week() {
    let (app, db) = setup_test_app();
    seed_history(&db, "demo_user", 20);

    let response = get(
        &app,
        "/api/dashboard/charts/demo_user?chart_type=spending_by_day_of_week",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["chart_type"], "spending_by_day_of_week");
    assert_eq!(json["data"].as_array().unwrap().len(), 7);
}

#[tokio::test]
async fn test_export_formats() {
    let (app, db) = setup_test_app();
    seed_history(&db, "demo_user", 5);

    let response = get(&app, "/api/dashboard/export/demo_user").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["format"], "json");
    assert_eq!(json["transaction_count"], 5);

    let response = get(&app, "/api/dashboard/export/demo_user?format=csv").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["format"], "csv");
    assert!(json["data"].as_str().unwrap().starts_with("id,date,amount"));

    let response = get(&app, "/api/dashboard/export/nobody").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ========== Prediction API ==========

#[tokio::test]
async fn test_train_requires_minimum_history() {
    let (app, db) = setup_test_app();
    seed_history(&db, "demo_user", 5);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/predictions/train/demo_user")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_train_predict_anomaly_flow() {
    let (app, db) = setup_test_app();
    seed_history(&db, "demo_user", 40);

    // Train
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/predictions/train/demo_user")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["message"], "Models trained successfully");
    assert!(json["predictor_metrics"]["mae"].as_f64().unwrap() >= 0.0);
    assert!(json["anomaly_metrics"]["detected_anomalies"].as_u64().unwrap() >= 1);
    let trained_version = json["predictor_version"].as_u64().unwrap();

    // Predict
    let response = get(&app, "/api/predictions/spending/demo_user?days_ahead=14").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    let daily = json["predictions"]["daily_predictions"].as_array().unwrap();
    assert_eq!(daily.len(), 14);
    assert!(daily
        .iter()
        .all(|d| d["predicted_amount"].as_f64().unwrap() >= 0.0));
    // The lazily-fetched model is the one trained above
    assert_eq!(json["model_version"].as_u64().unwrap(), trained_version);

    // Detect anomalies; stored flags must flip
    let response = get(&app, "/api/predictions/anomalies/demo_user").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    let count = json["anomaly_count"].as_u64().unwrap() as usize;
    assert!(count >= 1);

    let flagged = db
        .user_history("demo_user")
        .unwrap()
        .iter()
        .filter(|t| t.is_anomaly)
        .count();
    assert_eq!(flagged, count);
}

#[tokio::test]
async fn test_anomalies_require_twenty_transactions() {
    let (app, db) = setup_test_app();
    seed_history(&db, "demo_user", 15);

    let response = get(&app, "/api/predictions/anomalies/demo_user").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_budget_recommendation() {
    let (app, db) = setup_test_app();
    seed_history(&db, "demo_user", 30);

    let response = get(
        &app,
        "/api/predictions/budget-recommendation/demo_user?monthly_income=5000",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["monthly_income"], 5000.0);
    assert_eq!(json["recommended_budget"]["needs"], 2500.0);
    assert_eq!(json["recommended_budget"]["savings"], 1000.0);
}

// ========== Recommendation API ==========

#[tokio::test]
async fn test_investment_recommendations() {
    let (app, db) = setup_test_app();
    seed_history(&db, "demo_user", 30);

    let response = get(
        &app,
        "/api/recommendations/investment/demo_user?risk_tolerance=aggressive",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["investment_allocation"]["stocks"], 80);
    assert_eq!(json["user_profile"]["risk_tolerance"], "aggressive");

    // Unknown tolerance falls back to moderate
    let response = get(
        &app,
        "/api/recommendations/investment/demo_user?risk_tolerance=yolo",
    )
    .await;
    let json = get_body_json(response).await;
    assert_eq!(json["investment_allocation"]["stocks"], 60);
}

#[tokio::test]
async fn test_savings_goals() {
    let (app, db) = setup_test_app();
    seed_history(&db, "demo_user", 30);

    let response = get(&app, "/api/recommendations/savings-goals/demo_user").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    let goals = json["savings_goals"].as_array().unwrap();
    assert_eq!(goals.len(), 5);
    assert_eq!(goals[0]["name"], "Emergency Fund");
}

#[tokio::test]
async fn test_spending_optimization() {
    let (app, db) = setup_test_app();
    seed_history(&db, "demo_user", 30);

    let response = get(
        &app,
        "/api/recommendations/spending-optimization/demo_user",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert!(json["spending_analysis"]["total_spending"].as_f64().unwrap() > 0.0);
    assert!(!json["category_insights"].as_object().unwrap().is_empty());
}
