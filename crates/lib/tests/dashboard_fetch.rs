//! Integration test: dashboard loader against a local service.

mod common;

use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use lib::dashboard::loader::LOAD_ERROR_TEXT;
use lib::dashboard::{DashboardClient, DashboardLoader, LoadState};
use serde_json::{json, Value};
use std::collections::HashMap;

async fn summary(Query(q): Query<HashMap<String, String>>) -> Result<Json<Value>, StatusCode> {
    if q.get("level").map(String::as_str) != Some("universidad") {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(Json(json!({
        "summary": {
            "total_students": 3,
            "performance_distribution": {"Alto": 1, "Medio": 1, "Bajo": 1},
            "semester_distribution": {"1": 2, "2": 1},
            "program_distribution": {"Ingeniería": 3}
        },
        "trends": [{"week": 9, "avg_grade": 8.2, "avg_attendance": 0.9, "avg_assignments": 0.75, "student_count": 3}],
        "metadata": {"last_updated": "2024-05-01T10:30:00", "analysis_period": "Semanas 9-12"}
    })))
}

async fn load(router: Router) -> DashboardLoader {
    let base = common::spawn_server(move |_| router).await;
    let client = DashboardClient::new(base);
    let (mut loader, job) = DashboardLoader::mount("universidad");
    let job = job.expect("fetch on mount");
    let result = job.run(&client).await;
    loader.complete(job.ticket, result);
    loader
}

#[tokio::test]
async fn loads_summary_for_level() {
    let loader = load(Router::new().route("/dashboard", get(summary))).await;
    let data = loader.data().expect("loaded");
    assert_eq!(data.summary.total_students, 3.0);
    assert_eq!(data.summary.semester_rows().len(), 2);
    assert_eq!(data.trends[0].week_label(), "9");
    assert_eq!(data.metadata.analysis_period, "Semanas 9-12");
}

#[tokio::test]
async fn server_error_shows_error_text_only() {
    let loader = load(Router::new().route(
        "/dashboard",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    ))
    .await;
    assert_eq!(loader.state(), &LoadState::Error(LOAD_ERROR_TEXT.to_string()));
    assert!(loader.data().is_none());
}

#[tokio::test]
async fn garbage_body_is_an_error() {
    let loader = load(Router::new().route("/dashboard", get(|| async { "<html>oops</html>" }))).await;
    assert!(matches!(loader.state(), LoadState::Error(_)));
}
