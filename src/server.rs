//! HTTP surface: trigger evaluation, ingest one log row, extract goal
//! matches from free text.
//!
//! Every handler returns a JSON envelope with a `success` flag. Input
//! validation fails with 400 before any collaborator is touched;
//! configuration and collaborator failures are 500 with the underlying
//! message.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use crate::engine::{self, EvaluateOptions};
use crate::extraction;
use crate::state::SqliteStateStore;
use crate::traits::{CompletionProvider, LogStore, NewLogEntry};
use crate::utils::parse_utc_timestamp;

/// Shared handler state. Collaborator clients are constructed once at startup
/// and injected here; handlers never rebuild them per request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SqliteStateStore>,
    pub provider: Option<Arc<dyn CompletionProvider>>,
    pub auth_token: Option<String>,
    pub evaluate_options: EvaluateOptions,
    pub started_at: Instant,
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/api/evaluate_goals",
            get(evaluate_goals_handler).post(evaluate_goals_handler),
        )
        .route("/api/log_result", post(log_result_handler))
        .route(
            "/api/text_to_goal",
            get(text_to_goal_handler).post(text_to_goal_handler),
        )
        .route("/api/status", get(status_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .merge(api)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Auth middleware
// ---------------------------------------------------------------------------

async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: axum::extract::Request,
    next: Next,
) -> Result<impl IntoResponse, StatusCode> {
    // No token configured: serve open (e.g. behind a trusted proxy).
    let Some(expected) = &state.auth_token else {
        return Ok(next.run(request).await);
    };

    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");

    if token != expected {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health_handler() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn status_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "provider_configured": state.provider.is_some(),
    }))
}

fn bad_request(message: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"success": false, "error": message})),
    )
}

fn internal_error(err: &anyhow::Error) -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"success": false, "error": err.to_string()})),
    )
}

#[derive(Deserialize, Default)]
struct EvaluateParams {
    user_id: Option<String>,
}

async fn evaluate_goals_handler(
    State(state): State<AppState>,
    Query(params): Query<EvaluateParams>,
    body: Option<Json<Value>>,
) -> (StatusCode, Json<Value>) {
    let user_id = params
        .user_id
        .or_else(|| {
            body.as_ref()
                .and_then(|Json(b)| b.get("user_id"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
        .filter(|s| !s.is_empty());

    let Some(user_id) = user_id else {
        return bad_request("Missing user_id");
    };

    let now = Utc::now();
    match engine::evaluate_goals_for_user(
        state.store.as_ref(),
        &user_id,
        now,
        state.evaluate_options,
    )
    .await
    {
        Ok(report) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "evaluated_at": now.to_rfc3339(),
                "result": report,
            })),
        ),
        Err(e) => {
            error!(user_id = %user_id, "Error evaluating goals: {:#}", e);
            internal_error(&e)
        }
    }
}

async fn log_result_handler(
    State(state): State<AppState>,
    body: Option<Json<Value>>,
) -> (StatusCode, Json<Value>) {
    let Some(Json(body)) = body else {
        return bad_request("Invalid JSON");
    };

    let entry = match parse_log_request(&body) {
        Ok(entry) => entry,
        Err(message) => return bad_request(&message),
    };

    match state.store.insert_log(&entry).await {
        Ok(inserted) => (
            StatusCode::OK,
            Json(json!({"success": true, "result": inserted})),
        ),
        Err(e) => {
            error!("Error logging result: {:#}", e);
            internal_error(&e)
        }
    }
}

#[derive(Deserialize, Default)]
struct TextToGoalParams {
    user_id: Option<String>,
    user_text: Option<String>,
    current_time: Option<String>,
}

async fn text_to_goal_handler(
    State(state): State<AppState>,
    Query(params): Query<TextToGoalParams>,
    body: Option<Json<Value>>,
) -> Response {
    let from_body = |key: &str| -> Option<String> {
        body.as_ref()
            .and_then(|Json(b)| b.get(key))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };

    let user_id = params
        .user_id
        .or_else(|| from_body("user_id"))
        .filter(|s| !s.is_empty());
    let user_text = params
        .user_text
        .or_else(|| from_body("user_text"))
        .filter(|s| !s.is_empty());

    let Some(user_id) = user_id else {
        return bad_request("Missing user_id").into_response();
    };
    let Some(user_text) = user_text else {
        return bad_request("Missing user_text").into_response();
    };
    let current_time = params
        .current_time
        .or_else(|| from_body("current_time"))
        .unwrap_or_else(|| Utc::now().to_rfc3339());

    let Some(provider) = &state.provider else {
        let err = anyhow::anyhow!(
            "completion provider not configured: no API key found in config, keychain, or environment"
        );
        error!("{}", err);
        return internal_error(&err).into_response();
    };

    match extraction::extract_activities(
        state.store.as_ref(),
        provider.as_ref(),
        &user_id,
        &user_text,
        &current_time,
    )
    .await
    {
        // The model is instructed to emit JSON; pass its content through.
        Ok(content) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            content,
        )
            .into_response(),
        Err(e) => {
            error!(user_id = %user_id, "Error generating goal match: {:#}", e);
            internal_error(&e).into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// Request validation
// ---------------------------------------------------------------------------

fn coerce_number(v: &Value) -> Option<f64> {
    if let Some(n) = v.as_f64() {
        return Some(n);
    }
    v.as_str().and_then(|s| s.trim().parse().ok())
}

/// Validate an ingestion request into a typed entry. All checks run before
/// the store is touched; the error string becomes the 400 body.
fn parse_log_request(body: &Value) -> Result<NewLogEntry, String> {
    let Some(obj) = body.as_object() else {
        return Err("Invalid JSON".to_string());
    };

    let user_id = obj
        .get("user_id")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or("Missing user_id")?
        .to_string();
    let tracker_id = obj
        .get("tracker_id")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or("Missing tracker_id")?
        .to_string();

    let value_number_raw = obj.get("value_number").filter(|v| !v.is_null());
    let value_text_raw = obj.get("value_text").filter(|v| !v.is_null());
    let value_json_raw = obj.get("value_json").filter(|v| !v.is_null());

    let supplied = [&value_number_raw, &value_text_raw, &value_json_raw]
        .iter()
        .filter(|v| v.is_some())
        .count();
    if supplied != 1 {
        return Err("Exactly one of value_number, value_text, value_json is required".to_string());
    }

    let value_number = match value_number_raw {
        Some(v) => Some(coerce_number(v).ok_or("Invalid value_number")?),
        None => None,
    };
    let value_text = match value_text_raw {
        Some(v) => Some(v.as_str().ok_or("Invalid value_text")?.to_string()),
        None => None,
    };
    let value_json = value_json_raw.cloned();

    let metadata = match obj.get("metadata") {
        None | Some(Value::Null) => None,
        Some(v) => Some(v.clone()),
    };

    // A present-but-null or unreadable timestamp is a caller error; an absent
    // one defaults to insert time in the store.
    let timestamp = match obj.get("timestamp") {
        None => None,
        Some(Value::Null) => return Err("Invalid timestamp".to_string()),
        Some(v) => {
            let raw = v.as_str().ok_or("Invalid timestamp")?;
            Some(parse_utc_timestamp(raw).ok_or("Invalid timestamp")?)
        }
    };

    Ok(NewLogEntry {
        user_id,
        tracker_id,
        value_number,
        value_text,
        value_json,
        metadata,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_user_id_rejected() {
        let err = parse_log_request(&json!({"tracker_id": "t", "value_number": 1})).unwrap_err();
        assert_eq!(err, "Missing user_id");
    }

    #[test]
    fn test_missing_tracker_id_rejected() {
        let err = parse_log_request(&json!({"user_id": "u", "value_number": 1})).unwrap_err();
        assert_eq!(err, "Missing tracker_id");
    }

    #[test]
    fn test_exactly_one_value_required() {
        let none = parse_log_request(&json!({"user_id": "u", "tracker_id": "t"})).unwrap_err();
        assert!(none.contains("Exactly one"));

        let two = parse_log_request(&json!({
            "user_id": "u", "tracker_id": "t",
            "value_number": 1, "value_text": "x",
        }))
        .unwrap_err();
        assert!(two.contains("Exactly one"));

        // An explicit null does not count as supplied.
        let entry = parse_log_request(&json!({
            "user_id": "u", "tracker_id": "t",
            "value_number": 2.5, "value_text": null,
        }))
        .unwrap();
        assert_eq!(entry.value_number, Some(2.5));
    }

    #[test]
    fn test_numeric_strings_are_coerced() {
        let entry = parse_log_request(&json!({
            "user_id": "u", "tracker_id": "t", "value_number": "12.5",
        }))
        .unwrap();
        assert_eq!(entry.value_number, Some(12.5));

        let err = parse_log_request(&json!({
            "user_id": "u", "tracker_id": "t", "value_number": "not a number",
        }))
        .unwrap_err();
        assert_eq!(err, "Invalid value_number");
    }

    #[test]
    fn test_value_text_must_be_string() {
        let err = parse_log_request(&json!({
            "user_id": "u", "tracker_id": "t", "value_text": 42,
        }))
        .unwrap_err();
        assert_eq!(err, "Invalid value_text");
    }

    #[test]
    fn test_value_json_accepts_any_document() {
        let entry = parse_log_request(&json!({
            "user_id": "u", "tracker_id": "t",
            "value_json": {"sets": [5, 5, 5]},
        }))
        .unwrap();
        assert_eq!(entry.value_json.unwrap()["sets"][0], 5);
    }

    #[test]
    fn test_timestamp_validation() {
        let entry = parse_log_request(&json!({
            "user_id": "u", "tracker_id": "t", "value_number": 1,
            "timestamp": "2024-01-02T09:00:00Z",
        }))
        .unwrap();
        assert!(entry.timestamp.is_some());

        let null_ts = parse_log_request(&json!({
            "user_id": "u", "tracker_id": "t", "value_number": 1,
            "timestamp": null,
        }))
        .unwrap_err();
        assert_eq!(null_ts, "Invalid timestamp");

        let bad_ts = parse_log_request(&json!({
            "user_id": "u", "tracker_id": "t", "value_number": 1,
            "timestamp": "yesterday-ish",
        }))
        .unwrap_err();
        assert_eq!(bad_ts, "Invalid timestamp");

        let absent = parse_log_request(&json!({
            "user_id": "u", "tracker_id": "t", "value_number": 1,
        }))
        .unwrap();
        assert!(absent.timestamp.is_none());
    }

    #[test]
    fn test_metadata_passthrough() {
        let entry = parse_log_request(&json!({
            "user_id": "u", "tracker_id": "t", "value_number": 1,
            "metadata": {"source": "watch"},
        }))
        .unwrap();
        assert_eq!(entry.metadata.unwrap()["source"], "watch");
    }

    #[test]
    fn test_non_object_body_rejected() {
        assert!(parse_log_request(&json!(["not", "an", "object"])).is_err());
    }
}
