//! Suggestion, scenario and history endpoints.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::Json;
use feedreply_agent::{Scenario, ScenarioContext};
use feedreply_core::message::Role;
use feedreply_providers::{SuggestContext, SuggestRequest, SuggestResponse};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::SharedState;

/// Entries returned by `GET /api/conversation-history`.
const HISTORY_PAGE: usize = 20;

/// One side of a suggestion exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
    pub timestamp: String,
}

impl HistoryEntry {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

fn scenario_context(context: SuggestContext) -> ScenarioContext {
    let scenario = context
        .scenario
        .as_deref()
        .map(|s| {
            s.parse().unwrap_or_else(|_| {
                warn!(scenario = %s, "Unknown scenario, using general");
                Scenario::General
            })
        })
        .unwrap_or_default();

    ScenarioContext {
        scenario,
        user_background: context.user_background,
        conversation_goal: context.conversation_goal,
    }
}

fn failure(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<SuggestResponse>) {
    (
        status,
        Json(SuggestResponse {
            success: false,
            data: None,
            error: Some(message.into()),
        }),
    )
}

/// `POST /api/conversation-suggest`
pub async fn suggest_handler(
    State(state): State<SharedState>,
    payload: Result<Json<SuggestRequest>, JsonRejection>,
) -> (StatusCode, Json<SuggestResponse>) {
    let Ok(Json(request)) = payload else {
        return failure(StatusCode::BAD_REQUEST, "Invalid request body");
    };

    let message = request.message.trim().to_string();
    if message.is_empty() {
        return failure(StatusCode::BAD_REQUEST, "Message must not be empty");
    }

    let context = scenario_context(request.context);
    info!(scenario = %context.scenario, message_len = message.chars().count(), "Suggestion requested");

    match state.generator.suggest(&message, &context).await {
        Ok(suggestion) => {
            state
                .remember([
                    HistoryEntry::user(message),
                    HistoryEntry::assistant(suggestion.suggestion.clone()),
                ])
                .await;
            (
                StatusCode::OK,
                Json(SuggestResponse {
                    success: true,
                    data: Some(suggestion),
                    error: None,
                }),
            )
        }
        Err(e) => {
            error!(error = %e, "Suggestion generation failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// `GET /api/scenarios`
pub async fn scenarios_handler() -> Json<Value> {
    let data: Vec<Value> = Scenario::ALL
        .iter()
        .map(|s| {
            json!({
                "id": s.id(),
                "name": s.display_name(),
                "description": s.description(),
            })
        })
        .collect();
    Json(json!({ "success": true, "data": data }))
}

/// `GET /api/conversation-history`
pub async fn history_handler(State(state): State<SharedState>) -> Json<Value> {
    let history = state.history.read().await;
    let skip = history.len().saturating_sub(HISTORY_PAGE);
    let recent: Vec<&HistoryEntry> = history.iter().skip(skip).collect();
    Json(json!({ "success": true, "data": recent }))
}

/// `DELETE /api/conversation-history`
pub async fn clear_history_handler(State(state): State<SharedState>) -> Json<Value> {
    state.history.write().await.clear();
    Json(json!({ "success": true, "message": "History cleared" }))
}

/// `POST /api/test` echoes the body back, for integration checks.
pub async fn test_handler(payload: Result<Json<Value>, JsonRejection>) -> Json<Value> {
    let echo = payload.map(|Json(v)| v).unwrap_or(Value::Null);
    info!(echo = %echo, "Test endpoint called");
    Json(json!({
        "success": true,
        "message": "Test successful",
        "echo": echo,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use axum::body::Body;
    use axum::http::Request;
    use feedreply_core::error::GenerationError;

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn suggestion_round_trip() {
        let state = test_state();
        let (status, json) = send(
            state.clone(),
            post(
                "/api/conversation-suggest",
                r#"{"message":"你好","context":{"scenario":"social"}}"#,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["suggestion"], "你好，很高兴认识你！");
        assert_eq!(json["data"]["tips"][0], "友好");
        assert!(json["data"]["timestamp"].is_string());
        assert_eq!(state.history.read().await.len(), 2);
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let (status, json) = send(
            test_state(),
            post("/api/conversation-suggest", r#"{"message":"   "}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert!(json.get("data").is_none());
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() {
        let (status, json) =
            send(test_state(), post("/api/conversation-suggest", "not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid request body");
    }

    #[tokio::test]
    async fn generation_failure_is_500() {
        let state = state_with(Err(GenerationError::AuthenticationFailed("bad key".into())));
        let (status, json) =
            send(state, post("/api/conversation-suggest", r#"{"message":"hi"}"#)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("bad key"));
    }

    #[tokio::test]
    async fn scenarios_catalogue() {
        let req = Request::builder()
            .uri("/api/scenarios")
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(test_state(), req).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<&str> = json["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["interview", "social", "business", "general"]);
        assert_eq!(json["data"][0]["name"], "面试");
    }

    #[tokio::test]
    async fn history_lists_and_clears() {
        let state = test_state();
        state
            .remember((0..30).map(|i| HistoryEntry::user(format!("m{i}"))))
            .await;

        let get = Request::builder()
            .uri("/api/conversation-history")
            .body(Body::empty())
            .unwrap();
        let (_, json) = send(state.clone(), get).await;
        let data = json["data"].as_array().unwrap();
        assert_eq!(data.len(), 20);
        assert_eq!(data[0]["content"], "m10");
        assert_eq!(data[0]["role"], "user");

        let delete = Request::builder()
            .method("DELETE")
            .uri("/api/conversation-history")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(state.clone(), delete).await;
        assert_eq!(status, StatusCode::OK);
        assert!(state.history.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_endpoint_echoes() {
        let (status, json) = send(test_state(), post("/api/test", r#"{"ping":1}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["echo"]["ping"], 1);
    }

    #[test]
    fn unknown_scenario_falls_back() {
        let ctx = scenario_context(SuggestContext {
            scenario: Some("dating".into()),
            ..SuggestContext::default()
        });
        assert_eq!(ctx.scenario, Scenario::General);
    }
}
