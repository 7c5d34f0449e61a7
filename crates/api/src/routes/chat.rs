use crate::auth::AuthenticatedUser;
use crate::error::{ApiError, ApiResult};
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, post},
    Json, Router,
};
use baodao_common::{ApiResponse, Language, Teacher};
use baodao_core::orchestrator::{ChatOutcome, ChatRequest};
use baodao_core::TalkCore;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::debug;

pub fn routes(core: Arc<TalkCore>) -> Router {
    Router::new()
        .route("/", post(chat))
        .route("/", delete(delete_chat))
        .with_state(core)
}

/// One conversational turn. The selected-time shortcut answers with a plain
/// JSON teacher list; everything else streams newline-delimited JSON events.
async fn chat(
    State(core): State<Arc<TalkCore>>,
    user: AuthenticatedUser,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Response> {
    debug!("Chat turn {} from {}", request.id, user.id);
    let outcome = core
        .orchestrator
        .handle(request, user.student_profile())
        .await;

    match outcome {
        ChatOutcome::Teachers { language, teachers } => {
            Ok(Json(teachers_response(language, teachers)).into_response())
        }
        ChatOutcome::Stream(rx) => {
            let body = Body::from_stream(ReceiverStream::new(rx).map(|event| {
                let mut line =
                    serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
                line.push('\n');
                Ok::<_, std::convert::Infallible>(line)
            }));
            Response::builder()
                .header(header::CONTENT_TYPE, "application/x-ndjson")
                .body(body)
                .map_err(|e| ApiError::Internal(e.to_string()))
        }
    }
}

fn teachers_response(language: Language, teachers: Vec<Teacher>) -> ApiResponse<Value> {
    ApiResponse::success(json!({
        "availableTeachers": teachers,
        "language": language,
    }))
}

#[derive(Debug, Deserialize)]
struct DeleteParams {
    id: Option<String>,
}

/// Idempotent transcript removal; deleting an absent chat still succeeds.
async fn delete_chat(
    State(core): State<Arc<TalkCore>>,
    user: AuthenticatedUser,
    Query(params): Query<DeleteParams>,
) -> ApiResult<StatusCode> {
    let id = params
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::Validation("Chat ID is required".to_string()))?;
    debug!("Deleting transcript {} for {}", id, user.id);
    core.store.delete_chat(&id).await?;
    Ok(StatusCode::OK)
}
