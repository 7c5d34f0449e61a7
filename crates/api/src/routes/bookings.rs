use crate::auth::AuthenticatedUser;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use baodao_common::{ApiResponse, ConfirmationEmail, Language};
use baodao_core::teachers::{list_teachers, TEACHER_COUNT};
use baodao_core::TalkCore;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub fn routes(core: Arc<TalkCore>) -> Router {
    Router::new()
        .route("/:id/payment", post(complete_payment))
        .with_state(core)
}

#[derive(Debug, Default, Deserialize)]
struct PaymentRequest {
    #[serde(default)]
    language: Option<Language>,
}

/// Mark a regular booking's payment as completed. The payment flag flips at
/// most once, and the confirmation email rides that transition, so repeated
/// calls confirm the same state without a second email.
async fn complete_payment(
    State(core): State<Arc<TalkCore>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    body: Option<Json<PaymentRequest>>,
) -> ApiResult<Json<ApiResponse<Value>>> {
    let booking = core
        .store
        .get_booking(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("booking {}", id)))?;
    if booking.student_id != user.id {
        return Err(ApiError::Authorization(
            "booking belongs to another student".to_string(),
        ));
    }

    let newly_completed = core.store.complete_payment(id).await?;
    if newly_completed {
        info!("Payment completed for booking {}", id);
        // The email speaks the language pinned to the student's conversation;
        // the request body is only a fallback for clients without one.
        let language = core
            .store
            .latest_chat_language(user.id)
            .await?
            .and_then(|code| code.parse::<Language>().ok())
            .or_else(|| body.and_then(|Json(request)| request.language))
            .unwrap_or_default();
        let slot = core.store.get_schedule_slot(booking.schedule_slot_id).await?;
        let teacher_name = list_teachers(TEACHER_COUNT, language)
            .into_iter()
            .find(|t| t.id == booking.teacher_id)
            .map(|t| t.name)
            .unwrap_or_else(|| booking.teacher_id.clone());

        let email = ConfirmationEmail {
            recipient: user.email.clone(),
            student_name: user.name.clone().unwrap_or_else(|| user.email.clone()),
            teacher_name,
            lesson_date_time: slot
                .map(|s| s.start_time)
                .unwrap_or(booking.created_at),
            lesson_type: booking.lesson_type,
            classroom_link: booking.classroom_link.clone(),
            language,
        };
        if let Err(e) = core.mailer.send(&email).await {
            warn!("Confirmation email failed for booking {}: {}", id, e);
        }
    }

    Ok(Json(payment_response(id, newly_completed)))
}

fn payment_response(id: Uuid, newly_completed: bool) -> ApiResponse<Value> {
    ApiResponse::success(json!({
        "bookingId": id,
        "status": "confirmed",
        "alreadyCompleted": !newly_completed,
    }))
}
