use axum::extract::State;
use axum::Json;

use crate::app::AppState;
use crate::authz::{ActionKey, Transition};
use crate::db::access;
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::work_item::{CheckRequest, CheckResponse};

/// Evaluates one action for the caller without performing it. The decision
/// is returned as-is, regardless of the enforcement mode.
#[utoipa::path(
    post,
    path = "/authz/check",
    tag = "Permissions",
    request_body = CheckRequest,
    responses(
        (status = 200, description = "Decision for the caller", body = CheckResponse),
        (status = 400, description = "Unknown action or incomplete subject"),
        (status = 404, description = "Subject not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn check(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CheckRequest>,
) -> AppResult<Json<CheckResponse>> {
    let action = ActionKey::parse(&req.action)?;

    let subject = match (req.subject_type, req.subject_id) {
        (Some(kind), Some(id)) => Some(access::load_subject(&state.pool, kind, id).await?),
        (None, None) => None,
        _ => return Err(AppError::bad_request("subject_type and subject_id must be given together")),
    };
    let transition = req.target_status.map(Transition::to);

    let snapshot = access::load_snapshot(&state.pool, auth.user_id, subject.as_ref(), transition).await?;
    let decision = state
        .enforcer
        .can(&snapshot, action, auth.user_id, subject.as_ref(), transition);

    Ok(Json(CheckResponse {
        action: action.as_str().to_string(),
        decision,
    }))
}
