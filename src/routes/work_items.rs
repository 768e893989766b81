//! Guarded writes on stories, epics and tasks.
//!
//! A status change that is only blocked by the approval gate opens a pending
//! approval request for the caller before the 403 is returned, so the next
//! attempt succeeds once the approver signs off.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use uuid::Uuid;

use super::{authorize, parse_kind};
use crate::app::AppState;
use crate::authz::{ActionKey, AuthzMode, Transition, REQUIRES_APPROVAL};
use crate::db::{access, work_items};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::AuthUser;
use crate::models::work_item::{StatusUpdateRequest, StatusUpdateResponse};

#[utoipa::path(
    put,
    path = "/items/{kind}/{id}/status",
    tag = "Work items",
    params(
        ("kind" = String, Path, description = "story, epic or task"),
        ("id" = Uuid, Path, description = "Work item id"),
    ),
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Status changed", body = StatusUpdateResponse),
        (status = 403, description = "Denied, or awaiting approval"),
        (status = 404, description = "Work item not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((kind, id)): Path<(String, Uuid)>,
    headers: HeaderMap,
    Json(req): Json<StatusUpdateRequest>,
) -> AppResult<Json<StatusUpdateResponse>> {
    let kind = parse_kind(&kind)?;
    let action = ActionKey::status_change_for(kind)
        .ok_or_else(|| AppError::bad_request(format!("a {} has no status", kind)))?;
    let subject = access::load_subject(&state.pool, kind, id).await?;
    let transition = Transition::to(req.status);

    let snapshot = access::load_snapshot(&state.pool, auth.user_id, Some(&subject), Some(transition)).await?;
    let decision = state
        .enforcer
        .can(&snapshot, action, auth.user_id, Some(&subject), Some(transition));

    if state.mode == AuthzMode::Strict && decision.reason.as_deref() == Some(REQUIRES_APPROVAL) {
        match state.workflow.create(auth.user_id, &subject, transition, None).await {
            Ok(request) => log_activity_with_context(
                &state.event_bus,
                "created",
                Some(auth.user_id),
                &request,
                None,
                Some(RequestContext::from_headers(&headers)),
            ),
            // Already waiting on an approver.
            Err(AppError::Conflict(_)) => {}
            Err(err) => return Err(err),
        }
    }
    state.mode.apply(decision)?;

    work_items::update_status(&state.pool, kind, id, req.status).await?;
    tracing::info!(item_id = %id, kind = %kind, status = req.status.as_str(), "status changed");

    Ok(Json(StatusUpdateResponse {
        id,
        kind,
        status: req.status,
    }))
}

#[utoipa::path(
    delete,
    path = "/items/{kind}/{id}",
    tag = "Work items",
    params(
        ("kind" = String, Path, description = "story, epic or task"),
        ("id" = Uuid, Path, description = "Work item id"),
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Denied"),
        (status = 404, description = "Work item not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_item(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((kind, id)): Path<(String, Uuid)>,
) -> AppResult<StatusCode> {
    let kind = parse_kind(&kind)?;
    let action = ActionKey::delete_for(kind).ok_or_else(|| AppError::bad_request(format!("a {} cannot be deleted here", kind)))?;
    let subject = access::load_subject(&state.pool, kind, id).await?;

    authorize(&state, auth, action, Some(&subject), None).await?;

    work_items::delete(&state.pool, kind, id).await?;
    tracing::info!(item_id = %id, kind = %kind, deleted_by = %auth.user_id, "work item deleted");

    Ok(StatusCode::NO_CONTENT)
}
