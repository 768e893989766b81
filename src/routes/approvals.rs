//! Approval requests for gated status transitions.
//!
//! Every transition of a request is published to the activity log with
//! critical severity.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::authorize;
use crate::app::AppState;
use crate::authz::ActionKey;
use crate::db::{access, projects};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::AuthUser;
use crate::models::approval::{
    ApprovalCreateRequest, ApprovalDecisionRequest, ApprovalRejectRequest, ApprovalRequest, ApprovalStatus,
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ApprovalListQuery {
    /// pending, approved, rejected or cancelled
    pub status: Option<String>,
}

fn publish(
    state: &AppState,
    action: &str,
    actor: Uuid,
    request: &ApprovalRequest,
    old: Option<&ApprovalRequest>,
    headers: &HeaderMap,
) {
    log_activity_with_context(
        &state.event_bus,
        action,
        Some(actor),
        request,
        old,
        Some(RequestContext::from_headers(headers)),
    );
}

/// Opens a request. The caller must hold a role that may change the
/// subject's status; only the approval gate is left to clear.
#[utoipa::path(
    post,
    path = "/approvals",
    tag = "Approvals",
    request_body = ApprovalCreateRequest,
    responses(
        (status = 201, description = "Approval requested", body = ApprovalRequest),
        (status = 400, description = "Transition is not gated, or the approver cannot decide"),
        (status = 403, description = "Caller may not change the status, or named themselves as approver"),
        (status = 409, description = "A request is already pending"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(req): Json<ApprovalCreateRequest>,
) -> AppResult<(StatusCode, Json<ApprovalRequest>)> {
    let action = ActionKey::status_change_for(req.subject_type)
        .ok_or_else(|| AppError::bad_request(format!("a {} has no status to approve", req.subject_type)))?;
    let subject = access::load_subject(&state.pool, req.subject_type, req.subject_id).await?;

    authorize(&state, auth, action, Some(&subject), None).await?;

    let request = state
        .workflow
        .create(auth.user_id, &subject, req.transition, req.approver_id)
        .await?;
    publish(&state, "created", auth.user_id, &request, None, &headers);

    Ok((StatusCode::CREATED, Json(request)))
}

#[utoipa::path(
    get,
    path = "/approvals/{id}",
    tag = "Approvals",
    params(("id" = Uuid, Path, description = "Approval request id")),
    responses(
        (status = 200, description = "Approval request", body = ApprovalRequest),
        (status = 404, description = "Not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_one(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApprovalRequest>> {
    Ok(Json(state.workflow.get(id).await?))
}

#[utoipa::path(
    get,
    path = "/projects/{id}/approvals",
    tag = "Approvals",
    params(("id" = Uuid, Path, description = "Project id"), ApprovalListQuery),
    responses((status = 200, description = "Approval requests, newest first", body = Vec<ApprovalRequest>)),
    security(("bearerAuth" = []))
)]
pub async fn list_for_project(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(project_id): Path<Uuid>,
    Query(query): Query<ApprovalListQuery>,
) -> AppResult<Json<Vec<ApprovalRequest>>> {
    let status = query
        .status
        .as_deref()
        .map(|raw| {
            ApprovalStatus::parse(raw).ok_or_else(|| AppError::bad_request(format!("unknown approval status '{}'", raw)))
        })
        .transpose()?;

    projects::fetch_project(&state.pool, project_id).await?;
    Ok(Json(state.workflow.list_for_project(project_id, status).await?))
}

#[utoipa::path(
    post,
    path = "/approvals/{id}/approve",
    tag = "Approvals",
    params(("id" = Uuid, Path, description = "Approval request id")),
    request_body = ApprovalDecisionRequest,
    responses(
        (status = 200, description = "Approved", body = ApprovalRequest),
        (status = 403, description = "Caller may not decide this request"),
        (status = 409, description = "Request is no longer pending"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn approve(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Option<Json<ApprovalDecisionRequest>>,
) -> AppResult<Json<ApprovalRequest>> {
    let comment = body.and_then(|Json(req)| req.comment);
    let before = state.workflow.get(id).await?;
    let request = state.workflow.approve(id, auth.user_id, comment).await?;
    publish(&state, "approved", auth.user_id, &request, Some(&before), &headers);

    Ok(Json(request))
}

#[utoipa::path(
    post,
    path = "/approvals/{id}/reject",
    tag = "Approvals",
    params(("id" = Uuid, Path, description = "Approval request id")),
    request_body = ApprovalRejectRequest,
    responses(
        (status = 200, description = "Rejected", body = ApprovalRequest),
        (status = 400, description = "Reason missing"),
        (status = 403, description = "Caller may not decide this request"),
        (status = 409, description = "Request is no longer pending"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn reject(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<ApprovalRejectRequest>,
) -> AppResult<Json<ApprovalRequest>> {
    let before = state.workflow.get(id).await?;
    let request = state.workflow.reject(id, auth.user_id, &req.reason).await?;
    publish(&state, "rejected", auth.user_id, &request, Some(&before), &headers);

    Ok(Json(request))
}

#[utoipa::path(
    post,
    path = "/approvals/{id}/cancel",
    tag = "Approvals",
    params(("id" = Uuid, Path, description = "Approval request id")),
    responses(
        (status = 200, description = "Cancelled", body = ApprovalRequest),
        (status = 403, description = "Only the requester can cancel"),
        (status = 409, description = "Request is no longer pending"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn cancel(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> AppResult<Json<ApprovalRequest>> {
    let before = state.workflow.get(id).await?;
    let request = state.workflow.cancel(id, auth.user_id).await?;
    publish(&state, "cancelled", auth.user_id, &request, Some(&before), &headers);

    Ok(Json(request))
}
