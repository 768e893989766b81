//! Project-defined custom roles.
//!
//! Defining and assigning roles changes who can do what, so both are gated on
//! `manage_settings` and logged as critical activity.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use uuid::Uuid;

use super::authorize;
use crate::app::AppState;
use crate::authz::{ActionKey, Subject};
use crate::db::projects;
use crate::errors::AppResult;
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::AuthUser;
use crate::models::role::{AssignCustomRoleRequest, CustomRole, CustomRoleAssignment, CustomRoleCreateRequest};

#[utoipa::path(
    get,
    path = "/projects/{id}/roles",
    tag = "Roles",
    params(("id" = Uuid, Path, description = "Project id")),
    responses((status = 200, description = "Custom roles of the project", body = Vec<CustomRole>)),
    security(("bearerAuth" = []))
)]
pub async fn list_roles(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<Vec<CustomRole>>> {
    projects::fetch_project(&state.pool, project_id).await?;
    let roles = projects::list_custom_roles(&state.pool, project_id).await?;
    Ok(Json(roles))
}

#[utoipa::path(
    post,
    path = "/projects/{id}/roles",
    tag = "Roles",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = CustomRoleCreateRequest,
    responses(
        (status = 201, description = "Custom role defined", body = CustomRole),
        (status = 400, description = "Invalid name, unknown implied role or cycle"),
        (status = 409, description = "Role already defined"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<CustomRoleCreateRequest>,
) -> AppResult<(StatusCode, Json<CustomRole>)> {
    authorize(
        &state,
        auth,
        ActionKey::ManageSettings,
        Some(&Subject::Project { id: project_id }),
        None,
    )
    .await?;

    let role = projects::define_custom_role(&state.pool, project_id, &req.name, req.description, &req.implies).await?;

    log_activity_with_context(
        &state.event_bus,
        "created",
        Some(auth.user_id),
        &role,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(role)))
}

#[utoipa::path(
    post,
    path = "/projects/{id}/members/{user_id}/roles",
    tag = "Roles",
    params(
        ("id" = Uuid, Path, description = "Project id"),
        ("user_id" = Uuid, Path, description = "User receiving the role"),
    ),
    request_body = AssignCustomRoleRequest,
    responses(
        (status = 201, description = "Role assigned", body = CustomRoleAssignment),
        (status = 404, description = "Custom role not defined"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn assign_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, user_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
    Json(req): Json<AssignCustomRoleRequest>,
) -> AppResult<(StatusCode, Json<CustomRoleAssignment>)> {
    authorize(
        &state,
        auth,
        ActionKey::ManageSettings,
        Some(&Subject::Project { id: project_id }),
        None,
    )
    .await?;

    let assignment = projects::assign_custom_role(&state.pool, project_id, user_id, &req.role).await?;

    log_activity_with_context(
        &state.event_bus,
        "created",
        Some(auth.user_id),
        &assignment,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(assignment)))
}
