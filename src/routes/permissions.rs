//! Project permission settings and the effective permission matrix.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use uuid::Uuid;

use super::authorize;
use crate::app::AppState;
use crate::authz::{ActionKey, ProjectSettings, Subject};
use crate::db::projects;
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::AuthUser;
use crate::models::project::{ActionRoles, ProjectSettingsChange};

#[utoipa::path(
    get,
    path = "/projects/{id}/permissions",
    tag = "Permissions",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Stored settings document"),
        (status = 404, description = "Project not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_settings(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<ProjectSettings>> {
    let project = projects::fetch_project(&state.pool, project_id).await?;
    Ok(Json(project.settings))
}

/// Replaces the whole settings document.
#[utoipa::path(
    put,
    path = "/projects/{id}/permissions",
    tag = "Permissions",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body(content = String, description = "Settings document with a `permission_settings` section", content_type = "application/json"),
    responses(
        (status = 200, description = "Settings updated"),
        (status = 400, description = "Malformed settings document"),
        (status = 403, description = "Caller may not manage settings"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_settings(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<ProjectSettings>> {
    let previous = projects::fetch_project(&state.pool, project_id).await?;
    authorize(
        &state,
        auth,
        ActionKey::ManageSettings,
        Some(&Subject::Project { id: project_id }),
        None,
    )
    .await?;

    let raw = std::str::from_utf8(&body).map_err(|_| AppError::bad_request("settings body must be UTF-8"))?;
    let settings = ProjectSettings::from_json_str(raw)?;
    projects::update_settings(&state.pool, project_id, &settings).await?;

    let old = ProjectSettingsChange {
        project_id,
        settings: previous.settings,
    };
    let new = ProjectSettingsChange {
        project_id,
        settings: settings.clone(),
    };
    log_activity_with_context(
        &state.event_bus,
        "updated",
        Some(auth.user_id),
        &new,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(settings))
}

/// Allowed roles per action after applying the project's overrides.
#[utoipa::path(
    get,
    path = "/projects/{id}/permissions/matrix",
    tag = "Permissions",
    params(("id" = Uuid, Path, description = "Project id")),
    responses((status = 200, description = "Effective matrix", body = Vec<ActionRoles>)),
    security(("bearerAuth" = []))
)]
pub async fn matrix(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<Vec<ActionRoles>>> {
    let project = projects::fetch_project(&state.pool, project_id).await?;
    let custom_roles = projects::custom_role_defs(&state.pool, project_id).await?;
    let settings = &project.settings.permission_settings;
    let policy = state.enforcer.policy();

    let rows = ActionKey::ALL
        .into_iter()
        .map(|action| {
            let allowed = policy.allowed_roles(action, Some(settings), &custom_roles);
            let overridden = settings.override_for(action).is_some() && allowed != policy.default_roles(action);
            ActionRoles {
                action: action.as_str().to_string(),
                setting_key: action.setting_key(),
                allowed_roles: allowed.iter().map(|role| role.to_string()).collect(),
                overridden,
            }
        })
        .collect();

    Ok(Json(rows))
}
