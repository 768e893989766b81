//! Project configuration: permission settings and custom roles.

use std::collections::HashSet;

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::authz::{CustomRoleDef, CustomRoleName, ProjectSettings, Role, RoleHierarchy};
use crate::db::row_parsers;
use crate::errors::{AppError, AppResult};
use crate::models::project::Project;
use crate::models::role::{CustomRole, CustomRoleAssignment};
use crate::utils::utc_now;

pub async fn fetch_project(pool: &SqlitePool, project_id: Uuid) -> AppResult<Project> {
    let row = sqlx::query(
        "SELECT id, organization_id, owner_id, name, settings, created_at, updated_at FROM projects WHERE id = ?",
    )
    .bind(project_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("Project not found"))?;

    row_parsers::project_from_row(&row)
}

/// Replaces the settings document. The caller is responsible for checking
/// that the actor may manage settings.
pub async fn update_settings(pool: &SqlitePool, project_id: Uuid, settings: &ProjectSettings) -> AppResult<()> {
    let json = serde_json::to_string(settings)
        .map_err(|e| AppError::internal(format!("failed to serialize settings: {}", e)))?;

    let result = sqlx::query("UPDATE projects SET settings = ?, updated_at = ? WHERE id = ?")
        .bind(json)
        .bind(utc_now().to_rfc3339())
        .bind(project_id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Project not found"));
    }
    Ok(())
}

pub async fn list_custom_roles(pool: &SqlitePool, project_id: Uuid) -> AppResult<Vec<CustomRole>> {
    let rows = sqlx::query(
        "SELECT project_id, name, description, implies, created_at FROM custom_roles WHERE project_id = ? ORDER BY name",
    )
    .bind(project_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_parsers::custom_role_from_row).collect()
}

pub async fn custom_role_defs(pool: &SqlitePool, project_id: Uuid) -> AppResult<Vec<CustomRoleDef>> {
    let roles = list_custom_roles(pool, project_id).await?;
    Ok(roles.iter().filter_map(row_parsers::custom_role_def).collect())
}

/// Defines a custom role after checking that every implied role exists and
/// that the new edges keep the hierarchy acyclic.
pub async fn define_custom_role(
    pool: &SqlitePool,
    project_id: Uuid,
    name: &str,
    description: Option<String>,
    implies: &[String],
) -> AppResult<CustomRole> {
    let name = CustomRoleName::new(name)?;
    let implied: Vec<Role> = implies
        .iter()
        .map(|role| Role::parse(role))
        .collect::<Result<_, _>>()?;

    fetch_project(pool, project_id).await?;
    let existing = custom_role_defs(pool, project_id).await?;
    if existing.iter().any(|def| def.name == name) {
        return Err(AppError::conflict(format!("Custom role '{}' already exists", name.as_str())));
    }

    let def = CustomRoleDef::new(name, implied);
    let mut known: HashSet<Role> = existing.iter().map(CustomRoleDef::role).collect();
    known.insert(def.role());
    RoleHierarchy::for_project(&existing).extend(&def, &known)?;

    let role = CustomRole {
        project_id,
        name: def.name.as_str().to_string(),
        description,
        implies: def.implies.iter().map(|r| r.to_string()).collect(),
        created_at: utc_now(),
    };
    let implies_json = serde_json::to_string(&role.implies)
        .map_err(|e| AppError::internal(format!("failed to serialize implies: {}", e)))?;

    sqlx::query(
        "INSERT INTO custom_roles (project_id, name, description, implies, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(project_id.to_string())
    .bind(&role.name)
    .bind(&role.description)
    .bind(implies_json)
    .bind(role.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    tracing::info!(project_id = %project_id, role = %role.name, "custom role defined");
    Ok(role)
}

pub async fn assign_custom_role(
    pool: &SqlitePool,
    project_id: Uuid,
    user_id: Uuid,
    role_name: &str,
) -> AppResult<CustomRoleAssignment> {
    let name = CustomRoleName::new(role_name)?;

    let defined = custom_role_defs(pool, project_id).await?;
    if !defined.iter().any(|def| def.name == name) {
        return Err(AppError::not_found(format!("Custom role '{}' not found", name.as_str())));
    }

    let assignment = CustomRoleAssignment {
        project_id,
        user_id,
        role_name: name.as_str().to_string(),
        created_at: utc_now(),
    };

    sqlx::query(
        "INSERT OR IGNORE INTO custom_role_assignments (project_id, user_id, role_name, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(project_id.to_string())
    .bind(user_id.to_string())
    .bind(&assignment.role_name)
    .bind(assignment.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(assignment)
}
