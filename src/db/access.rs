//! Loads the per-call snapshot the permission engine decides against.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::authz::{AccessSnapshot, Role, Subject, SubjectKind, SubjectRef, Transition};
use crate::db::{projects, row_parsers};
use crate::errors::{AppError, AppResult};
use crate::models::project::Project;

pub async fn is_super_admin(pool: &SqlitePool, user_id: Uuid) -> AppResult<bool> {
    let flag: Option<i64> = sqlx::query_scalar("SELECT is_super_admin FROM users WHERE id = ?")
        .bind(user_id.to_string())
        .fetch_optional(pool)
        .await?;

    Ok(flag.unwrap_or(0) != 0)
}

async fn role_column(pool: &SqlitePool, sql: &str, binds: [String; 2]) -> AppResult<Vec<Role>> {
    let [first, second] = binds;
    let rows = sqlx::query(sql).bind(first).bind(second).fetch_all(pool).await?;

    let mut roles = Vec::with_capacity(rows.len());
    for row in rows {
        let name: String = row.try_get(0)?;
        match Role::parse(&name) {
            Ok(role) => roles.push(role),
            Err(err) => tracing::warn!(role = %name, error = %err, "ignoring stored role assignment"),
        }
    }
    Ok(roles)
}

pub async fn organization_roles(pool: &SqlitePool, user_id: Uuid, organization_id: Uuid) -> AppResult<Vec<Role>> {
    role_column(
        pool,
        "SELECT role FROM organization_members WHERE user_id = ? AND organization_id = ?",
        [user_id.to_string(), organization_id.to_string()],
    )
    .await
}

/// Membership roles; the project owner always holds `owner`.
pub async fn project_roles(pool: &SqlitePool, user_id: Uuid, project: &Project) -> AppResult<Vec<Role>> {
    let mut roles = role_column(
        pool,
        "SELECT role FROM project_members WHERE user_id = ? AND project_id = ?",
        [user_id.to_string(), project.id.to_string()],
    )
    .await?;

    if project.owner_id == user_id {
        roles.push(crate::authz::SystemRole::Owner.into());
    }
    Ok(roles)
}

pub async fn assigned_custom_roles(pool: &SqlitePool, user_id: Uuid, project_id: Uuid) -> AppResult<Vec<Role>> {
    role_column(
        pool,
        "SELECT role_name FROM custom_role_assignments WHERE user_id = ? AND project_id = ?",
        [user_id.to_string(), project_id.to_string()],
    )
    .await
}

/// An approval counts while it is the latest decision for the subject and
/// transition and the subject's status has not changed since it was granted.
/// Applying the change therefore consumes it, and a later rejection revokes it.
pub async fn has_approved(pool: &SqlitePool, subject: &SubjectRef, transition: &Transition) -> AppResult<bool> {
    let rows = sqlx::query(
        "SELECT status, decided_at FROM approval_requests WHERE subject_type = ? AND subject_id = ? AND transition = ? AND status IN ('approved', 'rejected') AND decided_at IS NOT NULL ORDER BY rowid",
    )
    .bind(subject.kind.as_str())
    .bind(subject.id.to_string())
    .bind(transition.key())
    .fetch_all(pool)
    .await?;

    let mut latest: Option<(DateTime<Utc>, bool)> = None;
    for row in rows {
        let decided_at = row_parsers::parse_datetime(&row.try_get::<String, _>("decided_at")?)?;
        let approved = row.try_get::<String, _>("status")? == "approved";
        if latest.map_or(true, |(at, _)| decided_at >= at) {
            latest = Some((decided_at, approved));
        }
    }

    let Some((granted_at, true)) = latest else {
        return Ok(false);
    };

    match status_changed_at(pool, subject).await? {
        Some(changed_at) => Ok(granted_at >= changed_at),
        None => Ok(true),
    }
}

/// Last status change of a work item, or its creation time. Projects and
/// sprints carry no status.
async fn status_changed_at(pool: &SqlitePool, subject: &SubjectRef) -> AppResult<Option<DateTime<Utc>>> {
    if !matches!(subject.kind, SubjectKind::Story | SubjectKind::Epic | SubjectKind::Task) {
        return Ok(None);
    }

    let changed: Option<String> =
        sqlx::query_scalar("SELECT COALESCE(status_changed_at, created_at) FROM work_items WHERE id = ? AND kind = ?")
            .bind(subject.id.to_string())
            .bind(subject.kind.as_str())
            .fetch_optional(pool)
            .await?;

    changed.as_deref().map(row_parsers::parse_datetime).transpose()
}

/// Resolves a subject reference into a full subject.
pub async fn load_subject(pool: &SqlitePool, kind: SubjectKind, id: Uuid) -> AppResult<Subject> {
    match kind {
        SubjectKind::Project => {
            projects::fetch_project(pool, id).await?;
            Ok(Subject::Project { id })
        }
        SubjectKind::Sprint => {
            let project_id: String = sqlx::query_scalar("SELECT project_id FROM sprints WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(pool)
                .await?
                .ok_or_else(|| AppError::not_found("Sprint not found"))?;
            let project_id = Uuid::parse_str(&project_id)
                .map_err(|e| AppError::internal(format!("invalid uuid: {}", e)))?;
            Ok(Subject::Sprint { id, project_id })
        }
        SubjectKind::Story | SubjectKind::Epic | SubjectKind::Task => {
            let row = sqlx::query("SELECT id, kind, project_id, status FROM work_items WHERE id = ? AND kind = ?")
                .bind(id.to_string())
                .bind(kind.as_str())
                .fetch_optional(pool)
                .await?
                .ok_or_else(|| AppError::not_found(format!("{} not found", kind)))?;

            let (kind, item) = row_parsers::work_item_from_row(&row)?;
            Subject::work_item(kind, item).ok_or_else(|| AppError::internal("work item kind mismatch"))
        }
    }
}

/// Reads everything `PermissionEnforcer::can` needs for one user and one
/// subject. Subjects without a project only carry the super admin flag.
pub async fn load_snapshot(
    pool: &SqlitePool,
    user_id: Uuid,
    subject: Option<&Subject>,
    transition: Option<Transition>,
) -> AppResult<AccessSnapshot> {
    let mut snapshot = AccessSnapshot::new();
    if is_super_admin(pool, user_id).await? {
        snapshot = snapshot.with_super_admin(user_id);
    }

    let Some((subject, project_id)) = subject.and_then(|s| s.project_of().map(|p| (s, p))) else {
        return Ok(snapshot);
    };

    let project = projects::fetch_project(pool, project_id).await?;
    snapshot = snapshot
        .with_project(project.id, project.organization_id)
        .with_settings(project.id, project.settings.permission_settings.clone())
        .with_custom_roles(project.id, projects::custom_role_defs(pool, project.id).await?)
        .with_project_roles(user_id, project.id, project_roles(pool, user_id, &project).await?)
        .with_custom_assignments(user_id, project.id, assigned_custom_roles(pool, user_id, project.id).await?);

    if let Some(org) = project.organization_id {
        snapshot = snapshot.with_org_roles(user_id, org, organization_roles(pool, user_id, org).await?);
    }

    if let Some(transition) = transition {
        let reference = subject.reference();
        if has_approved(pool, &reference, &transition).await? {
            snapshot = snapshot.with_approval(reference, transition);
        }
    }

    Ok(snapshot)
}
