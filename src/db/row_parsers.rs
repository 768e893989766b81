use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::authz::{CustomRoleDef, CustomRoleName, ProjectSettings, Role, SubjectKind, Transition, WorkItem, WorkStatus};
use crate::errors::AppError;
use crate::models::approval::{ApprovalRequest, ApprovalStatus};
use crate::models::project::Project;
use crate::models::role::CustomRole;

pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, AppError> {
    let s = s.trim();

    // RFC3339 first (e.g. 2025-11-19T12:34:56Z)
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // SQLite default timestamp format: "YYYY-MM-DD HH:MM:SS" (with optional fractional seconds)
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    if let Ok(naive_date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let ndt = naive_date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| AppError::internal("invalid datetime: date out of range".to_string()))?;
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    Err(AppError::internal(format!("invalid datetime: {}", s)))
}

pub fn parse_opt_datetime(s: Option<String>) -> Result<Option<DateTime<Utc>>, AppError> {
    match s {
        Some(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else {
                Ok(Some(parse_datetime(trimmed)?))
            }
        }
        None => Ok(None),
    }
}

fn get_str(row: &SqliteRow, column: &str) -> Result<String, AppError> {
    row.try_get(column)
        .map_err(|e| AppError::internal(format!("missing {}: {}", column, e)))
}

fn get_opt_str(row: &SqliteRow, column: &str) -> Result<Option<String>, AppError> {
    row.try_get(column)
        .map_err(|e| AppError::internal(format!("missing {}: {}", column, e)))
}

fn parse_uuid(s: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(s.trim()).map_err(|e| AppError::internal(format!("invalid uuid: {}", e)))
}

fn get_uuid(row: &SqliteRow, column: &str) -> Result<Uuid, AppError> {
    parse_uuid(&get_str(row, column)?)
}

fn get_opt_uuid(row: &SqliteRow, column: &str) -> Result<Option<Uuid>, AppError> {
    get_opt_str(row, column)?
        .filter(|s| !s.trim().is_empty())
        .map(|s| parse_uuid(&s))
        .transpose()
}

pub fn approval_from_row(row: &SqliteRow) -> Result<ApprovalRequest, AppError> {
    let subject_type_s = get_str(row, "subject_type")?;
    let transition_s = get_str(row, "transition")?;
    let status_s = get_str(row, "status")?;

    let subject_type = SubjectKind::parse(&subject_type_s)
        .ok_or_else(|| AppError::internal(format!("invalid subject_type: {}", subject_type_s)))?;
    let transition = Transition::parse(&transition_s)
        .map_err(|e| AppError::internal(format!("invalid transition: {}", e)))?;
    let status = ApprovalStatus::parse(&status_s)
        .ok_or_else(|| AppError::internal(format!("invalid approval status: {}", status_s)))?;

    Ok(ApprovalRequest {
        id: get_uuid(row, "id")?,
        subject_type,
        subject_id: get_uuid(row, "subject_id")?,
        project_id: get_uuid(row, "project_id")?,
        transition,
        requested_by: get_uuid(row, "requested_by")?,
        approver_id: get_uuid(row, "approver_id")?,
        status,
        decision_comment: get_opt_str(row, "decision_comment")?,
        decided_by: get_opt_uuid(row, "decided_by")?,
        decided_at: parse_opt_datetime(get_opt_str(row, "decided_at")?)?,
        created_at: parse_datetime(&get_str(row, "created_at")?)?,
    })
}

pub fn project_from_row(row: &SqliteRow) -> Result<Project, AppError> {
    let settings_s = get_opt_str(row, "settings")?;

    Ok(Project {
        id: get_uuid(row, "id")?,
        organization_id: get_opt_uuid(row, "organization_id")?,
        owner_id: get_uuid(row, "owner_id")?,
        name: get_str(row, "name")?,
        settings: ProjectSettings::from_stored(settings_s.as_deref()),
        created_at: parse_datetime(&get_str(row, "created_at")?)?,
        updated_at: parse_datetime(&get_str(row, "updated_at")?)?,
    })
}

pub fn custom_role_from_row(row: &SqliteRow) -> Result<CustomRole, AppError> {
    let implies_s = get_str(row, "implies")?;
    let implies: Vec<String> = serde_json::from_str(&implies_s)
        .map_err(|e| AppError::internal(format!("invalid implies list: {}", e)))?;

    Ok(CustomRole {
        project_id: get_uuid(row, "project_id")?,
        name: get_str(row, "name")?,
        description: get_opt_str(row, "description")?,
        implies,
        created_at: parse_datetime(&get_str(row, "created_at")?)?,
    })
}

/// Engine view of a stored custom role. Entries that no longer parse are
/// skipped with a warning rather than failing the whole lookup.
pub fn custom_role_def(role: &CustomRole) -> Option<CustomRoleDef> {
    let name = match CustomRoleName::new(role.name.as_str()) {
        Ok(name) => name,
        Err(err) => {
            tracing::warn!(role = %role.name, error = %err, "ignoring stored custom role");
            return None;
        }
    };

    let implies = role
        .implies
        .iter()
        .filter_map(|implied| match Role::parse(implied) {
            Ok(role) => Some(role),
            Err(err) => {
                tracing::warn!(role = %name.as_str(), implied = %implied, error = %err, "ignoring implied role");
                None
            }
        })
        .collect::<Vec<_>>();

    Some(CustomRoleDef::new(name, implies))
}

pub fn work_item_from_row(row: &SqliteRow) -> Result<(SubjectKind, WorkItem), AppError> {
    let kind_s = get_str(row, "kind")?;
    let status_s = get_str(row, "status")?;

    let kind = SubjectKind::parse(&kind_s)
        .filter(SubjectKind::is_work_item)
        .ok_or_else(|| AppError::internal(format!("invalid work item kind: {}", kind_s)))?;
    let status = WorkStatus::parse(&status_s)
        .ok_or_else(|| AppError::internal(format!("invalid work item status: {}", status_s)))?;

    Ok((
        kind,
        WorkItem {
            id: get_uuid(row, "id")?,
            project_id: get_opt_uuid(row, "project_id")?,
            status,
        },
    ))
}
