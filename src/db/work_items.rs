//! Writes to stories, epics and tasks. Callers decide permission first.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::authz::{SubjectKind, WorkStatus};
use crate::errors::{AppError, AppResult};
use crate::utils::utc_now;

pub async fn update_status(pool: &SqlitePool, kind: SubjectKind, id: Uuid, status: WorkStatus) -> AppResult<()> {
    let now = utc_now().to_rfc3339();
    let result = sqlx::query(
        "UPDATE work_items SET status_changed_at = CASE WHEN status = ? THEN status_changed_at ELSE ? END, status = ?, updated_at = ? WHERE id = ? AND kind = ?",
    )
    .bind(status.as_str())
    .bind(&now)
    .bind(status.as_str())
    .bind(&now)
    .bind(id.to_string())
    .bind(kind.as_str())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found(format!("{} not found", kind)));
    }
    Ok(())
}

pub async fn delete(pool: &SqlitePool, kind: SubjectKind, id: Uuid) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM work_items WHERE id = ? AND kind = ?")
        .bind(id.to_string())
        .bind(kind.as_str())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found(format!("{} not found", kind)));
    }
    Ok(())
}
