#![allow(dead_code)]

use anyhow::Result;
use chrono::Utc;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

/// Fresh file-backed database with migrations applied. Keep the `TempDir`
/// alive for as long as the pool is used.
pub async fn setup_pool() -> Result<(TempDir, SqlitePool)> {
    let dir = tempfile::tempdir()?;
    let opts = SqliteConnectOptions::new()
        .filename(dir.path().join("test.db"))
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator =
        sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;

    Ok((dir, pool))
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

pub async fn seed_user(pool: &SqlitePool, name: &str) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, name, email, is_super_admin, created_at) VALUES (?, ?, ?, 0, ?)")
        .bind(id.to_string())
        .bind(name)
        .bind(format!("{}-{}@example.com", name, id.simple()))
        .bind(now())
        .execute(pool)
        .await?;
    Ok(id)
}

pub async fn seed_super_admin(pool: &SqlitePool) -> Result<Uuid> {
    let id = seed_user(pool, "root").await?;
    sqlx::query("UPDATE users SET is_super_admin = 1 WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(id)
}

pub async fn seed_org(pool: &SqlitePool) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO organizations (id, name, created_at) VALUES (?, ?, ?)")
        .bind(id.to_string())
        .bind("Acme")
        .bind(now())
        .execute(pool)
        .await?;
    Ok(id)
}

pub async fn add_org_member(pool: &SqlitePool, org: Uuid, user: Uuid, role: &str) -> Result<()> {
    sqlx::query("INSERT INTO organization_members (organization_id, user_id, role, created_at) VALUES (?, ?, ?, ?)")
        .bind(org.to_string())
        .bind(user.to_string())
        .bind(role)
        .bind(now())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn seed_project(pool: &SqlitePool, owner: Uuid, org: Option<Uuid>) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO projects (id, organization_id, owner_id, name, settings, created_at, updated_at) VALUES (?, ?, ?, ?, '{}', ?, ?)",
    )
    .bind(id.to_string())
    .bind(org.map(|o| o.to_string()))
    .bind(owner.to_string())
    .bind("Launch")
    .bind(now())
    .bind(now())
    .execute(pool)
    .await?;
    Ok(id)
}

pub async fn set_settings(pool: &SqlitePool, project: Uuid, settings: serde_json::Value) -> Result<()> {
    sqlx::query("UPDATE projects SET settings = ? WHERE id = ?")
        .bind(settings.to_string())
        .bind(project.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn add_member(pool: &SqlitePool, project: Uuid, user: Uuid, role: &str) -> Result<()> {
    sqlx::query("INSERT INTO project_members (project_id, user_id, role, created_at) VALUES (?, ?, ?, ?)")
        .bind(project.to_string())
        .bind(user.to_string())
        .bind(role)
        .bind(now())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn seed_item(pool: &SqlitePool, kind: &str, project: Option<Uuid>, status: &str) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO work_items (id, kind, project_id, title, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(kind)
    .bind(project.map(|p| p.to_string()))
    .bind(format!("{} item", kind))
    .bind(status)
    .bind(now())
    .bind(now())
    .execute(pool)
    .await?;
    Ok(id)
}

pub async fn item_status(pool: &SqlitePool, id: Uuid) -> Result<String> {
    Ok(sqlx::query_scalar("SELECT status FROM work_items WHERE id = ?")
        .bind(id.to_string())
        .fetch_one(pool)
        .await?)
}

/// Project owned by `owner`, gating `status_change_to_done`, with `member`
/// holding the `member` role.
pub async fn gated_project(pool: &SqlitePool, owner: Uuid, member: Uuid) -> Result<Uuid> {
    let project = seed_project(pool, owner, None).await?;
    add_member(pool, project, member, "member").await?;
    set_settings(
        pool,
        project,
        serde_json::json!({
            "permission_settings": {
                "who_can_delete_stories": ["owner"],
                "require_approval_for": ["status_change_to_done"]
            }
        }),
    )
    .await?;
    Ok(project)
}
