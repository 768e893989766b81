use std::sync::Arc;

use axum::http::Method;
use axum::routing::{delete, get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::{ApprovalWorkflow, AuthzMode, PermissionEnforcer};
use crate::errors::AppError;
use crate::events::EventBus;
use crate::jwt::JwtConfig;
use crate::routes::{approvals, authz_check, health, permissions, roles, work_items};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub event_bus: EventBus,
    pub enforcer: Arc<PermissionEnforcer>,
    pub workflow: ApprovalWorkflow,
    pub mode: AuthzMode,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, event_bus: EventBus, mode: AuthzMode) -> Self {
        Self {
            workflow: ApprovalWorkflow::new(pool.clone()),
            pool,
            jwt: Arc::new(jwt),
            event_bus,
            enforcer: Arc::new(PermissionEnforcer::default()),
            mode,
        }
    }
}

/// Builds the router from environment configuration.
pub async fn create_app(pool: SqlitePool, event_bus: EventBus) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let mode = AuthzMode::from_env();
    tracing::info!(mode = mode.as_str(), "authorization mode");

    Ok(router(AppState::new(pool, jwt_config, event_bus, mode)))
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let project_routes = Router::new()
        .route(
            "/:id/permissions",
            get(permissions::get_settings).put(permissions::update_settings),
        )
        .route("/:id/permissions/matrix", get(permissions::matrix))
        .route("/:id/roles", get(roles::list_roles).post(roles::create_role))
        .route("/:id/members/:user_id/roles", post(roles::assign_role))
        .route("/:id/approvals", get(approvals::list_for_project));

    let approval_routes = Router::new()
        .route("/", post(approvals::create))
        .route("/:id", get(approvals::get_one))
        .route("/:id/approve", post(approvals::approve))
        .route("/:id/reject", post(approvals::reject))
        .route("/:id/cancel", post(approvals::cancel));

    let item_routes = Router::new()
        .route("/:kind/:id/status", put(work_items::update_status))
        .route("/:kind/:id", delete(work_items::delete_item));

    Router::new()
        .route("/api/health", get(health::health))
        .route("/authz/check", post(authz_check::check))
        .nest("/projects", project_routes)
        .nest("/approvals", approval_routes)
        .nest("/items", item_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
