pub mod approvals;
pub mod authz_check;
pub mod health;
pub mod permissions;
pub mod roles;
pub mod work_items;

use crate::app::AppState;
use crate::authz::{ActionKey, Subject, SubjectKind, Transition};
use crate::db::access;
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;

/// Runs one permission check for the caller and applies it under the
/// configured mode.
pub(crate) async fn authorize(
    state: &AppState,
    auth: AuthUser,
    action: ActionKey,
    subject: Option<&Subject>,
    transition: Option<Transition>,
) -> AppResult<()> {
    let snapshot = access::load_snapshot(&state.pool, auth.user_id, subject, transition).await?;
    let decision = state.enforcer.can(&snapshot, action, auth.user_id, subject, transition);

    if !decision.allowed {
        tracing::info!(
            user_id = %auth.user_id,
            action = %action,
            reason = decision.reason.as_deref().unwrap_or_default(),
            "permission denied"
        );
    }
    state.mode.apply(decision)
}

pub(crate) fn parse_kind(raw: &str) -> AppResult<SubjectKind> {
    SubjectKind::parse(raw).ok_or_else(|| AppError::bad_request(format!("unknown subject type '{}'", raw)))
}
