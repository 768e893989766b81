use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::actions::ActionKey;
use super::context::AccessContext;
use super::policy::PermissionPolicy;
use super::resolver::RoleResolver;
use super::roles::{Role, SystemRole};
use super::subject::{Subject, Transition};
use crate::errors::{AppError, AppResult};

pub const REQUIRES_APPROVAL: &str = "requires approval";

/// Outcome of a permission check. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PermissionDecision {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl PermissionDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }

    pub fn into_result(self) -> AppResult<()> {
        if self.allowed {
            Ok(())
        } else {
            Err(AppError::forbidden(self.reason.unwrap_or_else(|| "permission denied".to_string())))
        }
    }
}

/// Combines role resolution, the permission policy and approval gating into
/// a single allow/deny decision.
///
/// Evaluation order:
/// 1. no resolvable project -> allow
/// 2. super admin or org admin of the project's organization -> allow
/// 3. no held or implied role among the allowed roles -> deny
/// 4. approval-gated transition without an approved request -> deny
/// 5. allow
#[derive(Debug, Clone, Default)]
pub struct PermissionEnforcer {
    resolver: RoleResolver,
    policy: PermissionPolicy,
}

impl PermissionEnforcer {
    pub fn new(resolver: RoleResolver, policy: PermissionPolicy) -> Self {
        Self { resolver, policy }
    }

    pub fn policy(&self) -> &PermissionPolicy {
        &self.policy
    }

    pub fn resolver(&self) -> &RoleResolver {
        &self.resolver
    }

    pub fn can<C: AccessContext + ?Sized>(
        &self,
        ctx: &C,
        action: ActionKey,
        user_id: Uuid,
        subject: Option<&Subject>,
        transition: Option<Transition>,
    ) -> PermissionDecision {
        // Subjects outside any project carry no policy; they stay open.
        let (subject, project_id) = match subject.and_then(|s| s.project_of().map(|p| (s, p))) {
            Some(found) => found,
            None => {
                tracing::debug!(user_id = %user_id, action = %action, "no project context, allowing");
                return PermissionDecision::allow();
            }
        };

        let organization_id = ctx.organization_of(project_id);
        let resolved = self.resolver.roles(ctx, user_id, Some(project_id), organization_id);

        if resolved.is_bypass() {
            tracing::debug!(
                user_id = %user_id,
                action = %action,
                super_admin = resolved.is_super_admin,
                org_admin = resolved.is_org_admin,
                "admin bypass"
            );
            return PermissionDecision::allow();
        }

        let settings = ctx.permission_settings(project_id);
        let allowed_roles = self.policy.allowed_roles(action, settings, ctx.custom_roles(project_id));

        if !resolved.holds_any(&allowed_roles) {
            tracing::debug!(
                user_id = %user_id,
                action = %action,
                project_id = %project_id,
                "no allowed role held"
            );
            return PermissionDecision::deny(format!(
                "Only {} can {}",
                join_roles(&allowed_roles),
                action.label()
            ));
        }

        if let (true, Some(transition), Some(settings)) = (action.is_status_change(), transition, settings) {
            let gated = subject.transition_requires_approval(transition.to, settings);
            let elevated = resolved.holds(&Role::System(SystemRole::Admin));

            if gated && !elevated && !ctx.has_approval(&subject.reference(), &transition) {
                tracing::debug!(
                    user_id = %user_id,
                    subject_id = %subject.id(),
                    transition = %transition,
                    "transition awaits approval"
                );
                return PermissionDecision::deny(REQUIRES_APPROVAL);
            }
        }

        PermissionDecision::allow()
    }
}

fn join_roles(roles: &[Role]) -> String {
    roles.iter().map(Role::as_str).collect::<Vec<_>>().join(", ")
}
