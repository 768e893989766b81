//! Authorization module - project-scoped permission engine
//!
//! This module implements:
//! - a closed role model with an acyclic hierarchy (system + per-project custom roles)
//! - a default permission matrix merged with per-project overrides
//! - super admin / org admin bypass
//! - approval gating of work item status transitions
//! - configurable enforcement modes (off/advisory/strict) for the service layer

mod actions;
mod context;
mod enforcer;
mod hierarchy;
mod policy;
mod resolver;
mod roles;
mod settings;
mod subject;
pub mod workflow;

pub use actions::ActionKey;
pub use context::{AccessContext, AccessSnapshot};
pub use enforcer::{PermissionDecision, PermissionEnforcer, REQUIRES_APPROVAL};
pub use hierarchy::RoleHierarchy;
pub use policy::PermissionPolicy;
pub use resolver::{ResolvedRoles, RoleResolver};
pub use roles::{CustomRoleDef, CustomRoleName, Role, SystemRole};
pub use settings::{PermissionSettings, ProjectSettings};
pub use subject::{Subject, SubjectKind, SubjectRef, Transition, WorkItem, WorkStatus};
pub use workflow::ApprovalWorkflow;

/// Value errors raised while parsing or validating authorization data.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("invalid role name '{0}'")]
    InvalidRoleName(String),
    #[error("'{0}' is a system role and cannot be redefined")]
    ReservedRoleName(String),
    #[error("unknown role '{0}'")]
    UnknownRole(String),
    #[error("role '{0}' would imply itself")]
    HierarchyCycle(String),
    #[error("'{0}' is organization-scoped and cannot be implied by a project role")]
    OrgScopedRole(String),
    #[error("unknown action '{0}'")]
    UnknownAction(String),
    #[error("unknown transition '{0}'")]
    UnknownTransition(String),
    #[error("invalid permission settings: {0}")]
    InvalidSettings(String),
}

/// Authorization enforcement mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthzMode {
    /// No permission checks (development mode)
    Off,
    /// Log denials but allow requests (testing mode)
    Advisory,
    /// Enforce 403 on denied requests (production mode)
    Strict,
}

impl AuthzMode {
    pub fn from_env() -> Self {
        Self::parse(&std::env::var("AUTHZ_MODE").unwrap_or_default())
    }

    /// Unrecognized values enforce.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "off" => AuthzMode::Off,
            "advisory" => AuthzMode::Advisory,
            _ => AuthzMode::Strict,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthzMode::Off => "off",
            AuthzMode::Advisory => "advisory",
            AuthzMode::Strict => "strict",
        }
    }

    /// Applies a decision according to the mode.
    pub fn apply(&self, decision: PermissionDecision) -> crate::errors::AppResult<()> {
        match self {
            AuthzMode::Off => Ok(()),
            AuthzMode::Advisory => {
                if let Some(reason) = decision.reason.as_deref().filter(|_| !decision.allowed) {
                    tracing::warn!(reason = %reason, "authorization denied (advisory mode, allowing)");
                }
                Ok(())
            }
            AuthzMode::Strict => decision.into_result(),
        }
    }
}
