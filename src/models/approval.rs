use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::{SubjectKind, Transition};
use crate::errors::{AppError, AppResult};
use crate::events::{Loggable, Severity};

pub const ONLY_PENDING: &str = "only pending requests can be modified";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
            ApprovalStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ApprovalStatus::Pending),
            "approved" => Some(ApprovalStatus::Approved),
            "rejected" => Some(ApprovalStatus::Rejected),
            "cancelled" => Some(ApprovalStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }

    /// Checks that a request in this state may move to `next`. Only
    /// `pending` has outgoing transitions, and only into a terminal state.
    pub fn transition(self, next: ApprovalStatus) -> AppResult<ApprovalStatus> {
        if self.is_terminal() {
            return Err(AppError::invalid_state(ONLY_PENDING));
        }
        if !next.is_terminal() {
            return Err(AppError::internal("approval requests can only move to a terminal state"));
        }
        Ok(next)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ApprovalRequest {
    pub id: Uuid,
    pub subject_type: SubjectKind,
    pub subject_id: Uuid,
    pub project_id: Uuid,
    #[schema(value_type = String, example = "status_change_to_done")]
    pub transition: Transition,
    pub requested_by: Uuid,
    pub approver_id: Uuid,
    pub status: ApprovalStatus,
    /// Approval comment or rejection reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Loggable for ApprovalRequest {
    fn entity_type() -> &'static str { "approval_request" }
    fn subject_id(&self) -> Uuid { self.id }
    fn severity(&self) -> Severity { Severity::Critical }
    fn severity_for_action(&self, _action: &str) -> Severity { Severity::Critical }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApprovalCreateRequest {
    #[schema(example = "story")]
    pub subject_type: SubjectKind,
    pub subject_id: Uuid,
    #[schema(value_type = String, example = "status_change_to_done")]
    pub transition: Transition,
    /// Defaults to the project owner. Must be someone other than the
    /// requester who can decide requests in the project.
    pub approver_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ApprovalDecisionRequest {
    #[schema(example = "Looks good")]
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApprovalRejectRequest {
    #[schema(example = "Acceptance criteria not met")]
    pub reason: String,
}
