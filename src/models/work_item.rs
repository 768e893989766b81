use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::{PermissionDecision, SubjectKind, WorkStatus};

#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusUpdateRequest {
    #[schema(example = "done")]
    pub status: WorkStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusUpdateResponse {
    pub id: Uuid,
    pub kind: SubjectKind,
    pub status: WorkStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckRequest {
    #[schema(example = "delete_story")]
    pub action: String,
    pub subject_type: Option<SubjectKind>,
    pub subject_id: Option<Uuid>,
    /// Requested status for status-change actions.
    pub target_status: Option<WorkStatus>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckResponse {
    pub action: String,
    #[serde(flatten)]
    pub decision: PermissionDecision,
}
