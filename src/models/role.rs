use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::events::{Loggable, Severity};

// =============================================================================
// CUSTOM ROLE
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CustomRole {
    pub project_id: Uuid,
    #[schema(example = "qa_lead")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[schema(example = json!(["member"]))]
    pub implies: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Loggable for CustomRole {
    fn entity_type() -> &'static str { "custom_role" }
    fn subject_id(&self) -> Uuid { self.project_id }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CustomRoleCreateRequest {
    #[schema(example = "qa_lead")]
    pub name: String,
    #[schema(example = "Signs off on testing")]
    pub description: Option<String>,
    #[serde(default)]
    #[schema(example = json!(["member"]))]
    pub implies: Vec<String>,
}

// =============================================================================
// CUSTOM ROLE ASSIGNMENT
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CustomRoleAssignment {
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub role_name: String,
    pub created_at: DateTime<Utc>,
}

impl Loggable for CustomRoleAssignment {
    fn entity_type() -> &'static str { "custom_role_assignment" }
    fn subject_id(&self) -> Uuid { self.user_id }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignCustomRoleRequest {
    #[schema(example = "qa_lead")]
    pub role: String,
}
