use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::ProjectSettings;
use crate::events::{Loggable, Severity};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Project {
    pub id: Uuid,
    pub organization_id: Option<Uuid>,
    pub owner_id: Uuid,
    pub name: String,
    #[schema(value_type = Object)]
    pub settings: ProjectSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Settings document as written to the activity log.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectSettingsChange {
    pub project_id: Uuid,
    pub settings: ProjectSettings,
}

impl Loggable for ProjectSettingsChange {
    fn entity_type() -> &'static str { "project_settings" }
    fn subject_id(&self) -> Uuid { self.project_id }
    fn severity(&self) -> Severity { Severity::Critical }
}

/// Effective allowed roles for one action in one project.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ActionRoles {
    #[schema(example = "delete_story")]
    pub action: String,
    #[schema(example = "who_can_delete_stories")]
    pub setting_key: String,
    #[schema(example = json!(["owner"]))]
    pub allowed_roles: Vec<String>,
    /// True when a project override changed the built-in roles.
    pub overridden: bool,
}
