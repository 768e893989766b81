use std::fmt;

use serde::{Deserialize, Serialize};

use super::subject::SubjectKind;
use super::AuthzError;

/// Every guarded operation the engine knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ActionKey {
    CreateStory,
    EditStory,
    DeleteStory,
    AssignStory,
    ChangeStoryStatus,
    CreateEpic,
    EditEpic,
    DeleteEpic,
    AssignEpic,
    ChangeEpicStatus,
    CreateTask,
    EditTask,
    DeleteTask,
    AssignTask,
    ChangeTaskStatus,
    ManageSprints,
    ViewAnalytics,
    ManageComments,
    ManageAttachments,
    ManageDependencies,
    ManageSettings,
}

impl ActionKey {
    pub const ALL: [ActionKey; 21] = [
        ActionKey::CreateStory,
        ActionKey::EditStory,
        ActionKey::DeleteStory,
        ActionKey::AssignStory,
        ActionKey::ChangeStoryStatus,
        ActionKey::CreateEpic,
        ActionKey::EditEpic,
        ActionKey::DeleteEpic,
        ActionKey::AssignEpic,
        ActionKey::ChangeEpicStatus,
        ActionKey::CreateTask,
        ActionKey::EditTask,
        ActionKey::DeleteTask,
        ActionKey::AssignTask,
        ActionKey::ChangeTaskStatus,
        ActionKey::ManageSprints,
        ActionKey::ViewAnalytics,
        ActionKey::ManageComments,
        ActionKey::ManageAttachments,
        ActionKey::ManageDependencies,
        ActionKey::ManageSettings,
    ];

    /// Canonical identifier, e.g. `delete_story`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKey::CreateStory => "create_story",
            ActionKey::EditStory => "edit_story",
            ActionKey::DeleteStory => "delete_story",
            ActionKey::AssignStory => "assign_story",
            ActionKey::ChangeStoryStatus => "change_story_status",
            ActionKey::CreateEpic => "create_epic",
            ActionKey::EditEpic => "edit_epic",
            ActionKey::DeleteEpic => "delete_epic",
            ActionKey::AssignEpic => "assign_epic",
            ActionKey::ChangeEpicStatus => "change_epic_status",
            ActionKey::CreateTask => "create_task",
            ActionKey::EditTask => "edit_task",
            ActionKey::DeleteTask => "delete_task",
            ActionKey::AssignTask => "assign_task",
            ActionKey::ChangeTaskStatus => "change_task_status",
            ActionKey::ManageSprints => "manage_sprints",
            ActionKey::ViewAnalytics => "view_analytics",
            ActionKey::ManageComments => "manage_comments",
            ActionKey::ManageAttachments => "manage_attachments",
            ActionKey::ManageDependencies => "manage_dependencies",
            ActionKey::ManageSettings => "manage_settings",
        }
    }

    /// Human wording used in denial reasons, e.g. `delete stories`.
    pub fn label(&self) -> &'static str {
        match self {
            ActionKey::CreateStory => "create stories",
            ActionKey::EditStory => "edit stories",
            ActionKey::DeleteStory => "delete stories",
            ActionKey::AssignStory => "assign stories",
            ActionKey::ChangeStoryStatus => "change story status",
            ActionKey::CreateEpic => "create epics",
            ActionKey::EditEpic => "edit epics",
            ActionKey::DeleteEpic => "delete epics",
            ActionKey::AssignEpic => "assign epics",
            ActionKey::ChangeEpicStatus => "change epic status",
            ActionKey::CreateTask => "create tasks",
            ActionKey::EditTask => "edit tasks",
            ActionKey::DeleteTask => "delete tasks",
            ActionKey::AssignTask => "assign tasks",
            ActionKey::ChangeTaskStatus => "change task status",
            ActionKey::ManageSprints => "manage sprints",
            ActionKey::ViewAnalytics => "view analytics",
            ActionKey::ManageComments => "manage comments",
            ActionKey::ManageAttachments => "manage attachments",
            ActionKey::ManageDependencies => "manage dependencies",
            ActionKey::ManageSettings => "manage settings",
        }
    }

    /// Key under `permission_settings`, e.g. `who_can_delete_stories`.
    pub fn setting_key(&self) -> String {
        format!("who_can_{}", self.label().replace(' ', "_"))
    }

    pub fn is_status_change(&self) -> bool {
        matches!(
            self,
            ActionKey::ChangeStoryStatus | ActionKey::ChangeEpicStatus | ActionKey::ChangeTaskStatus
        )
    }

    /// Status-change action for a work item kind.
    pub fn status_change_for(kind: SubjectKind) -> Option<Self> {
        match kind {
            SubjectKind::Story => Some(ActionKey::ChangeStoryStatus),
            SubjectKind::Epic => Some(ActionKey::ChangeEpicStatus),
            SubjectKind::Task => Some(ActionKey::ChangeTaskStatus),
            SubjectKind::Project | SubjectKind::Sprint => None,
        }
    }

    pub fn delete_for(kind: SubjectKind) -> Option<Self> {
        match kind {
            SubjectKind::Story => Some(ActionKey::DeleteStory),
            SubjectKind::Epic => Some(ActionKey::DeleteEpic),
            SubjectKind::Task => Some(ActionKey::DeleteTask),
            SubjectKind::Project | SubjectKind::Sprint => None,
        }
    }

    /// Accepts the canonical name, `can_<name>`, the settings key or
    /// `can_<label>` (`can_delete_stories`).
    pub fn parse(s: &str) -> Result<Self, AuthzError> {
        let key = s.trim();
        let stripped = key
            .strip_prefix("who_can_")
            .or_else(|| key.strip_prefix("can_"))
            .unwrap_or(key);

        ActionKey::ALL
            .into_iter()
            .find(|action| action.as_str() == stripped || action.label().replace(' ', "_") == stripped)
            .ok_or_else(|| AuthzError::UnknownAction(s.to_string()))
    }
}

impl TryFrom<String> for ActionKey {
    type Error = AuthzError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ActionKey::parse(&value)
    }
}

impl From<ActionKey> for String {
    fn from(value: ActionKey) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
