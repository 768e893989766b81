use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::settings::PermissionSettings;
use super::AuthzError;

const STATUS_CHANGE_PREFIX: &str = "status_change_to_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    Project,
    Sprint,
    Story,
    Epic,
    Task,
}

impl SubjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectKind::Project => "project",
            SubjectKind::Sprint => "sprint",
            SubjectKind::Story => "story",
            SubjectKind::Epic => "epic",
            SubjectKind::Task => "task",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "project" => Some(SubjectKind::Project),
            "sprint" => Some(SubjectKind::Sprint),
            "story" => Some(SubjectKind::Story),
            "epic" => Some(SubjectKind::Epic),
            "task" => Some(SubjectKind::Task),
            _ => None,
        }
    }

    pub fn is_work_item(&self) -> bool {
        matches!(self, SubjectKind::Story | SubjectKind::Epic | SubjectKind::Task)
    }
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind and id of a subject, as persisted on approval requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct SubjectRef {
    pub kind: SubjectKind,
    pub id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    Backlog,
    Todo,
    InProgress,
    InReview,
    Blocked,
    Done,
}

impl WorkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkStatus::Backlog => "backlog",
            WorkStatus::Todo => "todo",
            WorkStatus::InProgress => "in_progress",
            WorkStatus::InReview => "in_review",
            WorkStatus::Blocked => "blocked",
            WorkStatus::Done => "done",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "backlog" => Some(WorkStatus::Backlog),
            "todo" => Some(WorkStatus::Todo),
            "in_progress" => Some(WorkStatus::InProgress),
            "in_review" => Some(WorkStatus::InReview),
            "blocked" => Some(WorkStatus::Blocked),
            "done" => Some(WorkStatus::Done),
            _ => None,
        }
    }
}

/// A requested status change, keyed `status_change_to_<status>` in project settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Transition {
    pub to: WorkStatus,
}

impl Transition {
    pub fn to(status: WorkStatus) -> Self {
        Self { to: status }
    }

    pub fn key(&self) -> String {
        format!("{}{}", STATUS_CHANGE_PREFIX, self.to.as_str())
    }

    pub fn parse(key: &str) -> Result<Self, AuthzError> {
        key.strip_prefix(STATUS_CHANGE_PREFIX)
            .and_then(WorkStatus::parse)
            .map(Transition::to)
            .ok_or_else(|| AuthzError::UnknownTransition(key.to_string()))
    }
}

impl TryFrom<String> for Transition {
    type Error = AuthzError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Transition::parse(&value)
    }
}

impl From<Transition> for String {
    fn from(value: Transition) -> Self {
        value.key()
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub id: Uuid,
    /// `None` for items that are not attached to any project.
    pub project_id: Option<Uuid>,
    pub status: WorkStatus,
}

/// The thing an action targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    Project { id: Uuid },
    Sprint { id: Uuid, project_id: Uuid },
    Story(WorkItem),
    Epic(WorkItem),
    Task(WorkItem),
}

impl Subject {
    pub fn work_item(kind: SubjectKind, item: WorkItem) -> Option<Self> {
        match kind {
            SubjectKind::Story => Some(Subject::Story(item)),
            SubjectKind::Epic => Some(Subject::Epic(item)),
            SubjectKind::Task => Some(Subject::Task(item)),
            SubjectKind::Project | SubjectKind::Sprint => None,
        }
    }

    pub fn kind(&self) -> SubjectKind {
        match self {
            Subject::Project { .. } => SubjectKind::Project,
            Subject::Sprint { .. } => SubjectKind::Sprint,
            Subject::Story(_) => SubjectKind::Story,
            Subject::Epic(_) => SubjectKind::Epic,
            Subject::Task(_) => SubjectKind::Task,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Subject::Project { id } | Subject::Sprint { id, .. } => *id,
            Subject::Story(item) | Subject::Epic(item) | Subject::Task(item) => item.id,
        }
    }

    pub fn reference(&self) -> SubjectRef {
        SubjectRef {
            kind: self.kind(),
            id: self.id(),
        }
    }

    pub fn project_of(&self) -> Option<Uuid> {
        match self {
            Subject::Project { id } => Some(*id),
            Subject::Sprint { project_id, .. } => Some(*project_id),
            Subject::Story(item) | Subject::Epic(item) | Subject::Task(item) => item.project_id,
        }
    }

    fn as_work_item(&self) -> Option<&WorkItem> {
        match self {
            Subject::Story(item) | Subject::Epic(item) | Subject::Task(item) => Some(item),
            Subject::Project { .. } | Subject::Sprint { .. } => None,
        }
    }

    /// Whether moving this subject to `target` needs a second approver under
    /// the given project settings. Only work items take part in approval, and
    /// re-applying the current status is never gated.
    pub fn transition_requires_approval(&self, target: WorkStatus, settings: &PermissionSettings) -> bool {
        match self.as_work_item() {
            Some(item) if item.status != target => settings.requires_approval(&Transition::to(target)),
            _ => false,
        }
    }
}
