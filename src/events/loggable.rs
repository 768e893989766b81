use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Retention class of an audit entry. Anything that changes who may do what
/// is `Critical`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    #[default]
    Important,
    Noise,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Important => "important",
            Severity::Noise => "noise",
        }
    }
}

/// Entities that can be published to the activity log.
pub trait Loggable: Serialize + Send + Sync {
    /// Prefix of the event name, e.g. `approval_request` in
    /// `approval_request.approved`.
    fn entity_type() -> &'static str;

    fn subject_id(&self) -> Uuid;

    fn severity(&self) -> Severity {
        Severity::Important
    }

    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "deleted" => Severity::Critical,
            "created" | "updated" => self.severity(),
            _ => Severity::Important,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Note {
        id: Uuid,
    }

    impl Loggable for Note {
        fn entity_type() -> &'static str { "note" }
        fn subject_id(&self) -> Uuid { self.id }
        fn severity(&self) -> Severity { Severity::Noise }
    }

    #[test]
    fn deletes_are_always_critical() {
        let note = Note { id: Uuid::new_v4() };

        assert_eq!(note.severity_for_action("created"), Severity::Noise);
        assert_eq!(note.severity_for_action("deleted"), Severity::Critical);
        assert_eq!(note.severity_for_action("archived").as_str(), "important");
    }
}
