//! Per-project permission configuration.
//!
//! Stored as JSON on the project row:
//!
//! ```json
//! { "permission_settings": {
//!     "who_can_delete_stories": ["owner"],
//!     "require_approval_for": ["status_change_to_done"] } }
//! ```
//!
//! Recognized action keys are lifted into typed overrides. Everything else is
//! kept in `extra` so it survives a read-modify-write, but is never interpreted.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::actions::ActionKey;
use super::subject::Transition;
use super::AuthzError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawPermissionSettings", into = "RawPermissionSettings")]
pub struct PermissionSettings {
    /// Role identifiers as written by the project; validated at lookup time.
    overrides: BTreeMap<ActionKey, Vec<String>>,
    require_approval_for: BTreeSet<Transition>,
    extra: Map<String, Value>,
}

impl PermissionSettings {
    pub fn override_for(&self, action: ActionKey) -> Option<&[String]> {
        self.overrides.get(&action).map(Vec::as_slice)
    }

    pub fn requires_approval(&self, transition: &Transition) -> bool {
        self.require_approval_for.contains(transition)
    }

    pub fn approval_gates(&self) -> impl Iterator<Item = &Transition> {
        self.require_approval_for.iter()
    }

    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    pub fn with_override<I, S>(mut self, action: ActionKey, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.overrides.insert(action, roles.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_approval_for(mut self, transition: Transition) -> Self {
        self.require_approval_for.insert(transition);
        self
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawPermissionSettings {
    #[serde(default)]
    require_approval_for: Vec<Value>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl From<RawPermissionSettings> for PermissionSettings {
    fn from(raw: RawPermissionSettings) -> Self {
        let mut settings = PermissionSettings::default();

        for (key, value) in raw.rest {
            let Ok(action) = ActionKey::parse(&key) else {
                settings.extra.insert(key, value);
                continue;
            };

            let Value::Array(items) = value else {
                tracing::warn!(key = %key, "permission override is not a list, ignoring");
                continue;
            };

            let roles = items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(role) => Some(role),
                    other => {
                        tracing::warn!(key = %key, value = %other, "dropping non-string role entry");
                        None
                    }
                })
                .collect();
            settings.overrides.insert(action, roles);
        }

        for entry in raw.require_approval_for {
            match entry.as_str().map(Transition::parse) {
                Some(Ok(transition)) => {
                    settings.require_approval_for.insert(transition);
                }
                _ => tracing::warn!(entry = %entry, "dropping unrecognized approval gate"),
            }
        }

        settings
    }
}

impl From<PermissionSettings> for RawPermissionSettings {
    fn from(settings: PermissionSettings) -> Self {
        let mut rest = settings.extra;
        for (action, roles) in settings.overrides {
            rest.insert(action.setting_key(), Value::from(roles));
        }

        RawPermissionSettings {
            require_approval_for: settings
                .require_approval_for
                .into_iter()
                .map(|t| Value::String(t.key()))
                .collect(),
            rest,
        }
    }
}

/// Whole `projects.settings` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectSettings {
    #[serde(default)]
    pub permission_settings: PermissionSettings,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProjectSettings {
    /// Strict parse used for writes; the error names the offending path.
    pub fn from_json_str(json: &str) -> Result<Self, AuthzError> {
        let de = &mut serde_json::Deserializer::from_str(json);
        serde_path_to_error::deserialize(de).map_err(|err| {
            AuthzError::InvalidSettings(format!("{} at {}", err.inner(), err.path()))
        })
    }

    /// Lenient parse used for reads: a blank or unreadable stored document
    /// behaves as "no overrides".
    pub fn from_stored(json: Option<&str>) -> Self {
        let Some(json) = json.map(str::trim).filter(|s| !s.is_empty()) else {
            return Self::default();
        };

        Self::from_json_str(json).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "stored project settings unreadable, using defaults");
            Self::default()
        })
    }
}
