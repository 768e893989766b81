use std::collections::HashSet;

use super::actions::ActionKey;
use super::roles::{CustomRoleDef, Role, SystemRole};
use super::settings::PermissionSettings;
use super::subject::Transition;

/// Built-in allowed roles for an action.
fn default_roles(action: ActionKey) -> &'static [SystemRole] {
    use SystemRole::*;

    match action {
        ActionKey::CreateStory | ActionKey::EditStory | ActionKey::ChangeStoryStatus => {
            &[Owner, Admin, ProductOwner, Member]
        }
        ActionKey::DeleteStory | ActionKey::DeleteEpic => &[OrgAdmin, Owner, ProductOwner],
        ActionKey::AssignStory => &[Owner, Admin, ProductOwner, ScrumMaster, Manager],
        ActionKey::CreateEpic | ActionKey::EditEpic | ActionKey::AssignEpic | ActionKey::ChangeEpicStatus => {
            &[Owner, Admin, ProductOwner]
        }
        ActionKey::CreateTask | ActionKey::EditTask | ActionKey::ChangeTaskStatus => &[Owner, Admin, Member],
        ActionKey::DeleteTask => &[Owner, Admin, Manager],
        ActionKey::AssignTask => &[Owner, Admin, ScrumMaster, Manager, Member],
        ActionKey::ManageSprints => &[Owner, Admin, ScrumMaster, ProductOwner],
        ActionKey::ViewAnalytics => &[Owner, Admin, ProductOwner, ScrumMaster, Manager],
        ActionKey::ManageComments | ActionKey::ManageAttachments => &[Owner, Admin, Member],
        ActionKey::ManageDependencies => &[Owner, Admin, ProductOwner, Manager],
        ActionKey::ManageSettings => &[Owner, Admin],
    }
}

/// Default permission matrix merged with per-project overrides.
#[derive(Debug, Clone, Default)]
pub struct PermissionPolicy;

impl PermissionPolicy {
    pub fn new() -> Self {
        Self
    }

    pub fn default_roles(&self, action: ActionKey) -> Vec<Role> {
        default_roles(action).iter().copied().map(Role::from).collect()
    }

    /// Roles allowed to perform `action` in a project.
    ///
    /// Override entries naming a role the project does not know are dropped;
    /// if nothing survives the built-in default applies, so the result is
    /// never empty.
    pub fn allowed_roles(
        &self,
        action: ActionKey,
        settings: Option<&PermissionSettings>,
        custom_roles: &[CustomRoleDef],
    ) -> Vec<Role> {
        let Some(entries) = settings.and_then(|s| s.override_for(action)) else {
            return self.default_roles(action);
        };

        let known_custom: HashSet<Role> = custom_roles.iter().map(CustomRoleDef::role).collect();
        let mut allowed: Vec<Role> = Vec::with_capacity(entries.len());

        for entry in entries {
            let role = match Role::parse(entry) {
                Ok(role) if !role.is_custom() || known_custom.contains(&role) => role,
                _ => {
                    tracing::warn!(
                        action = %action,
                        role = %entry,
                        "dropping unknown role from permission override"
                    );
                    continue;
                }
            };
            if !allowed.contains(&role) {
                allowed.push(role);
            }
        }

        if allowed.is_empty() {
            tracing::warn!(action = %action, "permission override has no valid roles, using defaults");
            return self.default_roles(action);
        }

        allowed
    }

    pub fn requires_approval(&self, settings: Option<&PermissionSettings>, transition: &Transition) -> bool {
        settings.map(|s| s.requires_approval(transition)).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::roles::CustomRoleName;

    fn roles(names: &[&str]) -> Vec<Role> {
        names.iter().map(|n| Role::parse(n).unwrap()).collect()
    }

    #[test]
    fn every_action_has_a_default() {
        let policy = PermissionPolicy::new();
        for action in ActionKey::ALL {
            assert!(!policy.allowed_roles(action, None, &[]).is_empty(), "{action}");
        }
    }

    #[test]
    fn never_empty_under_hostile_overrides() {
        let policy = PermissionPolicy::new();
        for action in ActionKey::ALL {
            for entries in [vec![], vec!["nobody", "Bad Role", ""]] {
                let settings = PermissionSettings::default().with_override(action, entries);
                assert!(!policy.allowed_roles(action, Some(&settings), &[]).is_empty(), "{action}");
            }
        }
    }

    #[test]
    fn invalid_delete_override_falls_back_to_default() {
        let policy = PermissionPolicy::new();
        let settings = PermissionSettings::default().with_override(ActionKey::DeleteStory, ["wizard", "root!"]);

        assert_eq!(
            policy.allowed_roles(ActionKey::DeleteStory, Some(&settings), &[]),
            roles(&["org_admin", "owner", "product_owner"])
        );
    }

    #[test]
    fn valid_override_replaces_default_in_order() {
        let policy = PermissionPolicy::new();
        let settings = PermissionSettings::default()
            .with_override(ActionKey::CreateTask, ["viewer", "ghost", "owner", "viewer"]);

        assert_eq!(
            policy.allowed_roles(ActionKey::CreateTask, Some(&settings), &[]),
            roles(&["viewer", "owner"])
        );
    }

    #[test]
    fn custom_roles_are_valid_only_when_defined() {
        let policy = PermissionPolicy::new();
        let qa = CustomRoleDef::new(CustomRoleName::new("qa").unwrap(), []);
        let settings = PermissionSettings::default().with_override(ActionKey::EditTask, ["qa"]);

        assert_eq!(policy.allowed_roles(ActionKey::EditTask, Some(&settings), &[qa]), roles(&["qa"]));
        assert_eq!(
            policy.allowed_roles(ActionKey::EditTask, Some(&settings), &[]),
            policy.default_roles(ActionKey::EditTask)
        );
    }
}
