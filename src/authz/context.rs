use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use super::roles::{CustomRoleDef, Role};
use super::settings::PermissionSettings;
use super::subject::{SubjectRef, Transition};

/// Read-only view of the role assignments, project configuration and
/// approval state the engine decides against.
///
/// One value should represent one consistent snapshot; the engine never
/// writes through it.
pub trait AccessContext: Send + Sync {
    fn is_super_admin(&self, user_id: Uuid) -> bool;

    fn organization_of(&self, project_id: Uuid) -> Option<Uuid>;

    fn organization_roles(&self, user_id: Uuid, organization_id: Uuid) -> Vec<Role>;

    fn project_roles(&self, user_id: Uuid, project_id: Uuid) -> Vec<Role>;

    /// Custom roles explicitly assigned to the user inside the project.
    fn assigned_custom_roles(&self, user_id: Uuid, project_id: Uuid) -> Vec<Role>;

    /// Custom roles defined by the project.
    fn custom_roles(&self, project_id: Uuid) -> &[CustomRoleDef];

    fn permission_settings(&self, project_id: Uuid) -> Option<&PermissionSettings>;

    /// Whether an `approved` request exists for exactly this subject and transition.
    fn has_approval(&self, subject: &SubjectRef, transition: &Transition) -> bool;
}

/// In-memory [`AccessContext`], filled either by the database loader or
/// directly by tests.
#[derive(Debug, Clone, Default)]
pub struct AccessSnapshot {
    super_admins: HashSet<Uuid>,
    project_orgs: HashMap<Uuid, Uuid>,
    org_roles: HashMap<(Uuid, Uuid), Vec<Role>>,
    project_roles: HashMap<(Uuid, Uuid), Vec<Role>>,
    custom_assignments: HashMap<(Uuid, Uuid), Vec<Role>>,
    custom_roles: HashMap<Uuid, Vec<CustomRoleDef>>,
    settings: HashMap<Uuid, PermissionSettings>,
    approvals: HashSet<(SubjectRef, Transition)>,
}

impl AccessSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_super_admin(mut self, user_id: Uuid) -> Self {
        self.super_admins.insert(user_id);
        self
    }

    pub fn with_project(mut self, project_id: Uuid, organization_id: Option<Uuid>) -> Self {
        if let Some(org) = organization_id {
            self.project_orgs.insert(project_id, org);
        }
        self
    }

    pub fn with_org_roles(mut self, user_id: Uuid, organization_id: Uuid, roles: impl IntoIterator<Item = Role>) -> Self {
        self.org_roles.entry((user_id, organization_id)).or_default().extend(roles);
        self
    }

    pub fn with_project_roles(mut self, user_id: Uuid, project_id: Uuid, roles: impl IntoIterator<Item = Role>) -> Self {
        self.project_roles.entry((user_id, project_id)).or_default().extend(roles);
        self
    }

    pub fn with_custom_assignments(
        mut self,
        user_id: Uuid,
        project_id: Uuid,
        roles: impl IntoIterator<Item = Role>,
    ) -> Self {
        self.custom_assignments.entry((user_id, project_id)).or_default().extend(roles);
        self
    }

    pub fn with_custom_roles(mut self, project_id: Uuid, defs: impl IntoIterator<Item = CustomRoleDef>) -> Self {
        self.custom_roles.entry(project_id).or_default().extend(defs);
        self
    }

    pub fn with_settings(mut self, project_id: Uuid, settings: PermissionSettings) -> Self {
        self.settings.insert(project_id, settings);
        self
    }

    pub fn with_approval(mut self, subject: SubjectRef, transition: Transition) -> Self {
        self.approvals.insert((subject, transition));
        self
    }
}

impl AccessContext for AccessSnapshot {
    fn is_super_admin(&self, user_id: Uuid) -> bool {
        self.super_admins.contains(&user_id)
    }

    fn organization_of(&self, project_id: Uuid) -> Option<Uuid> {
        self.project_orgs.get(&project_id).copied()
    }

    fn organization_roles(&self, user_id: Uuid, organization_id: Uuid) -> Vec<Role> {
        self.org_roles.get(&(user_id, organization_id)).cloned().unwrap_or_default()
    }

    fn project_roles(&self, user_id: Uuid, project_id: Uuid) -> Vec<Role> {
        self.project_roles.get(&(user_id, project_id)).cloned().unwrap_or_default()
    }

    fn assigned_custom_roles(&self, user_id: Uuid, project_id: Uuid) -> Vec<Role> {
        self.custom_assignments.get(&(user_id, project_id)).cloned().unwrap_or_default()
    }

    fn custom_roles(&self, project_id: Uuid) -> &[CustomRoleDef] {
        self.custom_roles.get(&project_id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn permission_settings(&self, project_id: Uuid) -> Option<&PermissionSettings> {
        self.settings.get(&project_id)
    }

    fn has_approval(&self, subject: &SubjectRef, transition: &Transition) -> bool {
        self.approvals.contains(&(*subject, *transition))
    }
}
