use std::collections::BTreeSet;

use uuid::Uuid;

use super::context::AccessContext;
use super::hierarchy::RoleHierarchy;
use super::roles::{Role, SystemRole};

/// Roles a user holds for one project, before and after hierarchy expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedRoles {
    pub direct: BTreeSet<Role>,
    pub effective: BTreeSet<Role>,
    pub is_super_admin: bool,
    pub is_org_admin: bool,
}

impl ResolvedRoles {
    pub fn is_bypass(&self) -> bool {
        self.is_super_admin || self.is_org_admin
    }

    pub fn holds(&self, role: &Role) -> bool {
        self.effective.contains(role)
    }

    pub fn holds_any(&self, roles: &[Role]) -> bool {
        roles.iter().any(|role| self.holds(role))
    }
}

/// Computes the roles a user effectively holds.
#[derive(Debug, Clone, Default)]
pub struct RoleResolver;

impl RoleResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn roles<C: AccessContext + ?Sized>(
        &self,
        ctx: &C,
        user_id: Uuid,
        project_id: Option<Uuid>,
        organization_id: Option<Uuid>,
    ) -> ResolvedRoles {
        if ctx.is_super_admin(user_id) {
            return ResolvedRoles {
                is_super_admin: true,
                ..ResolvedRoles::default()
            };
        }

        let mut direct = BTreeSet::new();
        let mut is_org_admin = false;

        if let Some(org) = organization_id {
            let org_roles = ctx.organization_roles(user_id, org);
            is_org_admin = org_roles.contains(&Role::System(SystemRole::OrgAdmin));
            direct.extend(org_roles);
        }

        let hierarchy = match project_id {
            Some(project) => {
                direct.extend(ctx.project_roles(user_id, project));
                direct.extend(ctx.assigned_custom_roles(user_id, project));
                RoleHierarchy::for_project(ctx.custom_roles(project))
            }
            None => RoleHierarchy::system(),
        };

        let effective = hierarchy.expand(&direct);

        ResolvedRoles {
            direct,
            effective,
            is_super_admin: false,
            is_org_admin,
        }
    }
}
