use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use super::roles::{CustomRoleDef, Role, SystemRole};
use super::AuthzError;

/// Acyclic "implies" relation between roles.
///
/// A role implies every role reachable from it, so holding `owner` also
/// grants `admin`, `manager`, `product_owner`, `member` and `viewer`.
#[derive(Debug, Clone)]
pub struct RoleHierarchy {
    edges: HashMap<Role, BTreeSet<Role>>,
}

impl RoleHierarchy {
    /// The fixed hierarchy between system roles.
    pub fn system() -> Self {
        use SystemRole::*;

        let mut edges: HashMap<Role, BTreeSet<Role>> = HashMap::new();
        let system_edges = [
            (Owner, vec![Admin]),
            (Admin, vec![Manager, ProductOwner]),
            (ProductOwner, vec![Member]),
            (ScrumMaster, vec![Member]),
            (Manager, vec![Member]),
            (Member, vec![Viewer]),
        ];
        for (role, implied) in system_edges {
            edges.insert(role.into(), implied.into_iter().map(Role::from).collect());
        }

        Self { edges }
    }

    /// System hierarchy extended with a project's custom roles. Definitions
    /// that no longer fit (cycle, unknown implied role) are skipped with a
    /// warning; they were validated when defined.
    pub fn for_project(custom_roles: &[CustomRoleDef]) -> Self {
        let mut hierarchy = Self::system();
        let known: HashSet<Role> = custom_roles.iter().map(CustomRoleDef::role).collect();

        for def in custom_roles {
            if let Err(err) = hierarchy.extend(def, &known) {
                tracing::warn!(role = %def.name.as_str(), error = %err, "skipping custom role definition");
            }
        }

        hierarchy
    }

    /// Adds a custom role and its implied roles. Fails without modifying the
    /// hierarchy if an implied role is unknown, is `org_admin`, or the edge
    /// would close a cycle.
    pub fn extend(&mut self, def: &CustomRoleDef, known_custom: &HashSet<Role>) -> Result<(), AuthzError> {
        let role = def.role();

        for implied in &def.implies {
            if *implied == Role::System(SystemRole::OrgAdmin) {
                return Err(AuthzError::OrgScopedRole(implied.to_string()));
            }
            if implied.is_custom() && !known_custom.contains(implied) {
                return Err(AuthzError::UnknownRole(implied.to_string()));
            }
            if *implied == role || self.implies(implied, &role) {
                return Err(AuthzError::HierarchyCycle(role.to_string()));
            }
        }

        self.edges
            .entry(role)
            .or_default()
            .extend(def.implies.iter().cloned());
        Ok(())
    }

    /// Roles directly implied by `role`.
    pub fn direct(&self, role: &Role) -> impl Iterator<Item = &Role> {
        self.edges.get(role).into_iter().flatten()
    }

    /// True when `from` reaches `to` through one or more edges.
    pub fn implies(&self, from: &Role, to: &Role) -> bool {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<&Role> = self.direct(from).collect();

        while let Some(next) = queue.pop_front() {
            if next == to {
                return true;
            }
            if seen.insert(next) {
                queue.extend(self.direct(next));
            }
        }
        false
    }

    /// Union of the given roles and everything they imply.
    pub fn expand<'a>(&self, roles: impl IntoIterator<Item = &'a Role>) -> BTreeSet<Role> {
        let mut expanded = BTreeSet::new();
        let mut queue: VecDeque<&Role> = roles.into_iter().collect();

        while let Some(role) = queue.pop_front() {
            if expanded.insert(role.clone()) {
                queue.extend(self.direct(role));
            }
        }
        expanded
    }
}

impl Default for RoleHierarchy {
    fn default() -> Self {
        Self::system()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::roles::CustomRoleName;

    fn custom(name: &str) -> Role {
        Role::parse(name).unwrap()
    }

    fn def(name: &str, implies: &[Role]) -> CustomRoleDef {
        CustomRoleDef::new(CustomRoleName::new(name).unwrap(), implies.iter().cloned())
    }

    #[test]
    fn owner_implies_manager_and_member() {
        let hierarchy = RoleHierarchy::system();
        let owner = Role::from(SystemRole::Owner);

        assert!(hierarchy.implies(&owner, &SystemRole::Manager.into()));
        assert!(hierarchy.implies(&owner, &SystemRole::Member.into()));
        assert!(!hierarchy.implies(&SystemRole::Member.into(), &owner));
    }

    #[test]
    fn expand_includes_held_and_implied_roles() {
        let hierarchy = RoleHierarchy::system();
        let expanded = hierarchy.expand(&[Role::from(SystemRole::ScrumMaster)]);

        let expected: BTreeSet<Role> = [SystemRole::ScrumMaster, SystemRole::Member, SystemRole::Viewer]
            .into_iter()
            .map(Role::from)
            .collect();
        assert_eq!(expanded, expected);
    }

    #[test]
    fn custom_roles_extend_the_graph() {
        let defs = vec![
            def("qa_lead", &[custom("qa")]),
            def("qa", &[SystemRole::Member.into()]),
        ];
        let hierarchy = RoleHierarchy::for_project(&defs);

        assert!(hierarchy.implies(&custom("qa_lead"), &SystemRole::Viewer.into()));
    }

    #[test]
    fn rejects_self_implication() {
        let mut hierarchy = RoleHierarchy::system();
        let known: HashSet<Role> = [custom("loop_role")].into_iter().collect();

        let err = hierarchy.extend(&def("loop_role", &[custom("loop_role")]), &known).unwrap_err();
        assert!(matches!(err, AuthzError::HierarchyCycle(_)));
    }

    #[test]
    fn rejects_transitive_cycle() {
        let mut hierarchy = RoleHierarchy::system();
        let known: HashSet<Role> = [custom("alpha"), custom("beta")].into_iter().collect();

        hierarchy.extend(&def("alpha", &[custom("beta")]), &known).unwrap();
        let err = hierarchy.extend(&def("beta", &[custom("alpha")]), &known).unwrap_err();
        assert!(matches!(err, AuthzError::HierarchyCycle(_)));
        assert!(!hierarchy.implies(&custom("beta"), &custom("alpha")));
    }

    #[test]
    fn rejects_unknown_custom_target() {
        let mut hierarchy = RoleHierarchy::system();
        let known: HashSet<Role> = [custom("alpha")].into_iter().collect();

        let err = hierarchy.extend(&def("alpha", &[custom("ghost")]), &known).unwrap_err();
        assert!(matches!(err, AuthzError::UnknownRole(_)));
    }

    #[test]
    fn rejects_org_admin_target() {
        let mut hierarchy = RoleHierarchy::system();
        let known: HashSet<Role> = [custom("auditor")].into_iter().collect();

        let err = hierarchy
            .extend(&def("auditor", &[SystemRole::OrgAdmin.into()]), &known)
            .unwrap_err();
        assert!(matches!(err, AuthzError::OrgScopedRole(_)));
        assert!(!hierarchy.implies(&custom("auditor"), &SystemRole::OrgAdmin.into()));
    }
}
