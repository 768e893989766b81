use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::AuthzError;

const MAX_CUSTOM_ROLE_LEN: usize = 64;

/// Built-in roles known to every project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemRole {
    /// Organization administrator; bypasses project checks inside its organization.
    OrgAdmin,
    Owner,
    Admin,
    ProductOwner,
    ScrumMaster,
    Manager,
    Member,
    Viewer,
}

impl SystemRole {
    pub const ALL: [SystemRole; 8] = [
        SystemRole::OrgAdmin,
        SystemRole::Owner,
        SystemRole::Admin,
        SystemRole::ProductOwner,
        SystemRole::ScrumMaster,
        SystemRole::Manager,
        SystemRole::Member,
        SystemRole::Viewer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SystemRole::OrgAdmin => "org_admin",
            SystemRole::Owner => "owner",
            SystemRole::Admin => "admin",
            SystemRole::ProductOwner => "product_owner",
            SystemRole::ScrumMaster => "scrum_master",
            SystemRole::Manager => "manager",
            SystemRole::Member => "member",
            SystemRole::Viewer => "viewer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        SystemRole::ALL.into_iter().find(|role| role.as_str() == s)
    }
}

/// Name of a project-defined role, validated on construction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CustomRoleName(String);

impl CustomRoleName {
    pub fn new(name: impl Into<String>) -> Result<Self, AuthzError> {
        let name = name.into();

        let starts_with_letter = name.chars().next().map(|c| c.is_ascii_lowercase()).unwrap_or(false);
        let well_formed = starts_with_letter
            && name.len() <= MAX_CUSTOM_ROLE_LEN
            && name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

        if !well_formed {
            return Err(AuthzError::InvalidRoleName(name));
        }
        if SystemRole::parse(&name).is_some() {
            return Err(AuthzError::ReservedRoleName(name));
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A role identifier: either a system role or a validated custom role.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    System(SystemRole),
    Custom(CustomRoleName),
}

impl Role {
    /// Parses a role identifier. Anything that is not a system role name must
    /// be a well-formed custom role name; whether that custom role exists in a
    /// given project is checked elsewhere.
    pub fn parse(s: &str) -> Result<Self, AuthzError> {
        let trimmed = s.trim();
        match SystemRole::parse(trimmed) {
            Some(system) => Ok(Role::System(system)),
            None => CustomRoleName::new(trimmed).map(Role::Custom),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::System(role) => role.as_str(),
            Role::Custom(name) => name.as_str(),
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Role::Custom(_))
    }
}

impl From<SystemRole> for Role {
    fn from(value: SystemRole) -> Self {
        Role::System(value)
    }
}

impl FromStr for Role {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::parse(s)
    }
}

impl TryFrom<String> for Role {
    type Error = AuthzError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Role::parse(&value)
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A custom role defined inside one project, with the roles it implies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomRoleDef {
    pub name: CustomRoleName,
    #[serde(default)]
    pub implies: Vec<Role>,
}

impl CustomRoleDef {
    pub fn new(name: CustomRoleName, implies: impl IntoIterator<Item = Role>) -> Self {
        Self {
            name,
            implies: implies.into_iter().collect(),
        }
    }

    pub fn role(&self) -> Role {
        Role::Custom(self.name.clone())
    }
}

impl Serialize for CustomRoleName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for CustomRoleName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        CustomRoleName::new(raw).map_err(serde::de::Error::custom)
    }
}
