//! Users and the closed role set.

use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RelabError;

/// Unique identifier for a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form for logs; full UUID is available via Deref.
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl Deref for UserId {
    type Target = Uuid;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Uuid> for UserId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// The closed set of roles known to the system.
///
/// Authorization decisions match on this enum; free-form role strings never
/// reach the domain layer. Unknown names fail at the parsing boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Student,
    LabAdvisor,
    ModuleCoordinator,
    LabCoordinator,
    Admin,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Student,
        Role::LabAdvisor,
        Role::ModuleCoordinator,
        Role::LabCoordinator,
        Role::Admin,
    ];

    /// Whether this role may act on requests in the approval pipeline.
    pub fn is_reviewer(self) -> bool {
        !matches!(self, Role::Student)
    }

    /// Resolve the single role a multi-role caller acts under when
    /// reviewing a request. Precedence runs from most to least privileged;
    /// a caller with no reviewer role gets `None`.
    pub fn acting_reviewer(roles: &[Role]) -> Option<Role> {
        const PRECEDENCE: [Role; 4] = [
            Role::Admin,
            Role::LabCoordinator,
            Role::ModuleCoordinator,
            Role::LabAdvisor,
        ];
        PRECEDENCE.into_iter().find(|r| roles.contains(r))
    }

    /// Map the short lowercase names accepted at signup. Anything
    /// unrecognized (or absent) falls back to a plain student account.
    pub fn from_signup(name: &str) -> Role {
        match name {
            "advisor" => Role::LabAdvisor,
            "module_coordinator" => Role::ModuleCoordinator,
            "lab_coordinator" => Role::LabCoordinator,
            "admin" => Role::Admin,
            _ => Role::Student,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Student => "STUDENT",
            Role::LabAdvisor => "LAB_ADVISOR",
            Role::ModuleCoordinator => "MODULE_COORDINATOR",
            Role::LabCoordinator => "LAB_COORDINATOR",
            Role::Admin => "ADMIN",
        };
        f.write_str(s)
    }
}

impl FromStr for Role {
    type Err = RelabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STUDENT" => Ok(Role::Student),
            "LAB_ADVISOR" => Ok(Role::LabAdvisor),
            "MODULE_COORDINATOR" => Ok(Role::ModuleCoordinator),
            "LAB_COORDINATOR" => Ok(Role::LabCoordinator),
            "ADMIN" => Ok(Role::Admin),
            other => Err(RelabError::Validation(format!("Unknown role: {other}"))),
        }
    }
}

/// A user account.
///
/// The password hash never leaves the server; it is skipped during
/// serialization so handlers can return `User` values directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    #[serde(default)]
    pub password_hash: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub student_number: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub semester: Option<i32>,
    pub roles: Vec<Role>,
    /// Disabled accounts cannot sign in.
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_display() {
        for role in Role::ALL {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!("ROLE_USER".parse::<Role>().is_err());
    }

    #[test]
    fn acting_reviewer_precedence() {
        assert_eq!(
            Role::acting_reviewer(&[Role::LabAdvisor, Role::Admin]),
            Some(Role::Admin)
        );
        assert_eq!(
            Role::acting_reviewer(&[Role::ModuleCoordinator, Role::LabCoordinator]),
            Some(Role::LabCoordinator)
        );
        assert_eq!(Role::acting_reviewer(&[Role::Student]), None);
        assert_eq!(Role::acting_reviewer(&[]), None);
    }

    #[test]
    fn signup_names_map_to_roles() {
        assert_eq!(Role::from_signup("advisor"), Role::LabAdvisor);
        assert_eq!(Role::from_signup("module_coordinator"), Role::ModuleCoordinator);
        assert_eq!(Role::from_signup("lab_coordinator"), Role::LabCoordinator);
        assert_eq!(Role::from_signup("admin"), Role::Admin);
        assert_eq!(Role::from_signup("student"), Role::Student);
        assert_eq!(Role::from_signup("anything else"), Role::Student);
    }
}
