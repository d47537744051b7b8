//! Role-based access control.
//!
//! Identities are asserted by an external authentication collaborator; this
//! module only decides whether a role may perform an operation.
//!
//! # Roles
//!
//! | Role | Permissions |
//! |------|-------------|
//! | `Admin` | All permissions |
//! | `User` | Read, Write, `SwitchMode`, `BulkLoad` |
//!
//! # Example
//!
//! ```rust
//! use cardvault::security::rbac::{AccessControl, Identity, Permission, Role};
//!
//! let ac = AccessControl::new();
//! let user = Identity::new("alice", Role::User);
//!
//! assert!(ac.check(&user, Permission::Write).is_ok());
//! assert!(ac.check(&user, Permission::Clear).is_err());
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Roles with predefined permission sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full access, including destructive operations.
    Admin,
    /// Standard access without destructive bulk operations.
    User,
}

impl Role {
    /// Returns all available roles.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Admin, Self::User]
    }

    /// Returns the role as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "admin" | "administrator" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            other => Err(Error::InvalidInput(format!(
                "unknown role '{other}' (expected 'admin' or 'user')"
            ))),
        }
    }
}

/// Permissions for catalog operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// List, get and query cards.
    Read,
    /// Add, update and delete single cards.
    Write,
    /// Remove every card from an engine.
    Clear,
    /// Change the active persistence mode.
    SwitchMode,
    /// Import a dataset.
    BulkLoad,
}

impl Permission {
    /// Returns all available permissions.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Read,
            Self::Write,
            Self::Clear,
            Self::SwitchMode,
            Self::BulkLoad,
        ]
    }

    /// Returns the permission as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Clear => "clear",
            Self::SwitchMode => "switch_mode",
            Self::BulkLoad => "bulk_load",
        }
    }
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Subject identifier, e.g. a user name.
    pub subject: String,
    /// Assigned role.
    pub role: Role,
}

impl Identity {
    /// Creates an identity.
    #[must_use]
    pub fn new(subject: impl Into<String>, role: Role) -> Self {
        Self {
            subject: subject.into(),
            role,
        }
    }

    /// Returns true if the identity holds the admin role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Maps roles to permissions and enforces them.
#[derive(Debug, Clone)]
pub struct AccessControl {
    role_permissions: HashMap<Role, HashSet<Permission>>,
}

impl Default for AccessControl {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessControl {
    /// Creates the default role-permission mapping.
    #[must_use]
    pub fn new() -> Self {
        let mut role_permissions = HashMap::new();

        role_permissions.insert(Role::Admin, Permission::all().iter().copied().collect());

        // Everything except Clear
        role_permissions.insert(
            Role::User,
            [
                Permission::Read,
                Permission::Write,
                Permission::SwitchMode,
                Permission::BulkLoad,
            ]
            .into_iter()
            .collect(),
        );

        Self { role_permissions }
    }

    /// Checks if a role has a permission.
    #[must_use]
    pub fn has_permission(&self, role: Role, permission: Permission) -> bool {
        self.role_permissions
            .get(&role)
            .is_some_and(|perms| perms.contains(&permission))
    }

    /// Enforces a permission for an identity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Forbidden`] if the identity's role lacks the permission.
    pub fn check(&self, identity: &Identity, permission: Permission) -> Result<()> {
        if self.has_permission(identity.role, permission) {
            return Ok(());
        }

        tracing::warn!(
            subject = %identity.subject,
            role = %identity.role,
            permission = permission.as_str(),
            "Access denied"
        );
        metrics::counter!("access_denied_total", "permission" => permission.as_str())
            .increment(1);
        Err(Error::Forbidden(format!(
            "role '{}' does not have permission '{}'",
            identity.role,
            permission.as_str()
        )))
    }

    /// Grants a permission to a role.
    pub fn grant_permission(&mut self, role: Role, permission: Permission) {
        self.role_permissions
            .entry(role)
            .or_default()
            .insert(permission);
    }

    /// Revokes a permission from a role.
    pub fn revoke_permission(&mut self, role: Role, permission: Permission) {
        if let Some(perms) = self.role_permissions.get_mut(&role) {
            perms.remove(&permission);
        }
    }

    /// Returns all permissions for a role.
    #[must_use]
    pub fn permissions_for(&self, role: Role) -> HashSet<Permission> {
        self.role_permissions.get(&role).cloned().unwrap_or_default()
    }
}
