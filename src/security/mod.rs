//! Security features.
//!
//! Role-based access control for privileged catalog operations.

pub mod rbac;

pub use rbac::{AccessControl, Identity, Permission, Role};
