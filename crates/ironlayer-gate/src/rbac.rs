// ironlayer-gate/src/rbac.rs
// ============================================================================
// Module: Role-Based Access Control
// Description: Role and permission matrix with fail-closed guards.
// Purpose: Decide what a caller may do before any service code runs.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Human roles form a strict hierarchy (Viewer < Operator < Engineer <
//! Admin); the Service role sits outside it and carries only machine
//! operations. Role guards reject Service identities unconditionally, so a
//! service account can never satisfy an endpoint that demands a human role.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Roles
// ============================================================================

/// Caller roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Read-only access.
    Viewer,
    /// Viewer plus approvals, backfills, and audit access.
    Operator,
    /// Operator plus plan creation, apply, and model writes.
    Engineer,
    /// Every permission.
    Admin,
    /// Machine identity; outside the human hierarchy.
    Service,
}

impl Role {
    /// Returns the rank within the human hierarchy; Service has none.
    const fn human_rank(self) -> Option<u8> {
        match self {
            Self::Viewer => Some(0),
            Self::Operator => Some(1),
            Self::Engineer => Some(2),
            Self::Admin => Some(3),
            Self::Service => None,
        }
    }
}

// ============================================================================
// SECTION: Permissions
// ============================================================================

/// Fine-grained permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    /// Read plans.
    ReadPlans,
    /// Read models.
    ReadModels,
    /// Read runs.
    ReadRuns,
    /// Read test results.
    ReadTestResults,
    /// Read the audit log.
    ReadAudit,
    /// Create plans.
    CreatePlans,
    /// Approve plans.
    ApprovePlans,
    /// Apply plans.
    ApplyPlans,
    /// Write model definitions.
    WriteModels,
    /// Create backfills.
    CreateBackfills,
    /// Run declarative tests.
    RunTests,
    /// Manage warehouse credentials.
    ManageCredentials,
    /// Manage tenant settings.
    ManageSettings,
    /// Manage webhooks.
    ManageWebhooks,
    /// Manage environments.
    ManageEnvironments,
    /// Create ephemeral environments.
    CreateEphemeralEnvs,
    /// Promote environments.
    PromoteEnvironments,
    /// View analytics.
    ViewAnalytics,
    /// View reports.
    ViewReports,
    /// Manage health checks.
    ManageHealth,
    /// View invoices.
    ViewInvoices,
}

/// Every permission, for the Admin grant.
const ALL_PERMISSIONS: &[Permission] = &[
    Permission::ReadPlans,
    Permission::ReadModels,
    Permission::ReadRuns,
    Permission::ReadTestResults,
    Permission::ReadAudit,
    Permission::CreatePlans,
    Permission::ApprovePlans,
    Permission::ApplyPlans,
    Permission::WriteModels,
    Permission::CreateBackfills,
    Permission::RunTests,
    Permission::ManageCredentials,
    Permission::ManageSettings,
    Permission::ManageWebhooks,
    Permission::ManageEnvironments,
    Permission::CreateEphemeralEnvs,
    Permission::PromoteEnvironments,
    Permission::ViewAnalytics,
    Permission::ViewReports,
    Permission::ManageHealth,
    Permission::ViewInvoices,
];

// ============================================================================
// SECTION: Matrix
// ============================================================================

/// Returns the permission set granted to a role.
#[must_use]
pub fn role_permissions(role: Role) -> BTreeSet<Permission> {
    match role {
        Role::Viewer => [
            Permission::ReadPlans,
            Permission::ReadModels,
            Permission::ReadRuns,
            Permission::ReadTestResults,
        ]
        .into_iter()
        .collect(),
        Role::Operator => {
            let mut set = role_permissions(Role::Viewer);
            set.extend([
                Permission::ApprovePlans,
                Permission::CreateBackfills,
                Permission::ReadAudit,
            ]);
            set
        }
        Role::Engineer => {
            let mut set = role_permissions(Role::Operator);
            set.extend([
                Permission::CreatePlans,
                Permission::ApplyPlans,
                Permission::WriteModels,
                Permission::CreateEphemeralEnvs,
                Permission::RunTests,
            ]);
            set
        }
        Role::Admin => ALL_PERMISSIONS.iter().copied().collect(),
        Role::Service => [
            Permission::ReadPlans,
            Permission::ReadModels,
            Permission::ReadRuns,
            Permission::CreatePlans,
            Permission::ApplyPlans,
        ]
        .into_iter()
        .collect(),
    }
}

/// Returns true when the role carries the permission.
#[must_use]
pub fn role_has_permission(role: Role, permission: Permission) -> bool {
    role_permissions(role).contains(&permission)
}

// ============================================================================
// SECTION: Guards
// ============================================================================

/// Authorization failures.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// The caller's role lacks the required permission.
    #[error("role {role:?} lacks permission {permission:?}")]
    MissingPermission {
        /// The caller's role.
        role: Role,
        /// The permission demanded.
        permission: Permission,
    },
    /// The caller's role is below the required role.
    #[error("role {role:?} does not satisfy required role {required:?}")]
    InsufficientRole {
        /// The caller's role.
        role: Role,
        /// The role demanded.
        required: Role,
    },
    /// A service account tried to satisfy a human role guard.
    #[error("service accounts cannot satisfy role-based guards")]
    ServiceAccount,
}

/// Requires a permission; fails closed.
///
/// # Errors
///
/// Returns [`AuthzError::MissingPermission`] when the role lacks it.
pub fn require_permission(role: Role, permission: Permission) -> Result<(), AuthzError> {
    if role_has_permission(role, permission) {
        Ok(())
    } else {
        Err(AuthzError::MissingPermission { role, permission })
    }
}

/// Requires a human role at or above `required`.
///
/// Service accounts are rejected unconditionally regardless of the
/// permissions they hold.
///
/// # Errors
///
/// Returns [`AuthzError::ServiceAccount`] for service identities and
/// [`AuthzError::InsufficientRole`] for under-ranked human roles.
pub fn require_role(role: Role, required: Role) -> Result<(), AuthzError> {
    let Some(rank) = role.human_rank() else {
        return Err(AuthzError::ServiceAccount);
    };
    let required_rank = required.human_rank().unwrap_or(u8::MAX);
    if rank >= required_rank {
        Ok(())
    } else {
        Err(AuthzError::InsufficientRole { role, required })
    }
}
