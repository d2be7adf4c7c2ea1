//! Portal roles and landing-route resolution.
//!
//! Every authenticated user lands on exactly one dashboard. The route is
//! picked from, in order: the role claim carried by the session, the user's
//! first active tenant membership, and finally the student dashboard.

use serde::{Deserialize, Serialize};

use crate::adapters::MembershipOps;

/// Landing route used when nothing else matches.
pub const DEFAULT_DASHBOARD_ROUTE: &str = "/student/dashboard";

/// Where unauthenticated visitors are sent.
pub const LOGIN_ROUTE: &str = "/login";

/// Path prefixes that are private to signed-in users and must never be
/// indexed by crawlers.
pub const PROTECTED_PATH_PREFIXES: [&str; 6] = [
    "/student/",
    "/teacher/",
    "/admin/",
    "/parent/",
    "/api/",
    "/messaging/",
];

/// Portal role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Teacher,
    Parent,
    Admin,
    SuperAdmin,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Student,
        Role::Teacher,
        Role::Parent,
        Role::Admin,
        Role::SuperAdmin,
    ];

    /// Parse a stored role name. Names are matched exactly.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "student" => Some(Self::Student),
            "teacher" => Some(Self::Teacher),
            "parent" => Some(Self::Parent),
            "admin" => Some(Self::Admin),
            "super_admin" => Some(Self::SuperAdmin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
            Self::Parent => "parent",
            Self::Admin => "admin",
            Self::SuperAdmin => "super_admin",
        }
    }

    pub fn dashboard_route(&self) -> &'static str {
        match self {
            Self::Student => "/student/dashboard",
            Self::Teacher => "/teacher/dashboard",
            Self::Parent => "/parent/dashboard",
            Self::Admin | Self::SuperAdmin => "/admin/dashboard",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin | Self::SuperAdmin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve the effective role of `user_id`.
///
/// Unknown role names never fail; they fall through to the next source. A
/// failed membership lookup is logged and treated as "no membership".
pub async fn resolve_role<DB: MembershipOps + ?Sized>(
    database: &DB,
    user_id: &str,
    hint: Option<&str>,
) -> Option<Role> {
    if let Some(role) = hint.and_then(Role::parse) {
        return Some(role);
    }

    if let Some(hint) = hint {
        tracing::debug!(user_id, hint, "ignoring unknown role hint");
    }

    match database.first_active_membership(user_id).await {
        Ok(Some(membership)) => match Role::parse(&membership.role) {
            Some(role) => return Some(role),
            None => tracing::debug!(
                user_id,
                role = %membership.role,
                "membership role has no dashboard"
            ),
        },
        Ok(None) => {}
        Err(err) => tracing::warn!(user_id, error = %err, "membership lookup failed"),
    }

    None
}

/// Resolve the landing route for `user_id`, defaulting to the student
/// dashboard.
pub async fn resolve_dashboard_route<DB: MembershipOps + ?Sized>(
    database: &DB,
    user_id: &str,
    hint: Option<&str>,
) -> &'static str {
    resolve_role(database, user_id, hint)
        .await
        .map(|role| role.dashboard_route())
        .unwrap_or(DEFAULT_DASHBOARD_ROUTE)
}
