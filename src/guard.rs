// 🚦 Route guard - one capability check for every screen
//
// Screens never inspect roles themselves. They declare a `Requirement`
// and ask the guard, which reads the session's `AuthStatus`.

use serde::Serialize;

use crate::session::AuthStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Route {
    Home,
    Login,
    Register,
    Pricing,
    Dashboard,
    Valuation,
    MyCourses,
    AdminDashboard,
    Users,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Requirement {
    Public,
    Authenticated,
    Admin,
}

impl Route {
    pub const ALL: [Route; 10] = [
        Route::Home,
        Route::Login,
        Route::Register,
        Route::Pricing,
        Route::Dashboard,
        Route::Valuation,
        Route::MyCourses,
        Route::AdminDashboard,
        Route::Users,
        Route::NotFound,
    ];

    /// Unknown paths map to `NotFound`; a trailing slash is ignored
    pub fn from_path(path: &str) -> Route {
        let trimmed = path.split(['?', '#']).next().unwrap_or("");
        let trimmed = if trimmed.len() > 1 { trimmed.trim_end_matches('/') } else { trimmed };

        match trimmed {
            "/" => Route::Home,
            "/login" => Route::Login,
            "/register" => Route::Register,
            "/pricing" => Route::Pricing,
            "/dashboard" => Route::Dashboard,
            "/valuation" => Route::Valuation,
            "/my-courses" => Route::MyCourses,
            "/admin-dashboard" => Route::AdminDashboard,
            "/users" => Route::Users,
            _ => Route::NotFound,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Login => "/login",
            Route::Register => "/register",
            Route::Pricing => "/pricing",
            Route::Dashboard => "/dashboard",
            Route::Valuation => "/valuation",
            Route::MyCourses => "/my-courses",
            Route::AdminDashboard => "/admin-dashboard",
            Route::Users => "/users",
            Route::NotFound => "*",
        }
    }

    pub fn requirement(&self) -> Requirement {
        match self {
            Route::Home | Route::Login | Route::Register | Route::Pricing | Route::NotFound => {
                Requirement::Public
            }
            Route::Dashboard | Route::Valuation | Route::MyCourses => Requirement::Authenticated,
            Route::AdminDashboard | Route::Users => Requirement::Admin,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Access {
    Allow,
    /// Session still restoring; render a spinner, decide later
    Pending,
    /// Not logged in; `from` is where to return after login
    RedirectToLogin { from: String },
    /// Logged in but not an admin
    RedirectToDashboard,
}

pub struct RouteGuard;

impl RouteGuard {
    pub fn check(status: &AuthStatus, route: Route) -> Access {
        Self::check_requirement(status, route.requirement(), route.path())
    }

    pub fn check_requirement(status: &AuthStatus, requirement: Requirement, from: &str) -> Access {
        if requirement == Requirement::Public {
            return Access::Allow;
        }
        if status.loading {
            return Access::Pending;
        }
        if status.identity.is_none() {
            return Access::RedirectToLogin {
                from: from.to_string(),
            };
        }
        if requirement == Requirement::Admin && !status.is_admin {
            return Access::RedirectToDashboard;
        }
        Access::Allow
    }
}

/// Per-user records (saved valuations, enrollments) belong to their owner;
/// admins may read anyone's
pub fn can_access_user_data(status: &AuthStatus, user_id: i64) -> bool {
    match &status.identity {
        Some(identity) => status.is_admin || identity.id == user_id,
        None => false,
    }
}

// ============================================================================
// NAVIGATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub label: &'static str,
    pub path: &'static str,
}

/// Side menu for the current role
pub fn nav_items(is_admin: bool) -> Vec<NavItem> {
    let items: &[(&'static str, &'static str)] = if is_admin {
        &[
            ("Dashboard", "/admin-dashboard"),
            ("User Management", "/users"),
            ("Courses", "/courses"),
            ("Settings", "/settings"),
        ]
    } else {
        &[
            ("Dashboard", "/dashboard"),
            ("Property Valuation", "/valuation"),
            ("My Courses", "/my-courses"),
            ("Pricing", "/pricing"),
        ]
    };

    items.iter().map(|&(label, path)| NavItem { label, path }).collect()
}

/// Landing screen after login
pub fn home_route(is_admin: bool) -> Route {
    if is_admin {
        Route::AdminDashboard
    } else {
        Route::Dashboard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Identity, Role};

    fn status(role: Option<Role>, loading: bool) -> AuthStatus {
        let identity = role.map(|role| Identity {
            id: 1,
            username: "someone".to_string(),
            role,
        });
        AuthStatus {
            is_admin: role == Some(Role::Admin),
            identity,
            loading,
        }
    }

    #[test]
    fn test_public_routes_always_allowed() {
        for s in [status(None, true), status(None, false), status(Some(Role::User), false)] {
            assert_eq!(RouteGuard::check(&s, Route::Login), Access::Allow);
            assert_eq!(RouteGuard::check(&s, Route::Pricing), Access::Allow);
            assert_eq!(RouteGuard::check(&s, Route::NotFound), Access::Allow);
        }
    }

    #[test]
    fn test_pending_while_loading() {
        let s = status(None, true);
        assert_eq!(RouteGuard::check(&s, Route::Dashboard), Access::Pending);
        assert_eq!(RouteGuard::check(&s, Route::Users), Access::Pending);
    }

    #[test]
    fn test_unauthenticated_redirects_to_login() {
        let s = status(None, false);
        assert_eq!(
            RouteGuard::check(&s, Route::Valuation),
            Access::RedirectToLogin { from: "/valuation".to_string() }
        );
        assert_eq!(
            RouteGuard::check(&s, Route::Users),
            Access::RedirectToLogin { from: "/users".to_string() }
        );
    }

    #[test]
    fn test_user_cannot_reach_admin_routes() {
        let s = status(Some(Role::User), false);
        assert_eq!(RouteGuard::check(&s, Route::MyCourses), Access::Allow);
        assert_eq!(RouteGuard::check(&s, Route::AdminDashboard), Access::RedirectToDashboard);
        assert_eq!(RouteGuard::check(&s, Route::Users), Access::RedirectToDashboard);
    }

    #[test]
    fn test_admin_reaches_everything() {
        let s = status(Some(Role::Admin), false);
        for route in Route::ALL {
            assert_eq!(RouteGuard::check(&s, route), Access::Allow, "{:?}", route);
        }
    }

    #[test]
    fn test_path_round_trip_and_unknowns() {
        for route in Route::ALL.iter().filter(|r| **r != Route::NotFound) {
            assert_eq!(Route::from_path(route.path()), *route);
        }
        assert_eq!(Route::from_path("/users/"), Route::Users);
        assert_eq!(Route::from_path("/dashboard?tab=1"), Route::Dashboard);
        assert_eq!(Route::from_path("/settings"), Route::NotFound);
        assert_eq!(Route::from_path(""), Route::NotFound);
    }

    #[test]
    fn test_nav_items_by_role() {
        let admin = nav_items(true);
        assert_eq!(admin[0].path, "/admin-dashboard");
        assert!(admin.iter().any(|i| i.path == "/users"));

        let user = nav_items(false);
        assert_eq!(user.len(), 4);
        assert!(user.iter().all(|i| i.path != "/users"));
        assert!(user.iter().any(|i| i.label == "Property Valuation"));
    }

    #[test]
    fn test_user_data_owner_or_admin() {
        let user = status(Some(Role::User), false);
        assert!(can_access_user_data(&user, 1));
        assert!(!can_access_user_data(&user, 2));

        let admin = status(Some(Role::Admin), false);
        assert!(can_access_user_data(&admin, 2));

        assert!(!can_access_user_data(&status(None, false), 1));
    }

    #[test]
    fn test_home_route() {
        assert_eq!(home_route(true), Route::AdminDashboard);
        assert_eq!(home_route(false), Route::Dashboard);
    }
}
