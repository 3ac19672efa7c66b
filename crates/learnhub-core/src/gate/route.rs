use std::fmt;

use tokio::sync::watch;
use tracing::debug;

use crate::auth::{Session, SessionSnapshot, SessionStatus};

/// Who may see a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    /// Only signed-in users.
    Protected,
    /// Only signed-out users (login, register).
    PublicOnly,
    /// Everyone, once the session has settled.
    Open,
}

/// Outcome of gating one navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    RenderProtected,
    RenderPublic,
    RedirectToLogin,
    RedirectToHome,
    Loading,
}

impl GateDecision {
    pub fn renders(&self) -> bool {
        matches!(self, GateDecision::RenderProtected | GateDecision::RenderPublic)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Register,
    Home,
    Courses,
    CourseDetails(i64),
    Profile,
    Notifications,
    Statistics,
    NotFound,
}

impl Route {
    /// Parse an application path such as `/courses/12`.
    pub fn parse(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or("");
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [] | ["dashboard"] => Route::Home,
            ["login"] => Route::Login,
            ["register"] => Route::Register,
            ["courses"] => Route::Courses,
            ["courses", id] => id
                .parse()
                .map(Route::CourseDetails)
                .unwrap_or(Route::NotFound),
            ["profile"] => Route::Profile,
            ["notifications"] => Route::Notifications,
            ["statistics"] => Route::Statistics,
            _ => Route::NotFound,
        }
    }

    pub fn access(&self) -> RouteAccess {
        match self {
            Route::Login | Route::Register => RouteAccess::PublicOnly,
            Route::NotFound => RouteAccess::Open,
            _ => RouteAccess::Protected,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Login => "/login".to_string(),
            Route::Register => "/register".to_string(),
            Route::Home => "/".to_string(),
            Route::Courses => "/courses".to_string(),
            Route::CourseDetails(id) => format!("/courses/{}", id),
            Route::Profile => "/profile".to_string(),
            Route::Notifications => "/notifications".to_string(),
            Route::Statistics => "/statistics".to_string(),
            Route::NotFound => "/404".to_string(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

pub struct RouteGate;

impl RouteGate {
    /// Decide whether a view with `access` may render under `status`.
    ///
    /// Nothing redirects until the session has settled, so a page reload
    /// never flashes the login view for a user whose token is still being
    /// checked.
    pub fn decide(access: RouteAccess, status: SessionStatus) -> GateDecision {
        match (status, access) {
            (SessionStatus::Uninitialized | SessionStatus::Checking, _) => GateDecision::Loading,
            (SessionStatus::Authenticated, RouteAccess::Protected) => GateDecision::RenderProtected,
            (SessionStatus::Authenticated, RouteAccess::PublicOnly) => GateDecision::RedirectToHome,
            (SessionStatus::Unauthenticated, RouteAccess::Protected) => {
                GateDecision::RedirectToLogin
            }
            (SessionStatus::Unauthenticated, RouteAccess::PublicOnly) => GateDecision::RenderPublic,
            (_, RouteAccess::Open) => GateDecision::RenderPublic,
        }
    }
}

/// Tracks the current route and re-applies the gate on navigation and on
/// every session change, so a forced logout lands on the login view the
/// same way an explicit one does.
pub struct Navigator {
    current: Route,
    session: watch::Receiver<SessionSnapshot>,
}

impl Navigator {
    pub fn new(session: &Session) -> Self {
        Self {
            current: Route::Home,
            session: session.subscribe(),
        }
    }

    pub fn current(&self) -> Route {
        self.current
    }

    /// Navigate to `route`. Redirects move the current route to their
    /// target; `Loading` keeps the requested route so it is re-evaluated
    /// once the session settles.
    pub fn navigate(&mut self, route: Route) -> GateDecision {
        let status = self.session.borrow_and_update().status();
        let decision = RouteGate::decide(route.access(), status);
        self.current = match decision {
            GateDecision::RedirectToLogin => Route::Login,
            GateDecision::RedirectToHome => Route::Home,
            _ => route,
        };
        debug!(requested = %route, current = %self.current, ?decision, "Navigation");
        decision
    }

    /// Wait for the next session transition and re-gate the current route.
    /// Returns `None` once the session has been dropped.
    pub async fn next_change(&mut self) -> Option<GateDecision> {
        self.session.changed().await.ok()?;
        Some(self.navigate(self.current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{EndReason, MemoryCredentialStore};
    use std::sync::Arc;

    #[test]
    fn test_decision_table() {
        use GateDecision::*;
        use RouteAccess::*;
        use SessionStatus::*;

        let cases = [
            (Uninitialized, Protected, Loading),
            (Uninitialized, PublicOnly, Loading),
            (Uninitialized, Open, Loading),
            (Checking, Protected, Loading),
            (Checking, PublicOnly, Loading),
            (Checking, Open, Loading),
            (Authenticated, Protected, RenderProtected),
            (Authenticated, PublicOnly, RedirectToHome),
            (Authenticated, Open, RenderPublic),
            (Unauthenticated, Protected, RedirectToLogin),
            (Unauthenticated, PublicOnly, RenderPublic),
            (Unauthenticated, Open, RenderPublic),
        ];
        for (status, access, expected) in cases {
            assert_eq!(
                RouteGate::decide(access, status),
                expected,
                "{:?} / {:?}",
                status,
                access
            );
        }
    }

    #[test]
    fn test_route_parse() {
        assert_eq!(Route::parse("/"), Route::Home);
        assert_eq!(Route::parse("/dashboard"), Route::Home);
        assert_eq!(Route::parse("/login"), Route::Login);
        assert_eq!(Route::parse("/courses/"), Route::Courses);
        assert_eq!(Route::parse("/courses/12"), Route::CourseDetails(12));
        assert_eq!(Route::parse("/courses/abc"), Route::NotFound);
        assert_eq!(Route::parse("/notifications?unread=true"), Route::Notifications);
        assert_eq!(Route::parse("/nope"), Route::NotFound);
        assert_eq!(Route::CourseDetails(12).to_string(), "/courses/12");
    }

    #[test]
    fn test_route_access() {
        assert_eq!(Route::Login.access(), RouteAccess::PublicOnly);
        assert_eq!(Route::Register.access(), RouteAccess::PublicOnly);
        assert_eq!(Route::Statistics.access(), RouteAccess::Protected);
        assert_eq!(Route::NotFound.access(), RouteAccess::Open);
    }

    #[test]
    fn test_navigator_waits_while_uninitialized() {
        let session = Session::new(Arc::new(MemoryCredentialStore::new()));
        let mut nav = Navigator::new(&session);

        assert_eq!(nav.navigate(Route::Courses), GateDecision::Loading);
        assert_eq!(nav.current(), Route::Courses);
    }

    #[tokio::test]
    async fn test_navigator_redirects_after_session_ends() {
        let session = Session::new(Arc::new(MemoryCredentialStore::new()));
        let mut nav = Navigator::new(&session);
        nav.navigate(Route::Profile);

        session.end(EndReason::Unauthorized);

        assert_eq!(nav.next_change().await, Some(GateDecision::RedirectToLogin));
        assert_eq!(nav.current(), Route::Login);
    }
}
