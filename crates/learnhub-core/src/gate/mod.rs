//! Access control for views.
//!
//! `RouteGate` maps (route access, session status) to a render or redirect
//! decision, `Navigator` applies it as the user moves around and as the
//! session changes, and `ViewScope` discards results that arrive after a
//! view is gone.

pub mod route;
pub mod scope;

pub use route::{GateDecision, Navigator, Route, RouteAccess, RouteGate};
pub use scope::{ScopeToken, ViewScope};
