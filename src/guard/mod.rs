//! Route guarding: who may reach which page.

mod decision;
mod routes;

pub use decision::{RouteDecision, RouteGuard};
pub use routes::RouteConfig;
