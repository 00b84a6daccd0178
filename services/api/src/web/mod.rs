pub mod attendance;
pub mod auth;
pub mod middleware;
pub mod rest;
pub mod state;

// Re-export the pieces the server binary wires into the router.
pub use middleware::require_auth;
pub use rest::{status_handler, ApiDoc};
