//! # HTTP Server
//!
//! The external surface of the gate:
//!
//! - `POST /webhook/chat` — messaging-platform webhook; business failures
//!   ride a success status with the failure in the payload
//! - `POST /admin/credentials/bulk`, `POST /admin/codes`,
//!   `POST /admin/codes/bulk`, `POST /admin/codes/disable`,
//!   `GET /admin/codes` — administrative surface behind a bearer token
//! - `GET /health` — liveness

pub mod admin_auth;
pub mod admin_routes;
pub mod chat_routes;
pub mod config;
pub mod server;

pub use config::HttpServerConfig;
pub use server::{GateServer, GateState};
