//! Followcare API Module
//!
//! The webhook boundary of the follow-up service: raw payload models, the
//! event router that classifies each inbound event, and the HTTP server.

pub mod handlers;
pub mod models;
pub mod router;
pub mod server;

pub use handlers::*;
pub use models::*;
pub use router::*;
pub use server::*;
