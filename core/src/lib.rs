//! Followcare Core Module
//!
//! Fundamental types for the follow-up orchestrator: the conversation data
//! model, the durable conversation store, service configuration, and the
//! shared error taxonomy.

pub mod config;
pub mod conversation;
pub mod error;
pub mod store;

pub use config::*;
pub use conversation::*;
pub use error::*;
pub use store::*;
