//! Followcare Agents Module
//!
//! Reply generation for follow-up conversations: the completion-service
//! client, the outbound message gateway, the reply generator that ties them
//! to the conversation store, and the scheduler that fires due initial
//! messages.

pub mod completion;
pub mod gateway;
pub mod reply;
pub mod scheduler;

pub use completion::*;
pub use gateway::*;
pub use reply::*;
pub use scheduler::*;
