//! Error taxonomy for the follow-up orchestrator.

use thiserror::Error;

/// Failures surfaced by the orchestrator.
///
/// A duplicate trigger is deliberately not represented here: re-triggering a
/// contact that already has a conversation is an expected no-op, not an
/// error.
#[derive(Debug, Error)]
pub enum FollowUpError {
    /// Inbound event is missing a resolvable contact id or phone number
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// Store unreachable or a query failed; no partial state was committed
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// Conditional update lost against a concurrent writer of the same row
    #[error("revision conflict for contact {contact_id}")]
    RevisionConflict { contact_id: String },

    /// Messaging gateway rejected the send or never accepted it
    #[error("delivery failure (status {status:?}): {message}")]
    Delivery {
        status: Option<u16>,
        message: String,
    },

    /// Completion service call failed or timed out
    #[error("completion service failure: {0}")]
    Completion(String),

    /// No conversation exists for the contact
    #[error("no conversation for contact {0}")]
    ConversationNotFound(String),

    /// The conversation exists but has not started yet
    #[error("conversation for contact {0} is not ongoing")]
    NotOngoing(String),
}

impl From<rusqlite::Error> for FollowUpError {
    fn from(err: rusqlite::Error) -> Self {
        FollowUpError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for FollowUpError {
    fn from(err: serde_json::Error) -> Self {
        FollowUpError::Persistence(format!("transcript serialization failed: {err}"))
    }
}
