//! Conversation data model
//!
//! One conversation per contact: scheduling state plus the append-only
//! transcript that serves as prompt context for every generated reply.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FollowUpError;

/// Speaker of a transcript turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single transcript entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who produced this turn
    pub role: Role,
    /// Turn text
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Lifecycle state of a conversation.
///
/// Monotonic: a conversation only ever moves Scheduled -> Ongoing, never
/// backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    /// Created by a trigger, waiting for its initial message to become due
    Scheduled,
    /// Initial message claimed or sent; patient replies are accepted
    Ongoing,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Scheduled => "scheduled",
            ConversationStatus::Ongoing => "ongoing",
        }
    }
}

impl std::str::FromStr for ConversationStatus {
    type Err = FollowUpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(ConversationStatus::Scheduled),
            "ongoing" => Ok(ConversationStatus::Ongoing),
            other => Err(FollowUpError::Persistence(format!(
                "unknown conversation status: {other}"
            ))),
        }
    }
}

/// A follow-up conversation with one contact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Stable identifier from the messaging platform
    pub contact_id: String,
    /// Destination address for outbound sends
    pub phone_number: String,
    /// Lifecycle state
    pub status: ConversationStatus,
    /// When the initial message becomes eligible; meaningful while Scheduled
    pub scheduled_time: DateTime<Utc>,
    /// Ordered, append-only turn history
    pub transcript: Vec<Turn>,
    /// Optimistic-concurrency counter, bumped on every mutation
    pub revision: i64,
}
