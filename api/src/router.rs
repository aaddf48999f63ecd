//! Event router
//!
//! Classifies each normalized inbound event into exactly one category and
//! applies at most one transition: idempotently create a scheduled
//! conversation, spawn the contextual reply path, or ignore. The reply path
//! runs in its own task; the router returns without waiting on it.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, error, info};

use followcare_agents::ReplyGenerator;
use followcare_core::{AppConfig, ConversationStatus, ConversationStore, FollowUpError};

use crate::models::{EventKind, InboundEvent};

/// What the router did with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// A new conversation was scheduled
    Scheduled,
    /// A trigger matched but the contact already has a conversation
    Duplicate,
    /// A patient reply was accepted; generation runs in the background
    ReplyAccepted,
    /// Nothing to do for this event
    Ignored,
}

/// Routes normalized webhook events to conversation-store transitions.
pub struct EventRouter {
    store: Arc<ConversationStore>,
    generator: Arc<ReplyGenerator>,
    config: AppConfig,
}

impl EventRouter {
    pub fn new(
        store: Arc<ConversationStore>,
        generator: Arc<ReplyGenerator>,
        config: AppConfig,
    ) -> Self {
        Self {
            store,
            generator,
            config,
        }
    }

    /// Route one event. Returns quickly: the reply path is spawned, never
    /// awaited here.
    pub async fn route(&self, event: InboundEvent) -> Result<RouteOutcome, FollowUpError> {
        match event.kind {
            EventKind::LabelApplied { ref labels } => {
                if labels.iter().any(|l| l == &self.config.followup_label) {
                    self.schedule(&event)
                } else {
                    Ok(RouteOutcome::Ignored)
                }
            }
            EventKind::Message {
                ref body,
                from_operator,
            } => {
                if from_operator {
                    if body.trim().eq_ignore_ascii_case(&self.config.trigger_keyword) {
                        self.schedule(&event)
                    } else {
                        Ok(RouteOutcome::Ignored)
                    }
                } else {
                    self.accept_reply(&event, body)
                }
            }
            EventKind::Other => Ok(RouteOutcome::Ignored),
        }
    }

    fn schedule(&self, event: &InboundEvent) -> Result<RouteOutcome, FollowUpError> {
        let due = Utc::now() + Duration::seconds(self.config.followup_delay.as_secs() as i64);
        let created = self
            .store
            .create_scheduled(&event.contact_id, &event.phone_number, due)?;

        if created {
            info!("Follow-up scheduled for {} at {}", event.phone_number, due);
            Ok(RouteOutcome::Scheduled)
        } else {
            debug!(
                "Trigger for contact {} ignored: conversation already exists",
                event.contact_id
            );
            Ok(RouteOutcome::Duplicate)
        }
    }

    fn accept_reply(&self, event: &InboundEvent, body: &str) -> Result<RouteOutcome, FollowUpError> {
        let Some(conversation) = self.store.get(&event.contact_id)? else {
            debug!(
                "Ignoring message from {}: no follow-up conversation",
                event.phone_number
            );
            return Ok(RouteOutcome::Ignored);
        };
        if conversation.status != ConversationStatus::Ongoing {
            debug!(
                "Ignoring message from {}: follow-up not started yet",
                event.phone_number
            );
            return Ok(RouteOutcome::Ignored);
        }

        let generator = self.generator.clone();
        let contact_id = event.contact_id.clone();
        let body = body.to_string();
        tokio::spawn(async move {
            if let Err(e) = generator.send_reply(&contact_id, &body).await {
                error!("Reply generation for contact {contact_id} failed: {e}");
            }
        });
        Ok(RouteOutcome::ReplyAccepted)
    }
}
