//! Reply generation
//!
//! Builds prompts from the stored transcript plus fixed persona instructions,
//! obtains a completion, dispatches it, and records the exchange. The whole
//! read-complete-dispatch-append cycle for one contact runs under that
//! contact's lock so concurrent replies cannot interleave, and nothing is
//! persisted unless the outbound send succeeded.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use followcare_core::{Conversation, ConversationStatus, ConversationStore, FollowUpError, Turn};

use crate::completion::CompletionClient;
use crate::gateway::MessageGateway;

/// Persona instruction for the scheduled first message.
pub const INITIAL_PROMPT: &str = "You are a helpful medical assistant. A patient needs a \
follow-up. Please write a polite message to ask how they are doing after their recent \
appointment and if they have any questions. Keep it under 100 words.";

/// Persona instruction for every contextual reply.
pub const REPLY_PROMPT: &str = "You are a professional medical assistant replying to a \
patient. Be helpful, concise, and empathetic. Do not give medical advice. If the patient \
asks for an appointment or to speak with a doctor, tell them you will connect them with a \
human.";

/// Generates and dispatches follow-up messages, one conversation at a time.
pub struct ReplyGenerator {
    store: Arc<ConversationStore>,
    completion: Arc<dyn CompletionClient>,
    gateway: Arc<dyn MessageGateway>,
    /// Per-contact critical sections serializing transcript mutation
    contact_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ReplyGenerator {
    pub fn new(
        store: Arc<ConversationStore>,
        completion: Arc<dyn CompletionClient>,
        gateway: Arc<dyn MessageGateway>,
    ) -> Self {
        Self {
            store,
            completion,
            gateway,
            contact_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_for(&self, contact_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.contact_locks.lock().await;
        locks
            .entry(contact_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the registry entry once no task holds or waits on it. The
    /// registry mutex is held across the count check, and every clone is
    /// handed out under that same mutex, so a count of two (the map's and
    /// ours) cannot race a new waiter.
    async fn prune_lock(&self, contact_id: &str, lock: &Arc<Mutex<()>>) {
        let mut locks = self.contact_locks.lock().await;
        if Arc::strong_count(lock) == 2 {
            locks.remove(contact_id);
        }
    }

    /// Send the first outbound message for a conversation just claimed by the
    /// scheduler. The claim already moved the row to Ongoing; this appends
    /// the opening assistant turn once the send has gone through.
    pub async fn send_initial(&self, conversation: &Conversation) -> Result<(), FollowUpError> {
        let lock = self.lock_for(&conversation.contact_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.send_initial_locked(conversation).await
        };
        self.prune_lock(&conversation.contact_id, &lock).await;
        result
    }

    async fn send_initial_locked(&self, conversation: &Conversation) -> Result<(), FollowUpError> {
        // Re-read under the lock so the revision check reflects any writer
        // that slipped in between the claim and this call.
        let current = self
            .store
            .get(&conversation.contact_id)?
            .ok_or_else(|| FollowUpError::ConversationNotFound(conversation.contact_id.clone()))?;

        let prompt = [Turn::system(INITIAL_PROMPT)];
        let text = self.completion.complete(&prompt).await?;
        self.gateway.send_text(&current.phone_number, &text).await?;
        self.store
            .append_turns(&current.contact_id, current.revision, &[Turn::assistant(text)])?;

        info!("Initial follow-up sent to {}", current.phone_number);
        Ok(())
    }

    /// Generate and send a reply to a patient message. The incoming user turn
    /// and the generated assistant turn are appended together, and only after
    /// the send succeeded; a failed completion or send leaves the transcript
    /// untouched.
    pub async fn send_reply(&self, contact_id: &str, body: &str) -> Result<(), FollowUpError> {
        let lock = self.lock_for(contact_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.send_reply_locked(contact_id, body).await
        };
        self.prune_lock(contact_id, &lock).await;
        result
    }

    async fn send_reply_locked(&self, contact_id: &str, body: &str) -> Result<(), FollowUpError> {
        let current = self
            .store
            .get(contact_id)?
            .ok_or_else(|| FollowUpError::ConversationNotFound(contact_id.to_string()))?;
        if current.status != ConversationStatus::Ongoing {
            return Err(FollowUpError::NotOngoing(contact_id.to_string()));
        }

        let user_turn = Turn::user(body);
        let mut prompt = Vec::with_capacity(current.transcript.len() + 2);
        prompt.push(Turn::system(REPLY_PROMPT));
        prompt.extend(current.transcript.iter().cloned());
        prompt.push(user_turn.clone());

        let text = self.completion.complete(&prompt).await?;
        self.gateway.send_text(&current.phone_number, &text).await?;
        self.store.append_turns(
            contact_id,
            current.revision,
            &[user_turn, Turn::assistant(text)],
        )?;

        debug!("Replied to {}", current.phone_number);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use followcare_core::ConversationStore;

    struct FixedCompletion;

    #[async_trait]
    impl CompletionClient for FixedCompletion {
        async fn complete(&self, _turns: &[Turn]) -> Result<String, FollowUpError> {
            Ok("Hope you are recovering well.".to_string())
        }
    }

    struct SilentGateway;

    #[async_trait]
    impl MessageGateway for SilentGateway {
        async fn send_text(&self, _phone: &str, _text: &str) -> Result<(), FollowUpError> {
            Ok(())
        }
    }

    fn generator() -> (Arc<ConversationStore>, ReplyGenerator) {
        let store = Arc::new(ConversationStore::open_in_memory().unwrap());
        let generator = ReplyGenerator::new(
            store.clone(),
            Arc::new(FixedCompletion),
            Arc::new(SilentGateway),
        );
        (store, generator)
    }

    #[tokio::test]
    async fn contact_lock_is_released_after_reply() {
        let (store, generator) = generator();
        store
            .create_scheduled("C1", "+100", Utc::now() - Duration::minutes(1))
            .unwrap();
        store.claim_due(Utc::now()).unwrap();

        generator.send_reply("C1", "feeling better").await.unwrap();

        let locks = generator.contact_locks.lock().await;
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn contact_lock_is_released_after_failure() {
        let (_store, generator) = generator();

        // No conversation exists, so the reply path errors out early.
        let err = generator.send_reply("ghost", "hello").await.unwrap_err();
        assert!(matches!(err, FollowUpError::ConversationNotFound(_)));

        let locks = generator.contact_locks.lock().await;
        assert!(locks.is_empty());
    }
}
