//! Follow-up scheduler
//!
//! Recurring loop that claims due conversations and fires their initial
//! message. Claiming flips a row to Ongoing in the same store operation that
//! selects it, so overlapping cycles cannot double-send. One conversation's
//! failure is logged and never stops the cycle or the loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info};

use followcare_core::ConversationStore;

use crate::reply::ReplyGenerator;

/// Polls the store for due conversations on a fixed interval.
pub struct Scheduler {
    store: Arc<ConversationStore>,
    generator: Arc<ReplyGenerator>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(
        store: Arc<ConversationStore>,
        generator: Arc<ReplyGenerator>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            generator,
            interval,
        }
    }

    /// Run forever, waking on the configured interval.
    pub async fn run(&self) {
        info!("Scheduler started with wake interval {:?}", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            self.run_cycle().await;
        }
    }

    /// One wake cycle: claim everything due, then process each claimed row,
    /// isolating per-row failures.
    pub async fn run_cycle(&self) {
        let due = match self.store.claim_due(Utc::now()) {
            Ok(due) => due,
            Err(e) => {
                error!("Scheduler failed to claim due conversations: {e}");
                return;
            }
        };
        if due.is_empty() {
            return;
        }

        debug!("Processing {} due conversation(s)", due.len());
        for conversation in due {
            if let Err(e) = self.generator.send_initial(&conversation).await {
                error!(
                    "Initial follow-up for contact {} failed: {e}",
                    conversation.contact_id
                );
            }
        }
    }
}
