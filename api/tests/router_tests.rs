//! Event router integration tests with in-memory collaborators.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use followcare_agents::{CompletionClient, MessageGateway, ReplyGenerator};
use followcare_api::{EventKind, EventRouter, InboundEvent, RouteOutcome};
use followcare_core::{AppConfig, ConversationStatus, ConversationStore, FollowUpError, Turn};

struct FakeCompletion;

#[async_trait]
impl CompletionClient for FakeCompletion {
    async fn complete(&self, _turns: &[Turn]) -> Result<String, FollowUpError> {
        Ok("Glad to hear it. Anything else I can help with?".to_string())
    }
}

#[derive(Default)]
struct FakeGateway {
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl MessageGateway for FakeGateway {
    async fn send_text(&self, phone_number: &str, text: &str) -> Result<(), FollowUpError> {
        self.sent
            .lock()
            .unwrap()
            .push((phone_number.to_string(), text.to_string()));
        Ok(())
    }
}

fn harness() -> (Arc<ConversationStore>, Arc<FakeGateway>, EventRouter) {
    let store = Arc::new(ConversationStore::open_in_memory().unwrap());
    let gateway = Arc::new(FakeGateway::default());
    let generator = Arc::new(ReplyGenerator::new(
        store.clone(),
        Arc::new(FakeCompletion),
        gateway.clone(),
    ));
    let router = EventRouter::new(store.clone(), generator, AppConfig::default());
    (store, gateway, router)
}

fn label_event(labels: &[&str]) -> InboundEvent {
    InboundEvent {
        contact_id: "C1".to_string(),
        phone_number: "+100".to_string(),
        kind: EventKind::LabelApplied {
            labels: labels.iter().map(|l| l.to_string()).collect(),
        },
    }
}

fn message_event(body: &str, from_operator: bool) -> InboundEvent {
    InboundEvent {
        contact_id: "C1".to_string(),
        phone_number: "+100".to_string(),
        kind: EventKind::Message {
            body: body.to_string(),
            from_operator,
        },
    }
}

#[tokio::test]
async fn label_trigger_creates_one_conversation() {
    let (store, _gateway, router) = harness();

    let outcome = router.route(label_event(&["Follow-up"])).await.unwrap();
    assert_eq!(outcome, RouteOutcome::Scheduled);

    let conversation = store.get("C1").unwrap().unwrap();
    assert_eq!(conversation.status, ConversationStatus::Scheduled);
    assert!(conversation.scheduled_time > Utc::now());

    // Second label event for the same contact is a no-op.
    let outcome = router.route(label_event(&["Follow-up"])).await.unwrap();
    assert_eq!(outcome, RouteOutcome::Duplicate);
}

#[tokio::test]
async fn unrelated_label_is_ignored() {
    let (store, _gateway, router) = harness();

    let outcome = router.route(label_event(&["VIP"])).await.unwrap();
    assert_eq!(outcome, RouteOutcome::Ignored);
    assert!(store.get("C1").unwrap().is_none());
}

#[tokio::test]
async fn operator_keyword_matches_case_insensitively() {
    let (store, _gateway, router) = harness();

    let outcome = router
        .route(message_event("start followup", true))
        .await
        .unwrap();
    assert_eq!(outcome, RouteOutcome::Scheduled);
    assert!(store.get("C1").unwrap().is_some());
}

#[tokio::test]
async fn operator_chatter_is_ignored() {
    let (store, _gateway, router) = harness();

    let outcome = router
        .route(message_event("please start the followup", true))
        .await
        .unwrap();
    assert_eq!(outcome, RouteOutcome::Ignored);
    assert!(store.get("C1").unwrap().is_none());
}

#[tokio::test]
async fn patient_keyword_does_not_trigger() {
    let (store, _gateway, router) = harness();

    let outcome = router
        .route(message_event("START FOLLOWUP", false))
        .await
        .unwrap();
    assert_eq!(outcome, RouteOutcome::Ignored);
    assert!(store.get("C1").unwrap().is_none());
}

#[tokio::test]
async fn reply_before_initial_message_is_ignored() {
    let (store, gateway, router) = harness();

    router.route(label_event(&["Follow-up"])).await.unwrap();
    let outcome = router
        .route(message_event("hello?", false))
        .await
        .unwrap();
    assert_eq!(outcome, RouteOutcome::Ignored);

    let conversation = store.get("C1").unwrap().unwrap();
    assert!(conversation.transcript.is_empty());
    assert!(gateway.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn ongoing_reply_is_accepted_and_processed_in_background() {
    let (store, gateway, router) = harness();

    store
        .create_scheduled("C1", "+100", Utc::now() - chrono::Duration::minutes(1))
        .unwrap();
    store.claim_due(Utc::now()).unwrap();
    store
        .append_turns("C1", 1, &[Turn::assistant("How are you?")])
        .unwrap();

    let outcome = router
        .route(message_event("I'm fine", false))
        .await
        .unwrap();
    assert_eq!(outcome, RouteOutcome::ReplyAccepted);

    // The reply path runs off the router's task; give it a moment.
    let mut transcript_len = 0;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        transcript_len = store.get("C1").unwrap().unwrap().transcript.len();
        if transcript_len == 3 {
            break;
        }
    }
    assert_eq!(transcript_len, 3);
    assert_eq!(gateway.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_event_kind_is_ignored() {
    let (store, _gateway, router) = harness();

    let event = InboundEvent {
        contact_id: "C1".to_string(),
        phone_number: "+100".to_string(),
        kind: EventKind::Other,
    };
    assert_eq!(router.route(event).await.unwrap(), RouteOutcome::Ignored);
    assert!(store.get("C1").unwrap().is_none());
}
