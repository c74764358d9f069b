use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tradelink_gateway::{CompletionGateway, ScriptedGateway};
use tradelink_messaging::{
    ConversationId, EngineConfig, EngineEvent, MessageBody, MessageDraft, MessageStore,
    MessagingEngine, MessagingError, PendingFlags, Roster, SendOutcome, Sender,
    DEFAULT_REPLY_ERROR_TEXT,
};

fn conversation() -> ConversationId {
    ConversationId::new(1)
}

fn engine_with(gateway: Arc<ScriptedGateway>, config: EngineConfig) -> Arc<MessagingEngine> {
    let store = Arc::new(MessageStore::new());
    // Fixture from the platform demo: two contact messages and one already
    // read user message.
    store.seed(
        conversation(),
        vec![
            MessageDraft::contact_text("Good morning! The shipment cleared the origin port."),
            MessageDraft::user_text("Great, thanks for the update.").with_read(true),
            MessageDraft::contact_text("The customs paperwork is ready."),
        ],
    );
    Arc::new(MessagingEngine::with_store(
        store,
        Roster::builtin(),
        gateway as Arc<dyn CompletionGateway>,
        config,
    ))
}

async fn wait_until(mut predicate: impl FnMut() -> bool) {
    for _ in 0..500 {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn happy_path_reply_cycle_updates_store_reads_and_suggestions() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.push_reply("Next Tuesday.");
    gateway.push_suggestions(vec!["Thanks!", "Can you confirm the carrier?"]);
    let engine = engine_with(gateway.clone(), EngineConfig::default());
    engine.select_conversation(conversation()).unwrap();

    let outcome = engine
        .send(conversation(), "When will the shipment arrive?")
        .await
        .unwrap();

    let messages = engine.messages(conversation());
    assert_eq!(messages.len(), 5);
    assert_eq!(messages[3].sender, Sender::User);
    assert_eq!(
        messages[3].body.as_text(),
        Some("When will the shipment arrive?")
    );
    assert!(messages[3].is_read, "reply cycle marks the sent message read");
    assert_eq!(messages[4].sender, Sender::Contact);
    assert_eq!(messages[4].body.as_text(), Some("Next Tuesday."));

    assert_eq!(
        engine.suggestions(conversation()),
        vec!["Thanks!", "Can you confirm the carrier?"]
    );
    match outcome {
        SendOutcome::Replied { reply, suggestions } => {
            assert_eq!(reply.body.as_text(), Some("Next Tuesday."));
            assert_eq!(suggestions.len(), 2);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(engine.pending_flags(conversation()), PendingFlags::default());
    assert_eq!(gateway.reply_calls(), 1);
    assert_eq!(gateway.suggestion_calls(), 1);
}

#[tokio::test]
async fn reply_failure_appends_error_notice_and_skips_suggestions() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.push_reply_failure("completion backend down");
    let engine = engine_with(gateway.clone(), EngineConfig::default());
    engine.select_conversation(conversation()).unwrap();

    let outcome = engine
        .send(conversation(), "When will the shipment arrive?")
        .await
        .unwrap();

    let messages = engine.messages(conversation());
    assert_eq!(messages.len(), 5);
    assert!(
        !messages[3].is_read,
        "failed cycles must not mark messages read"
    );
    assert_eq!(messages[4].sender, Sender::Contact);
    assert_eq!(messages[4].body.as_text(), Some(DEFAULT_REPLY_ERROR_TEXT));

    assert!(engine.suggestions(conversation()).is_empty());
    assert_eq!(gateway.suggestion_calls(), 0, "no suggestion call after an error");
    assert!(matches!(outcome, SendOutcome::ReplyFailed { .. }));
    assert_eq!(engine.pending_flags(conversation()), PendingFlags::default());
}

#[tokio::test]
async fn reply_timeout_takes_the_failure_path() {
    let gateway = Arc::new(ScriptedGateway::new());
    // Gate is never released; the configured timeout must fire instead.
    gateway.gate_replies(Arc::new(Notify::new()));
    gateway.push_reply("never delivered");
    let config = EngineConfig {
        reply_timeout: Duration::from_millis(40),
        ..EngineConfig::default()
    };
    let engine = engine_with(gateway.clone(), config);

    let outcome = engine.send(conversation(), "anyone there?").await.unwrap();

    assert!(matches!(outcome, SendOutcome::ReplyFailed { .. }));
    let messages = engine.messages(conversation());
    assert_eq!(
        messages.last().unwrap().body.as_text(),
        Some(DEFAULT_REPLY_ERROR_TEXT)
    );
    assert_eq!(engine.pending_flags(conversation()), PendingFlags::default());
}

#[tokio::test]
async fn blank_text_is_rejected_without_any_mutation() {
    let gateway = Arc::new(ScriptedGateway::new());
    let engine = engine_with(gateway.clone(), EngineConfig::default());

    let result = engine.send(conversation(), "   \n  ").await;

    assert!(matches!(result, Err(MessagingError::EmptyMessage { .. })));
    assert_eq!(engine.messages(conversation()).len(), 3);
    assert_eq!(gateway.reply_calls(), 0);
}

#[tokio::test]
async fn unknown_conversation_is_rejected() {
    let gateway = Arc::new(ScriptedGateway::new());
    let engine = engine_with(gateway, EngineConfig::default());

    let result = engine.send(ConversationId::new(404), "hello?").await;

    assert!(matches!(
        result,
        Err(MessagingError::UnknownConversation { .. })
    ));
}

#[tokio::test]
async fn second_send_is_rejected_while_reply_is_in_flight() {
    let gateway = Arc::new(ScriptedGateway::new());
    let gate = Arc::new(Notify::new());
    gateway.gate_replies(gate.clone());
    gateway.push_reply("held reply");
    gateway.push_suggestions(vec!["ok"]);
    let engine = engine_with(gateway.clone(), EngineConfig::default());
    engine.select_conversation(conversation()).unwrap();

    let background_engine = engine.clone();
    let first_send = tokio::spawn(async move {
        background_engine
            .send(conversation(), "first message")
            .await
    });

    {
        let gateway = gateway.clone();
        wait_until(move || gateway.reply_calls() == 1).await;
    }
    assert!(engine.pending_flags(conversation()).is_replying);

    let second = engine.send(conversation(), "second message").await;
    assert!(matches!(
        second,
        Err(MessagingError::ConversationBusy { .. })
    ));
    // The rejected send must not touch the store or the gateway.
    assert_eq!(engine.messages(conversation()).len(), 4);
    assert_eq!(gateway.reply_calls(), 1);

    gate.notify_one();
    let outcome = first_send.await.unwrap().unwrap();
    assert!(matches!(outcome, SendOutcome::Replied { .. }));
    assert_eq!(engine.messages(conversation()).len(), 5);
}

#[tokio::test]
async fn attachments_interleave_with_an_in_flight_reply() {
    let gateway = Arc::new(ScriptedGateway::new());
    let gate = Arc::new(Notify::new());
    gateway.gate_replies(gate.clone());
    gateway.push_reply("got it");
    gateway.push_suggestions(vec![]);
    let engine = engine_with(gateway.clone(), EngineConfig::default());
    engine.select_conversation(conversation()).unwrap();

    let background_engine = engine.clone();
    let send_task = tokio::spawn(async move {
        background_engine.send(conversation(), "sending now").await
    });
    {
        let gateway = gateway.clone();
        wait_until(move || gateway.reply_calls() == 1).await;
    }

    // Attachment sends are not subject to reply-cycle serialization.
    let attached = engine.attach_voice_note(conversation(), tradelink_messaging::VoiceNote::new(9));
    assert!(attached.is_ok());

    gate.notify_one();
    send_task.await.unwrap().unwrap();

    let messages = engine.messages(conversation());
    assert_eq!(messages.len(), 6);
    assert!(matches!(messages[4].body, MessageBody::VoiceNote(_)));
    assert_eq!(messages[5].body.as_text(), Some("got it"));
}

#[tokio::test]
async fn stale_suggestions_are_discarded_after_switching_conversations() {
    let gateway = Arc::new(ScriptedGateway::new());
    let gate = Arc::new(Notify::new());
    gateway.gate_suggestions(gate.clone());
    gateway.push_reply("reply lands fine");
    gateway.push_suggestions(vec!["too late"]);
    let engine = engine_with(gateway.clone(), EngineConfig::default());
    engine.select_conversation(conversation()).unwrap();

    let background_engine = engine.clone();
    let send_task = tokio::spawn(async move {
        background_engine.send(conversation(), "still here?").await
    });
    {
        let gateway = gateway.clone();
        wait_until(move || gateway.suggestion_calls() == 1).await;
    }

    // User walks away while the suggestion call is still in flight.
    engine.select_conversation(ConversationId::new(2)).unwrap();

    gate.notify_one();
    let outcome = send_task.await.unwrap().unwrap();

    match outcome {
        SendOutcome::Replied { suggestions, .. } => assert!(suggestions.is_empty()),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(engine.suggestions(conversation()).is_empty());
    // The reply itself still landed; only the suggestion result was stale.
    assert_eq!(engine.messages(conversation()).len(), 5);
    assert_eq!(engine.pending_flags(conversation()), PendingFlags::default());
}

#[tokio::test]
async fn new_send_supersedes_a_running_suggestion_phase() {
    let gateway = Arc::new(ScriptedGateway::new());
    let gate = Arc::new(Notify::new());
    gateway.gate_suggestions(gate.clone());
    gateway.push_reply("first reply");
    gateway.push_reply("second reply");
    gateway.push_suggestions(vec!["confirm the new schedule"]);
    gateway.push_suggestions(vec!["confirm the new schedule"]);
    let engine = engine_with(gateway.clone(), EngineConfig::default());
    engine.select_conversation(conversation()).unwrap();

    let engine_one = engine.clone();
    let first = tokio::spawn(async move { engine_one.send(conversation(), "still deciding").await });
    {
        let gateway = gateway.clone();
        wait_until(move || gateway.suggestion_calls() == 1).await;
    }

    // Sending is allowed while only suggestions are pending; the new cycle
    // takes over the session.
    let engine_two = engine.clone();
    let second =
        tokio::spawn(async move { engine_two.send(conversation(), "actually, one more thing").await });
    {
        let gateway = gateway.clone();
        wait_until(move || gateway.suggestion_calls() == 2).await;
    }

    gate.notify_one();
    wait_until(|| first.is_finished() || second.is_finished()).await;
    gate.notify_one();

    let first_outcome = first.await.unwrap().unwrap();
    let second_outcome = second.await.unwrap().unwrap();

    // The superseded cycle must not publish; only the newer cycle's set
    // survives on the board.
    match first_outcome {
        SendOutcome::Replied { suggestions, .. } => assert!(suggestions.is_empty()),
        other => panic!("unexpected outcome: {other:?}"),
    }
    match second_outcome {
        SendOutcome::Replied { suggestions, .. } => {
            assert_eq!(suggestions, vec!["confirm the new schedule"]);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(
        engine.suggestions(conversation()),
        vec!["confirm the new schedule"]
    );

    let messages = engine.messages(conversation());
    assert_eq!(messages.len(), 7, "both user messages and both replies land");
    assert_eq!(engine.pending_flags(conversation()), PendingFlags::default());
}

#[tokio::test]
async fn error_notice_lands_before_a_follow_up_send() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.push_reply_failure("backend hiccup");
    gateway.push_reply("recovered");
    gateway.push_suggestions(vec![]);
    let engine = engine_with(gateway, EngineConfig::default());
    engine.select_conversation(conversation()).unwrap();

    let failed = engine.send(conversation(), "first attempt").await.unwrap();
    assert!(matches!(failed, SendOutcome::ReplyFailed { .. }));
    engine.send(conversation(), "second attempt").await.unwrap();

    let messages = engine.messages(conversation());
    assert_eq!(messages.len(), 7);
    assert_eq!(messages[3].body.as_text(), Some("first attempt"));
    assert_eq!(messages[4].body.as_text(), Some(DEFAULT_REPLY_ERROR_TEXT));
    assert_eq!(messages[5].body.as_text(), Some("second attempt"));
    assert_eq!(messages[6].body.as_text(), Some("recovered"));
}

#[tokio::test]
async fn suggestion_failure_degrades_to_an_empty_set() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.push_reply("reply works");
    gateway.push_suggestions_failure("malformed payload");
    let engine = engine_with(gateway, EngineConfig::default());
    engine.select_conversation(conversation()).unwrap();

    let outcome = engine.send(conversation(), "how are we doing?").await.unwrap();

    match outcome {
        SendOutcome::Replied { suggestions, .. } => assert!(suggestions.is_empty()),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(engine.suggestions(conversation()).is_empty());
    assert_eq!(engine.messages(conversation()).len(), 5);
}

#[tokio::test]
async fn switching_conversations_clears_suggestions_but_not_messages() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.push_reply("sure");
    gateway.push_suggestions(vec!["chip one", "chip two"]);
    let engine = engine_with(gateway, EngineConfig::default());
    engine.select_conversation(conversation()).unwrap();
    engine.send(conversation(), "quick question").await.unwrap();
    assert_eq!(engine.suggestions(conversation()).len(), 2);

    let message_count_before = engine.messages(conversation()).len();
    engine.select_conversation(ConversationId::new(2)).unwrap();

    assert!(engine.suggestions(conversation()).is_empty());
    assert!(engine.suggestions(ConversationId::new(2)).is_empty());
    assert_eq!(engine.messages(conversation()).len(), message_count_before);
    assert_eq!(engine.active_conversation(), Some(ConversationId::new(2)));
}

#[tokio::test]
async fn event_stream_reports_the_full_reply_cycle() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.push_reply("done");
    gateway.push_suggestions(vec!["thanks"]);
    let engine = engine_with(gateway, EngineConfig::default());
    engine.select_conversation(conversation()).unwrap();
    let mut events = engine.subscribe();

    engine.send(conversation(), "ping").await.unwrap();

    let mut appended = 0;
    let mut read_receipts = 0;
    let mut suggestions_updated = 0;
    let mut suggestions_cleared = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            EngineEvent::MessageAppended { .. } => appended += 1,
            EngineEvent::ReadReceiptsApplied { .. } => read_receipts += 1,
            EngineEvent::SuggestionsUpdated { suggestions, .. } => {
                suggestions_updated += 1;
                assert_eq!(suggestions, vec!["thanks"]);
            }
            EngineEvent::SuggestionsCleared { .. } => suggestions_cleared += 1,
            EngineEvent::ConversationSelected { .. } => {}
        }
    }
    assert_eq!(appended, 2, "user message and contact reply");
    assert_eq!(read_receipts, 1);
    assert_eq!(suggestions_updated, 1);
    assert!(suggestions_cleared >= 1, "cleared at send time");
}

#[tokio::test]
async fn pipelines_for_different_conversations_run_independently() {
    let gateway = Arc::new(ScriptedGateway::new());
    let gate = Arc::new(Notify::new());
    gateway.gate_replies(gate.clone());
    gateway.push_reply("for conversation one");
    gateway.push_reply("for conversation two");
    gateway.push_suggestions(vec![]);
    gateway.push_suggestions(vec![]);
    let engine = engine_with(gateway.clone(), EngineConfig::default());

    let engine_one = engine.clone();
    let first = tokio::spawn(async move { engine_one.send(conversation(), "one").await });
    let engine_two = engine.clone();
    let second =
        tokio::spawn(async move { engine_two.send(ConversationId::new(2), "two").await });

    {
        let gateway = gateway.clone();
        wait_until(move || gateway.reply_calls() == 2).await;
    }
    // Both conversations are awaiting replies at once.
    assert!(engine.pending_flags(conversation()).is_replying);
    assert!(engine.pending_flags(ConversationId::new(2)).is_replying);

    gate.notify_one();
    gate.notify_one();
    assert!(first.await.unwrap().is_ok());
    assert!(second.await.unwrap().is_ok());
}
