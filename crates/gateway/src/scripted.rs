use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use super::context::{ConversationContext, HistoryEntry};
use super::gateway::{BoxFuture, CompletionGateway, GatewayError, GatewayResult};

/// One scripted outcome for a `generate_reply` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedReply {
    Reply(String),
    Fail(String),
}

/// One scripted outcome for a `generate_suggestions` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedSuggestions {
    Suggestions(Vec<String>),
    Fail(String),
}

/// Deterministic gateway for tests and offline QA runs.
///
/// Outcomes are consumed in push order. Optional gates let a test hold a call
/// open so in-flight behavior (busy rejection, stale discard) can be observed
/// at a controlled point instead of by racing the runtime.
#[derive(Default)]
pub struct ScriptedGateway {
    replies: Mutex<VecDeque<ScriptedReply>>,
    suggestions: Mutex<VecDeque<ScriptedSuggestions>>,
    reply_gate: Mutex<Option<Arc<Notify>>>,
    suggestion_gate: Mutex<Option<Arc<Notify>>>,
    reply_calls: AtomicUsize,
    suggestion_calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_reply(&self, text: impl Into<String>) {
        self.replies
            .lock()
            .expect("scripted reply queue poisoned")
            .push_back(ScriptedReply::Reply(text.into()));
    }

    pub fn push_reply_failure(&self, details: impl Into<String>) {
        self.replies
            .lock()
            .expect("scripted reply queue poisoned")
            .push_back(ScriptedReply::Fail(details.into()));
    }

    pub fn push_suggestions(&self, entries: Vec<&str>) {
        self.suggestions
            .lock()
            .expect("scripted suggestion queue poisoned")
            .push_back(ScriptedSuggestions::Suggestions(
                entries.into_iter().map(str::to_string).collect(),
            ));
    }

    pub fn push_suggestions_failure(&self, details: impl Into<String>) {
        self.suggestions
            .lock()
            .expect("scripted suggestion queue poisoned")
            .push_back(ScriptedSuggestions::Fail(details.into()));
    }

    /// Makes every subsequent reply call wait for one `notify_one` on `gate`.
    pub fn gate_replies(&self, gate: Arc<Notify>) {
        *self.reply_gate.lock().expect("reply gate poisoned") = Some(gate);
    }

    /// Makes every subsequent suggestion call wait for one `notify_one` on `gate`.
    pub fn gate_suggestions(&self, gate: Arc<Notify>) {
        *self.suggestion_gate.lock().expect("suggestion gate poisoned") = Some(gate);
    }

    pub fn reply_calls(&self) -> usize {
        self.reply_calls.load(Ordering::SeqCst)
    }

    pub fn suggestion_calls(&self) -> usize {
        self.suggestion_calls.load(Ordering::SeqCst)
    }

    fn next_reply(&self) -> GatewayResult<String> {
        let scripted = self
            .replies
            .lock()
            .expect("scripted reply queue poisoned")
            .pop_front();
        match scripted {
            Some(ScriptedReply::Reply(text)) => Ok(text),
            Some(ScriptedReply::Fail(details)) => Err(GatewayError::Scripted {
                stage: "scripted-generate-reply",
                details,
            }),
            None => Err(GatewayError::Scripted {
                stage: "scripted-generate-reply",
                details: "reply script exhausted".to_string(),
            }),
        }
    }

    fn next_suggestions(&self) -> GatewayResult<Vec<String>> {
        let scripted = self
            .suggestions
            .lock()
            .expect("scripted suggestion queue poisoned")
            .pop_front();
        match scripted {
            Some(ScriptedSuggestions::Suggestions(entries)) => Ok(entries),
            Some(ScriptedSuggestions::Fail(details)) => Err(GatewayError::Scripted {
                stage: "scripted-generate-suggestions",
                details,
            }),
            None => Err(GatewayError::Scripted {
                stage: "scripted-generate-suggestions",
                details: "suggestion script exhausted".to_string(),
            }),
        }
    }
}

impl CompletionGateway for ScriptedGateway {
    fn generate_reply<'a>(
        &'a self,
        _context: &'a ConversationContext,
        _history: &'a [HistoryEntry],
    ) -> BoxFuture<'a, GatewayResult<String>> {
        Box::pin(async move {
            self.reply_calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.reply_gate.lock().expect("reply gate poisoned").clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            self.next_reply()
        })
    }

    fn generate_suggestions<'a>(
        &'a self,
        _context: &'a ConversationContext,
        _history: &'a [HistoryEntry],
        _requester_role: &'a str,
    ) -> BoxFuture<'a, GatewayResult<Vec<String>>> {
        Box::pin(async move {
            self.suggestion_calls.fetch_add(1, Ordering::SeqCst);
            let gate = self
                .suggestion_gate
                .lock()
                .expect("suggestion gate poisoned")
                .clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            self.next_suggestions()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> ConversationContext {
        ConversationContext::new(1, "Marta Diaz", "Buyer")
    }

    #[tokio::test]
    async fn scripted_outcomes_are_consumed_in_order() {
        let gateway = ScriptedGateway::new();
        gateway.push_reply("first");
        gateway.push_reply_failure("second breaks");

        let context = context();
        let first = gateway.generate_reply(&context, &[]).await;
        let second = gateway.generate_reply(&context, &[]).await;

        assert_eq!(first.unwrap(), "first");
        assert!(matches!(second, Err(GatewayError::Scripted { .. })));
        assert_eq!(gateway.reply_calls(), 2);
    }

    #[tokio::test]
    async fn exhausted_script_fails_instead_of_hanging() {
        let gateway = ScriptedGateway::new();
        let context = context();
        let result = gateway.generate_suggestions(&context, &[], "buyer").await;
        assert!(matches!(result, Err(GatewayError::Scripted { .. })));
    }
}
