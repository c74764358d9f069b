use snafu::Snafu;

use super::context::{ConversationContext, HistoryEntry};

pub use futures::future::BoxFuture;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum GatewayError {
    #[snafu(display("missing API key for completion gateway"))]
    MissingApiKey { stage: &'static str },
    #[snafu(display("http request failed on `{stage}`, {source}"))]
    Http {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("completion endpoint returned status {status}: {body}"))]
    CompletionStatus {
        stage: &'static str,
        status: u16,
        body: String,
    },
    #[snafu(display("completion response carried no usable text"))]
    EmptyCompletion { stage: &'static str },
    #[snafu(display("failed to parse suggestion payload: {details}"))]
    SuggestionPayloadParse {
        stage: &'static str,
        details: String,
    },
    #[snafu(display("scripted gateway failure: {details}"))]
    Scripted {
        stage: &'static str,
        details: String,
    },
}

/// Boundary to the external text-generation service.
///
/// Both operations are read-only with respect to the caller's message store;
/// implementations receive a rebuilt history snapshot and a context value and
/// have nothing else to touch.
pub trait CompletionGateway: Send + Sync {
    /// Generates the counterpart's next reply for the given history.
    fn generate_reply<'a>(
        &'a self,
        context: &'a ConversationContext,
        history: &'a [HistoryEntry],
    ) -> BoxFuture<'a, GatewayResult<String>>;

    /// Proposes up to three short quick-replies the requester could send next.
    fn generate_suggestions<'a>(
        &'a self,
        context: &'a ConversationContext,
        history: &'a [HistoryEntry],
        requester_role: &'a str,
    ) -> BoxFuture<'a, GatewayResult<Vec<String>>>;
}
