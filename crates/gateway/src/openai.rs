use serde::{Deserialize, Serialize};
use snafu::{ResultExt, ensure};

use super::context::{ConversationContext, HistoryEntry, HistoryRole};
use super::gateway::{
    BoxFuture, CompletionGateway, CompletionStatusSnafu, EmptyCompletionSnafu, GatewayResult,
    HttpSnafu, MissingApiKeySnafu, SuggestionPayloadParseSnafu,
};

pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-4o-mini";

/// Upper bound on quick-reply suggestions returned to callers.
pub const MAX_SUGGESTIONS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl GatewayConfig {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into().trim().to_string(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: DEFAULT_COMPLETION_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// Adapter for any OpenAI-compatible chat-completions endpoint.
pub struct OpenAiGateway {
    config: GatewayConfig,
    http: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl OpenAiGateway {
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        ensure!(
            !config.api_key.is_empty(),
            MissingApiKeySnafu {
                stage: "openai-gateway-new",
            }
        );

        Ok(Self {
            config,
            http: reqwest::Client::new(),
        })
    }

    async fn complete(
        &self,
        stage: &'static str,
        preamble: String,
        history: &[HistoryEntry],
    ) -> GatewayResult<String> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(WireMessage {
            role: "system",
            content: preamble,
        });
        for entry in history {
            messages.push(WireMessage {
                role: match entry.role {
                    HistoryRole::User => "user",
                    HistoryRole::Model => "assistant",
                },
                content: entry.text.clone(),
            });
        }

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages,
            temperature: 0.7,
        };

        let endpoint = format!("{}/chat/completions", self.config.base_url);
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .context(HttpSnafu { stage })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return CompletionStatusSnafu {
                stage,
                status: status.as_u16(),
                body,
            }
            .fail();
        }

        let payload: ChatResponse = response.json().await.context(HttpSnafu { stage })?;
        let text = payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty());

        match text {
            Some(text) => Ok(text),
            None => EmptyCompletionSnafu { stage }.fail(),
        }
    }

    fn reply_preamble(context: &ConversationContext) -> String {
        let mut preamble = format!(
            "You are {name}, a {role} on a business-to-business trade platform, \
             chatting with a counterpart about ongoing trade activity.",
            name = context.remote_party_name,
            role = context.remote_party_role_label,
        );
        if let Some(trade_reference) = &context.trade_reference {
            preamble.push_str(&format!(
                " The conversation concerns trade {trade_reference}."
            ));
        }
        preamble.push_str(
            " Reply in character with one short, professional chat message. \
             Plain text only.",
        );
        preamble
    }

    fn suggestion_preamble(context: &ConversationContext, requester_role: &str) -> String {
        format!(
            "You write quick-reply chips for a trade-platform chat. The local user \
             is a {requester_role} talking to {name} ({role}). Based on the \
             conversation, propose at most {limit} short replies the local user \
             could send next. Respond with a JSON array of strings and nothing \
             else, for example [\"Thanks!\", \"Please confirm.\"].",
            requester_role = requester_role,
            name = context.remote_party_name,
            role = context.remote_party_role_label,
            limit = MAX_SUGGESTIONS,
        )
    }
}

impl CompletionGateway for OpenAiGateway {
    fn generate_reply<'a>(
        &'a self,
        context: &'a ConversationContext,
        history: &'a [HistoryEntry],
    ) -> BoxFuture<'a, GatewayResult<String>> {
        Box::pin(async move {
            tracing::debug!(
                conversation_id = context.conversation_id,
                entries = history.len(),
                "requesting contact reply"
            );
            self.complete("generate-reply", Self::reply_preamble(context), history)
                .await
        })
    }

    fn generate_suggestions<'a>(
        &'a self,
        context: &'a ConversationContext,
        history: &'a [HistoryEntry],
        requester_role: &'a str,
    ) -> BoxFuture<'a, GatewayResult<Vec<String>>> {
        Box::pin(async move {
            tracing::debug!(
                conversation_id = context.conversation_id,
                entries = history.len(),
                "requesting reply suggestions"
            );
            let raw = self
                .complete(
                    "generate-suggestions",
                    Self::suggestion_preamble(context, requester_role),
                    history,
                )
                .await?;
            parse_suggestion_payload(&raw)
        })
    }
}

/// Parses a completion response that is supposed to be a JSON string array.
///
/// Models wrap JSON in markdown fences often enough that stripping them here
/// is cheaper than re-prompting. Anything else unparsable is an error the
/// caller degrades to an empty suggestion set.
pub fn parse_suggestion_payload(raw: &str) -> GatewayResult<Vec<String>> {
    let trimmed = strip_code_fences(raw);
    let entries: Vec<String> =
        serde_json::from_str(trimmed).map_err(|error| {
            SuggestionPayloadParseSnafu {
                stage: "parse-suggestion-payload",
                details: error.to_string(),
            }
            .build()
        })?;

    Ok(entries
        .into_iter()
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
        .take(MAX_SUGGESTIONS)
        .collect())
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
