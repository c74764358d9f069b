pub mod context;
pub mod gateway;
pub mod openai;
pub mod scripted;

use std::sync::Arc;

pub use context::{ConversationContext, HistoryEntry, HistoryRole};
pub use gateway::{BoxFuture, CompletionGateway, GatewayError, GatewayResult};
pub use openai::{GatewayConfig, OpenAiGateway, DEFAULT_COMPLETION_MODEL, MAX_SUGGESTIONS};
pub use scripted::{ScriptedGateway, ScriptedReply, ScriptedSuggestions};

pub const OPENAI_GATEWAY_ID: &str = "openai";

pub fn create_gateway(config: GatewayConfig) -> GatewayResult<Arc<dyn CompletionGateway>> {
    Ok(Arc::new(OpenAiGateway::new(config)?))
}
