//! Upstream request and response shapes
//!
//! Requests are built by the translator and are strict. Responses are deliberately lenient:
//! every field is optional so that a missing field reaches the response translator, which
//! reports it as a protocol error instead of failing inside serde with an opaque message.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::openai::{Content, Role, StopSequence, StreamOptions, ToolCallDelta, ToolDefinition};

/// Who started the turn, reported in `X-Initiator`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initiator {
    User,
    Agent,
}

impl Initiator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Initiator::User => "user",
            Initiator::Agent => "agent",
        }
    }
}

/// Per-request routing hints the upstream expects as headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingMetadata {
    pub initiator: Initiator,
    /// Set when any message carries an image
    pub vision: bool,
}

/// A fully translated upstream call
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRequest {
    pub body: UpstreamChatBody,
    pub routing: RoutingMetadata,
}

impl UpstreamRequest {
    pub fn is_stream(&self) -> bool {
        self.body.stream
    }
}

/// Tool call sent back to the upstream as conversation history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpstreamToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: UpstreamFunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpstreamFunctionCall {
    pub name: String,
    pub arguments: String,
}

/// Message in the upstream's representation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpstreamMessage {
    pub role: Role,
    /// Always serialized; `null` for tool-call-only assistant turns
    pub content: Option<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<UpstreamToolCall>>,
}

/// JSON body of `POST /chat/completions`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpstreamChatBody {
    pub model: String,
    pub messages: Vec<UpstreamMessage>,
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<StopSequence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logit_bias: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,
}

// Response side

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct UpstreamUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct UpstreamResponseFunction {
    pub name: Option<String>,
    pub arguments: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct UpstreamResponseToolCall {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub call_type: Option<String>,
    pub function: Option<UpstreamResponseFunction>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct UpstreamResponseMessage {
    pub role: Option<String>,
    pub content: Option<String>,
    pub tool_calls: Option<Vec<UpstreamResponseToolCall>>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct UpstreamChoice {
    pub index: Option<u32>,
    pub message: Option<UpstreamResponseMessage>,
    pub finish_reason: Option<String>,
}

/// Non-streaming upstream response
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct UpstreamResponse {
    pub id: Option<String>,
    pub created: Option<i64>,
    pub model: Option<String>,
    pub choices: Option<Vec<UpstreamChoice>>,
    pub usage: Option<UpstreamUsage>,
    pub system_fingerprint: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct UpstreamDelta {
    pub role: Option<String>,
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct UpstreamStreamChoice {
    pub index: Option<u32>,
    pub delta: Option<UpstreamDelta>,
    pub finish_reason: Option<String>,
}

/// One `data:` payload of the upstream stream
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct UpstreamStreamChunk {
    pub id: Option<String>,
    pub created: Option<i64>,
    #[serde(default)]
    pub choices: Vec<UpstreamStreamChoice>,
    pub usage: Option<UpstreamUsage>,
    /// Present when the upstream fails after the stream has started
    pub error: Option<Value>,
}
