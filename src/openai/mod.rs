//! OpenAI Chat Completions wire types
//!
//! `request` holds what callers send, `response` what the gateway sends back. Both follow the
//! public OpenAI schema so unmodified OpenAI client libraries work against the gateway.

pub mod request;
pub mod response;

pub use request::{
    ChatMessage, ChatRequest, Content, ContentPart, FunctionCall, FunctionDefinition, ImageUrl,
    Role, StopSequence, StreamOptions, ToolCall, ToolDefinition,
};
pub use response::{
    ChatCompletion, Choice, ChoiceMessage, ChunkChoice, CompletionChunk, Delta, FinishReason,
    FunctionCallDelta, ToolCallDelta, Usage,
};
