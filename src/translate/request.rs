//! Request translation
//!
//! `translate` validates a caller request against the resolved model and builds the upstream
//! call. Nothing is silently dropped or clamped: a request the model cannot serve as written
//! fails with `InvalidRequest` or `CapabilityUnsupported`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::{GatewayError, GatewayResult};
use crate::openai::{ChatMessage, ChatRequest, Role, StreamOptions, ToolDefinition};
use crate::registry::ModelDescriptor;
use crate::upstream::types::{
    Initiator, RoutingMetadata, UpstreamChatBody, UpstreamFunctionCall, UpstreamMessage,
    UpstreamRequest, UpstreamToolCall,
};

/// Tool names accepted by OpenAI-compatible APIs
static TOOL_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]{1,64}$").expect("tool name pattern is valid"));

/// Validate a tool name: 1 to 64 characters of `a-zA-Z0-9_-`
pub fn validate_tool_name(name: &str) -> bool {
    TOOL_NAME_PATTERN.is_match(name)
}

/// Validate a JSON Schema for tool parameters
///
/// The schema must be an object schema (`type: "object"`) and must compile as JSON Schema.
pub fn validate_tool_schema(schema: &Value) -> Result<(), String> {
    match schema.get("type") {
        Some(Value::String(t)) if t == "object" => {}
        Some(Value::String(t)) => {
            return Err(format!(
                "Tool parameters schema must have type 'object', got '{}'",
                t
            ));
        }
        Some(_) => return Err("Tool parameters schema 'type' must be a string".to_string()),
        None => return Err("Tool parameters schema must have 'type' field".to_string()),
    }

    jsonschema::draft202012::new(schema).map_err(|e| format!("Invalid JSON Schema: {}", e))?;

    Ok(())
}

/// Translate a caller request into an upstream call for `model`
pub fn translate(request: &ChatRequest, model: &ModelDescriptor) -> GatewayResult<UpstreamRequest> {
    validate_messages(&request.messages)?;
    validate_sampling(request)?;
    let max_tokens = effective_max_tokens(request, model)?;
    let tools = validate_tools(request, model)?;

    let vision = request.messages.iter().any(ChatMessage::has_image);
    if vision && !model.supports_vision {
        return Err(GatewayError::CapabilityUnsupported(format!(
            "Model '{}' does not accept image input",
            model.public_id
        )));
    }

    let initiator = match request.messages.last().map(|m| m.role) {
        Some(Role::Assistant) | Some(Role::Tool) => Initiator::Agent,
        _ => Initiator::User,
    };

    let body = UpstreamChatBody {
        model: model.upstream_id.clone(),
        messages: request.messages.iter().map(upstream_message).collect(),
        stream: request.stream,
        // Usage is always requested so it can be recorded; callers only see it if they asked
        stream_options: request.stream.then_some(StreamOptions {
            include_usage: true,
        }),
        temperature: request.temperature,
        top_p: request.top_p,
        max_tokens,
        stop: request.stop.clone(),
        presence_penalty: request.presence_penalty,
        frequency_penalty: request.frequency_penalty,
        logit_bias: request.logit_bias.clone(),
        user: request.user.clone(),
        seed: request.seed,
        response_format: request.response_format.clone(),
        tools,
        tool_choice: request.tool_choice.clone(),
        parallel_tool_calls: request.parallel_tool_calls,
    };

    Ok(UpstreamRequest {
        body,
        routing: RoutingMetadata { initiator, vision },
    })
}

fn upstream_message(message: &ChatMessage) -> UpstreamMessage {
    UpstreamMessage {
        role: message.role,
        content: message.content.clone(),
        name: message.name.clone(),
        tool_call_id: message.tool_call_id.clone(),
        tool_calls: message.tool_calls.as_ref().map(|calls| {
            calls
                .iter()
                .map(|call| UpstreamToolCall {
                    id: call.id.clone(),
                    call_type: call.call_type.clone(),
                    function: UpstreamFunctionCall {
                        name: call.function.name.clone(),
                        arguments: call.function.arguments.clone(),
                    },
                })
                .collect()
        }),
    }
}

fn invalid(message: impl Into<String>) -> GatewayError {
    GatewayError::InvalidRequest(message.into())
}

fn validate_messages(messages: &[ChatMessage]) -> GatewayResult<()> {
    if messages.is_empty() {
        return Err(invalid("'messages' must contain at least one message"));
    }

    for (i, message) in messages.iter().enumerate() {
        match message.role {
            Role::Tool if message.tool_call_id.as_deref().map_or(true, str::is_empty) => {
                return Err(invalid(format!(
                    "messages[{}]: tool messages must include 'tool_call_id'",
                    i
                )));
            }
            Role::System | Role::User | Role::Tool if message.content.is_none() => {
                return Err(invalid(format!("messages[{}]: 'content' is required", i)));
            }
            Role::Assistant if message.content.is_none() && !message.uses_tools() => {
                return Err(invalid(format!(
                    "messages[{}]: assistant messages need 'content' or 'tool_calls'",
                    i
                )));
            }
            _ => {}
        }
    }

    Ok(())
}

fn validate_sampling(request: &ChatRequest) -> GatewayResult<()> {
    if let Some(t) = request.temperature {
        if !(0.0..=2.0).contains(&t) {
            return Err(invalid(format!("'temperature' must be between 0 and 2, got {}", t)));
        }
    }
    if let Some(p) = request.top_p {
        if !(0.0..=1.0).contains(&p) {
            return Err(invalid(format!("'top_p' must be between 0 and 1, got {}", p)));
        }
    }
    if let Some(n) = request.n {
        if n != 1 {
            return Err(invalid(format!("'n' must be 1, got {}", n)));
        }
    }
    Ok(())
}

/// The output cap to send upstream. Values above the model's cap are rejected, never reduced.
fn effective_max_tokens(request: &ChatRequest, model: &ModelDescriptor) -> GatewayResult<Option<u32>> {
    let requested = match (request.max_tokens, request.max_completion_tokens) {
        (Some(a), Some(b)) if a != b => {
            return Err(invalid(format!(
                "'max_tokens' ({}) and 'max_completion_tokens' ({}) disagree",
                a, b
            )));
        }
        (Some(v), _) | (None, Some(v)) => Some(v),
        (None, None) => None,
    };

    if let Some(value) = requested {
        if value == 0 {
            return Err(invalid("'max_tokens' must be greater than 0"));
        }
        if value > model.max_output_tokens {
            return Err(invalid(format!(
                "'max_tokens' ({}) exceeds the maximum of {} for model '{}'",
                value, model.max_output_tokens, model.public_id
            )));
        }
    }

    Ok(requested)
}

fn validate_tools(
    request: &ChatRequest,
    model: &ModelDescriptor,
) -> GatewayResult<Option<Vec<ToolDefinition>>> {
    let tools = request.tools.as_ref().filter(|tools| !tools.is_empty());
    let uses_tool_history = request.messages.iter().any(ChatMessage::uses_tools);
    let tool_choice_set = request
        .tool_choice
        .as_ref()
        .is_some_and(|choice| choice != &Value::String("none".to_string()));

    if !model.supports_tools && (tools.is_some() || uses_tool_history || tool_choice_set) {
        return Err(GatewayError::CapabilityUnsupported(format!(
            "Model '{}' does not support tool calling",
            model.public_id
        )));
    }

    let Some(tools) = tools else {
        return Ok(None);
    };

    for (i, tool) in tools.iter().enumerate() {
        if tool.tool_type != "function" {
            return Err(invalid(format!(
                "tools[{}]: unsupported tool type '{}'",
                i, tool.tool_type
            )));
        }
        if !validate_tool_name(&tool.function.name) {
            return Err(invalid(format!(
                "tools[{}]: invalid function name '{}'",
                i, tool.function.name
            )));
        }
        if let Some(parameters) = &tool.function.parameters {
            validate_tool_schema(parameters)
                .map_err(|e| invalid(format!("tools[{}]: {}", i, e)))?;
        }
    }

    Ok(Some(tools.clone()))
}
