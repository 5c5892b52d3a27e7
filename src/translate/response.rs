//! Non-streaming response translation

use crate::error::{GatewayError, GatewayResult};
use crate::openai::response::COMPLETION_OBJECT;
use crate::openai::{ChatCompletion, Choice, ChoiceMessage, FinishReason, FunctionCall, ToolCall, Usage};
use crate::upstream::types::{UpstreamResponse, UpstreamResponseToolCall, UpstreamUsage};

fn protocol(message: impl Into<String>) -> GatewayError {
    GatewayError::UpstreamProtocolError(message.into())
}

/// Map an upstream finish reason, rejecting values outside the OpenAI set and its known aliases
pub(crate) fn map_finish_reason(reason: &str) -> GatewayResult<FinishReason> {
    FinishReason::from_upstream(reason)
        .ok_or_else(|| protocol(format!("unknown finish_reason '{}'", reason)))
}

/// Usage counters; `total_tokens` is derived when the upstream leaves it out
pub(crate) fn map_usage(usage: &UpstreamUsage) -> Option<Usage> {
    let prompt_tokens = usage.prompt_tokens?;
    let completion_tokens = usage.completion_tokens?;
    Some(Usage {
        prompt_tokens,
        completion_tokens,
        total_tokens: usage
            .total_tokens
            .unwrap_or(prompt_tokens + completion_tokens),
    })
}

/// One logical choice assembled from upstream choices that share an index
struct MergedChoice {
    index: u32,
    content: Option<String>,
    tool_calls: Vec<ToolCall>,
    finish_reason: Option<FinishReason>,
}

fn map_tool_call(call: UpstreamResponseToolCall, index: u32) -> GatewayResult<ToolCall> {
    let id = call
        .id
        .ok_or_else(|| protocol(format!("choice {}: tool call without 'id'", index)))?;
    let function = call
        .function
        .ok_or_else(|| protocol(format!("choice {}: tool call '{}' without 'function'", index, id)))?;
    let name = function
        .name
        .ok_or_else(|| protocol(format!("choice {}: tool call '{}' without a function name", index, id)))?;
    let arguments = function
        .arguments
        .ok_or_else(|| protocol(format!("choice {}: tool call '{}' without 'arguments'", index, id)))?;

    Ok(ToolCall {
        id,
        call_type: call.call_type.unwrap_or_else(|| "function".to_string()),
        function: FunctionCall { name, arguments },
    })
}

/// Translate a complete upstream response into an OpenAI chat completion.
///
/// `public_model` is the id the caller asked for. A missing required field fails with
/// `UpstreamProtocolError`; nothing is defaulted except `total_tokens`, which is derivable.
pub fn translate_complete(
    response: UpstreamResponse,
    public_model: &str,
) -> GatewayResult<ChatCompletion> {
    let id = response
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| protocol("response has no 'id'"))?;
    let created = response
        .created
        .ok_or_else(|| protocol("response has no 'created'"))?;
    let upstream_choices = response
        .choices
        .filter(|choices| !choices.is_empty())
        .ok_or_else(|| protocol("response has no 'choices'"))?;
    let usage = response
        .usage
        .as_ref()
        .ok_or_else(|| protocol("response has no 'usage'"))
        .and_then(|usage| {
            map_usage(usage).ok_or_else(|| {
                protocol("'usage' is missing 'prompt_tokens' or 'completion_tokens'")
            })
        })?;

    // Some models split one answer over several choices with the same index (text in one,
    // tool calls in the next). They are merged back in arrival order.
    let mut merged: Vec<MergedChoice> = Vec::new();
    for (position, choice) in upstream_choices.into_iter().enumerate() {
        let index = choice.index.unwrap_or(0);
        let message = choice
            .message
            .ok_or_else(|| protocol(format!("choices[{}] has no 'message'", position)))?;
        let finish_reason = choice
            .finish_reason
            .as_deref()
            .map(map_finish_reason)
            .transpose()?;

        let existing = merged.iter().position(|m| m.index == index);
        let slot = match existing {
            Some(existing) => &mut merged[existing],
            None => {
                merged.push(MergedChoice {
                    index,
                    content: None,
                    tool_calls: Vec::new(),
                    finish_reason: None,
                });
                let last = merged.len() - 1;
                &mut merged[last]
            }
        };

        if let Some(content) = message.content {
            slot.content.get_or_insert_with(String::new).push_str(&content);
        }
        for call in message.tool_calls.unwrap_or_default() {
            slot.tool_calls.push(map_tool_call(call, index)?);
        }
        if finish_reason.is_some() {
            slot.finish_reason = finish_reason;
        }
    }

    merged.sort_by_key(|m| m.index);

    let choices = merged
        .into_iter()
        .map(|m| {
            let finish_reason = m
                .finish_reason
                .ok_or_else(|| protocol(format!("choice {} has no 'finish_reason'", m.index)))?;
            Ok(Choice {
                index: m.index,
                message: ChoiceMessage {
                    role: "assistant".to_string(),
                    content: m.content,
                    tool_calls: (!m.tool_calls.is_empty()).then_some(m.tool_calls),
                },
                finish_reason,
            })
        })
        .collect::<GatewayResult<Vec<_>>>()?;

    Ok(ChatCompletion {
        id,
        object: COMPLETION_OBJECT.to_string(),
        created,
        model: public_model.to_string(),
        choices,
        usage,
        system_fingerprint: response.system_fingerprint,
    })
}
