//! OpenAI-compatible chat completions client.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{LlmClient, Message, ModelResponse, ToolCall, ToolSchema};
use crate::error::ProviderError;

const PROVIDER: &str = "llm";

/// Key used when the model sends arguments that are not a JSON object.
pub(crate) const POSITIONAL_ARG_KEY: &str = "__arg1";

/// Chat client for any endpoint implementing `POST /chat/completions`.
pub struct OpenAiClient {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::network(PROVIDER, e))?;
        Ok(Self {
            http,
            api_key,
            base_url,
            model,
        })
    }

    fn build_request_body(
        &self,
        system_prompt: &str,
        messages: &[Message],
        tools: &[ToolSchema],
    ) -> Value {
        let mut wire = Vec::with_capacity(messages.len() + 1);
        wire.push(json!({ "role": "system", "content": system_prompt }));
        wire.extend(messages.iter().map(message_to_openai));

        let mut body = json!({
            "model": self.model,
            "messages": wire,
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools.iter().map(tool_to_openai).collect());
        }
        body
    }
}

fn message_to_openai(message: &Message) -> Value {
    match message {
        Message::User { content } => json!({ "role": "user", "content": content }),
        Message::Assistant {
            content,
            tool_calls,
        } if !tool_calls.is_empty() => {
            let calls: Vec<Value> = tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": {
                            "name": call.name,
                            "arguments": serde_json::to_string(&call.arguments)
                                .unwrap_or_else(|_| "{}".to_string()),
                        }
                    })
                })
                .collect();
            let content = if content.is_empty() {
                Value::Null
            } else {
                Value::String(content.clone())
            };
            json!({ "role": "assistant", "content": content, "tool_calls": calls })
        }
        Message::Assistant { content, .. } => json!({ "role": "assistant", "content": content }),
        Message::ToolResult {
            tool_call_id,
            content,
        } => json!({ "role": "tool", "tool_call_id": tool_call_id, "content": content }),
    }
}

fn tool_to_openai(tool: &ToolSchema) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters
        }
    })
}

/// Decode the model's JSON-encoded arguments into a flat string map.
///
/// Non-string values keep their JSON text. Anything that is not a JSON object
/// is stored whole under the positional key.
pub(crate) fn parse_arguments(raw: &str) -> BTreeMap<String, String> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map
            .into_iter()
            .map(|(key, value)| match value {
                Value::String(s) => (key, s),
                other => (key, other.to_string()),
            })
            .collect(),
        Ok(Value::String(s)) => BTreeMap::from([(POSITIONAL_ARG_KEY.to_string(), s)]),
        _ if raw.trim().is_empty() => BTreeMap::new(),
        _ => BTreeMap::from([(POSITIONAL_ARG_KEY.to_string(), raw.to_string())]),
    }
}

fn parse_response(response: ChatCompletion) -> Result<ModelResponse, ProviderError> {
    let message = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .ok_or_else(|| ProviderError::malformed(PROVIDER, "missing choices[0].message"))?;

    let tool_calls = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| ToolCall {
            id: tc.id,
            name: tc.function.name,
            arguments: parse_arguments(&tc.function.arguments),
        })
        .collect();

    Ok(ModelResponse {
        content: message.content,
        tool_calls,
    })
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[Message],
        tools: &[ToolSchema],
    ) -> Result<ModelResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = self.build_request_body(system_prompt, messages, tools);

        tracing::debug!(model = %self.model, messages = messages.len(), "POST {}", url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::network(PROVIDER, e))?;

        let status = response.status();
        let body_text = response
            .text()
            .await
            .map_err(|e| ProviderError::network(PROVIDER, e))?;

        if !status.is_success() {
            return Err(ProviderError::Http {
                provider: PROVIDER,
                status: status.as_u16(),
                body: body_text,
            });
        }

        let completion: ChatCompletion = serde_json::from_str(&body_text)
            .map_err(|e| ProviderError::malformed(PROVIDER, e.to_string()))?;

        parse_response(completion)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    id: String,
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}
