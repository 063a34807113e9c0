//! Tool-calling client for OpenAI-compatible `/chat/completions` endpoints
//! (OpenAI, Ollama, vLLM, llama.cpp server).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use repoqa_core::config::LlmSettings;
use repoqa_core::{Error, InferenceRequest, IntentInference, Result, Role};

pub struct OpenAiToolClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiToolClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        }
    }

    /// Build from settings, reading the key from the configured environment variable.
    pub fn from_settings(settings: &LlmSettings) -> Self {
        let api_key = std::env::var(&settings.api_key_env).ok().filter(|k| !k.is_empty());
        Self::new(settings.base_url.clone(), settings.model.clone(), api_key)
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: ToolCallFunction,
}

#[derive(Debug, Deserialize)]
struct ToolCallFunction {
    name: String,
    arguments: Value,
}

#[async_trait]
impl IntentInference for OpenAiToolClient {
    async fn call_tool(&self, request: &InferenceRequest) -> Result<Value> {
        let mut messages = vec![ChatMessage { role: "system", content: &request.system }];
        messages.extend(request.messages.iter().map(|t| ChatMessage {
            role: match t.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: &t.content,
        }));
        let body = json!({
            "model": self.model,
            "messages": messages,
            "tools": [{
                "type": "function",
                "function": {
                    "name": request.tool.name,
                    "description": request.tool.description,
                    "parameters": request.tool.parameters,
                },
            }],
            "tool_choice": { "type": "function", "function": { "name": request.tool.name } },
            "temperature": 0,
        });

        let url = format!("{}/chat/completions", self.base_url);
        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let response = req.send().await.map_err(|e| Error::Inference(format!("HTTP error: {e}")))?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!("server returned {status}: {text}")));
        }
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("JSON parse error: {e}")))?;

        let call = parsed
            .choices
            .into_iter()
            .flat_map(|c| c.message.tool_calls.unwrap_or_default())
            .find(|c| c.function.name == request.tool.name)
            .ok_or_else(|| Error::Inference("response contained no matching tool call".into()))?;
        debug!(tool = %call.function.name, "tool call received");

        // OpenAI encodes arguments as a JSON string; some local servers send an object.
        match call.function.arguments {
            Value::String(raw) => {
                serde_json::from_str(&raw).map_err(|e| Error::Inference(format!("tool arguments are not JSON: {e}")))
            }
            other => Ok(other),
        }
    }
}
