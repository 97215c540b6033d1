/// OpenAI LLM Adapter using the Responses API
///
/// Each call sends the agent instructions, the whole conversation and the
/// available MCP tools. The conversation is translated into Responses input
/// items:
/// 1. Text from the user or the assistant becomes a plain message
/// 2. A tool use becomes a `function_call` item
/// 3. A tool result becomes a `function_call_output` item
///
/// Function calls in the output come back as [`ContentBlock::ToolUse`]; executing
/// them is the runner's job, not the adapter's.
///
/// # Example
///
/// ```ignore
/// use mcp_playwright_agent::adapters::OpenAIAdapter;
/// use mcp_playwright_agent::runner::Runner;
///
/// let adapter = OpenAIAdapter::from_env("gpt-4o")?;
/// let runner = Runner::new(std::sync::Arc::new(adapter), RunConfig::default());
/// let result = runner.run(&agent, "Navigate to https://example.com").await?;
/// ```

use crate::agent::{LLMProvider, LLMResponse, StopReason};
use crate::protocol::{ContentBlock, Message, Role, Tool};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI Responses API tool definition
#[derive(Debug, Serialize, Clone)]
struct OpenAITool {
    #[serde(rename = "type")]
    type_field: String,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    parameters: Value,
}

/// OpenAI Responses API request
#[derive(Debug, Serialize)]
struct OpenAIResponsesRequest {
    model: String,
    instructions: String,
    input: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OpenAITool>,
}

/// OpenAI Responses API response
#[derive(Debug, Deserialize)]
struct OpenAIResponsesResponse {
    #[serde(default)]
    output: Vec<Value>,
    #[serde(default)]
    id: String,
    #[serde(default)]
    status: String,
}

/// OpenAI LLM Provider
pub struct OpenAIAdapter {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAIAdapter {
    /// Create a new OpenAI adapter
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Create from environment variables
    /// Expects: OPENAI_API_KEY; honours OPENAI_BASE_URL
    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::ConfigError("OPENAI_API_KEY not set".to_string()))?;

        let mut adapter = Self::new(api_key, model);
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            adapter = adapter.with_base_url(base_url);
        }
        Ok(adapter)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Convert MCP tools to Responses `function` tools
    fn convert_tools(tools: &[Tool]) -> Vec<OpenAITool> {
        tools
            .iter()
            .map(|tool| {
                let parameters = match &tool.input_schema {
                    Some(schema) => {
                        let mut parameters = json!({
                            "type": schema.schema_type,
                            "properties": schema.properties,
                        });
                        if let Some(required) = &schema.required {
                            parameters["required"] = json!(required);
                        }
                        parameters
                    }
                    None => json!({"type": "object", "properties": {}}),
                };

                OpenAITool {
                    type_field: "function".to_string(),
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters,
                }
            })
            .collect()
    }

    /// Flatten the conversation into Responses input items
    fn convert_messages(messages: &[Message]) -> Vec<Value> {
        let mut items = Vec::new();
        for message in messages {
            let role = match message.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            for block in &message.content {
                match block {
                    ContentBlock::Text { text } => {
                        items.push(json!({"role": role, "content": text}));
                    }
                    ContentBlock::ToolUse { id, name, input } => {
                        items.push(json!({
                            "type": "function_call",
                            "call_id": id,
                            "name": name,
                            "arguments": input.to_string(),
                        }));
                    }
                    ContentBlock::ToolResult { tool_use_id, content, .. } => {
                        items.push(json!({
                            "type": "function_call_output",
                            "call_id": tool_use_id,
                            "output": content,
                        }));
                    }
                }
            }
        }
        items
    }

    /// Extract function calls from response output
    fn extract_function_calls(output: &[Value]) -> Vec<ContentBlock> {
        output
            .iter()
            .filter(|item| item.get("type").and_then(Value::as_str) == Some("function_call"))
            .filter_map(|item| {
                let name = item.get("name")?.as_str()?;
                let call_id = item.get("call_id")?.as_str()?;
                let arguments = item.get("arguments").and_then(Value::as_str).unwrap_or("{}");
                let input = serde_json::from_str(arguments).unwrap_or_else(|e| {
                    tracing::warn!(tool = %name, "Unparseable tool arguments ({}), sending {{}}", e);
                    json!({})
                });
                Some(ContentBlock::ToolUse {
                    id: call_id.to_string(),
                    name: name.to_string(),
                    input,
                })
            })
            .collect()
    }

    /// Extract text from response output
    fn extract_text(output: &[Value]) -> String {
        let mut text_content = String::new();
        for item in output {
            if item.get("type").and_then(Value::as_str) != Some("message") {
                continue;
            }
            let Some(parts) = item.get("content").and_then(Value::as_array) else {
                continue;
            };
            for part in parts {
                if part.get("type").and_then(Value::as_str) == Some("output_text") {
                    if let Some(text) = part.get("text").and_then(Value::as_str) {
                        if !text_content.is_empty() {
                            text_content.push('\n');
                        }
                        text_content.push_str(text);
                    }
                }
            }
        }
        text_content
    }

    fn parse_response(response: OpenAIResponsesResponse) -> LLMResponse {
        let mut content = Vec::new();
        let text = Self::extract_text(&response.output);
        if !text.is_empty() {
            content.push(ContentBlock::Text { text });
        }
        let calls = Self::extract_function_calls(&response.output);
        let has_calls = !calls.is_empty();
        content.extend(calls);

        let stop_reason = if has_calls {
            StopReason::ToolUse
        } else if response.status == "incomplete" {
            StopReason::MaxTokens
        } else {
            StopReason::EndTurn
        };
        LLMResponse { content, stop_reason }
    }
}

#[async_trait::async_trait]
impl LLMProvider for OpenAIAdapter {
    async fn call(
        &self,
        instructions: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<LLMResponse> {
        let request = OpenAIResponsesRequest {
            model: self.model.clone(),
            instructions: instructions.to_string(),
            input: Self::convert_messages(messages),
            tools: Self::convert_tools(tools),
        };

        let response = self
            .client
            .post(format!("{}/responses", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::ConnectionError(format!("OpenAI API error: {}", e)))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| Error::ConnectionError(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Error::LLMError(format!(
                "OpenAI API returned {}: {}",
                status, response_text
            )));
        }

        let parsed: OpenAIResponsesResponse = serde_json::from_str(&response_text).map_err(|e| {
            Error::LLMError(format!(
                "Failed to parse OpenAI response: {} (body: {})",
                e, response_text
            ))
        })?;
        tracing::debug!(response_id = %parsed.id, status = %parsed.status, items = parsed.output.len(), "OpenAI response");

        Ok(Self::parse_response(parsed))
    }
}
