use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// MCP protocol version announced during `initialize`
pub const MCP_VERSION: &str = "2024-11-05";

/// Unique identifier for requests
pub type RequestId = String;

/// JSON-RPC Request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Uuid::new_v4().to_string(),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC Notification (no id, no response expected)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: RequestId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC Error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Any line read from a server's stdout.
///
/// Servers may interleave responses, notifications and their own requests,
/// so the shape is decided by which of `id` / `method` are present.
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// Classification of an [`IncomingMessage`]
#[derive(Debug, Clone, PartialEq)]
pub enum MessageKind {
    Response(RequestId),
    Notification(String),
    Request(Value, String),
    Invalid,
}

impl IncomingMessage {
    pub fn kind(&self) -> MessageKind {
        match (&self.id, &self.method) {
            (Some(id), Some(method)) => MessageKind::Request(id.clone(), method.clone()),
            (None, Some(method)) => MessageKind::Notification(method.clone()),
            (Some(id), None) => match id {
                Value::String(s) => MessageKind::Response(s.clone()),
                Value::Number(n) => MessageKind::Response(n.to_string()),
                _ => MessageKind::Invalid,
            },
            (None, None) => MessageKind::Invalid,
        }
    }

    /// Convert into a response, assuming `kind()` returned `Response`
    pub fn into_response(self, id: RequestId) -> JsonRpcResponse {
        JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id,
            result: self.result,
            error: self.error,
        }
    }
}

/// Tool definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "inputSchema")]
    pub input_schema: Option<ToolInputSchema>,
}

/// Tool input schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInputSchema {
    #[serde(rename = "type", default = "default_schema_type")]
    pub schema_type: String,
    #[serde(default)]
    pub properties: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

fn default_schema_type() -> String {
    "object".to_string()
}

/// Result of `tools/call`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolResult {
    #[serde(default)]
    pub content: Vec<ResultContent>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "isError")]
    pub is_error: Option<bool>,
}

impl ToolResult {
    /// Concatenate the text parts; other content kinds are summarized.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(|c| match c {
                ResultContent::Text { text } => text.clone(),
                ResultContent::Image { mime_type, .. } => format!("[image: {}]", mime_type),
                ResultContent::Other => "[unsupported content]".to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn failed(&self) -> bool {
        self.is_error == Some(true)
    }
}

/// Result content
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResultContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image")]
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    #[serde(other)]
    Other,
}

/// Name and version a server reports about itself
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Implementation {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// Result of the `initialize` handshake
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    #[serde(default, rename = "serverInfo")]
    pub server_info: Option<Implementation>,
    #[serde(default)]
    pub capabilities: Value,
}

/// Message role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
}

/// Content block
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none", rename = "isError")]
        is_error: Option<bool>,
    },
}

/// Message with role and content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text {
                text: text.into(),
            }],
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::Text {
                text: text.into(),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_jsonrpc_request_creation() {
        let req = JsonRpcRequest::new("tools/list", None);
        assert_eq!(req.method, "tools/list");
        assert_eq!(req.jsonrpc, "2.0");
    }

    #[test]
    fn test_message_creation() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
    }

    #[test]
    fn test_incoming_message_kinds() {
        let resp: IncomingMessage =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": "abc", "result": {}})).unwrap();
        assert_eq!(resp.kind(), MessageKind::Response("abc".to_string()));

        let notif: IncomingMessage = serde_json::from_value(
            json!({"jsonrpc": "2.0", "method": "notifications/message", "params": {}}),
        )
        .unwrap();
        assert_eq!(
            notif.kind(),
            MessageKind::Notification("notifications/message".to_string())
        );

        let req: IncomingMessage =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 7, "method": "ping"})).unwrap();
        assert_eq!(req.kind(), MessageKind::Request(json!(7), "ping".to_string()));
    }

    #[test]
    fn test_tool_result_without_id_parses() {
        let result: ToolResult = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": "Navigated to https://example.com"},
                {"type": "image", "data": "iVBOR", "mimeType": "image/png"},
                {"type": "resource", "resource": {"uri": "file:///tmp/x"}}
            ]
        }))
        .unwrap();
        assert!(!result.failed());
        assert_eq!(
            result.text(),
            "Navigated to https://example.com\n[image: image/png]\n[unsupported content]"
        );
    }

    #[test]
    fn test_tool_schema_defaults() {
        let tool: Tool = serde_json::from_value(json!({
            "name": "browser_close",
            "inputSchema": {"type": "object"}
        }))
        .unwrap();
        let schema = tool.input_schema.unwrap();
        assert!(schema.properties.is_empty());
        assert!(tool.description.is_none());
    }
}
