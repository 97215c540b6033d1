/// Base connector trait for MCP connections
use crate::protocol::{
    InitializeResult, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, Tool, ToolResult,
    MCP_VERSION,
};
use crate::error::{Error, Result};
use serde_json::Value;

/// Trait for MCP transports
///
/// Connectors handle the low-level communication with MCP servers.
///
/// The trait provides both low-level (send_request) and high-level methods (list_tools, call_tool).
/// Default implementations of high-level methods use send_request.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Send a raw JSON-RPC request and receive a response
    async fn send_request(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse>;

    /// Send a notification; no response is expected
    async fn send_notification(&self, notification: JsonRpcNotification) -> Result<()>;

    /// Establish a connection to the MCP server
    async fn connect(&mut self) -> Result<()>;

    /// Close the connection to the MCP server
    async fn disconnect(&mut self) -> Result<()>;

    /// Check if connector is currently connected
    fn is_connected(&self) -> bool;

    /// Send the initialize request and return what the server reports
    async fn initialize(&self) -> Result<InitializeResult> {
        let params = serde_json::json!({
            "protocolVersion": MCP_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION")
            }
        });
        let request = JsonRpcRequest::new("initialize", Some(params));
        let result = into_result(self.send_request(request).await?)?;
        serde_json::from_value(result)
            .map_err(|e| Error::InvalidResponse(format!("Invalid initialize result: {}", e)))
    }

    /// List all available tools from the server
    async fn list_tools(&self) -> Result<Vec<Tool>> {
        let request = JsonRpcRequest::new("tools/list", None);
        let result = into_result(self.send_request(request).await?)?;
        let tools = result
            .get("tools")
            .cloned()
            .ok_or_else(|| Error::InvalidResponse("tools/list result has no 'tools'".to_string()))?;
        serde_json::from_value(tools)
            .map_err(|e| Error::InvalidResponse(format!("Invalid tools response: {}", e)))
    }

    /// Call a tool on the server
    async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<ToolResult> {
        let params = serde_json::json!({
            "name": tool_name,
            "arguments": arguments,
        });
        let request = JsonRpcRequest::new("tools/call", Some(params));
        let result = into_result(self.send_request(request).await?)?;
        serde_json::from_value(result)
            .map_err(|e| Error::InvalidResponse(format!("Invalid tool result: {}", e)))
    }
}

/// Unwrap the `result` of a response, turning a JSON-RPC error into `Error::RpcError`
pub fn into_result(response: JsonRpcResponse) -> Result<Value> {
    if let Some(error) = response.error {
        Err(Error::RpcError {
            code: error.code,
            message: error.message,
        })
    } else if let Some(result) = response.result {
        Ok(result)
    } else {
        Err(Error::InvalidResponse("No result or error in response".to_string()))
    }
}
