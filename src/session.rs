/// Session to an MCP server. Wraps a connector and caches the tool list.

use crate::connectors::base::Connector;
use crate::error::{Error, Result};
use crate::protocol::{InitializeResult, JsonRpcNotification, Tool, ToolResult};
use serde_json::Value;

pub struct Session {
    /// Unique name for this session (usually the server name)
    pub name: String,

    /// The underlying connector
    connector: Box<dyn Connector>,

    /// What the server reported during `initialize`
    server_info: Option<InitializeResult>,

    /// Whether `tools/list` answers may be reused
    cache_tools: bool,

    /// Cached tools, in the order the server listed them
    tools_cache: Option<Vec<Tool>>,
}

impl Session {
    /// Create a new session with a connector
    pub fn new(name: impl Into<String>, connector: Box<dyn Connector>) -> Self {
        Self {
            name: name.into(),
            connector,
            server_info: None,
            cache_tools: false,
            tools_cache: None,
        }
    }

    pub fn with_tool_cache(mut self, enabled: bool) -> Self {
        self.cache_tools = enabled;
        self
    }

    /// Start the underlying transport
    pub async fn connect(&mut self) -> Result<()> {
        self.connector.connect().await
    }

    /// Run the MCP handshake: `initialize`, then `notifications/initialized`
    pub async fn initialize(&mut self) -> Result<&InitializeResult> {
        let result = self.connector.initialize().await?;
        self.connector
            .send_notification(JsonRpcNotification::new("notifications/initialized", None))
            .await?;
        tracing::debug!(
            session = %self.name,
            protocol = %result.protocol_version,
            server = ?result.server_info.as_ref().map(|s| &s.name),
            "MCP session initialized"
        );
        Ok(&*self.server_info.insert(result))
    }

    /// Check if the session is connected
    pub fn is_connected(&self) -> bool {
        self.connector.is_connected()
    }

    /// Check if the session has been initialized
    pub fn is_initialized(&self) -> bool {
        self.server_info.is_some()
    }

    pub fn server_info(&self) -> Option<&InitializeResult> {
        self.server_info.as_ref()
    }

    /// Disconnect from the server
    pub async fn disconnect(&mut self) -> Result<()> {
        self.server_info = None;
        self.tools_cache = None;
        self.connector.disconnect().await
    }

    /// Tools offered by the server, served from cache when caching is enabled
    pub async fn list_tools(&mut self) -> Result<Vec<Tool>> {
        if !self.is_initialized() {
            return Err(Error::ConnectionError(format!(
                "session '{}' is not initialized",
                self.name
            )));
        }
        if self.cache_tools {
            if let Some(tools) = &self.tools_cache {
                return Ok(tools.clone());
            }
        }
        let tools = self.connector.list_tools().await?;
        if self.cache_tools {
            self.tools_cache = Some(tools.clone());
        }
        Ok(tools)
    }

    /// Drop cached tools so the next `list_tools` asks the server again
    pub fn invalidate_tools_cache(&mut self) {
        self.tools_cache = None;
    }

    /// Call a tool on the server
    pub async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<ToolResult> {
        if !self.is_initialized() {
            return Err(Error::ConnectionError(format!(
                "session '{}' is not initialized",
                self.name
            )));
        }
        self.connector.call_tool(tool_name, arguments).await
    }
}
