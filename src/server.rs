/// Tool servers and their scoped lifecycle.
///
/// A tool server is an external process exposing callable tools over MCP.
/// [`with_server`] starts one, hands it to the caller's work and always tears it
/// down afterwards.
use crate::client::McpClient;
use crate::config::MCPServerConfig;
use crate::error::{Error, Result};
use crate::protocol::{Tool, ToolResult};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

/// Handle to a running (or startable) MCP tool server
#[async_trait]
pub trait McpServer: Send + Sync {
    fn name(&self) -> &str;

    /// Start the server and complete the MCP handshake
    async fn connect(&self) -> Result<()>;

    /// Stop the server. Safe to call when it never started.
    async fn cleanup(&self) -> Result<()>;

    async fn list_tools(&self) -> Result<Vec<Tool>>;

    async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<ToolResult>;
}

/// MCP server launched as a subprocess and spoken to over stdio
pub struct McpServerStdio {
    client: McpClient,
}

impl McpServerStdio {
    pub fn new(config: MCPServerConfig) -> Self {
        Self {
            client: McpClient::new(config),
        }
    }

    pub fn config(&self) -> &MCPServerConfig {
        self.client.config()
    }
}

impl fmt::Display for McpServerStdio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.config().name, self.config().command_line())
    }
}

#[async_trait]
impl McpServer for McpServerStdio {
    fn name(&self) -> &str {
        &self.config().name
    }

    async fn connect(&self) -> Result<()> {
        let info = self.client.initialize().await.map_err(|e| Error::ServerStartup {
            server: self.config().name.clone(),
            reason: e.to_string(),
        })?;
        info!(
            server = %self.config().name,
            protocol = %info.protocol_version,
            reported_as = ?info.server_info.map(|s| format!("{} {}", s.name, s.version)),
            "Tool server started"
        );
        Ok(())
    }

    async fn cleanup(&self) -> Result<()> {
        self.client.close().await.map_err(|e| Error::ServerShutdown {
            server: self.config().name.clone(),
            reason: e.to_string(),
        })
    }

    async fn list_tools(&self) -> Result<Vec<Tool>> {
        self.client.list_tools().await
    }

    async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<ToolResult> {
        self.client.call_tool(tool_name, arguments).await
    }
}

/// Run `work` against a started server, then tear the server down.
///
/// If the server fails to start, `work` never runs and the startup error is
/// returned. Cleanup is attempted exactly once on every path; a cleanup failure
/// is only logged and never replaces the outcome of `work`. A panic inside
/// `work` skips the explicit cleanup, but the subprocess is killed when its
/// handle is dropped.
pub async fn with_server<S, F, Fut, T, E>(server: Arc<S>, work: F) -> std::result::Result<T, E>
where
    S: McpServer + ?Sized,
    F: FnOnce(Arc<S>) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: From<Error>,
{
    if let Err(startup) = server.connect().await {
        release(server.as_ref()).await;
        return Err(startup.into());
    }

    let outcome = work(server.clone()).await;
    release(server.as_ref()).await;
    outcome
}

async fn release<S: McpServer + ?Sized>(server: &S) {
    if let Err(e) = server.cleanup().await {
        warn!(server = %server.name(), "Error cleaning up server: {}", e);
    }
}
