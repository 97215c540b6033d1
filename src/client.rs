/// MCP client for one stdio server.
///
/// Owns the session to a subprocess started from an [`MCPServerConfig`].
/// The session lives behind a mutex so the client can be shared through `Arc`.

use crate::config::MCPServerConfig;
use crate::connectors::StdioConnector;
use crate::error::{Error, Result};
use crate::protocol::*;
use crate::session::Session;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct McpClient {
    config: MCPServerConfig,
    session: Arc<Mutex<Option<Session>>>,
}

impl McpClient {
    pub fn new(config: MCPServerConfig) -> Self {
        Self {
            config,
            session: Arc::new(Mutex::new(None)),
        }
    }

    pub fn config(&self) -> &MCPServerConfig {
        &self.config
    }

    /// Spawn the server and run the handshake. Returns the server's self-description.
    pub async fn initialize(&self) -> Result<InitializeResult> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            if let Some(info) = session.server_info() {
                return Ok(info.clone());
            }
        }

        let mut connector = StdioConnector::new(&self.config.command, self.config.args.clone())
            .with_timeout(self.config.timeout_secs);
        connector.set_env(self.config.env.clone());

        let mut session = Session::new(self.config.name.clone(), Box::new(connector))
            .with_tool_cache(self.config.cache_tools_list);
        session.connect().await?;
        let info = match session.initialize().await {
            Ok(info) => info.clone(),
            Err(e) => {
                // Reap the half-started process before reporting.
                if let Err(close_err) = session.disconnect().await {
                    tracing::warn!("Failed to stop '{}' after handshake error: {}", self.config.name, close_err);
                }
                return Err(e);
            }
        };
        *guard = Some(session);
        Ok(info)
    }

    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or_else(|| self.not_connected())?;
        session.list_tools().await
    }

    pub async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<ToolResult> {
        let guard = self.session.lock().await;
        let session = guard.as_ref().ok_or_else(|| self.not_connected())?;
        session.call_tool(tool_name, arguments).await
    }

    /// Close the session and stop the subprocess. Closing twice is a no-op.
    pub async fn close(&self) -> Result<()> {
        if let Some(mut session) = self.session.lock().await.take() {
            session.disconnect().await?;
            tracing::info!("Closed session for server '{}'", self.config.name);
        }
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .is_some_and(|s| s.is_connected())
    }

    fn not_connected(&self) -> Error {
        Error::ConnectionError(format!("server '{}' is not connected", self.config.name))
    }
}
