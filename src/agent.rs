use crate::error::{Error, Result};
use crate::protocol::*;
use crate::server::McpServer;
use std::fmt;
use std::sync::Arc;

/// LLM interface trait
#[async_trait::async_trait]
pub trait LLMProvider: Send + Sync {
    /// Call the LLM with the agent's instructions, the conversation so far and the tools on offer
    async fn call(
        &self,
        instructions: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<LLMResponse>;
}

/// LLM response
#[derive(Debug, Clone)]
pub struct LLMResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: StopReason,
}

impl LLMResponse {
    /// Plain text answer with no tool calls
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
            stop_reason: StopReason::EndTurn,
        }
    }

    pub fn has_tool_use(&self) -> bool {
        self.content
            .iter()
            .any(|c| matches!(c, ContentBlock::ToolUse { .. }))
    }
}

/// Reason the LLM stopped generating
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
}

/// An agent: a name, its instructions and the tool servers it may use.
///
/// Pure configuration. Nothing runs until the agent is handed to a
/// [`Runner`](crate::runner::Runner).
#[derive(Clone)]
pub struct Agent {
    name: String,
    instructions: String,
    mcp_servers: Vec<Arc<dyn McpServer>>,
}

impl Agent {
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder {
            name: name.into(),
            instructions: String::new(),
            mcp_servers: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn mcp_servers(&self) -> &[Arc<dyn McpServer>] {
        &self.mcp_servers
    }

    /// Every tool offered by the attached servers, in server order
    pub async fn get_all_tools(&self) -> Result<Vec<Tool>> {
        let listings =
            futures::future::try_join_all(self.mcp_servers.iter().map(|s| s.list_tools())).await?;
        Ok(listings.into_iter().flatten().collect())
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field(
                "mcp_servers",
                &self.mcp_servers.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

pub struct AgentBuilder {
    name: String,
    instructions: String,
    mcp_servers: Vec<Arc<dyn McpServer>>,
}

impl AgentBuilder {
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn mcp_server(mut self, server: Arc<dyn McpServer>) -> Self {
        self.mcp_servers.push(server);
        self
    }

    /// Fails when the instructions are blank
    pub fn build(self) -> Result<Agent> {
        if self.instructions.trim().is_empty() {
            return Err(Error::InvalidAgent(format!(
                "agent '{}' has no instructions",
                self.name
            )));
        }
        Ok(Agent {
            name: self.name,
            instructions: self.instructions,
            mcp_servers: self.mcp_servers,
        })
    }
}
