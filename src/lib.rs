//! MCP Playwright Agent - drive the Playwright MCP server from an LLM agent
//!
//! The pieces, in the order a run uses them:
//! - `server`: start the tool server subprocess and guarantee its teardown
//! - `agent`: the agent bundle (name, instructions, tool servers)
//! - `runner`: execute one request through the LLM / tool-call loop
//! - `frontend`: scripted single request or interactive read loop
//!
//! Underneath sit the MCP stdio transport (`connectors`, `session`, `client`),
//! the OpenAI adapter and the trace context.

/// Load environment variables from .env file
/// Call this in your main() function before creating adapters
pub fn load_env() {
    dotenv::dotenv().ok();
}

pub mod protocol;
pub mod error;
pub mod config;
pub mod logging;
pub mod trace;
pub mod connectors;
pub mod session;
pub mod client;
pub mod server;
pub mod agent;
pub mod runner;
pub mod frontend;
pub mod adapters;

pub use error::{Error, Result};

pub mod prelude {
    pub use crate::protocol::*;
    pub use crate::config::{MCPServerConfig, RunConfig};
    pub use crate::server::{with_server, McpServer, McpServerStdio};
    pub use crate::agent::*;
    pub use crate::runner::*;
    pub use crate::frontend::*;
    pub use crate::trace::{gen_trace_id, Trace};
    pub use crate::adapters::OpenAIAdapter;
    pub use crate::error::{Error, Result};
}
