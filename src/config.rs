/// Configuration for the tool server and the agent runner
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Package that provides the Playwright MCP server
pub const PLAYWRIGHT_MCP_PACKAGE: &str = "@playwright/mcp@latest";

/// Configuration for a stdio MCP server subprocess
///
/// Example: `command: "npx"`, `args: ["-y", "@playwright/mcp@latest", "--headless"]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MCPServerConfig {
    /// Display name for this server
    pub name: String,

    /// Executable to spawn
    pub command: String,

    /// Arguments for the executable
    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment variables for the subprocess
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Reuse the first `tools/list` answer instead of asking on every run
    #[serde(default)]
    pub cache_tools_list: bool,

    /// Per-request timeout; `None` waits indefinitely
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl MCPServerConfig {
    /// Create a new stdio/subprocess server config
    pub fn stdio(name: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args,
            env: HashMap::new(),
            cache_tools_list: false,
            timeout_secs: None,
        }
    }

    /// Create a stdio config from a shell command string
    /// Example: "npx -y @playwright/mcp@latest"
    pub fn from_command(name: impl Into<String>, command_str: &str) -> Result<Self> {
        let mut parts = command_str.split_whitespace();
        let command = parts
            .next()
            .ok_or_else(|| Error::ConfigError("empty server command".to_string()))?;
        Ok(Self::stdio(name, command, parts.map(str::to_string).collect()))
    }

    /// The Playwright MCP server launched through `npx`
    pub fn playwright(headless: bool, output_dir: Option<&Path>) -> Self {
        Self::playwright_with_runner("npx", headless, output_dir)
    }

    /// The Playwright MCP server launched through a specific package runner
    pub fn playwright_with_runner(
        runner: impl Into<String>,
        headless: bool,
        output_dir: Option<&Path>,
    ) -> Self {
        let mut args = vec!["-y".to_string(), PLAYWRIGHT_MCP_PACKAGE.to_string()];
        if headless {
            args.push("--headless".to_string());
        }
        if let Some(dir) = output_dir {
            args.push("--output-dir".to_string());
            args.push(dir.display().to_string());
        }
        Self::stdio("Playwright Screenshot Server", runner, args)
    }

    pub fn with_env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn with_cached_tools(mut self) -> Self {
        self.cache_tools_list = true;
        self
    }

    /// Command line as it would be typed in a shell
    pub fn command_line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Settings for one agent run
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub model: String,
    pub max_turns: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            max_turns: 10,
        }
    }
}

impl RunConfig {
    /// Read `OPENAI_MODEL` and `AGENT_MAX_TURNS`, falling back to defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(model) = lookup("OPENAI_MODEL").filter(|m| !m.trim().is_empty()) {
            config.model = model;
        }
        if let Some(turns) = lookup("AGENT_MAX_TURNS") {
            config.max_turns = turns.trim().parse().map_err(|_| {
                Error::ConfigError(format!("AGENT_MAX_TURNS must be a positive integer, got '{}'", turns))
            })?;
        }
        if config.max_turns == 0 {
            return Err(Error::ConfigError("max_turns must be at least 1".to_string()));
        }
        Ok(config)
    }
}
