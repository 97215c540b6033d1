/// Agent execution: the LLM / tool-call loop for one request.
use crate::agent::{Agent, LLMProvider, StopReason};
use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::frontend::RequestExecutor;
use crate::protocol::*;
use crate::server::McpServer;
use crate::trace::Trace;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

/// Something that happened during a run
#[derive(Debug, Clone, PartialEq)]
pub enum RunItem {
    MessageOutput(String),
    ToolCall {
        call_id: String,
        name: String,
        arguments: serde_json::Value,
    },
    ToolCallOutput {
        call_id: String,
        output: String,
        is_error: bool,
    },
}

/// Outcome of one request
#[derive(Debug, Clone)]
pub struct RunResult {
    pub input: String,
    pub final_output: String,
    pub new_items: Vec<RunItem>,
    pub last_agent: String,
    pub trace_id: Option<String>,
    pub turns: usize,
}

impl RunResult {
    pub fn tool_calls(&self) -> impl Iterator<Item = &str> {
        self.new_items.iter().filter_map(|item| match item {
            RunItem::ToolCall { name, .. } => Some(name.as_str()),
            _ => None,
        })
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "RunResult:")?;
        writeln!(f, "- Last agent: {}", self.last_agent)?;
        writeln!(f, "- Final output:")?;
        for line in self.final_output.lines() {
            writeln!(f, "    {}", line)?;
        }
        writeln!(f, "- {} new item(s), {} turn(s)", self.new_items.len(), self.turns)?;
        let tools: Vec<&str> = self.tool_calls().collect();
        if !tools.is_empty() {
            writeln!(f, "- Tools called: {}", tools.join(", "))?;
        }
        if let Some(trace_id) = &self.trace_id {
            writeln!(f, "- Trace: {}", trace_id)?;
        }
        Ok(())
    }
}

/// Runs agents against an LLM provider
pub struct Runner {
    llm: Arc<dyn LLMProvider>,
    config: RunConfig,
    trace: Option<Trace>,
}

impl Runner {
    pub fn new(llm: Arc<dyn LLMProvider>, config: RunConfig) -> Self {
        Self {
            llm,
            config,
            trace: None,
        }
    }

    /// Attach a trace; every run is recorded under it
    pub fn with_trace(mut self, trace: Trace) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn trace(&self) -> Option<&Trace> {
        self.trace.as_ref()
    }

    /// Run `agent` on one request until the model gives a final answer
    pub async fn run(&self, agent: &Agent, input: &str) -> Result<RunResult> {
        let span = match &self.trace {
            Some(trace) => trace.span(),
            None => tracing::Span::none(),
        };
        self.run_inner(agent, input).instrument(span).await
    }

    async fn run_inner(&self, agent: &Agent, input: &str) -> Result<RunResult> {
        let (tools, routes) = collect_tools(agent).await?;
        info!(agent = %agent.name(), tools = tools.len(), "Running agent");

        let mut conversation = vec![Message::user(input)];
        let mut new_items = Vec::new();

        for turn in 1..=self.config.max_turns {
            debug!(turn, "Calling LLM");
            let response = self
                .llm
                .call(agent.instructions(), &conversation, &tools)
                .await?;

            if response.stop_reason == StopReason::MaxTokens {
                warn!(turn, "LLM response was truncated");
            }

            let text = response
                .content
                .iter()
                .filter_map(|c| match c {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n");
            if !text.is_empty() {
                new_items.push(RunItem::MessageOutput(text.clone()));
            }

            if !response.has_tool_use() {
                return Ok(RunResult {
                    input: input.to_string(),
                    final_output: text,
                    new_items,
                    last_agent: agent.name().to_string(),
                    trace_id: self.trace.as_ref().map(|t| t.trace_id.clone()),
                    turns: turn,
                });
            }

            let mut results = Vec::new();
            for block in &response.content {
                if let ContentBlock::ToolUse { id, name, input: arguments } = block {
                    new_items.push(RunItem::ToolCall {
                        call_id: id.clone(),
                        name: name.clone(),
                        arguments: arguments.clone(),
                    });

                    let (output, is_error) = invoke_tool(&routes, name, arguments.clone()).await;
                    new_items.push(RunItem::ToolCallOutput {
                        call_id: id.clone(),
                        output: output.clone(),
                        is_error,
                    });
                    results.push(ContentBlock::ToolResult {
                        tool_use_id: id.clone(),
                        content: output,
                        is_error: is_error.then_some(true),
                    });
                }
            }

            conversation.push(Message {
                role: Role::Assistant,
                content: response.content,
            });
            conversation.push(Message {
                role: Role::User,
                content: results,
            });
        }

        Err(Error::MaxTurnsExceeded(self.config.max_turns))
    }
}

type ToolRoutes = HashMap<String, Arc<dyn McpServer>>;

/// List tools from every server and remember which server owns which tool
async fn collect_tools(agent: &Agent) -> Result<(Vec<Tool>, ToolRoutes)> {
    let mut tools = Vec::new();
    let mut routes: ToolRoutes = HashMap::new();
    for server in agent.mcp_servers() {
        for tool in server.list_tools().await? {
            if routes.insert(tool.name.clone(), server.clone()).is_some() {
                return Err(Error::DuplicateTool(tool.name));
            }
            tools.push(tool);
        }
    }
    Ok((tools, routes))
}

/// Call a tool. Failures become text for the model instead of aborting the run.
async fn invoke_tool(routes: &ToolRoutes, name: &str, arguments: serde_json::Value) -> (String, bool) {
    let Some(server) = routes.get(name) else {
        warn!(tool = %name, "Model requested an unknown tool");
        return (Error::ToolNotFound(name.to_string()).to_string(), true);
    };

    debug!(tool = %name, server = %server.name(), "Invoking tool");
    match server.call_tool(name, arguments).await {
        Ok(result) => (result.text(), result.failed()),
        Err(e) => {
            warn!(tool = %name, "Tool call failed: {}", e);
            (
                format!("An error occurred while running the tool. Please try again. Error: {}", e),
                true,
            )
        }
    }
}

/// An agent paired with the runner that executes it
pub struct Driver {
    runner: Runner,
    agent: Agent,
}

impl Driver {
    pub fn new(runner: Runner, agent: Agent) -> Self {
        Self { runner, agent }
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }
}

#[async_trait::async_trait]
impl RequestExecutor for Driver {
    async fn execute(&self, request: &str) -> Result<RunResult> {
        self.runner.run(&self.agent, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::LLMResponse;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Replays canned responses and records what it was sent
    struct ScriptedLLM {
        responses: Mutex<Vec<Result<LLMResponse>>>,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedLLM {
        fn new(mut responses: Vec<Result<LLMResponse>>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl LLMProvider for ScriptedLLM {
        async fn call(
            &self,
            instructions: &str,
            messages: &[Message],
            _tools: &[Tool],
        ) -> Result<LLMResponse> {
            assert!(!instructions.is_empty());
            self.seen.lock().unwrap().push(messages.to_vec());
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(LLMResponse::text("out of script")))
        }
    }

    struct BrowserServer {
        calls: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait::async_trait]
    impl McpServer for BrowserServer {
        fn name(&self) -> &str {
            "browser"
        }

        async fn connect(&self) -> Result<()> {
            Ok(())
        }

        async fn cleanup(&self) -> Result<()> {
            Ok(())
        }

        async fn list_tools(&self) -> Result<Vec<Tool>> {
            Ok(vec![Tool {
                name: "browser_navigate".to_string(),
                description: Some("Navigate to a URL".to_string()),
                input_schema: None,
            }])
        }

        async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<ToolResult> {
            self.calls
                .lock()
                .unwrap()
                .push((tool_name.to_string(), arguments.clone()));
            if arguments["url"] == "bad" {
                return Err(Error::RpcError {
                    code: -32603,
                    message: "navigation failed".to_string(),
                });
            }
            Ok(ToolResult {
                content: vec![ResultContent::Text {
                    text: format!("Navigated to {}", arguments["url"].as_str().unwrap_or("")),
                }],
                is_error: None,
            })
        }
    }

    fn tool_use(id: &str, name: &str, input: Value) -> LLMResponse {
        LLMResponse {
            content: vec![ContentBlock::ToolUse {
                id: id.to_string(),
                name: name.to_string(),
                input,
            }],
            stop_reason: StopReason::ToolUse,
        }
    }

    fn agent_with(server: Arc<BrowserServer>) -> Agent {
        Agent::builder("Playwright Assistant")
            .instructions("Use the browser tools")
            .mcp_server(server)
            .build()
            .unwrap()
    }

    fn browser() -> Arc<BrowserServer> {
        Arc::new(BrowserServer {
            calls: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn test_plain_answer_single_turn() {
        let llm = Arc::new(ScriptedLLM::new(vec![Ok(LLMResponse::text("Hello!"))]));
        let runner = Runner::new(llm.clone(), RunConfig::default());
        let result = runner.run(&agent_with(browser()), "Say hello").await.unwrap();

        assert_eq!(result.final_output, "Hello!");
        assert_eq!(result.turns, 1);
        assert_eq!(result.last_agent, "Playwright Assistant");
        assert!(result.trace_id.is_none());
        assert_eq!(llm.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_tool_call_then_answer() {
        let server = browser();
        let llm = Arc::new(ScriptedLLM::new(vec![
            Ok(tool_use("call_1", "browser_navigate", json!({"url": "https://example.com"}))),
            Ok(LLMResponse::text("The page title is Example Domain")),
        ]));
        let runner = Runner::new(llm.clone(), RunConfig::default())
            .with_trace(Trace::with_id("test", "trace_0123"));
        let result = runner
            .run(&agent_with(server.clone()), "Navigate to https://example.com")
            .await
            .unwrap();

        assert_eq!(result.final_output, "The page title is Example Domain");
        assert_eq!(result.turns, 2);
        assert_eq!(result.trace_id.as_deref(), Some("trace_0123"));
        assert_eq!(result.tool_calls().collect::<Vec<_>>(), vec!["browser_navigate"]);
        assert_eq!(server.calls.lock().unwrap().len(), 1);

        // Second LLM call sees the tool result
        let seen = llm.seen.lock().unwrap();
        let last = seen[1].last().unwrap();
        assert!(matches!(
            &last.content[0],
            ContentBlock::ToolResult { tool_use_id, content, is_error: None }
                if tool_use_id == "call_1" && content == "Navigated to https://example.com"
        ));
    }

    #[tokio::test]
    async fn test_tool_failure_is_reported_to_model() {
        let llm = Arc::new(ScriptedLLM::new(vec![
            Ok(tool_use("call_1", "browser_navigate", json!({"url": "bad"}))),
            Ok(tool_use("call_2", "browser_teleport", json!({}))),
            Ok(LLMResponse::text("Could not navigate")),
        ]));
        let runner = Runner::new(llm, RunConfig::default());
        let result = runner.run(&agent_with(browser()), "go").await.unwrap();

        let errors: Vec<&RunItem> = result
            .new_items
            .iter()
            .filter(|i| matches!(i, RunItem::ToolCallOutput { is_error: true, .. }))
            .collect();
        assert_eq!(errors.len(), 2);
        assert_eq!(result.final_output, "Could not navigate");
    }

    #[tokio::test]
    async fn test_llm_error_propagates_unchanged() {
        let llm = Arc::new(ScriptedLLM::new(vec![Err(Error::LLMError(
            "rate limited".to_string(),
        ))]));
        let runner = Runner::new(llm, RunConfig::default());
        let err = runner.run(&agent_with(browser()), "go").await.unwrap_err();
        assert!(matches!(err, Error::LLMError(msg) if msg == "rate limited"));
    }

    #[tokio::test]
    async fn test_max_turns_exceeded() {
        let llm = Arc::new(ScriptedLLM::new(vec![
            Ok(tool_use("a", "browser_navigate", json!({"url": "https://a.example"}))),
            Ok(tool_use("b", "browser_navigate", json!({"url": "https://b.example"}))),
        ]));
        let runner = Runner::new(
            llm,
            RunConfig {
                max_turns: 2,
                ..RunConfig::default()
            },
        );
        let err = runner.run(&agent_with(browser()), "loop").await.unwrap_err();
        assert!(matches!(err, Error::MaxTurnsExceeded(2)));
    }

    #[tokio::test]
    async fn test_duplicate_tools_rejected() {
        let agent = Agent::builder("dup")
            .instructions("x")
            .mcp_server(browser())
            .mcp_server(browser())
            .build()
            .unwrap();
        let llm = Arc::new(ScriptedLLM::new(vec![]));
        let err = Runner::new(llm, RunConfig::default())
            .run(&agent, "go")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateTool(name) if name == "browser_navigate"));
    }

    #[test]
    fn test_run_result_display() {
        let result = RunResult {
            input: "go".to_string(),
            final_output: "Saved screenshot\nat /tmp/a.png".to_string(),
            new_items: vec![RunItem::ToolCall {
                call_id: "c".to_string(),
                name: "browser_take_screenshot".to_string(),
                arguments: json!({}),
            }],
            last_agent: "Playwright Assistant".to_string(),
            trace_id: Some("trace_1".to_string()),
            turns: 2,
        };
        let shown = result.to_string();
        assert!(shown.contains("- Last agent: Playwright Assistant"));
        assert!(shown.contains("    Saved screenshot\n    at /tmp/a.png"));
        assert!(shown.contains("- Tools called: browser_take_screenshot"));
        assert!(shown.contains("- Trace: trace_1"));
    }
}
