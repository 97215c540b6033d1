//! Playwright agent CLI
//!
//! Starts the Playwright MCP server through `npx`, attaches it to an agent and
//! either runs one scripted screenshot request or reads requests from stdin
//! until `exit`.
//!
//! Prerequisites:
//! - Node.js with `npx` on the PATH (the server is fetched as `@playwright/mcp@latest`)
//! - OPENAI_API_KEY in the environment or a .env file

use anyhow::Context;
use clap::{Parser, ValueEnum};
use mcp_playwright_agent::logging::{init_logging, LogLevel};
use mcp_playwright_agent::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;

const AGENT_NAME: &str = "Playwright Assistant";
const WORKFLOW_NAME: &str = "Playwright Screenshot Example";

const INSTRUCTIONS: &str = "\
You are a playwright assistant that follows a Read-Eval-Test (RET) loop pattern:
- Read: Understand the user's request for website navigation and screenshots
- Eval: Choose appropriate Playwright tools for the task
- Test: Verify successful navigation and page load
- Report back with results and file locations";

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Read requests from stdin until 'exit'
    Interactive,
    /// Run one fixed screenshot request and check the file
    Scripted,
}

#[derive(Parser)]
#[command(name = "playwright-agent")]
#[command(version)]
#[command(about = "Drive the Playwright MCP server with an LLM agent", long_about = None)]
struct Cli {
    /// Interaction mode
    #[arg(long, short = 'm', value_enum, default_value = "interactive")]
    mode: Mode,

    /// Show the browser window (default: headless)
    #[arg(long, short = 'H')]
    headed: bool,

    /// Model name; overrides OPENAI_MODEL
    #[arg(long)]
    model: Option<String>,

    /// Maximum LLM turns per request; overrides AGENT_MAX_TURNS
    #[arg(long)]
    max_turns: Option<usize>,

    /// Directory in which `screenshots/` is created
    #[arg(long, value_name = "DIR", default_value = ".")]
    base_dir: PathBuf,

    /// Page the scripted request navigates to
    #[arg(long, value_name = "URL", default_value = DEFAULT_TARGET_URL)]
    url: String,

    /// Package runner used to launch the server
    #[arg(long, value_name = "CMD", default_value = "npx")]
    runner_command: String,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mcp_playwright_agent::load_env();
    let cli = Cli::parse();
    init_logging(LogLevel::from_verbosity(cli.verbose));

    let mut run_config = RunConfig::from_env()?;
    if let Some(model) = &cli.model {
        run_config.model = model.clone();
    }
    if let Some(max_turns) = cli.max_turns {
        run_config.max_turns = max_turns.max(1);
    }
    let llm = OpenAIAdapter::from_env(run_config.model.clone())?;

    let screenshots_dir = ensure_screenshots_dir(&cli.base_dir)
        .with_context(|| format!("creating screenshots directory under {}", cli.base_dir.display()))?;

    let server_config = MCPServerConfig::playwright_with_runner(
        cli.runner_command.clone(),
        !cli.headed,
        Some(&screenshots_dir),
    );
    let server = Arc::new(McpServerStdio::new(server_config));

    let trace = Trace::new(WORKFLOW_NAME);
    println!("View trace: {}\n", trace.url());

    with_server(server, |server| async move {
        println!("Starting Playwright server: {}", server);

        let agent = Agent::builder(AGENT_NAME)
            .instructions(INSTRUCTIONS)
            .mcp_server(server.clone())
            .build()?;

        let tools = agent.get_all_tools().await?;
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        println!("Available tools: {:?}", names);

        let runner = Runner::new(Arc::new(llm), run_config).with_trace(trace);
        let driver = Driver::new(runner, agent);
        let mut stdout = std::io::stdout();

        match cli.mode {
            Mode::Interactive => {
                let stdin = BufReader::new(tokio::io::stdin());
                let executed = interactive_loop(&driver, stdin, &mut stdout).await?;
                tracing::info!(executed, "Interactive session finished");
            }
            Mode::Scripted => {
                run_scripted(&driver, &cli.url, &screenshots_dir, &mut stdout).await?;
            }
        }
        Ok::<_, anyhow::Error>(())
    })
    .await
    .context("playwright agent run failed")
}
