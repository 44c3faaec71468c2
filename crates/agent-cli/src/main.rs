//! agent-run - run one prompt through a command-line coding agent
//!
//! Prints the completed response as JSON, or streams content to stdout with
//! `--stream`. Logs go to stderr; tune them with `RUST_LOG`.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use agent_adapter::{
    AdapterConfig, AdapterRegistry, CancellationToken, ExecutionRequest, McpConfig,
};
use anyhow::{bail, Context, Result};
use clap::Parser;
use futures::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "agent-run", version, about = "Run a prompt through an external coding agent")]
struct Args {
    /// Agent to run (claude-code, opencode, codex, gemini-cli)
    #[arg(short, long, env = "AGENT_RUN_AGENT", default_value = "claude-code")]
    agent: String,

    /// Prompt text
    prompt: String,

    /// System prompt prepended to the prompt
    #[arg(long)]
    system: Option<String>,

    /// Model identifier passed to the agent
    #[arg(short, long)]
    model: Option<String>,

    /// Working directory for the agent
    #[arg(short = 'C', long)]
    cwd: Option<PathBuf>,

    /// Deadline in seconds (0 = none)
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Tool the agent may use (repeatable)
    #[arg(long = "allow-tool")]
    allowed_tools: Vec<String>,

    /// Tool the agent must not use (repeatable)
    #[arg(long = "deny-tool")]
    disallowed_tools: Vec<String>,

    /// Extra environment entry KEY=VALUE (repeatable)
    #[arg(short, long = "env", value_parser = parse_env_pair)]
    env: Vec<(String, String)>,

    /// JSON file holding an {"mcpServers": {...}} map
    #[arg(long)]
    mcp_config: Option<PathBuf>,

    /// JSON file with adapter defaults; environment is used otherwise
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stream output as it arrives
    #[arg(short, long)]
    stream: bool,
}

fn parse_env_pair(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got {:?}", raw))
}

fn build_request(args: &Args) -> Result<ExecutionRequest> {
    let mut request = ExecutionRequest::new(args.prompt.clone())
        .with_allowed_tools(args.allowed_tools.iter().cloned())
        .with_disallowed_tools(args.disallowed_tools.iter().cloned());

    request.system_prompt = args.system.clone();
    request.model = args.model.clone();
    request.working_dir = args.cwd.clone();
    request.timeout = args.timeout.map(Duration::from_secs);
    request.env = args.env.iter().cloned().collect::<BTreeMap<_, _>>();

    if let Some(path) = &args.mcp_config {
        let body = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read MCP config {:?}", path))?;
        let mcp: McpConfig = serde_json::from_str(&body)
            .with_context(|| format!("Invalid MCP config {:?}", path))?;
        request.mcp_config = Some(mcp);
    }

    Ok(request)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agent_adapter=info,agent_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AdapterConfig::from_json_file(path)?,
        None => AdapterConfig::from_env(),
    };
    let registry = AdapterRegistry::with_builtins();
    let adapter = registry.create(&args.agent, Arc::new(config))?;
    let request = build_request(&args)?;

    // Ctrl-C cancels the call; the agent process is killed
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling");
                cancel.cancel();
            }
        });
    }

    if args.stream {
        let mut stream = adapter.stream(request, cancel);
        let mut stdout = std::io::stdout();
        while let Some(chunk) = stream.next().await {
            if let Some(error) = &chunk.error {
                bail!("{} (retryable: {})", error.message, error.retryable);
            }
            stdout.write_all(chunk.content.as_bytes())?;
            for call in &chunk.tool_calls {
                eprintln!("[tool] {} {}", call.name, call.arguments);
            }
            if let Some(usage) = chunk.usage {
                tracing::info!(
                    "Usage: {} in / {} out ({} total)",
                    usage.input_tokens,
                    usage.output_tokens,
                    usage.total()
                );
            }
            stdout.flush()?;
        }
    } else {
        let response = adapter.complete(request, cancel).await?;
        println!("{}", serde_json::to_string_pretty(&response)?);
    }

    Ok(())
}
