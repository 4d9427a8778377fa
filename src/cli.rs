use clap::Parser;

#[derive(Parser, Debug, Default)]
#[command(name = "mcp2ai")]
#[command(
    about = "Ask questions answered with the help of MCP tools and a local model",
    long_about = None
)]
pub struct Args {
    #[arg(short = 'v', long = "verbose", help = "Show debug logging on stderr")]
    pub verbose: bool,

    #[arg(long = "model", help = "Model name (e.g., qwen2.5:7b)")]
    pub model: Option<String>,

    #[arg(long = "provider", help = "Inference framing: ollama or openai")]
    pub provider: Option<String>,

    #[arg(
        long = "api-endpoint",
        help = "Inference service base URL (e.g., http://localhost:11434)"
    )]
    pub api_endpoint: Option<String>,

    #[arg(long = "max-iterations", help = "Maximum model calls per question")]
    pub max_iterations: Option<u32>,

    #[arg(
        long = "mcp-server",
        help = "Tool server to launch (format: command:arg1,arg2,...)"
    )]
    pub mcp_server: Option<String>,

    #[arg(long = "no-tools", help = "Do not advertise any tools to the model")]
    pub no_tools: bool,

    #[arg(long = "config-init", help = "Write an example .mcp2ai.yaml and exit")]
    pub config_init: bool,
}

/// Split `command:arg1,arg2` into the command and its arguments.
pub fn parse_server_spec(spec: &str) -> Option<(String, Vec<String>)> {
    let (command, args) = match spec.split_once(':') {
        Some((command, args)) => (command, split_list(args)),
        None => (spec, Vec::new()),
    };

    let command = command.trim();
    if command.is_empty() {
        return None;
    }
    Some((command.to_string(), args))
}

/// Comma-separated list with blanks dropped.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `exit`, `quit` and `q` end the session, in any case.
pub fn is_exit_command(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "exit" | "quit" | "q")
}
