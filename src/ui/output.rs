use colored::*;
use std::io::{self, Write};

use crate::models::ToolSchema;
use crate::orchestrator::RunEvent;

pub fn display_banner(model: &str, provider: &str, server: &str) {
    println!("{}", "mcp2ai".bold().cyan());
    println!(
        "{}",
        format!("Model: {} ({}) | Tool server: {}", model, provider, server).dimmed()
    );
    println!(
        "{}",
        "Type your question, or 'exit' to quit. Ctrl-C cancels a running answer.".dimmed()
    );
    println!();
}

/// List the tools advertised to the model
pub fn display_tools(tools: &[ToolSchema]) {
    if tools.is_empty() {
        println!("{}", "⚠ No tools available".yellow());
    } else {
        println!("{}", format!("✓ Found {} tool(s):", tools.len()).green());
        for tool in tools {
            println!("  - {}: {}", tool.name.bold(), tool.description);
        }
    }
    println!("{}", "✓ Ready!".green());
    println!();
}

/// Render orchestrator progress
pub fn display_event(event: &RunEvent) {
    match event {
        RunEvent::TurnStarted { .. } => {}
        RunEvent::ToolCallsDetected { calls } => {
            println!(
                "{}",
                format!("[Tool calls detected: {}]", calls.len()).cyan()
            );
        }
        RunEvent::ToolCallStarted { call } => {
            println!(
                "  {} {} with {}",
                "→ Calling".cyan(),
                call.name.bold(),
                call.arguments_value().to_string().dimmed()
            );
        }
        RunEvent::ToolCallFinished { result, .. } => match result.error() {
            None => println!("  {}", "✓ Result received".green()),
            Some(error) => println!("  {}", format!("✗ {}", error.message).red()),
        },
        RunEvent::IterationLimitReached { max_iterations } => {
            println!(
                "{}",
                format!("[Stopped after {} model calls]", max_iterations).yellow()
            );
        }
    }
}

pub fn display_answer(answer: &str) {
    println!();
    println!("{} {}", "Assistant:".bold().green(), answer.trim_end());
    println!();
}

pub fn display_error(message: &str) {
    eprintln!("{} {}", "Error:".red().bold(), message);
}

pub fn prompt() -> io::Result<()> {
    print!("{} ", "You:".bold().blue());
    io::stdout().flush()
}
