use std::io::{self, IsTerminal};

use owo_colors::OwoColorize;

use crate::agent::AgentStep;
use crate::chat::ChatMessage;

fn colors_enabled() -> bool {
    io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// Trace lines, one per step, on stderr.
pub fn print_steps(steps: &[AgentStep]) {
    if steps.is_empty() {
        eprintln!("(no steps recorded)");
        return;
    }
    let colors = io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none();
    for (index, step) in steps.iter().enumerate() {
        let line = format!("{:>2}. {step}", index + 1);
        match (colors, step) {
            (true, AgentStep::Error { .. }) => eprintln!("{}", line.red()),
            (true, _) => eprintln!("{}", line.dimmed()),
            (false, _) => eprintln!("{line}"),
        }
    }
}

pub fn print_reply(reply: &ChatMessage) {
    if !colors_enabled() {
        println!("{}", reply.content);
        return;
    }
    if reply.is_error {
        println!("{}", reply.content.red());
    } else {
        println!("{} {}", "assistant:".bold().cyan(), reply.content);
    }
}

pub fn print_notice(text: &str) {
    if colors_enabled() {
        println!("{}", text.yellow());
    } else {
        println!("{text}");
    }
}
