use analysis_client::{AgentStatus, FailureKind, SessionStatus, StreamState};
use colored::*;

use crate::status_client::RunStatusReport;

/// Print whatever changed between two snapshots of the same session.
pub fn print_progress(previous: &StreamState, current: &StreamState) {
    if current.message != previous.message || current.progress != previous.progress {
        println!(
            "{} [{:>3}%] {}",
            "→".blue(),
            current.progress,
            current.message
        );
    }

    for layer in current.layers.iter().skip(previous.layers.len()) {
        println!(
            "   {} layer {}/{} {} ({} anomalies)",
            "✓".green(),
            layer.layer_index + 1,
            layer.total_layers,
            layer.layer_name.bold(),
            layer.finding_count
        );
    }

    for agent in current.agents.iter().skip(previous.agents.len()) {
        let mark = match agent.status {
            AgentStatus::Success => "✓".green(),
            AgentStatus::Error => "✗".red(),
        };
        let perspective = agent
            .perspective
            .as_deref()
            .map(|p| format!(" [{p}]"))
            .unwrap_or_default();
        println!(
            "   {} agent {}{} ({} findings)",
            mark,
            agent.agent_name.bold(),
            perspective.dimmed(),
            agent.finding_count
        );
    }
}

pub fn print_summary(state: &StreamState) {
    println!("\n{}", "=== RESULT ===".bright_white().bold());

    println!(
        "{}: {} layer(s), {} agent(s)",
        "Received".bold(),
        state.layers.len(),
        state.agents.len()
    );

    match state.status {
        SessionStatus::Completed => {
            println!("{}", "Analysis complete ✓".bright_green().bold());
            if let Some(result) = &state.result {
                if let Ok(pretty) = serde_json::to_string_pretty(result) {
                    println!("{}", pretty.dimmed());
                }
            }
        }
        SessionStatus::Errored => {
            let kind = match state.error_kind {
                Some(FailureKind::Server) => "server error",
                Some(FailureKind::Decode) => "undecodable event",
                Some(FailureKind::ConnectionLost) => "connection lost",
                None => "error",
            };
            println!(
                "{} ({}): {}",
                "Analysis failed ✗".bright_red().bold(),
                kind,
                state.error.as_deref().unwrap_or_default()
            );
        }
        SessionStatus::Cancelled => {
            println!("{}", "Cancelled".yellow().bold());
        }
        SessionStatus::Pending | SessionStatus::Active => {
            println!("{}", "Session still active".yellow());
        }
    }
}

pub fn print_run_status(report: Option<&RunStatusReport>) {
    match report {
        Some(report) => {
            println!(
                "{} Server reports run {} as {}",
                "→".blue(),
                report.run_id,
                report.status.bold()
            );
            if let Some(message) = &report.message {
                println!("   {}", message.dimmed());
            }
        }
        None => println!("{} Server has no record of this run", "→".blue()),
    }
}
