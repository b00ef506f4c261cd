//! Terminal confirmation prompt.

use std::io::{self, BufRead, Write};

use async_trait::async_trait;
use sprout_core::{ConfirmRequest, ConfirmationGate};

/// Asks on stdin before any destructive action
pub struct PromptGate;

fn question(request: &ConfirmRequest) -> String {
    match request {
        ConfirmRequest::SwitchMode { from, to } => format!(
            "Switching from {from} to {to} signs you out and hides data stored in {from} mode. Continue?"
        ),
        ConfirmRequest::ClearAllData { mode } => {
            format!("This deletes every stored user record ({mode} mode). Continue?")
        }
    }
}

#[async_trait]
impl ConfirmationGate for PromptGate {
    async fn confirm(&self, request: ConfirmRequest) -> bool {
        let prompt = question(&request);
        let answer = tokio::task::spawn_blocking(move || {
            let mut stdout = io::stdout();
            write!(stdout, "{prompt} [y/N] ").ok()?;
            stdout.flush().ok()?;
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line).ok()?;
            Some(line)
        })
        .await
        .ok()
        .flatten()
        .unwrap_or_default();

        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}
