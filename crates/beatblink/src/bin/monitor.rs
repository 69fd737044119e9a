//! Beat & Blink monitor
//!
//! Follows a running server over WebSocket, reconnecting with exponential
//! backoff, and prints level changes to stdout.

use anyhow::{bail, Result};
use beatblink::{cli::MonitorOpts, logging_setup};
use beatblink_control::{ClientSnapshot, ConnectionStatus, ReconnectPolicy, Reconnector};
use beatblink_core::{LevelState, LogConfig, MAX_LEVEL};
use clap::Parser;
use tracing::info;

const BAR_WIDTH: usize = 20;

fn progress_bar(level: &LevelState) -> String {
    let filled = ((level.progress * BAR_WIDTH as f32) as usize).min(BAR_WIDTH);
    format!("[{}{}]", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled))
}

fn render(snapshot: &ClientSnapshot, verbose: bool) -> Option<String> {
    match &snapshot.status {
        ConnectionStatus::Connecting => return Some("connecting...".to_string()),
        ConnectionStatus::Reconnecting { attempt, delay } => {
            return Some(format!("disconnected, retry {} in {:?}", attempt, delay))
        }
        ConnectionStatus::Failed | ConnectionStatus::Closed | ConnectionStatus::Idle => {
            return None
        }
        ConnectionStatus::Connected => {}
    }

    let level = snapshot.level.as_ref()?;
    let mut line = format!(
        "level {}/{} {} {:>3.0}%",
        level.current,
        MAX_LEVEL,
        progress_bar(level),
        level.progress * 100.0
    );
    if level.is_winner {
        line.push_str("  WINNER");
    }
    if verbose {
        if let Some(audio) = &snapshot.audio {
            line.push_str(&format!(
                "  vol {:.2} bass {:.2} mid {:.2} treble {:.2}",
                audio.volume, audio.bass, audio.mid, audio.treble
            ));
        }
    }
    Some(line)
}

#[tokio::main]
async fn main() -> Result<()> {
    let opts = MonitorOpts::parse();

    let log_config = LogConfig::default().with_level(opts.log_level.clone());
    let _log_guard = logging_setup::init(&log_config)?;

    let policy = ReconnectPolicy {
        max_attempts: opts.max_attempts,
        ..Default::default()
    };
    let client = Reconnector::new(opts.url.clone(), policy).spawn();
    let mut updates = client.subscribe();
    let mut last_line = String::new();

    info!("Monitoring {}", opts.url);
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                if snapshot.status == ConnectionStatus::Failed {
                    let reason = snapshot.connection_error.unwrap_or_default();
                    client.close().await?;
                    bail!("{}: {}", opts.url, reason);
                }
                if let Some(line) = render(&snapshot, opts.verbose) {
                    if line != last_line {
                        println!("{}", line);
                        last_line = line;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.close().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_bar() {
        let mut level = LevelState::initial();
        assert_eq!(progress_bar(&level), format!("[{}]", ".".repeat(BAR_WIDTH)));

        level.progress = 0.5;
        assert_eq!(
            progress_bar(&level),
            format!("[{}{}]", "#".repeat(10), ".".repeat(10))
        );
    }

    #[test]
    fn test_render_connected() {
        let mut level = LevelState::initial();
        level.current = 5;
        level.is_winner = true;
        level.winner_start_time = Some(1);

        let snapshot = ClientSnapshot {
            status: ConnectionStatus::Connected,
            level: Some(level),
            ..Default::default()
        };
        let line = render(&snapshot, false).unwrap();
        assert!(line.starts_with("level 5/5"));
        assert!(line.ends_with("WINNER"));
    }

    #[test]
    fn test_render_waiting() {
        let snapshot = ClientSnapshot {
            status: ConnectionStatus::Connected,
            ..Default::default()
        };
        assert!(render(&snapshot, false).is_none());

        let snapshot = ClientSnapshot {
            status: ConnectionStatus::Closed,
            ..Default::default()
        };
        assert!(render(&snapshot, false).is_none());
    }
}
