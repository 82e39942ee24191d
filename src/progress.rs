//! Search session progress reporting.
//!
//! Observers receive every state transition of the live search session so
//! the user sees which step the server is on and how long it has been
//! running. The CLI reporters write to **stderr** so stdout stays parseable
//! for scripts.

use std::io::Write;
use std::str::FromStr;

use crate::session::{SessionId, SessionState};

/// Receives state transitions of the live session.
///
/// Called while the session's lock is held: implementations must return
/// quickly and must not call back into the session.
pub trait SessionObserver: Send + Sync {
    fn on_transition(&self, session: SessionId, state: &SessionState);
}

/// Human-friendly progress on stderr: "search  scoring: 412 / 9,896 lines  (12s)".
pub struct StderrProgress;

impl SessionObserver for StderrProgress {
    fn on_transition(&self, _session: SessionId, state: &SessionState) {
        let line = match state {
            SessionState::Idle => return,
            SessionState::Running {
                elapsed_seconds,
                last_progress,
                ..
            } => {
                let step = last_progress.as_deref().unwrap_or("starting...");
                format!("search  {}  ({})\n", step, format_elapsed(*elapsed_seconds))
            }
            SessionState::Completed { results } => {
                let secs = results
                    .elapsed_time
                    .map(|t| format!(" in {}", format_elapsed(t)))
                    .unwrap_or_default();
                format!(
                    "search  complete  {} matches{}\n",
                    format_number(results.total_matches()),
                    secs
                )
            }
            SessionState::Failed { message } => format!("search  failed  {}\n", message),
            SessionState::Cancelled => "search  cancelled\n".to_string(),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl SessionObserver for JsonProgress {
    fn on_transition(&self, session: SessionId, state: &SessionState) {
        let obj = match state {
            SessionState::Idle => return,
            SessionState::Running {
                started_at,
                elapsed_seconds,
                last_progress,
            } => serde_json::json!({
                "event": "progress",
                "session": session.to_string(),
                "state": state.label(),
                "started_at": started_at.to_rfc3339(),
                "elapsed": elapsed_seconds,
                "step": last_progress,
            }),
            SessionState::Completed { results } => serde_json::json!({
                "event": "progress",
                "session": session.to_string(),
                "state": state.label(),
                "total_matches": results.total_matches(),
                "elapsed_time": results.elapsed_time,
            }),
            SessionState::Failed { message } => serde_json::json!({
                "event": "progress",
                "session": session.to_string(),
                "state": state.label(),
                "message": message,
            }),
            SessionState::Cancelled => serde_json::json!({
                "event": "progress",
                "session": session.to_string(),
                "state": state.label(),
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op observer when progress is disabled.
pub struct NoProgress;

impl SessionObserver for NoProgress {
    fn on_transition(&self, _session: SessionId, _state: &SessionState) {}
}

fn format_elapsed(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    if total < 60 {
        format!("{}s", total)
    } else {
        format!("{}m {:02}s", total / 60, total % 60)
    }
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: auto, off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Auto,
    Off,
    Human,
    Json,
}

impl FromStr for ProgressMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(ProgressMode::Auto),
            "off" => Ok(ProgressMode::Off),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            other => Err(format!(
                "Unknown progress mode: '{}'. Use auto, off, human, or json.",
                other
            )),
        }
    }
}

impl ProgressMode {
    /// Human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build an observer for this mode, resolving `Auto` against the terminal.
    pub fn observer(&self) -> Box<dyn SessionObserver> {
        match self {
            ProgressMode::Auto => Self::default_for_tty().observer(),
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
