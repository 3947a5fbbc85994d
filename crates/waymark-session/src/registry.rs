//! Per-chat session registry and chat command dispatch.
//!
//! The chat surface (messenger bot, local REPL) is deliberately thin:
//! it parses user text into a [`ChatCommand`] and hands it to the
//! [`SessionRegistry`], which owns one [`NavigationSession`] per chat id.
//! Two chats talking to the same registry get independent sessions over the
//! same robot handle and map.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};
use waymark_map::MapData;

use crate::robot::RobotClient;
use crate::session::{CancelToken, NavigationSession, SessionConfig, StatusSink};

// ─────────────────────────────────────────────────────────────────────────────
// ChatCommand
// ─────────────────────────────────────────────────────────────────────────────

/// A parsed chat command; the surface-independent form of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Connect { force: bool },
    Disconnect,
    Status,
    Goto { location: String },
    Help,
}

impl ChatCommand {
    /// Parse a chat line.  Accepts a leading slash or bare words; returns
    /// `None` for empty input or an unknown command word.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        let stripped = trimmed.strip_prefix('/').unwrap_or(trimmed);
        let mut words = stripped.split_whitespace();
        let command = words.next()?.to_lowercase();
        match command.as_str() {
            "connect" => Some(ChatCommand::Connect {
                force: matches!(words.next(), Some(w) if w.eq_ignore_ascii_case("force")),
            }),
            "force_connect" => Some(ChatCommand::Connect { force: true }),
            "disconnect" => Some(ChatCommand::Disconnect),
            "status" => Some(ChatCommand::Status),
            "goto" | "go" => {
                let location = words.collect::<Vec<_>>().join(" ");
                if location.is_empty() {
                    None
                } else {
                    Some(ChatCommand::Goto { location })
                }
            }
            "help" | "start" => Some(ChatCommand::Help),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SessionRegistry
// ─────────────────────────────────────────────────────────────────────────────

/// One chat's session plus the cancel token shared with it.  The token is
/// held outside the session mutex so an in-flight navigation can be
/// cancelled while the session itself is locked.
#[derive(Clone)]
struct SessionHandle {
    session: Arc<Mutex<NavigationSession>>,
    cancel: CancelToken,
}

/// Owns one [`NavigationSession`] per chat id.
///
/// The outer map lock is only held long enough to look up or create a
/// handle, never across a session operation: a navigation that runs for
/// minutes in one chat must not block another chat's `/status` or the
/// shutdown path.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<i64, SessionHandle>>,
    robot: Arc<dyn RobotClient>,
    map: MapData,
    config: SessionConfig,
}

impl SessionRegistry {
    pub fn new(robot: Arc<dyn RobotClient>, map: MapData, config: SessionConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            robot,
            map,
            config,
        }
    }

    /// Execute a command on behalf of `chat_id`, replying through `sink`.
    pub async fn dispatch(&self, chat_id: i64, command: ChatCommand, sink: &dyn StatusSink) {
        info!(chat_id, ?command, "dispatching chat command");
        match command {
            ChatCommand::Connect { force } => self.handle_connect(chat_id, force, sink).await,
            ChatCommand::Disconnect => self.handle_disconnect(chat_id, sink).await,
            ChatCommand::Status => self.handle_status(chat_id, sink).await,
            ChatCommand::Goto { location } => self.handle_goto(chat_id, &location, sink).await,
            ChatCommand::Help => sink.send(&self.help_text()).await,
        }
    }

    /// Disconnect every active session; used on shutdown.  In-flight
    /// navigations are cancelled first so their session locks free up
    /// within one poll interval.
    pub async fn disconnect_all(&self) {
        let handles: Vec<(i64, SessionHandle)> = {
            let mut sessions = self.sessions.lock().await;
            sessions.drain().collect()
        };
        for (_, handle) in &handles {
            handle.cancel.cancel();
        }
        for (chat_id, handle) in handles {
            let mut session = handle.session.lock().await;
            if session.is_connected() {
                if let Err(e) = session.disconnect().await {
                    warn!(chat_id, error = %e, "disconnect during shutdown failed");
                }
            }
        }
    }

    /// Look up the handle for `chat_id`, creating it if absent.  The map
    /// lock is released before the caller touches the session.
    async fn handle_for(&self, chat_id: i64) -> SessionHandle {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(chat_id)
            .or_insert_with(|| {
                let session = NavigationSession::new(
                    self.robot.clone(),
                    self.map.clone(),
                    self.config.clone(),
                );
                let cancel = session.cancel_token();
                SessionHandle {
                    session: Arc::new(Mutex::new(session)),
                    cancel,
                }
            })
            .clone()
    }

    async fn existing_handle(&self, chat_id: i64) -> Option<SessionHandle> {
        self.sessions.lock().await.get(&chat_id).cloned()
    }

    async fn handle_connect(&self, chat_id: i64, force: bool, sink: &dyn StatusSink) {
        let handle = self.handle_for(chat_id).await;
        let mut session = handle.session.lock().await;
        if session.is_connected() {
            sink.send("Already connected to the robot").await;
            return;
        }
        // connect() reports its own progress and failure guidance.
        let _ = session.connect(force, sink).await;
    }

    async fn handle_disconnect(&self, chat_id: i64, sink: &dyn StatusSink) {
        let Some(handle) = self.existing_handle(chat_id).await else {
            sink.send("Not connected to the robot").await;
            return;
        };
        let mut session = handle.session.lock().await;
        if !session.is_connected() {
            sink.send("Not connected to the robot").await;
            return;
        }
        match session.disconnect().await {
            Ok(()) => sink.send("Disconnected from the robot").await,
            Err(e) => sink.send(&format!("Disconnect failed: {e}")).await,
        }
    }

    async fn handle_status(&self, chat_id: i64, sink: &dyn StatusSink) {
        let Some(handle) = self.existing_handle(chat_id).await else {
            sink.send("Not connected to the robot").await;
            return;
        };
        let session = handle.session.lock().await;
        let status = session.status().await;
        let mut lines = vec![
            "Robot status:".to_string(),
            format!("  Host: {}", status.hostname),
            format!(
                "  Connected: {}",
                if status.connected { "yes" } else { "no" }
            ),
            format!("  State: {:?}", status.state),
            format!(
                "  Motors: {}",
                match status.powered_on {
                    Some(true) => "on",
                    Some(false) => "off",
                    None => "unknown",
                }
            ),
        ];
        if let Some(pct) = status.battery_percent {
            lines.push(format!("  Battery: {pct:.0}%"));
        }
        if let Some(owner) = &status.lease_owner {
            lines.push(format!("  Lease: {owner}"));
        }
        if let Some(at) = status.connected_at {
            lines.push(format!("  Connected since: {}", at.format("%H:%M:%S UTC")));
        }
        sink.send(&lines.join("\n")).await;
    }

    async fn handle_goto(&self, chat_id: i64, location: &str, sink: &dyn StatusSink) {
        let Some(handle) = self.existing_handle(chat_id).await else {
            sink.send("Not connected to the robot. Use /connect first").await;
            return;
        };
        let mut session = handle.session.lock().await;
        // navigate_to reports progress, heartbeats, and failures itself.
        match session.navigate_to(location, sink).await {
            Ok(()) => sink.send(&format!("Arrived at {location}!")).await,
            Err(e) => warn!(chat_id, location, error = %e, "navigation failed"),
        }
    }

    fn help_text(&self) -> String {
        let mut text = String::from(
            "Robot navigation commands:\n\
             /connect - connect to the robot\n\
             /connect force - take the lease from another client\n\
             /goto <place> - navigate to a location\n\
             /status - robot and session status\n\
             /disconnect - release the robot\n\
             /help - this message",
        );
        if !self.config.locations.is_empty() {
            let mut names: Vec<&str> =
                self.config.locations.keys().map(String::as_str).collect();
            names.sort_unstable();
            text.push_str("\n\nKnown locations: ");
            text.push_str(&names.join(", "));
        }
        text
    }
}
