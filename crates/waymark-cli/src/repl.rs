//! REPL – the local chat surface over a [`SessionRegistry`].
//!
//! Supported commands (leading slash optional):
//!   /connect [force] – connect to the robot and acquire the lease
//!   /goto <place>    – navigate to a location, short code, name, or id
//!   /status          – robot and session status
//!   /disconnect      – release the robot
//!   /help            – show the command list
//!   /quit | /exit    – leave the REPL

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use colored::Colorize;
use tokio::runtime::Runtime;
use waymark_session::{ChatCommand, SessionRegistry, StatusSink};

/// Chat id used for the single local REPL conversation.
const LOCAL_CHAT_ID: i64 = 0;

/// Prints replies and progress lines to the terminal.
struct TerminalSink;

#[async_trait]
impl StatusSink for TerminalSink {
    async fn send(&self, msg: &str) {
        for line in msg.lines() {
            println!("  {}", line.cyan());
        }
    }
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set (Ctrl-C) the REPL
/// disconnects every session and exits cleanly.
pub fn run(runtime: &Runtime, registry: Arc<SessionRegistry>, shutdown: Arc<AtomicBool>) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "waymark>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            "/quit" | "/exit" | "quit" | "exit" => {
                println!("{}", "Goodbye.".green());
                break;
            }
            other => match ChatCommand::parse(other) {
                Some(command) => {
                    runtime.block_on(registry.dispatch(LOCAL_CHAT_ID, command, &TerminalSink));
                }
                None => {
                    println!(
                        "{} '{}'. Type {} for available commands.",
                        "Unknown command:".red(),
                        other.yellow(),
                        "/help".bold()
                    );
                }
            },
        }
    }

    // Release the lease and power down anything we powered up.
    runtime.block_on(registry.disconnect_all());
}
