//! CLI channel — stdin/stdout REPL over one conversation.

use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

use crate::conversation::ConversationSession;
use crate::render::RenderOp;

const HELP: &str = "Type an option number to choose it. /reset clears the chat, /state shows the current state, /quit exits.";

/// A line of user input, parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    /// Zero-based option index.
    Select(usize),
    Reset,
    State,
    Help,
    Quit,
}

/// Why the REPL stopped reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliExit {
    /// The user asked to quit.
    Quit,
    /// Input ran out (EOF or a read error). Only the terminal frontend ends.
    InputClosed,
}

/// Parse one input line. Option numbers are 1-based on screen.
pub fn parse_command(line: &str) -> Result<CliCommand, String> {
    let line = line.trim();
    match line {
        "/reset" | "/clear" => Ok(CliCommand::Reset),
        "/state" => Ok(CliCommand::State),
        "/help" | "?" => Ok(CliCommand::Help),
        "/quit" | "/exit" => Ok(CliCommand::Quit),
        _ => match line.parse::<usize>() {
            Ok(n) if n >= 1 => Ok(CliCommand::Select(n - 1)),
            _ => Err(format!("Unknown input: {line:?}")),
        },
    }
}

/// Terminal lines for a batch of render operations.
pub fn render_lines(ops: &[RenderOp]) -> Vec<String> {
    ops.iter()
        .filter_map(|op| match op {
            RenderOp::Append { entry } => Some(entry.to_plain_text()),
            RenderOp::Clear => Some("──────── chat cleared ────────".to_string()),
            RenderOp::RemoveOptions | RenderOp::ScrollToBottom => None,
        })
        .collect()
}

/// A terminal frontend driving one conversation.
pub struct CliChannel {
    session: Arc<ConversationSession>,
}

impl CliChannel {
    pub fn new(session: Arc<ConversationSession>) -> Self {
        Self { session }
    }

    /// Run against the process's stdin until EOF or `/quit`.
    pub async fn run(&self) -> CliExit {
        let lines = BufReader::new(tokio::io::stdin()).lines();
        let input = stream::unfold(lines, |mut lines| async move {
            match lines.next_line().await {
                Ok(Some(line)) => Some((line, lines)),
                Ok(None) => None, // EOF
                Err(e) => {
                    tracing::error!("Error reading stdin: {}", e);
                    None
                }
            }
        });
        self.run_with(Box::pin(input)).await
    }

    /// Run against any line stream.
    pub async fn run_with<S>(&self, mut input: S) -> CliExit
    where
        S: Stream<Item = String> + Unpin,
    {
        let printer = self.spawn_printer();

        let snapshot = self.session.snapshot().await;
        for entry in &snapshot.entries {
            println!("{}", entry.to_plain_text());
        }
        eprintln!("{HELP}");
        eprint!("> ");

        let mut exit = CliExit::InputClosed;
        while let Some(line) = input.next().await {
            if line.trim().is_empty() {
                eprint!("> ");
                continue;
            }
            match parse_command(&line) {
                Ok(CliCommand::Select(index)) => {
                    if let Err(e) = self.session.select(index).await {
                        eprintln!("⚠️  {e}");
                    }
                }
                Ok(CliCommand::Reset) => {
                    self.session.reset().await;
                }
                Ok(CliCommand::State) => {
                    let state = self.session.inspect().await;
                    eprintln!(
                        "{}",
                        serde_json::to_string_pretty(&state).unwrap_or_else(|_| state.to_string())
                    );
                }
                Ok(CliCommand::Help) => eprintln!("{HELP}"),
                Ok(CliCommand::Quit) => {
                    exit = CliExit::Quit;
                    break;
                }
                Err(e) => eprintln!("⚠️  {e}. {HELP}"),
            }
            eprint!("> ");
        }

        self.session.settled().await;
        printer.abort();
        exit
    }

    fn spawn_printer(&self) -> JoinHandle<()> {
        let mut rx = self.session.subscribe();
        tokio::spawn(async move {
            while let Ok(ops) = rx.recv().await {
                for line in render_lines(&ops) {
                    println!("\n{line}");
                }
            }
        })
    }
}
