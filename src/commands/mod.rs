//! Built-in REPL commands prefixed with `/`.
//!
//! Commands implement the [`Command`] trait and are registered in a
//! [`CommandRegistry`]. The registry handles dispatch, alias resolution,
//! and dynamic help generation. Extra commands can be added at runtime via
//! `registry.register(Arc::new(MyCommand))`.

mod help;
mod plan;
mod quit;
mod set;
mod tokens;
mod transcript;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::Config;
use crate::provider::TokenUsage;
use crate::state::WorkflowState;

/// Session info available to commands during execution.
pub struct SessionInfo<'a> {
    pub provider: &'a str,
    pub model: &'a str,
    pub usage: TokenUsage,
    /// Final state of the most recent run, if any.
    pub last_state: Option<&'a WorkflowState>,
    /// Preferences store, when one is open.
    pub config: Option<&'a Config>,
}

/// A state change the REPL needs to apply after a command runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    /// A preference was stored and should take effect now.
    Setting { key: String, value: String },
}

/// What the REPL should do after a command runs.
#[derive(Debug)]
pub enum CommandResult {
    /// Not a command; the input is a task.
    NotACommand,
    /// Command handled, continue the REPL loop.
    Handled,
    /// Command produced a state change the REPL must apply.
    StateChanged(StateChange),
    /// Exit the REPL.
    Quit,
}

/// A REPL command. Implement this trait to add new commands.
#[async_trait]
pub trait Command: Send + Sync {
    /// Primary name, e.g. `"/plan"`.
    fn name(&self) -> &str;

    /// Alternative names, e.g. `&["/h", "/?"]`.
    fn aliases(&self) -> &[&str] {
        &[]
    }

    /// One-line description for `/help`.
    fn description(&self) -> &str;

    /// Run the command. `args` is everything after the command name.
    async fn execute(&self, args: &str, info: &SessionInfo<'_>) -> CommandResult;
}

/// Holds registered commands.
pub struct CommandRegistry {
    commands: Vec<Arc<dyn Command>>,
}

impl CommandRegistry {
    /// Create a registry with all built-in commands.
    pub fn new() -> Self {
        let commands: Vec<Arc<dyn Command>> = vec![
            Arc::new(help::HelpCommand),
            Arc::new(plan::PlanCommand),
            Arc::new(transcript::TranscriptCommand),
            Arc::new(tokens::TokensCommand),
            Arc::new(set::SetCommand),
            Arc::new(quit::QuitCommand),
        ];
        Self { commands }
    }

    /// Register an additional command.
    pub fn register(&mut self, command: Arc<dyn Command>) {
        self.commands.push(command);
    }

    /// Dispatch input to a matching command, or return `NotACommand`.
    pub async fn dispatch(&self, input: &str, info: &SessionInfo<'_>) -> CommandResult {
        let input = input.trim();
        let (cmd, args) = input
            .split_once(char::is_whitespace)
            .map_or((input, ""), |(cmd, args)| (cmd, args.trim()));

        for command in &self.commands {
            if cmd == command.name() || command.aliases().contains(&cmd) {
                // /help needs the registry to list all commands
                if command.name() == "/help" {
                    print!("{}", self.help_text());
                    return CommandResult::Handled;
                }
                return command.execute(args, info).await;
            }
        }

        if cmd.starts_with('/') {
            println!("unknown command: {cmd}");
            println!("type /help for available commands");
            return CommandResult::Handled;
        }

        CommandResult::NotACommand
    }

    /// Generate help text from all registered commands.
    pub fn help_text(&self) -> String {
        let entries: Vec<(String, &str)> = self
            .commands
            .iter()
            .map(|c| (format_label(c.name(), c.aliases()), c.description()))
            .collect();

        let max_width = entries
            .iter()
            .map(|(label, _)| label.len())
            .max()
            .unwrap_or(10);

        let mut out = String::new();
        for (label, desc) in &entries {
            out.push_str(&format!("  {label:<max_width$}  {desc}\n"));
        }
        out
    }

    /// All registered command names.
    pub fn names(&self) -> Vec<&str> {
        self.commands.iter().map(|c| c.name()).collect()
    }

    /// All registered names and aliases.
    pub fn all_triggers(&self) -> Vec<&str> {
        let mut triggers = Vec::new();
        for cmd in &self.commands {
            triggers.push(cmd.name());
            triggers.extend_from_slice(cmd.aliases());
        }
        triggers
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn format_label(name: &str, aliases: &[&str]) -> String {
    if aliases.is_empty() {
        name.to_string()
    } else {
        format!("{} ({})", name, aliases.join(", "))
    }
}
