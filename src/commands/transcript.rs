use async_trait::async_trait;

use super::{Command, CommandResult, SessionInfo};
use crate::state::Role;

pub struct TranscriptCommand;

#[async_trait]
impl Command for TranscriptCommand {
    fn name(&self) -> &str {
        "/transcript"
    }

    fn aliases(&self) -> &[&str] {
        &["/log"]
    }

    fn description(&self) -> &str {
        "show the message log of the last run"
    }

    async fn execute(&self, _args: &str, info: &SessionInfo<'_>) -> CommandResult {
        let Some(state) = info.last_state else {
            println!("  nothing has run yet");
            return CommandResult::Handled;
        };

        for message in state.messages() {
            let who = match message.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            println!("  [{who}]");
            for line in message.content.lines() {
                println!("    {line}");
            }
        }
        CommandResult::Handled
    }
}
