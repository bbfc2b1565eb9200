use async_trait::async_trait;

use super::{Command, CommandResult, SessionInfo};
use crate::consts::format_number;

pub struct TokensCommand;

#[async_trait]
impl Command for TokensCommand {
    fn name(&self) -> &str {
        "/tokens"
    }

    fn description(&self) -> &str {
        "show session token usage"
    }

    async fn execute(&self, _args: &str, info: &SessionInfo<'_>) -> CommandResult {
        if info.usage.total() == 0 {
            println!("  no tokens used this session");
        } else {
            println!(
                "  {} input + {} output = {} total ({})",
                format_number(info.usage.input_tokens),
                format_number(info.usage.output_tokens),
                format_number(info.usage.total()),
                info.model,
            );
        }
        CommandResult::Handled
    }
}
