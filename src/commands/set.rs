use async_trait::async_trait;

use super::{Command, CommandResult, SessionInfo, StateChange};
use crate::config;

pub struct SetCommand;

#[async_trait]
impl Command for SetCommand {
    fn name(&self) -> &str {
        "/set"
    }

    fn description(&self) -> &str {
        "show preferences, or store one: /set <key> <value>"
    }

    async fn execute(&self, args: &str, info: &SessionInfo<'_>) -> CommandResult {
        let Some(store) = info.config else {
            eprintln!("  ✗ preferences not available");
            return CommandResult::Handled;
        };

        if args.is_empty() {
            match store.entries() {
                Ok(entries) if entries.is_empty() => println!("  no stored preferences"),
                Ok(entries) => {
                    for (key, value) in entries {
                        println!("  {key:<16} {value}");
                    }
                }
                Err(e) => eprintln!("  ✗ failed to read preferences: {e}"),
            }
            return CommandResult::Handled;
        }

        let Some((key, value)) = args.split_once(char::is_whitespace) else {
            eprintln!("  usage: /set <key> <value> (keys: {})", config::KEYS.join(", "));
            return CommandResult::Handled;
        };
        let value = value.trim();

        if let Err(e) = config::validate(key, value) {
            eprintln!("  ✗ {e}");
            return CommandResult::Handled;
        }
        if let Err(e) = store.set(key, value) {
            eprintln!("  ✗ failed to save {key}: {e}");
            return CommandResult::Handled;
        }

        println!("  ✓ {key} = {value}");
        CommandResult::StateChanged(StateChange::Setting {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}
