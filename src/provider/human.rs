use async_trait::async_trait;
use std::io::{self, BufRead, Write};

use super::{Generation, Generator};
use crate::error::ProviderError;

/// End-of-reply marker typed on a line by itself.
const END_MARKER: &str = ".";

/// You are the model. Read the instruction at the terminal and type the reply.
pub struct HumanGenerator;

impl HumanGenerator {
    fn print_request(system: &str, user: &str) {
        println!("\n{}", "=".repeat(60));
        println!("Instruction:\n{}", system.trim());
        println!("{}", "-".repeat(60));
        println!("Input:\n{}", user.trim());
        println!("{}", "=".repeat(60));
    }

    fn read_reply() -> io::Result<String> {
        println!("Reply (end with '{}' on its own line):", END_MARKER);
        io::stdout().flush()?;
        read_until_marker(io::stdin().lock())
    }
}

/// Collect lines up to the end marker or end of input.
fn read_until_marker(reader: impl BufRead) -> io::Result<String> {
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim() == END_MARKER {
            break;
        }
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

#[async_trait]
impl Generator for HumanGenerator {
    async fn generate(&self, system: &str, user: &str) -> Result<Generation, ProviderError> {
        Self::print_request(system, user);
        // Must not block the runtime: call timeouts and Ctrl+C stay live.
        let text = tokio::task::spawn_blocking(Self::read_reply)
            .await
            .map_err(io::Error::other)??;
        Ok(Generation::text(text.trim()))
    }

    fn model(&self) -> &str {
        "human"
    }
}
