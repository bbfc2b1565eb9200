//! Decides once per run whether a task is answered directly or needs the
//! full plan/route/work loop.

use tracing::info;

use super::NodeContext;
use crate::error::Result;
use crate::prompts::{WORKFLOW_SENTINEL, workflow as prompts};
use crate::state::{Message, StateUpdate, WorkflowState};

pub async fn run(state: &WorkflowState, ctx: &NodeContext<'_>) -> Result<StateUpdate> {
    let reply = ctx.generate(prompts::INTAKE, state.task()).await?;
    let update = decide(&reply);
    info!(workflow_needed = ?update.workflow_needed, "intake decision");
    Ok(update)
}

/// Interpret the intake reply. Any occurrence of the sentinel means the
/// workflow is needed; otherwise the reply is the answer.
pub fn decide(reply: &str) -> StateUpdate {
    if reply.contains(WORKFLOW_SENTINEL) {
        return StateUpdate::default().workflow_needed(true);
    }
    let answer = reply.trim();
    StateUpdate::default()
        .workflow_needed(false)
        .general_answer(answer)
        .message(Message::assistant(answer))
}
