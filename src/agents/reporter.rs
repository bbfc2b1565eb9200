//! Synthesizes the final report from everything gathered. Always the last
//! node of a full workflow run.

use tracing::info;

use super::NodeContext;
use crate::error::Result;
use crate::plan::Plan;
use crate::prompts::workflow as prompts;
use crate::state::{Message, StateUpdate, WorkflowState};

pub async fn run(state: &WorkflowState, ctx: &NodeContext<'_>) -> Result<StateUpdate> {
    let report = ctx.generate(prompts::REPORTER, &input(state)).await?;
    let report = report.trim().to_string();
    info!(chars = report.len(), "report ready");

    let mut update = StateUpdate::default();
    if let Some(plan) = state.plan().and_then(complete_routed_step) {
        update = update.plan(plan);
    }
    Ok(update
        .report(report.clone())
        .message(Message::assistant(report)))
}

/// What the reporter is asked to compile.
pub fn input(state: &WorkflowState) -> String {
    let mut input = if state.accumulated_content().trim().is_empty() {
        format!(
            "No research findings were gathered for the task: {}",
            state.task()
        )
    } else {
        state.accumulated_content().to_string()
    };

    if let Some(code) = state.code_artifact() {
        input.push_str("\n\nCode produced:\n");
        input.push_str(code);
    }
    input
}

/// The reporting step the router sent us for, marked done.
fn complete_routed_step(plan: &Plan) -> Option<Plan> {
    let mut next = plan.clone();
    next.complete_current().ok()?;
    Some(next)
}
