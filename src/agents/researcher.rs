//! Completes one research step with a web search.

use tracing::info;

use super::{NodeContext, advance, pending_plan};
use crate::error::Result;
use crate::provider::SearchHit;
use crate::state::{Message, StateUpdate, WorkflowState};

pub async fn run(state: &WorkflowState, ctx: &NodeContext<'_>) -> Result<StateUpdate> {
    let plan = pending_plan(state, ctx.node())?;
    let query = plan
        .current()
        .map(|step| step.description().to_string())
        .unwrap_or_default();

    let hits = ctx.search(&query, ctx.config().search_results).await?;
    info!(query = %query, hits = hits.len(), "search done");

    let trace = trace(&query, &hits);
    ctx.emit_chunk(trace.clone());

    let plan = advance(plan, ctx.node())?;
    Ok(StateUpdate::default()
        .plan(plan)
        .append(&trace)
        .message(Message::assistant(trace)))
}

/// The text appended to the findings for one search. Only the top hit's
/// content is recorded.
pub fn trace(query: &str, hits: &[SearchHit]) -> String {
    match hits.first() {
        Some(top) => format!(
            "Performing web search for: {query}\nSearch results: {}\n",
            top.content.trim()
        ),
        None => format!("Performing web search for: {query}\nNo results found for: {query}\n"),
    }
}
