//! Completes one coding step. The backend behind it is swappable: the stub
//! only advances the plan, the generating backend asks the model for code.

use async_trait::async_trait;
use tracing::info;

use super::{NodeContext, advance, pending_plan};
use crate::error::Result;
use crate::prompts::workflow as prompts;
use crate::state::{Message, StateUpdate, WorkflowState};

/// Produces code for a step. `None` means the step is done without an
/// artifact.
#[async_trait]
pub trait CodeBackend: Send + Sync {
    async fn write_code(
        &self,
        step: &str,
        state: &WorkflowState,
        ctx: &NodeContext<'_>,
    ) -> Result<Option<String>>;
}

/// Marks the step done and produces nothing.
pub struct StubBackend;

#[async_trait]
impl CodeBackend for StubBackend {
    async fn write_code(
        &self,
        _step: &str,
        _state: &WorkflowState,
        _ctx: &NodeContext<'_>,
    ) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Asks the generator to write the code for the step.
pub struct GeneratingBackend;

#[async_trait]
impl CodeBackend for GeneratingBackend {
    async fn write_code(
        &self,
        step: &str,
        state: &WorkflowState,
        ctx: &NodeContext<'_>,
    ) -> Result<Option<String>> {
        let request = prompts::code_request(state.task(), step, state.accumulated_content());
        let code = ctx.generate(prompts::CODER, &request).await?;
        Ok(Some(code.trim().to_string()))
    }
}

pub async fn run(state: &WorkflowState, ctx: &NodeContext<'_>) -> Result<StateUpdate> {
    let plan = pending_plan(state, ctx.node())?;
    let step = plan
        .current()
        .map(|step| step.description().to_string())
        .unwrap_or_default();

    let artifact = ctx
        .providers()
        .coder
        .write_code(&step, state, ctx)
        .await?;
    info!(step = %step, artifact = artifact.is_some(), "coding step done");

    let mut update = StateUpdate::default().plan(advance(plan, ctx.node())?);
    if let Some(code) = artifact {
        let trace = format!("Code for: {step}\n{code}\n");
        update = update
            .append(&trace)
            .code_artifact(code)
            .message(Message::assistant(trace));
    }
    Ok(update)
}
