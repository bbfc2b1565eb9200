//! Turns the task into a checklist plan, or refreshes the pending part of an
//! existing plan when the router asks for replanning.

use tracing::{info, warn};

use super::NodeContext;
use crate::error::{Result, WorkflowError};
use crate::plan::Plan;
use crate::prompts::workflow as prompts;
use crate::state::{Message, StateUpdate, WorkflowState};

pub async fn run(state: &WorkflowState, ctx: &NodeContext<'_>) -> Result<StateUpdate> {
    let user = match state.plan() {
        Some(current) => prompts::replan_request(state.task(), current),
        None => state.task().to_string(),
    };

    let reply = ctx.generate(&prompts::planner(), &user).await?;
    let plan = build_plan(state.plan(), &reply)?;

    info!(
        steps = plan.len(),
        done = plan.done_count(),
        replanned = state.plan().is_some(),
        "plan ready"
    );

    Ok(StateUpdate::default()
        .plan(plan.clone())
        .message(Message::assistant(plan.render())))
}

/// Parse the planner's reply and, when replanning, merge it behind the
/// already completed steps.
pub fn build_plan(current: Option<&Plan>, reply: &str) -> Result<Plan> {
    let malformed = |reason| WorkflowError::MalformedPlan {
        reason,
        raw: reply.to_string(),
    };

    let fresh = Plan::parse(reply).map_err(malformed)?;
    match current {
        None => {
            if fresh.done_count() == 0 {
                return Ok(fresh);
            }
            warn!(
                done = fresh.done_count(),
                "planner marked steps done in a new plan; resetting them to pending"
            );
            let items = fresh.steps().iter().map(|step| step.description().to_string());
            Plan::new(fresh.title().map(str::to_string), items).map_err(malformed)
        }
        Some(current) => {
            if fresh.done_count() > 0 {
                warn!("planner marked steps done while replanning; keeping only pending ones");
            }
            current.replan(fresh).map_err(malformed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlanError;

    #[test]
    fn fresh_plan_from_reply() {
        let plan = build_plan(
            None,
            "Title: Node.js\n- [ ] Gather information about Node.js origins\n- [ ] Summarize findings",
        )
        .unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.title(), Some("Node.js"));
    }

    #[test]
    fn prose_without_items_is_malformed() {
        let err = build_plan(None, "I think you should read a book.").unwrap_err();
        match err {
            WorkflowError::MalformedPlan { reason, raw } => {
                assert_eq!(reason, PlanError::NoItems);
                assert!(raw.contains("read a book"));
            }
            other => panic!("expected MalformedPlan, got {other:?}"),
        }
    }

    #[test]
    fn new_plan_starts_with_every_step_pending() {
        let plan = build_plan(None, "Title: T\n- [x] gather facts\n- [ ] ponder\n- [X] report").unwrap();
        assert_eq!(plan.done_count(), 0);
        assert_eq!(
            plan.render(),
            "Title: T\n- [ ] gather facts\n- [ ] ponder\n- [ ] report\n"
        );
        assert_eq!(plan.current().unwrap().description(), "gather facts");
    }

    #[test]
    fn replanning_keeps_completed_steps() {
        let mut current = Plan::parse("Title: T\n- [ ] gather facts\n- [ ] ponder").unwrap();
        current.complete_current().unwrap();

        let plan = build_plan(Some(&current), "- [ ] research the open question\n- [ ] summarize").unwrap();
        assert_eq!(
            plan.render(),
            "Title: T\n- [x] gather facts\n- [ ] research the open question\n- [ ] summarize\n"
        );
    }
}
