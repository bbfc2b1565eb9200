use async_trait::async_trait;

use super::{Command, CommandResult, SessionInfo};

pub struct PlanCommand;

#[async_trait]
impl Command for PlanCommand {
    fn name(&self) -> &str {
        "/plan"
    }

    fn description(&self) -> &str {
        "show the plan of the last run"
    }

    async fn execute(&self, _args: &str, info: &SessionInfo<'_>) -> CommandResult {
        match info.last_state.and_then(|state| state.plan()) {
            Some(plan) => {
                for line in plan.render().lines() {
                    println!("  {line}");
                }
                println!("  ({} of {} done)", plan.done_count(), plan.len());
            }
            None => println!("  no plan yet"),
        }
        CommandResult::Handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::test_info;
    use crate::plan::Plan;
    use crate::state::{StateUpdate, WorkflowState};

    #[tokio::test]
    async fn without_a_run() {
        assert!(matches!(
            PlanCommand.execute("", &test_info()).await,
            CommandResult::Handled
        ));
    }

    #[tokio::test]
    async fn with_a_plan() {
        let state = WorkflowState::new("t")
            .apply(
                StateUpdate::default()
                    .workflow_needed(true)
                    .plan(Plan::parse("Title: T\n- [x] a\n- [ ] b").unwrap()),
            )
            .unwrap();
        let info = SessionInfo {
            last_state: Some(&state),
            ..test_info()
        };
        assert!(matches!(
            PlanCommand.execute("", &info).await,
            CommandResult::Handled
        ));
    }
}
