pub mod workflow;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use crate::agents::router::{Capability, Route};
use crate::error::{Result, WorkflowError};
use crate::provider::TokenUsage;
use crate::state::WorkflowState;

/// The outermost boundary. main.rs only knows this trait.
#[async_trait]
pub trait Engine: Send + Sync {
    async fn run(&mut self, task: &str) -> Result<RunReport>;
}

/// The states of the workflow machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Node {
    Intake,
    Plan,
    Route,
    Research,
    Code,
    Report,
    Done,
}

impl Node {
    pub fn name(&self) -> &'static str {
        match self {
            Node::Intake => "intake",
            Node::Plan => "plan",
            Node::Route => "route",
            Node::Research => "research",
            Node::Code => "code",
            Node::Report => "report",
            Node::Done => "done",
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a node reports back to the machine once its update is merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Intake answered the task itself.
    Answered,
    /// Intake decided a plan is needed.
    NeedsWorkflow,
    /// The planner produced (or refreshed) the plan.
    Planned,
    /// The router picked the next move.
    Routed(Route),
    /// A worker completed exactly one step.
    Advanced,
    /// The reporter produced the report.
    Reported,
}

/// The transition table. Any pair not listed is a bug in the caller.
pub fn transition(from: Node, signal: Signal) -> Result<Node> {
    let next = match (from, signal) {
        (Node::Intake, Signal::Answered) => Node::Done,
        (Node::Intake, Signal::NeedsWorkflow) => Node::Plan,
        (Node::Plan, Signal::Planned) => Node::Route,
        (Node::Route, Signal::Routed(route)) => match route {
            Route::Capability(Capability::Research) => Node::Research,
            Route::Capability(Capability::Coding) => Node::Code,
            Route::Capability(Capability::Reporting) => Node::Report,
            Route::NeedsReplanning => Node::Plan,
            Route::Terminate => Node::Done,
        },
        (Node::Research | Node::Code, Signal::Advanced) => Node::Route,
        (Node::Report, Signal::Reported) => Node::Done,
        (from, signal) => {
            return Err(WorkflowError::IllegalTransition {
                from,
                signal: format!("{signal:?}"),
            });
        }
    };
    Ok(next)
}

/// The terminal payload of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "lowercase")]
pub enum Outcome {
    /// Intake answered directly.
    Answer(String),
    /// The reporter synthesised a report.
    Report(String),
    /// Every step completed without a reporting step; carries the findings.
    Exhausted(String),
}

impl Outcome {
    pub fn text(&self) -> &str {
        match self {
            Outcome::Answer(t) | Outcome::Report(t) | Outcome::Exhausted(t) => t,
        }
    }
}

/// Everything a caller gets back from a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub outcome: Outcome,
    pub state: WorkflowState,
    pub usage: TokenUsage,
    /// Nodes in execution order, excluding the final `Done`.
    pub path: Vec<Node>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intake_branches() {
        assert_eq!(transition(Node::Intake, Signal::Answered).unwrap(), Node::Done);
        assert_eq!(
            transition(Node::Intake, Signal::NeedsWorkflow).unwrap(),
            Node::Plan
        );
    }

    #[test]
    fn router_targets() {
        let cases = [
            (Route::Capability(Capability::Research), Node::Research),
            (Route::Capability(Capability::Coding), Node::Code),
            (Route::Capability(Capability::Reporting), Node::Report),
            (Route::NeedsReplanning, Node::Plan),
            (Route::Terminate, Node::Done),
        ];
        for (route, expected) in cases {
            assert_eq!(
                transition(Node::Route, Signal::Routed(route)).unwrap(),
                expected
            );
        }
    }

    #[test]
    fn workers_loop_back_to_router() {
        assert_eq!(transition(Node::Research, Signal::Advanced).unwrap(), Node::Route);
        assert_eq!(transition(Node::Code, Signal::Advanced).unwrap(), Node::Route);
        assert_eq!(transition(Node::Report, Signal::Reported).unwrap(), Node::Done);
        assert_eq!(transition(Node::Plan, Signal::Planned).unwrap(), Node::Route);
    }

    #[test]
    fn illegal_pairs_are_rejected() {
        assert!(matches!(
            transition(Node::Report, Signal::Advanced),
            Err(WorkflowError::IllegalTransition { from: Node::Report, .. })
        ));
        assert!(transition(Node::Done, Signal::Planned).is_err());
        assert!(transition(Node::Plan, Signal::Routed(Route::Terminate)).is_err());
    }

    #[test]
    fn node_names() {
        assert_eq!(Node::Research.to_string(), "research");
        assert_eq!(Node::Done.name(), "done");
    }

    #[test]
    fn outcome_serializes_with_kind() {
        let json = serde_json::to_value(Outcome::Report("r".to_string())).unwrap();
        assert_eq!(json["kind"], "report");
        assert_eq!(json["text"], "r");
    }
}
