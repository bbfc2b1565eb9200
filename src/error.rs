//! Error types for the workflow engine and its providers.

use std::time::Duration;

use thiserror::Error;

use crate::engine::Node;

/// Failure of an external provider call (generation or search).
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("provider returned empty content")]
    EmptyResponse,

    #[error("failed to decode provider response: {0}")]
    Decode(String),

    #[error("scripted provider exhausted (called {0} times)")]
    Exhausted(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Problems with a plan's text or with advancing it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("plan contains no checklist items")]
    NoItems,

    #[error("plan has no pending step")]
    NothingPending,
}

/// Everything that can abort a workflow run.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("provider error in {node}: {source}")]
    Provider {
        node: Node,
        #[source]
        source: ProviderError,
    },

    #[error("planner produced a malformed plan: {reason}\nraw: {raw}")]
    MalformedPlan { reason: PlanError, raw: String },

    #[error("{node} invoked with no pending plan step")]
    EmptyPlanAdvance { node: Node },

    #[error("workflow stalled after {steps} steps ({reason})")]
    WorkflowStalled { steps: usize, reason: String },

    #[error("{what} timed out after {after:?}")]
    Timeout { what: String, after: Duration },

    #[error("run cancelled")]
    Cancelled,

    #[error("illegal transition from {from} on {signal}")]
    IllegalTransition { from: Node, signal: String },

    #[error("state invariant violated: {0}")]
    Invariant(String),
}

impl WorkflowError {
    pub fn provider(node: Node, source: ProviderError) -> Self {
        Self::Provider { node, source }
    }
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
