//! The per-run workflow state and the deltas nodes produce.
//!
//! Nodes never mutate a [`WorkflowState`]. They read a snapshot and return a
//! [`StateUpdate`]; the engine calls [`WorkflowState::apply`] to build the
//! next snapshot, which is where the write-once and append-only rules are
//! enforced.

use serde::Serialize;

use crate::error::{Result, WorkflowError};
use crate::plan::Plan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowState {
    task: String,
    workflow_needed: Option<bool>,
    general_answer: Option<String>,
    plan: Option<Plan>,
    accumulated_content: String,
    code_artifact: Option<String>,
    report: Option<String>,
    messages: Vec<Message>,
}

impl WorkflowState {
    /// Fresh state for a task. The task is the first transcript entry.
    pub fn new(task: impl Into<String>) -> Self {
        let task = task.into();
        Self {
            messages: vec![Message::user(task.clone())],
            task,
            workflow_needed: None,
            general_answer: None,
            plan: None,
            accumulated_content: String::new(),
            code_artifact: None,
            report: None,
        }
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn workflow_needed(&self) -> Option<bool> {
        self.workflow_needed
    }

    pub fn general_answer(&self) -> Option<&str> {
        self.general_answer.as_deref()
    }

    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    pub fn accumulated_content(&self) -> &str {
        &self.accumulated_content
    }

    pub fn code_artifact(&self) -> Option<&str> {
        self.code_artifact.as_deref()
    }

    pub fn report(&self) -> Option<&str> {
        self.report.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Build the next snapshot from this one plus `update`.
    pub fn apply(&self, update: StateUpdate) -> Result<WorkflowState> {
        let mut next = self.clone();

        if let Some(needed) = update.workflow_needed {
            if self.workflow_needed.is_some() {
                return Err(violation("intake decision made twice"));
            }
            next.workflow_needed = Some(needed);
        }

        if let Some(answer) = update.general_answer {
            if next.workflow_needed != Some(false) || self.general_answer.is_some() {
                return Err(violation("general answer without a direct-answer decision"));
            }
            next.general_answer = Some(answer);
        }

        if let Some(plan) = update.plan {
            if next.workflow_needed != Some(true) {
                return Err(violation("plan set on a direct-answer run"));
            }
            if let Some(previous) = &self.plan
                && !plan.extends(previous)
            {
                return Err(violation("plan update reverts completed steps"));
            }
            next.plan = Some(plan);
        }

        next.accumulated_content.push_str(&update.append_content);

        if let Some(code) = update.code_artifact {
            next.code_artifact = Some(code);
        }

        if let Some(report) = update.report {
            if self.report.is_some() {
                return Err(violation("report set twice"));
            }
            next.report = Some(report);
        }

        next.messages.extend(update.messages);
        Ok(next)
    }
}

fn violation(what: &str) -> WorkflowError {
    WorkflowError::Invariant(what.to_string())
}

/// A partial update returned by a node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateUpdate {
    pub workflow_needed: Option<bool>,
    pub general_answer: Option<String>,
    pub plan: Option<Plan>,
    pub append_content: String,
    pub code_artifact: Option<String>,
    pub report: Option<String>,
    pub messages: Vec<Message>,
}

impl StateUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn workflow_needed(mut self, needed: bool) -> Self {
        self.workflow_needed = Some(needed);
        self
    }

    pub fn general_answer(mut self, answer: impl Into<String>) -> Self {
        self.general_answer = Some(answer.into());
        self
    }

    pub fn plan(mut self, plan: Plan) -> Self {
        self.plan = Some(plan);
        self
    }

    pub fn append(mut self, content: impl AsRef<str>) -> Self {
        self.append_content.push_str(content.as_ref());
        self
    }

    pub fn code_artifact(mut self, code: impl Into<String>) -> Self {
        self.code_artifact = Some(code.into());
        self
    }

    pub fn report(mut self, report: impl Into<String>) -> Self {
        self.report = Some(report.into());
        self
    }

    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }
}
