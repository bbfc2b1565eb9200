//! The checklist plan shared by every node of a run.
//!
//! Text format:
//!
//! ```text
//! Title: Node.js history
//! - [x] Gather information about Node.js origins
//! - [ ] Summarize findings
//! ```
//!
//! The cursor always points at the first pending step. Workers advance it
//! with [`Plan::complete_current`], which flips exactly one marker.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::error::PlanError;

const TITLE_PREFIX: &str = "Title:";
const PENDING_MARKER: &str = "[ ]";
const DONE_MARKERS: &[&str] = &["[x]", "[X]"];

/// One checklist entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStep {
    description: String,
    done: bool,
}

impl PlanStep {
    pub fn pending(description: impl Into<String>) -> Self {
        Self {
            description: normalize(&description.into()),
            done: false,
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}

/// An ordered checklist with an optional title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    title: Option<String>,
    steps: Vec<PlanStep>,
    cursor: usize,
}

impl Plan {
    /// Build an all-pending plan. Fails when there are no usable items.
    pub fn new<I, S>(title: Option<String>, items: I) -> Result<Self, PlanError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let steps: Vec<PlanStep> = items
            .into_iter()
            .map(PlanStep::pending)
            .filter(|s| !s.description.is_empty())
            .collect();
        Self::from_steps(title.map(|t| normalize(&t)), steps)
    }

    fn from_steps(title: Option<String>, steps: Vec<PlanStep>) -> Result<Self, PlanError> {
        if steps.is_empty() {
            return Err(PlanError::NoItems);
        }
        let mut plan = Self {
            title,
            steps,
            cursor: 0,
        };
        plan.cursor = plan.next_pending_from(0);
        Ok(plan)
    }

    /// Parse checklist text. Blank lines, code fences and any prose around
    /// the checklist are ignored.
    pub fn parse(text: &str) -> Result<Self, PlanError> {
        let mut title = None;
        let mut steps = Vec::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with("```") {
                continue;
            }

            if let Some(rest) = line.strip_prefix(TITLE_PREFIX) {
                if title.is_none() && steps.is_empty() {
                    title = Some(normalize(rest));
                } else {
                    debug!(line, "ignoring extra title line");
                }
                continue;
            }

            match parse_item(line) {
                Some(step) => steps.push(step),
                None => debug!(line, "ignoring non-checklist line"),
            }
        }

        Self::from_steps(title, steps)
    }

    /// Canonical text form. `Plan::parse(&p.render())` yields `p` again.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(title) = &self.title {
            out.push_str(TITLE_PREFIX);
            out.push(' ');
            out.push_str(title);
            out.push('\n');
        }
        for step in &self.steps {
            let marker = if step.done { "[x]" } else { PENDING_MARKER };
            out.push_str(&format!("- {} {}\n", marker, step.description));
        }
        out
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Index of the first pending step, if any.
    pub fn current_index(&self) -> Option<usize> {
        (self.cursor < self.steps.len()).then_some(self.cursor)
    }

    /// The first pending step, if any.
    pub fn current(&self) -> Option<&PlanStep> {
        self.steps.get(self.cursor)
    }

    pub fn pending(&self) -> impl Iterator<Item = &PlanStep> {
        self.steps.iter().filter(|s| !s.done)
    }

    pub fn done_count(&self) -> usize {
        self.steps.iter().filter(|s| s.done).count()
    }

    pub fn is_complete(&self) -> bool {
        self.current_index().is_none()
    }

    /// Mark the current step done and move the cursor to the next pending
    /// one. Returns the index that flipped.
    pub fn complete_current(&mut self) -> Result<usize, PlanError> {
        let idx = self.current_index().ok_or(PlanError::NothingPending)?;
        self.steps[idx].done = true;
        self.cursor = self.next_pending_from(idx + 1);
        Ok(idx)
    }

    /// Merge a freshly generated plan into this one: completed steps stay
    /// where they are and the pending tail is replaced by the fresh plan's
    /// pending items.
    pub fn replan(&self, fresh: Plan) -> Result<Plan, PlanError> {
        let mut steps: Vec<PlanStep> = self.steps[..self.cursor].to_vec();
        steps.extend(self.steps[self.cursor..].iter().filter(|s| s.done).cloned());
        let before = steps.len();
        steps.extend(fresh.steps.into_iter().filter(|s| !s.done));
        if steps.len() == before {
            return Err(PlanError::NoItems);
        }
        let title = self.title.clone().or(fresh.title);
        Self::from_steps(title, steps)
    }

    /// True when `self` is a legal successor of `earlier`: the completed
    /// prefix is untouched and no completed step was lost.
    pub fn extends(&self, earlier: &Plan) -> bool {
        self.steps.len() >= earlier.cursor
            && self.steps[..earlier.cursor] == earlier.steps[..earlier.cursor]
            && self.done_count() >= earlier.done_count()
    }

    fn next_pending_from(&self, start: usize) -> usize {
        self.steps[start.min(self.steps.len())..]
            .iter()
            .position(|s| !s.done)
            .map_or(self.steps.len(), |offset| start + offset)
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn parse_item(line: &str) -> Option<PlanStep> {
    let rest = line
        .strip_prefix('-')
        .or_else(|| line.strip_prefix('*'))?
        .trim_start();

    let (done, rest) = if let Some(rest) = rest.strip_prefix(PENDING_MARKER) {
        (false, rest)
    } else {
        let rest = DONE_MARKERS.iter().find_map(|m| rest.strip_prefix(m))?;
        (true, rest)
    };

    let description = normalize(rest);
    if description.is_empty() {
        return None;
    }
    Some(PlanStep { description, done })
}

/// Single line, no surrounding whitespace.
fn normalize(text: &str) -> String {
    text.replace(['\r', '\n'], " ").trim().to_string()
}
