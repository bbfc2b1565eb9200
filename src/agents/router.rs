//! Picks the capability for the first pending plan step.
//!
//! Exactly one step is looked at per call. A label that maps to no
//! capability sends the run back to the planner instead of failing.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use super::NodeContext;
use crate::error::Result;
use crate::prompts::workflow as prompts;
use crate::state::WorkflowState;

/// The kinds of work a plan step can need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Research,
    Coding,
    Reporting,
}

impl Capability {
    pub fn label(&self) -> &'static str {
        match self {
            Capability::Research => "research",
            Capability::Coding => "coding",
            Capability::Reporting => "reporting",
        }
    }

    /// Map a classifier reply to a capability. Accepts a bare word, a word
    /// wrapped in quotes, fences or punctuation, or a JSON object with a
    /// `capability`, `label` or `nextAgent` field.
    pub fn from_label(raw: &str) -> Option<Capability> {
        let text = strip_fences(raw);
        let label = if text.starts_with('{') {
            let value: serde_json::Value = serde_json::from_str(text).ok()?;
            ["capability", "label", "nextAgent"]
                .iter()
                .find_map(|key| value.get(key).and_then(|v| v.as_str()))?
                .to_string()
        } else {
            text.to_string()
        };

        let word = label
            .split_whitespace()
            .next()?
            .trim_matches(|c: char| !c.is_alphanumeric() && c != '-' && c != '_')
            .to_lowercase();

        match word.as_str() {
            "research" | "researcher" | "search" | "web" | "web_scraper" | "web-scraper"
            | "web-scraper-agent" | "web-scrapper-agent" => Some(Capability::Research),
            "coding" | "code" | "coder" | "programming" => Some(Capability::Coding),
            "reporting" | "report" | "reporter" | "reporting-agent" | "summary"
            | "summarize" => Some(Capability::Reporting),
            _ => None,
        }
    }
}

/// The router's decision for the current plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Capability(Capability),
    /// The step fits no capability; ask the planner to rework it.
    NeedsReplanning,
    /// Nothing is pending.
    Terminate,
}

impl Route {
    pub fn from_label(raw: &str) -> Route {
        Capability::from_label(raw).map_or(Route::NeedsReplanning, Route::Capability)
    }
}

/// Produces a raw label for a step description.
#[async_trait]
pub trait StepClassifier: Send + Sync {
    async fn classify(&self, description: &str, ctx: &NodeContext<'_>) -> Result<String>;
}

/// Asks the generator to label the step.
pub struct LlmClassifier;

#[async_trait]
impl StepClassifier for LlmClassifier {
    async fn classify(&self, description: &str, ctx: &NodeContext<'_>) -> Result<String> {
        ctx.generate(prompts::ROUTER, description).await
    }
}

const RESEARCH_VERBS: &[&str] = &[
    "web", "research", "collect", "gather", "find", "search", "look", "identify", "investigate",
];
const CODING_VERBS: &[&str] = &[
    "code", "develop", "implement", "execute", "run", "compute", "calculate", "program", "script",
];
const REPORTING_VERBS: &[&str] = &[
    "summarize", "summarise", "report", "compile", "write", "draft", "present", "synthesize",
];

/// Offline classification on the step's leading verb.
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn label_for(description: &str) -> &'static str {
        let first = description
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();

        if RESEARCH_VERBS.contains(&first.as_str()) {
            Capability::Research.label()
        } else if CODING_VERBS.contains(&first.as_str()) {
            Capability::Coding.label()
        } else if REPORTING_VERBS.contains(&first.as_str()) {
            Capability::Reporting.label()
        } else {
            ""
        }
    }
}

#[async_trait]
impl StepClassifier for KeywordClassifier {
    async fn classify(&self, description: &str, _ctx: &NodeContext<'_>) -> Result<String> {
        Ok(Self::label_for(description).to_string())
    }
}

pub async fn run(state: &WorkflowState, ctx: &NodeContext<'_>) -> Result<Route> {
    let Some(step) = state.plan().and_then(|plan| plan.current()) else {
        info!("no pending steps");
        return Ok(Route::Terminate);
    };

    let label = ctx
        .providers()
        .classifier
        .classify(step.description(), ctx)
        .await?;
    let route = Route::from_label(&label);

    match route {
        Route::NeedsReplanning => warn!(
            step = step.description(),
            label = label.trim(),
            "step could not be classified, replanning"
        ),
        _ => info!(step = step.description(), ?route, "routed"),
    }
    Ok(route)
}

fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    for fence in ["```json", "```"] {
        if let Some(after) = trimmed.strip_prefix(fence)
            && let Some(inner) = after.strip_suffix("```")
        {
            return inner.trim();
        }
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_labels() {
        assert_eq!(Capability::from_label("research"), Some(Capability::Research));
        assert_eq!(Capability::from_label("coding"), Some(Capability::Coding));
        assert_eq!(Capability::from_label("reporting"), Some(Capability::Reporting));
    }

    #[test]
    fn labels_with_noise() {
        assert_eq!(Capability::from_label("  Research.\n"), Some(Capability::Research));
        assert_eq!(Capability::from_label("\"coding\""), Some(Capability::Coding));
        assert_eq!(Capability::from_label("**reporting**"), Some(Capability::Reporting));
        assert_eq!(
            Capability::from_label("```\nresearch\n```"),
            Some(Capability::Research)
        );
    }

    #[test]
    fn json_labels() {
        assert_eq!(
            Capability::from_label(r#"{"capability": "coding"}"#),
            Some(Capability::Coding)
        );
        assert_eq!(
            Capability::from_label("```json\n{\"nextAgent\": \"web-scrapper-agent\", \"task\": \"x\"}\n```"),
            Some(Capability::Research)
        );
        assert_eq!(
            Capability::from_label(r#"{"nextAgent": "reporting-agent"}"#),
            Some(Capability::Reporting)
        );
        assert_eq!(Capability::from_label(r#"{"other": "research"}"#), None);
        assert_eq!(Capability::from_label("{not json"), None);
    }

    #[test]
    fn unknown_and_empty_labels_replan() {
        assert_eq!(Route::from_label(""), Route::NeedsReplanning);
        assert_eq!(Route::from_label("   "), Route::NeedsReplanning);
        assert_eq!(Route::from_label("replan"), Route::NeedsReplanning);
        assert_eq!(Route::from_label("dance"), Route::NeedsReplanning);
    }

    #[test]
    fn keyword_classifier_uses_leading_verb() {
        assert_eq!(
            KeywordClassifier::label_for("Gather information about Node.js origins"),
            "research"
        );
        assert_eq!(KeywordClassifier::label_for("Implement a parser"), "coding");
        assert_eq!(KeywordClassifier::label_for("Summarize findings"), "reporting");
        assert_eq!(KeywordClassifier::label_for("Ponder the meaning of life"), "");
        assert_eq!(KeywordClassifier::label_for(""), "");
    }

    #[test]
    fn keyword_labels_round_trip_through_router() {
        for (step, expected) in [
            ("Find recent papers", Route::Capability(Capability::Research)),
            ("Run the benchmark", Route::Capability(Capability::Coding)),
            ("Write a summary", Route::Capability(Capability::Reporting)),
            ("Meditate", Route::NeedsReplanning),
        ] {
            assert_eq!(Route::from_label(KeywordClassifier::label_for(step)), expected);
        }
    }
}
