use std::future::{self, Future};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use super::{Engine, Node, Outcome, RunReport, Signal, transition};
use crate::agents::coder::{CodeBackend, StubBackend};
use crate::agents::router::{LlmClassifier, Route, StepClassifier};
use crate::agents::{NodeContext, coder, intake, planner, reporter, researcher, router};
use crate::error::{Result, WorkflowError};
use crate::events::{Event, EventBus};
use crate::provider::{Generator, Searcher, TokenUsage};
use crate::state::{StateUpdate, WorkflowState};

#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Node executions allowed per run, including replanning rounds.
    pub max_steps: usize,
    /// Router-requested replans allowed per run.
    pub max_replans: usize,
    /// Hits requested per research step.
    pub search_results: usize,
    pub call_timeout: Duration,
    pub run_deadline: Duration,
    /// Stream generations chunk by chunk onto the event bus.
    pub stream: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_steps: 32,
            max_replans: 2,
            search_results: 1,
            call_timeout: Duration::from_secs(60),
            run_deadline: Duration::from_secs(300),
            stream: true,
        }
    }
}

/// The external services a run depends on, injected at construction.
#[derive(Clone)]
pub struct Providers {
    pub generator: Arc<dyn Generator>,
    pub searcher: Arc<dyn Searcher>,
    pub classifier: Arc<dyn StepClassifier>,
    pub coder: Arc<dyn CodeBackend>,
}

impl Providers {
    /// Model-backed routing and the stub coder.
    pub fn new(generator: Arc<dyn Generator>, searcher: Arc<dyn Searcher>) -> Self {
        Self {
            generator,
            searcher,
            classifier: Arc::new(LlmClassifier),
            coder: Arc::new(StubBackend),
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn StepClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_coder(mut self, coder: Arc<dyn CodeBackend>) -> Self {
        self.coder = coder;
        self
    }
}

/// Drives Intake → Plan → Route → worker → Route … → Done, one node at a
/// time, merging each node's update into a fresh state snapshot.
pub struct WorkflowEngine {
    providers: Providers,
    events: Arc<EventBus>,
    config: WorkflowConfig,
    session_usage: TokenUsage,
    last_state: Option<WorkflowState>,
}

impl WorkflowEngine {
    pub fn new(providers: Providers, config: WorkflowConfig) -> Self {
        Self::with_events(providers, config, Arc::new(EventBus::default()))
    }

    pub fn with_events(providers: Providers, config: WorkflowConfig, events: Arc<EventBus>) -> Self {
        Self {
            providers,
            events,
            config,
            session_usage: TokenUsage::default(),
            last_state: None,
        }
    }

    pub fn events(&self) -> Arc<EventBus> {
        Arc::clone(&self.events)
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Budgets can be changed between runs.
    pub fn config_mut(&mut self) -> &mut WorkflowConfig {
        &mut self.config
    }

    /// Swap the generator. The next run uses the new one.
    pub fn set_generator(&mut self, generator: Arc<dyn Generator>) {
        self.providers.generator = generator;
    }

    pub fn set_classifier(&mut self, classifier: Arc<dyn StepClassifier>) {
        self.providers.classifier = classifier;
    }

    pub fn providers(&self) -> &Providers {
        &self.providers
    }

    /// Tokens spent across every run of this engine.
    pub fn session_usage(&self) -> TokenUsage {
        self.session_usage
    }

    /// The final snapshot of the most recent run, failed or not.
    pub fn last_state(&self) -> Option<&WorkflowState> {
        self.last_state.as_ref()
    }

    /// Run a task, giving up early when `cancel` resolves. A cancelled run
    /// still records its usage and the snapshot it reached.
    pub async fn run_until<F>(&mut self, task: &str, cancel: F) -> Result<RunReport>
    where
        F: Future<Output = ()> + Send,
    {
        let mut state = WorkflowState::new(task);
        let mut usage = TokenUsage::default();
        let mut path = Vec::new();
        let deadline = self.config.run_deadline;

        info!(task, "run started");
        let result = {
            let run = tokio::time::timeout(deadline, self.execute(&mut state, &mut usage, &mut path));
            tokio::select! {
                finished = run => finished.unwrap_or_else(|_| {
                    Err(WorkflowError::Timeout {
                        what: "workflow run".to_string(),
                        after: deadline,
                    })
                }),
                () = cancel => Err(WorkflowError::Cancelled),
            }
        };

        self.session_usage.add(usage);
        self.last_state = Some(state.clone());

        match result {
            Ok(outcome) => {
                info!(
                    steps = path.len(),
                    tokens = usage.total(),
                    "run finished"
                );
                self.events.emit(Event::Finished {
                    outcome: outcome.clone(),
                });
                Ok(RunReport {
                    outcome,
                    state,
                    usage,
                    path,
                })
            }
            Err(err) => {
                warn!(error = %err, steps = path.len(), "run failed");
                self.events.emit(Event::Failed {
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        state: &mut WorkflowState,
        usage: &mut TokenUsage,
        path: &mut Vec<Node>,
    ) -> Result<Outcome> {
        let mut node = Node::Intake;
        let mut replans = 0;

        while node != Node::Done {
            if path.len() >= self.config.max_steps {
                return Err(WorkflowError::WorkflowStalled {
                    steps: path.len(),
                    reason: format!("step budget of {} exhausted", self.config.max_steps),
                });
            }
            path.push(node);
            self.events.emit(Event::NodeEntered { node });

            let ctx = NodeContext::new(node, &self.providers, &self.events, &self.config);
            let result = self.step(node, state, &ctx).await;
            usage.add(ctx.usage());
            let (update, signal) = result?;

            if signal == Signal::Routed(Route::NeedsReplanning) {
                replans += 1;
                if replans > self.config.max_replans {
                    return Err(WorkflowError::WorkflowStalled {
                        steps: path.len(),
                        reason: format!(
                            "replan budget of {} exhausted",
                            self.config.max_replans
                        ),
                    });
                }
            }

            let plan_changed = update.plan.is_some();
            *state = state.apply(update)?;
            if plan_changed && let Some(plan) = state.plan() {
                self.events.emit(Event::PlanUpdated { plan: plan.clone() });
            }
            self.events.emit(Event::NodeFinished { node });

            let next = transition(node, signal)?;
            info!(node = %node, next = %next, "transition");
            node = next;
        }

        Ok(outcome(state))
    }

    async fn step(
        &self,
        node: Node,
        state: &WorkflowState,
        ctx: &NodeContext<'_>,
    ) -> Result<(StateUpdate, Signal)> {
        match node {
            Node::Intake => {
                let update = intake::run(state, ctx).await?;
                let signal = if update.workflow_needed == Some(false) {
                    Signal::Answered
                } else {
                    Signal::NeedsWorkflow
                };
                Ok((update, signal))
            }
            Node::Plan => Ok((planner::run(state, ctx).await?, Signal::Planned)),
            Node::Route => {
                let route = router::run(state, ctx).await?;
                Ok((StateUpdate::default(), Signal::Routed(route)))
            }
            Node::Research => Ok((researcher::run(state, ctx).await?, Signal::Advanced)),
            Node::Code => Ok((coder::run(state, ctx).await?, Signal::Advanced)),
            Node::Report => Ok((reporter::run(state, ctx).await?, Signal::Reported)),
            Node::Done => Err(WorkflowError::Invariant(
                "done node has no work".to_string(),
            )),
        }
    }
}

#[async_trait]
impl Engine for WorkflowEngine {
    async fn run(&mut self, task: &str) -> Result<RunReport> {
        self.run_until(task, future::pending()).await
    }
}

/// The terminal payload for a state that reached `Done`.
fn outcome(state: &WorkflowState) -> Outcome {
    if let Some(report) = state.report() {
        Outcome::Report(report.to_string())
    } else if let Some(answer) = state.general_answer() {
        Outcome::Answer(answer.to_string())
    } else {
        Outcome::Exhausted(state.accumulated_content().to_string())
    }
}
