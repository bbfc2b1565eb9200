use std::sync::Arc;

use foreman::agents::NodeContext;
use foreman::agents::router::{self, Capability, KeywordClassifier, Route};
use foreman::engine::Node;
use foreman::engine::workflow::{Providers, WorkflowConfig};
use foreman::events::{Event, EventBus};
use foreman::plan::Plan;
use foreman::provider::mock::{MockGenerator, MockSearcher};
use foreman::state::{StateUpdate, WorkflowState};

fn planned(text: &str) -> WorkflowState {
    WorkflowState::new("task")
        .apply(
            StateUpdate::default()
                .workflow_needed(true)
                .plan(Plan::parse(text).unwrap()),
        )
        .unwrap()
}

fn providers(generator: &Arc<MockGenerator>) -> Providers {
    Providers::new(generator.clone(), Arc::new(MockSearcher::new(vec![])))
}

#[tokio::test]
async fn classifies_only_the_first_pending_step() {
    let generator = Arc::new(MockGenerator::new(["coding"]));
    let providers = providers(&generator);
    let events = EventBus::default();
    let config = WorkflowConfig::default();
    let ctx = NodeContext::new(Node::Route, &providers, &events, &config);

    let state = planned("- [x] Find facts\n- [ ] Compute the totals\n- [ ] Summarize");
    let route = router::run(&state, &ctx).await.unwrap();

    assert_eq!(route, Route::Capability(Capability::Coding));
    let calls = generator.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].user, "Compute the totals");
}

#[tokio::test]
async fn complete_plan_terminates_without_a_call() {
    let generator = Arc::new(MockGenerator::new(Vec::<String>::new()));
    let providers = providers(&generator);
    let events = EventBus::default();
    let config = WorkflowConfig::default();
    let ctx = NodeContext::new(Node::Route, &providers, &events, &config);

    let state = planned("- [x] Find facts\n- [x] Summarize");
    assert_eq!(router::run(&state, &ctx).await.unwrap(), Route::Terminate);

    let no_plan = WorkflowState::new("task");
    assert_eq!(router::run(&no_plan, &ctx).await.unwrap(), Route::Terminate);

    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn structured_and_noisy_labels() {
    let cases = [
        ("```json\n{\"nextAgent\": \"web-scraper-agent\"}\n```", Route::Capability(Capability::Research)),
        ("{\"capability\": \"reporting\"}", Route::Capability(Capability::Reporting)),
        ("Coding.", Route::Capability(Capability::Coding)),
        ("replan", Route::NeedsReplanning),
        ("I am not sure what this step means", Route::NeedsReplanning),
    ];

    for (reply, expected) in cases {
        let generator = Arc::new(MockGenerator::new([reply]));
        let providers = providers(&generator);
        let events = EventBus::default();
        let config = WorkflowConfig::default();
        let ctx = NodeContext::new(Node::Route, &providers, &events, &config);

        let route = router::run(&planned("- [ ] Do the thing"), &ctx).await.unwrap();
        assert_eq!(route, expected, "reply: {reply}");
    }
}

#[tokio::test]
async fn keyword_classifier_needs_no_generator() {
    let generator = Arc::new(MockGenerator::new(Vec::<String>::new()));
    let providers = providers(&generator).with_classifier(Arc::new(KeywordClassifier));
    let events = EventBus::default();
    let config = WorkflowConfig::default();
    let ctx = NodeContext::new(Node::Route, &providers, &events, &config);

    for (step, expected) in [
        ("- [ ] Research Node.js origins", Route::Capability(Capability::Research)),
        ("- [ ] Develop a prototype", Route::Capability(Capability::Coding)),
        ("- [ ] Draft the final summary", Route::Capability(Capability::Reporting)),
        ("- [ ] Contemplate", Route::NeedsReplanning),
    ] {
        assert_eq!(router::run(&planned(step), &ctx).await.unwrap(), expected);
    }
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn classifier_output_is_streamed_as_route_chunks() {
    let generator = Arc::new(MockGenerator::new(["research"]));
    let providers = providers(&generator);
    let events = EventBus::default();
    let mut rx = events.subscribe();
    let config = WorkflowConfig::default();
    let ctx = NodeContext::new(Node::Route, &providers, &events, &config);

    router::run(&planned("- [ ] Find facts"), &ctx).await.unwrap();

    match rx.try_recv().unwrap() {
        Event::Chunk { node, text } => {
            assert_eq!(node, Node::Route);
            assert_eq!(text, "research");
        }
        other => panic!("expected chunk, got {other:?}"),
    }
}
