use foreman::error::PlanError;
use foreman::plan::Plan;

const PLANS: &[&str] = &[
    "Title: History of Node.js\n- [ ] Gather information about Node.js origins\n- [ ] Summarize findings\n",
    "- [ ] only step\n",
    "Title: Mixed\n- [x] done first\n- [ ] then this\n- [x] odd but legal\n- [ ] last\n",
    "Title: All done\n- [x] a\n- [x] b\n",
];

#[test]
fn render_round_trip_is_byte_identical() {
    for text in PLANS {
        let plan = Plan::parse(text).unwrap();
        let rendered = plan.render();
        assert_eq!(&rendered, text);

        let again = Plan::parse(&rendered).unwrap();
        assert_eq!(again, plan);
        assert_eq!(again.render(), rendered);
    }
}

#[test]
fn loose_input_renders_canonically() {
    let messy = "Here is the plan:\n\n```markdown\nTitle:   Trip  \n\n  * [X] Book flights\n-  [ ]   Find a hotel\n```\nGood luck!";
    let plan = Plan::parse(messy).unwrap();

    assert_eq!(
        plan.render(),
        "Title: Trip\n- [x] Book flights\n- [ ] Find a hotel\n"
    );
    assert_eq!(Plan::parse(&plan.render()).unwrap().render(), plan.render());
}

#[test]
fn zero_items_is_an_error() {
    assert_eq!(Plan::parse("Title: Empty"), Err(PlanError::NoItems));
    assert_eq!(Plan::parse(""), Err(PlanError::NoItems));
    assert_eq!(Plan::parse("- [ ]   \n- [x]"), Err(PlanError::NoItems));
}

#[test]
fn completion_is_monotonic_and_in_order() {
    let mut plan = Plan::parse("- [ ] one\n- [ ] two\n- [ ] three").unwrap();
    let total = plan.len();
    let mut flipped = Vec::new();
    let mut previous = plan.done_count();

    while !plan.is_complete() {
        let before = plan.clone();
        flipped.push(plan.complete_current().unwrap());
        assert_eq!(plan.done_count(), previous + 1);
        assert!(plan.done_count() <= total);
        assert!(plan.extends(&before));
        previous = plan.done_count();
    }

    assert_eq!(flipped, vec![0, 1, 2]);
    assert_eq!(plan.complete_current(), Err(PlanError::NothingPending));
    assert_eq!(plan.done_count(), total);
}

#[test]
fn exactly_one_marker_flips_per_completion() {
    let mut plan = Plan::parse("- [ ] a\n- [ ] b\n- [ ] c").unwrap();
    let before = plan.render();
    plan.complete_current().unwrap();
    let after = plan.render();

    let changed: Vec<(&str, &str)> = before
        .lines()
        .zip(after.lines())
        .filter(|(b, a)| b != a)
        .collect();
    assert_eq!(changed, vec![("- [ ] a", "- [x] a")]);
}

#[test]
fn replan_never_reverts_progress() {
    let mut plan = Plan::parse("Title: T\n- [ ] gather\n- [ ] vague thing\n- [ ] report").unwrap();
    plan.complete_current().unwrap();

    let fresh = Plan::parse("Title: Other\n- [x] claims to be done\n- [ ] search specifics\n- [ ] report").unwrap();
    let merged = plan.replan(fresh).unwrap();

    assert_eq!(
        merged.render(),
        "Title: T\n- [x] gather\n- [ ] search specifics\n- [ ] report\n"
    );
    assert!(merged.extends(&plan));
    assert_eq!(merged.current().unwrap().description(), "search specifics");
}

#[test]
fn display_matches_render() {
    let plan = Plan::parse(PLANS[0]).unwrap();
    assert_eq!(plan.to_string(), plan.render());
}
