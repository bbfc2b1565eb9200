use crate::plan::Plan;

/// Emitted by the intake model when a direct answer is not enough.
pub const WORKFLOW_SENTINEL: &str = "WORKFLOW_NEEDED";

pub const INTAKE: &str = "Analyze the following user query. If it can be answered directly and concisely without needing a multi-step workflow (planning, web research, coding, reporting), provide that direct answer. Otherwise, respond with only 'WORKFLOW_NEEDED' to indicate that a full workflow is required.";

const PLANNER_INTRO: &str = "You are a Planner. Break the user's request down into a clear, actionable plan written as a markdown TODO list.";
const PLANNER_CAPABILITIES: &[&str] = &[
    "gather relevant information from the internet",
    "write or run code",
    "summarize the gathered information into a report",
];
const PLANNER_RULES: &[&str] = &[
    "Use general language to describe steps. Do not mention specific tools or agents.",
    "Decompose the request into logical, sequential steps.",
    "Each step must be something exactly one of the capabilities above can do.",
    "Format the response strictly as a markdown TODO list.",
    "Do not include any explanations, reasoning, or extra text.",
];
const PLANNER_EXAMPLE: &str = "Title: <Concise title of the plan>\n- [ ] <Step 1>\n- [ ] <Step 2>\n- [ ] ...";

pub const ROUTER: &str = "Classify the plan step you are given by the kind of work it requires. Answer with exactly one word:\n- research: the step gathers information (searching, looking up, collecting facts)\n- coding: the step writes, runs or debugs code or computes something\n- reporting: the step summarizes, compiles or writes up what was gathered\n- replan: the step fits none of the above or is too vague to act on\nOutput only the word.";

pub const REPORTER: &str = "You are a professional reporter. Compile all the provided information into a clear, polished, and concise report.";

pub const CODER: &str = "You are a software engineer. Write the code that accomplishes the step you are given, using the task and findings for context. Respond with the code only, in a single fenced code block.";

/// System instruction for the planner.
pub fn planner() -> String {
    let capabilities = PLANNER_CAPABILITIES
        .iter()
        .map(|c| format!("- {}", c))
        .collect::<Vec<_>>()
        .join("\n");
    let rules = PLANNER_RULES
        .iter()
        .map(|r| format!("- {}", r))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{PLANNER_INTRO}\n\nSteps can only be carried out by these capabilities:\n{capabilities}\n\nInstructions:\n{rules}\n\nExample output:\n{PLANNER_EXAMPLE}\n"
    )
}

/// User content for a replanning round: the task, the plan so far and the
/// step the router could not place.
pub fn replan_request(task: &str, plan: &Plan) -> String {
    let stuck = plan
        .current()
        .map(|s| s.description())
        .unwrap_or_default();
    format!(
        "{task}\n\nCurrent plan:\n{plan}\nThe step \"{stuck}\" could not be assigned to a capability. Rewrite the remaining, unfinished steps so each one can be carried out by exactly one capability. List only the remaining steps."
    )
}

/// User content for the coding backend.
pub fn code_request(task: &str, step: &str, findings: &str) -> String {
    if findings.trim().is_empty() {
        format!("Task: {task}\nStep: {step}")
    } else {
        format!("Task: {task}\nStep: {step}\n\nFindings so far:\n{findings}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intake_mentions_sentinel() {
        assert!(INTAKE.contains(WORKFLOW_SENTINEL));
    }

    #[test]
    fn planner_lists_capabilities_and_rules() {
        let prompt = planner();
        for capability in PLANNER_CAPABILITIES {
            assert!(prompt.contains(capability));
        }
        for rule in PLANNER_RULES {
            assert!(prompt.contains(rule));
        }
        assert!(prompt.contains("- [ ] <Step 1>"));
        assert!(prompt.contains("Title:"));
    }

    #[test]
    fn router_names_every_label() {
        for label in ["research", "coding", "reporting", "replan"] {
            assert!(ROUTER.contains(label));
        }
    }

    #[test]
    fn replan_request_names_stuck_step() {
        let mut plan = Plan::parse("- [ ] look around\n- [ ] ponder deeply").unwrap();
        plan.complete_current().unwrap();
        let request = replan_request("learn about owls", &plan);
        assert!(request.starts_with("learn about owls"));
        assert!(request.contains("- [x] look around"));
        assert!(request.contains("\"ponder deeply\""));
    }

    #[test]
    fn code_request_omits_empty_findings() {
        assert!(!code_request("t", "s", "  ").contains("Findings"));
        assert!(code_request("t", "s", "facts").contains("Findings so far:\nfacts"));
    }
}
