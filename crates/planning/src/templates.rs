/// The closed set of plan templates and their fixed step graphs.
use crate::{
    analysis::{Complexity, Intent, QueryAnalysis},
    plan::{PlanKind, Step, StepCommand},
};

/// Fixed step ids, shared with execution through recorded results.
pub const STEP_SEARCH: &str = "search";
pub const STEP_NAVIGATE: &str = "navigate";
pub const STEP_ANALYZE: &str = "analyze";
pub const STEP_HIGHLIGHT: &str = "highlight";

/// Template chosen for an intent.
pub fn template_for(intent: Intent) -> PlanKind {
    match intent {
        Intent::Navigate => PlanKind::SearchNavigate,
        Intent::Analyze => PlanKind::DeepAnalysis,
        Intent::Lookup => PlanKind::Basic,
    }
}

/// Search result cap per complexity tier.
pub fn search_limit(complexity: Complexity) -> usize {
    match complexity {
        Complexity::Simple => 5,
        Complexity::Moderate => 8,
        Complexity::Complex => 12,
    }
}

/// Instantiate a template for one analysis. Step ids and dependency edges are
/// fixed per template; only the parameters vary with the query.
pub fn template_steps(kind: PlanKind, analysis: &QueryAnalysis) -> Vec<Step> {
    let query = analysis.query.clone();
    let limit = search_limit(analysis.complexity);
    match kind {
        PlanKind::Basic => vec![search_step(query, limit)],
        PlanKind::SearchNavigate => vec![
            search_step(query.clone(), limit),
            Step {
                id: STEP_NAVIGATE.to_string(),
                description: format!("navigate to the best match for '{query}'"),
                command: StepCommand::Navigate {
                    url: None,
                    link_text: None,
                },
                dependencies: vec![STEP_SEARCH.to_string()],
            },
        ],
        PlanKind::DeepAnalysis => {
            let highlight_text = analysis.entities.first().cloned().unwrap_or_else(|| query.clone());
            vec![
                search_step(query.clone(), limit),
                Step {
                    id: STEP_ANALYZE.to_string(),
                    description: format!("analyze results for '{query}'"),
                    command: StepCommand::Analyze { focus: query.clone() },
                    dependencies: vec![STEP_SEARCH.to_string()],
                },
                Step {
                    id: STEP_HIGHLIGHT.to_string(),
                    description: format!("highlight passages about '{highlight_text}'"),
                    command: StepCommand::Highlight {
                        target: None,
                        text: highlight_text,
                    },
                    dependencies: vec![STEP_ANALYZE.to_string()],
                },
            ]
        }
    }
}

fn search_step(query: String, limit: usize) -> Step {
    Step {
        id: STEP_SEARCH.to_string(),
        description: format!("search for '{query}'"),
        command: StepCommand::Search { query, limit },
        dependencies: Vec::new(),
    }
}
