/// Plan assembly: template selection, parameterization, advisory estimates.
use std::time::Duration;

use {chrono::Utc, tracing::debug, uuid::Uuid};

use crate::{
    analysis::{QueryAnalysis, Urgency},
    plan::{Plan, PlanKind, Priority, Step, StepCommand, StepKind},
    templates,
};

/// Planning failures. Callers usually degrade to [`Planner::fallback_plan`]
/// instead of giving up on the query.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("query is empty")]
    EmptyQuery,
    #[error("step '{step}' depends on '{dependency}' which does not precede it")]
    DependencyOrder { step: String, dependency: String },
}

/// Advisory duration per step kind.
fn estimated_step_time(kind: StepKind) -> Duration {
    match kind {
        StepKind::Search => Duration::from_secs(2),
        StepKind::Navigation => Duration::from_secs(3),
        StepKind::Highlight => Duration::from_secs(1),
        StepKind::Analysis => Duration::from_secs(4),
    }
}

fn priority_for(urgency: Urgency) -> Priority {
    match urgency {
        Urgency::High => Priority::High,
        Urgency::Normal => Priority::Normal,
        Urgency::Low => Priority::Low,
    }
}

#[derive(Debug, Default)]
pub struct Planner;

impl Planner {
    pub fn new() -> Self {
        Self
    }

    /// Build a plan for one analysis. Deterministic apart from the generated
    /// plan id and timestamp: the same analysis always yields the same steps.
    pub fn create_plan(&self, analysis: &QueryAnalysis) -> Result<Plan, PlanError> {
        if analysis.query.trim().is_empty() {
            return Err(PlanError::EmptyQuery);
        }
        let kind = templates::template_for(analysis.intent);
        let steps = templates::template_steps(kind, analysis);
        let plan = assemble(kind, analysis.query.clone(), priority_for(analysis.urgency), steps);
        if let Some((step, dependency)) = plan.dependency_violation() {
            return Err(PlanError::DependencyOrder { step, dependency });
        }
        debug!(plan = %plan.id, kind = %plan.kind, steps = plan.steps.len(), "assembled plan");
        Ok(plan)
    }

    /// Minimal search-then-navigate plan used when normal planning fails.
    /// Fully deterministic and independent of query analysis.
    pub fn fallback_plan(&self, query: &str) -> Plan {
        let steps = vec![
            Step {
                id: templates::STEP_SEARCH.to_string(),
                description: format!("search for '{query}'"),
                command: StepCommand::Search {
                    query: query.to_string(),
                    limit: 5,
                },
                dependencies: Vec::new(),
            },
            Step {
                id: templates::STEP_NAVIGATE.to_string(),
                description: "navigate to the best match".to_string(),
                command: StepCommand::Navigate {
                    url: None,
                    link_text: None,
                },
                dependencies: vec![templates::STEP_SEARCH.to_string()],
            },
        ];
        assemble(PlanKind::SearchNavigate, query.to_string(), Priority::Normal, steps)
    }
}

fn assemble(kind: PlanKind, query: String, priority: Priority, steps: Vec<Step>) -> Plan {
    let estimated_time: Duration = steps.iter().map(|s| estimated_step_time(s.kind())).sum();
    Plan {
        id: Uuid::new_v4().to_string(),
        query,
        kind,
        steps,
        priority,
        estimated_time,
        created_at: Utc::now(),
        shortcuts: Vec::new(),
    }
}
