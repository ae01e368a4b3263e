/// Plan, step, and typed step-command model.
use std::time::Duration;

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

/// Step categories. Search and navigation get re-attempted on failure;
/// everything else is skipped past.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Search,
    Navigation,
    Highlight,
    Analysis,
}

impl StepKind {
    /// Kinds the executor re-attempts after a failure.
    pub fn retryable(self) -> bool {
        matches!(self, Self::Search | Self::Navigation)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Navigation => "navigation",
            Self::Highlight => "highlight",
            Self::Analysis => "analysis",
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a step does, with its parameters. A closed set: execution matches on
/// it exhaustively, so there is no string-keyed handler lookup to go stale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepCommand {
    Search {
        query: String,
        limit: usize,
    },
    /// `url` explicit target; falls back to plan shortcuts, then the current
    /// page, at execution time.
    Navigate {
        url: Option<String>,
        link_text: Option<String>,
    },
    Highlight {
        target: Option<String>,
        text: String,
    },
    Analyze {
        focus: String,
    },
}

impl StepCommand {
    pub fn kind(&self) -> StepKind {
        match self {
            Self::Search { .. } => StepKind::Search,
            Self::Navigate { .. } => StepKind::Navigation,
            Self::Highlight { .. } => StepKind::Highlight,
            Self::Analyze { .. } => StepKind::Analysis,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Template-assigned id, unique within the plan.
    pub id: String,
    pub description: String,
    pub command: StepCommand,
    /// Ids of steps that must succeed first. Templates only emit backward
    /// references.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl Step {
    pub fn kind(&self) -> StepKind {
        self.command.kind()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
}

/// Which template produced a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    Basic,
    SearchNavigate,
    DeepAnalysis,
}

impl PlanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::SearchNavigate => "search_navigate",
            Self::DeepAnalysis => "deep_analysis",
        }
    }
}

impl std::fmt::Display for PlanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One query's ordered, dependency-annotated steps. Built fresh per query and
/// never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub query: String,
    pub kind: PlanKind,
    pub steps: Vec<Step>,
    pub priority: Priority,
    /// Advisory total from the per-kind duration table. Not a deadline.
    pub estimated_time: Duration,
    pub created_at: DateTime<Utc>,
    /// Candidate URLs contributed by memory retrieval. Navigation falls back
    /// to the first one when a step carries no explicit target.
    #[serde(default)]
    pub shortcuts: Vec<String>,
}

impl Plan {
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Id of the step after `id` in plan order.
    pub fn next_step_id(&self, id: &str) -> Option<String> {
        let index = self.steps.iter().position(|s| s.id == id)?;
        self.steps.get(index + 1).map(|s| s.id.clone())
    }

    /// First dependency edge that points forward or nowhere, if any.
    pub fn dependency_violation(&self) -> Option<(String, String)> {
        let mut seen: Vec<&str> = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            for dep in &step.dependencies {
                if !seen.contains(&dep.as_str()) {
                    return Some((step.id.clone(), dep.clone()));
                }
            }
            seen.push(step.id.as_str());
        }
        None
    }
}
