/// Plan execution: id-cursor loop, dependency gating, bounded retries.
use std::{collections::HashMap, time::Duration};

use {
    serde::Serialize,
    serde_json::{Value, json},
    tokio::time::sleep,
    tracing::{debug, info, warn},
    url::Url,
};

use tidemark_planning::plan::{Plan, Step, StepCommand};

use crate::{
    actions::{ActionExecutor, ExecutionContext},
    readiness::{self, ReadinessPolicy},
};

/// Latest known state of a step within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepState {
    Running,
    Succeeded,
    Failed,
}

/// Outcome of one step attempt. Retried steps record one result per attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub step_id: String,
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
}

/// Aggregate of one run.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    /// True only when the run walked off the end of the plan. Budget
    /// exhaustion is never success, whatever the per-step results say.
    pub success: bool,
    /// Loop iterations consumed, dependency waits included.
    pub iterations: usize,
    /// Every recorded attempt, in execution order.
    pub results: Vec<ExecutionResult>,
    /// Data payloads of successful results, in execution order.
    pub data: Vec<Value>,
}

/// Engine tuning. The iteration budget bounds the whole run: dispatches,
/// retries, and dependency waits all consume it.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub iteration_budget: usize,
    /// Pause before re-checking an unmet dependency.
    pub dependency_wait: Duration,
    /// Pause between dispatched steps, bounding the action rate.
    pub step_delay: Duration,
    pub readiness: ReadinessPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            iteration_budget: 5,
            dependency_wait: Duration::from_millis(1000),
            step_delay: Duration::from_millis(500),
            readiness: ReadinessPolicy::default(),
        }
    }
}

/// What the loop decided to do with the current step this iteration.
enum Decision {
    Advance,
    Retry,
    Wait { dependency: String },
    Skip,
}

enum Gate {
    Ready,
    /// A dependency has not reached a terminal state yet.
    WaitOn(String),
    /// A dependency terminally failed; the step can never run.
    DependencyFailed(String),
}

fn gate(step: &Step, states: &HashMap<String, StepState>) -> Gate {
    for dep in &step.dependencies {
        match states.get(dep) {
            Some(StepState::Succeeded) => {}
            Some(StepState::Failed) => return Gate::DependencyFailed(dep.clone()),
            _ => return Gate::WaitOn(dep.clone()),
        }
    }
    Gate::Ready
}

pub struct ExecutionEngine {
    actions: Box<dyn ActionExecutor>,
    config: EngineConfig,
}

impl ExecutionEngine {
    pub fn new(actions: Box<dyn ActionExecutor>, config: EngineConfig) -> Self {
        Self { actions, config }
    }

    /// Run `plan` until it completes or the iteration budget runs out. Step
    /// handlers may run more than once (at-least-once retry semantics); the
    /// report keeps one result per attempt.
    pub async fn run(&self, plan: &Plan, context: &ExecutionContext) -> ExecutionReport {
        let mut states: HashMap<String, StepState> = HashMap::with_capacity(plan.steps.len());
        let mut results: Vec<ExecutionResult> = Vec::new();
        let mut cursor = plan.steps.first().map(|s| s.id.clone());
        let mut iterations = 0usize;

        while iterations < self.config.iteration_budget {
            let Some(step_id) = cursor.clone() else {
                break;
            };
            let Some(step) = plan.step(&step_id) else {
                warn!(step = %step_id, "cursor points at an unknown step, aborting run");
                break;
            };
            iterations += 1;

            let decision = match gate(step, &states) {
                Gate::WaitOn(dependency) => Decision::Wait { dependency },
                Gate::DependencyFailed(dependency) => {
                    states.insert(step_id.clone(), StepState::Failed);
                    results.push(ExecutionResult {
                        step_id: step_id.clone(),
                        success: false,
                        data: None,
                        error: Some(format!("dependency '{dependency}' failed")),
                    });
                    Decision::Skip
                }
                Gate::Ready => {
                    states.insert(step_id.clone(), StepState::Running);
                    debug!(step = %step_id, kind = %step.kind(), "dispatching step");
                    match self.dispatch(step, plan, context, &results).await {
                        Ok(data) => {
                            states.insert(step_id.clone(), StepState::Succeeded);
                            results.push(ExecutionResult {
                                step_id: step_id.clone(),
                                success: true,
                                data: Some(data),
                                error: None,
                            });
                            Decision::Advance
                        }
                        Err(e) => {
                            states.insert(step_id.clone(), StepState::Failed);
                            warn!(step = %step_id, error = %e, "step failed");
                            results.push(ExecutionResult {
                                step_id: step_id.clone(),
                                success: false,
                                data: None,
                                error: Some(e.to_string()),
                            });
                            if step.kind().retryable() {
                                Decision::Retry
                            } else {
                                Decision::Advance
                            }
                        }
                    }
                }
            };

            match decision {
                Decision::Wait { dependency } => {
                    debug!(step = %step_id, dependency = %dependency, "waiting on dependency");
                    sleep(self.config.dependency_wait).await;
                }
                Decision::Retry => {
                    sleep(self.config.step_delay).await;
                }
                Decision::Advance | Decision::Skip => {
                    cursor = plan.next_step_id(&step_id);
                    sleep(self.config.step_delay).await;
                }
            }
        }

        let success = cursor.is_none();
        let data: Vec<Value> = results.iter().filter(|r| r.success).filter_map(|r| r.data.clone()).collect();
        info!(success, iterations, results = results.len(), "plan run finished");
        ExecutionReport {
            success,
            iterations,
            results,
            data,
        }
    }

    async fn dispatch(
        &self,
        step: &Step,
        plan: &Plan,
        context: &ExecutionContext,
        results: &[ExecutionResult],
    ) -> anyhow::Result<Value> {
        match &step.command {
            StepCommand::Search { query, limit } => {
                let items = self.actions.execute_search(query, *limit).await?;
                Ok(Value::Array(items))
            }
            StepCommand::Navigate { url, link_text } => {
                let target = resolve_navigation_target(url.as_deref(), plan, context)?;
                Url::parse(&target).map_err(|e| anyhow::anyhow!("invalid navigation target '{target}': {e}"))?;
                self.actions.execute_navigation(&target, link_text.as_deref()).await?;
                readiness::wait_until_ready(self.config.readiness, || self.actions.navigation_ready()).await?;
                Ok(json!({ "url": target }))
            }
            StepCommand::Highlight { target, text } => {
                let count = self.actions.execute_highlight(target.as_deref(), text).await?;
                Ok(json!({ "count": count }))
            }
            StepCommand::Analyze { focus } => {
                let sources = results.iter().filter(|r| r.success && r.data.is_some()).count();
                Ok(json!({
                    "focus": focus,
                    "sources": sources,
                    "summary": format!("synthesized {sources} prior result set(s) for '{focus}'"),
                }))
            }
        }
    }
}

/// Explicit target first, then the plan's retrieval shortcuts, then the page
/// the agent is already on.
fn resolve_navigation_target(explicit: Option<&str>, plan: &Plan, context: &ExecutionContext) -> anyhow::Result<String> {
    explicit
        .map(str::to_string)
        .or_else(|| plan.shortcuts.first().cloned())
        .or_else(|| context.current_url.clone())
        .ok_or_else(|| anyhow::anyhow!("no navigation target available"))
}
