//! WorkflowOrchestrator: event-driven execution of step graphs.
//!
//! A run is driven by one coordinator that owns the `ExecutionContext`. Each
//! scheduled step runs as its own task in a `tokio::JoinSet` (so fan-out
//! siblings execute concurrently) and reports back with its output or error.
//! The coordinator records outputs, registers fan-out completions, picks the
//! next steps (static edges or navigation) and gates fan-in steps on their
//! group's readiness signal.
//!
//! # Run lifecycle
//!
//! 1. Register a cancellation token under a fresh run id.
//! 2. Schedule the entry step.
//! 3. On each task completion: record output, advance edges, or apply
//!    `on_error` / fail the run.
//! 4. When no work remains: `Completed` with the last output that reached a
//!    `user` edge, or `Failed` if a fan-in step is still waiting.
//! 5. Cancellation and the optional run deadline abort all in-flight tasks.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use conductor_types::config::OrchestratorConfig;
use conductor_types::error::ErrorKind;
use conductor_types::event::RunEvent;
use conductor_types::invocation::InvocationResult;
use conductor_types::workflow::{
    NavigationMode, NavigationRecord, RunStatus, StepDefinition, StepKind, USER_EDGE,
    WorkflowDefinition,
};
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::context::{parse_text, ExecutionContext};
use super::definition::{validate_definition, WorkflowError};
use super::fan_group::FanGroupTracker;
use super::navigation::{AgentChoice, NavigationEngine};
use super::retry::RetryHandler;
use super::step_runner::{StepError, StepRunner};
use crate::agent::AgentRegistry;
use crate::event::EventBus;
use crate::router::{ActionRouter, SubWorkflowError, SubWorkflowRunner};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Errors that prevent a run from starting.
///
/// Failures during a run are reported through [`RunReport`] instead.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("workflow '{0}' is not registered")]
    WorkflowNotFound(String),

    #[error(transparent)]
    InvalidWorkflow(#[from] WorkflowError),

    #[error("run task failed: {0}")]
    Join(String),
}

/// Initial context of a run.
#[derive(Debug, Clone, Default)]
pub struct RunInput {
    pub user_input: String,
    pub variables: HashMap<String, Value>,
}

impl RunInput {
    pub fn new(user_input: impl Into<String>) -> Self {
        Self {
            user_input: user_input.into(),
            variables: HashMap::new(),
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }
}

/// Outcome of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub workflow_id: String,
    pub status: RunStatus,
    /// The last step output that reached a `user` edge.
    pub output: Option<String>,
    pub error: Option<String>,
    /// Kind of the failure that stopped the run. `None` on a failed run means
    /// a structural failure of the step graph rather than of a step: a fan-in
    /// deadlock, or draining without any output reaching a `user` edge.
    pub error_kind: Option<ErrorKind>,
    pub context: ExecutionContext,
    /// Step ids in completion order.
    pub completed_steps: Vec<String>,
    /// Attempts made per step.
    pub attempts: BTreeMap<String, u32>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// A run started with [`WorkflowOrchestrator::spawn_run`].
#[derive(Debug)]
pub struct RunHandle {
    pub run_id: Uuid,
    handle: JoinHandle<RunReport>,
}

impl RunHandle {
    pub async fn wait(self) -> Result<RunReport, OrchestratorError> {
        self.handle
            .await
            .map_err(|e| OrchestratorError::Join(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ActiveRun {
    token: CancellationToken,
    status: RunStatus,
}

/// Why a run stopped early.
#[derive(Debug)]
struct RunFailure {
    kind: Option<ErrorKind>,
    message: String,
}

impl RunFailure {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind: Some(kind),
            message: message.into(),
        }
    }

    /// A failure that none of the error kinds describes.
    fn unclassified(message: impl Into<String>) -> Self {
        Self {
            kind: None,
            message: message.into(),
        }
    }
}

/// What a task in the run's `JoinSet` reports.
enum TaskOutcome {
    Step {
        step_id: String,
        attempts: u32,
        result: Result<String, StepError>,
    },
    FanInReady {
        fan_key: String,
    },
}

struct RunState {
    run_id: Uuid,
    def: Arc<WorkflowDefinition>,
    depth: u32,
    ctx: ExecutionContext,
    fan: Arc<FanGroupTracker>,
    tasks: JoinSet<TaskOutcome>,
    scheduled: HashSet<String>,
    /// Fan-in steps waiting for their group, keyed by fan key.
    awaiting: BTreeMap<String, String>,
    running: usize,
    completed: Vec<String>,
    attempts: BTreeMap<String, u32>,
    final_output: Option<String>,
}

/// Removes a run from the active table however the run future ends.
struct ActiveRunGuard<'a> {
    runs: &'a DashMap<Uuid, ActiveRun>,
    run_id: Uuid,
}

impl Drop for ActiveRunGuard<'_> {
    fn drop(&mut self) {
        self.runs.remove(&self.run_id);
    }
}

struct Inner {
    workflows: DashMap<String, Arc<WorkflowDefinition>>,
    runner: StepRunner,
    navigation: NavigationEngine,
    config: OrchestratorConfig,
    event_bus: EventBus,
    active_runs: DashMap<Uuid, ActiveRun>,
}

// ---------------------------------------------------------------------------
// WorkflowOrchestrator
// ---------------------------------------------------------------------------

/// Runs registered workflows. Cloning shares the same registry and runs.
#[derive(Clone)]
pub struct WorkflowOrchestrator {
    inner: Arc<Inner>,
}

impl WorkflowOrchestrator {
    pub fn new(router: Arc<ActionRouter>, agents: AgentRegistry, config: OrchestratorConfig) -> Self {
        Self::with_navigation(router, agents, config, NavigationEngine::new())
    }

    /// Build with a specific navigation engine (e.g. a seeded one).
    pub fn with_navigation(
        router: Arc<ActionRouter>,
        agents: AgentRegistry,
        config: OrchestratorConfig,
        navigation: NavigationEngine,
    ) -> Self {
        let event_bus = EventBus::new(config.event_capacity);
        Self {
            inner: Arc::new(Inner {
                workflows: DashMap::new(),
                runner: StepRunner::new(agents, router),
                navigation,
                config,
                event_bus,
                active_runs: DashMap::new(),
            }),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    /// Validate and register a workflow, replacing one with the same id.
    pub fn register_workflow(&self, def: WorkflowDefinition) -> Result<(), WorkflowError> {
        validate_definition(&def)?;
        tracing::info!(workflow_id = def.id.as_str(), steps = def.steps.len(), "registered workflow");
        self.inner.workflows.insert(def.id.clone(), Arc::new(def));
        Ok(())
    }

    pub fn workflow(&self, workflow_id: &str) -> Option<Arc<WorkflowDefinition>> {
        self.inner.workflows.get(workflow_id).map(|d| Arc::clone(d.value()))
    }

    pub fn workflow_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.workflows.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.inner.event_bus.subscribe()
    }

    /// Upper bound on a run of `def` when every attempt times out.
    pub fn worst_case_duration(&self, def: &WorkflowDefinition) -> Duration {
        RetryHandler::worst_case_duration(&self.inner.config, def)
    }

    /// Run a registered workflow to completion.
    pub async fn run(&self, workflow_id: &str, input: RunInput) -> Result<RunReport, OrchestratorError> {
        let def = self
            .workflow(workflow_id)
            .ok_or_else(|| OrchestratorError::WorkflowNotFound(workflow_id.to_string()))?;
        let (run_id, token) = self.register_run();
        Ok(self.execute(def, input, 0, run_id, token).await)
    }

    /// Validate and run a definition without registering it.
    pub async fn run_definition(
        &self,
        def: WorkflowDefinition,
        input: RunInput,
    ) -> Result<RunReport, OrchestratorError> {
        validate_definition(&def)?;
        let (run_id, token) = self.register_run();
        Ok(self.execute(Arc::new(def), input, 0, run_id, token).await)
    }

    /// Start a registered workflow on its own task. The returned run id can
    /// be passed to [`cancel`](Self::cancel) right away.
    pub fn spawn_run(&self, workflow_id: &str, input: RunInput) -> Result<RunHandle, OrchestratorError> {
        let def = self
            .workflow(workflow_id)
            .ok_or_else(|| OrchestratorError::WorkflowNotFound(workflow_id.to_string()))?;
        let (run_id, token) = self.register_run();
        let orchestrator = self.clone();
        let handle =
            tokio::spawn(async move { orchestrator.execute(def, input, 0, run_id, token).await });
        Ok(RunHandle { run_id, handle })
    }

    /// Route a decision with intent calls served by this orchestrator.
    pub async fn route(&self, decision: &Value) -> InvocationResult {
        let nested = NestedRunner {
            orchestrator: self.clone(),
            depth: 1,
        };
        self.inner
            .runner
            .router()
            .route_within(decision, Some(&nested))
            .await
    }

    /// Cancel an in-flight run. Returns false if the run is unknown or done.
    pub fn cancel(&self, run_id: Uuid) -> bool {
        match self.inner.active_runs.get(&run_id) {
            Some(run) => {
                tracing::info!(%run_id, "cancelling workflow run");
                run.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Status of an in-flight run.
    pub fn run_status(&self, run_id: Uuid) -> Option<RunStatus> {
        self.inner.active_runs.get(&run_id).map(|run| run.status)
    }

    // -----------------------------------------------------------------------
    // Run execution
    // -----------------------------------------------------------------------

    fn register_run(&self) -> (Uuid, CancellationToken) {
        let run_id = Uuid::now_v7();
        let token = CancellationToken::new();
        self.inner.active_runs.insert(
            run_id,
            ActiveRun {
                token: token.clone(),
                status: RunStatus::Pending,
            },
        );
        (run_id, token)
    }

    fn set_status(&self, run_id: Uuid, status: RunStatus) {
        if let Some(mut run) = self.inner.active_runs.get_mut(&run_id) {
            run.status = status;
        }
    }

    fn publish(&self, event: RunEvent) {
        self.inner.event_bus.publish(event);
    }

    async fn execute(
        &self,
        def: Arc<WorkflowDefinition>,
        input: RunInput,
        depth: u32,
        run_id: Uuid,
        token: CancellationToken,
    ) -> RunReport {
        let _guard = ActiveRunGuard {
            runs: &self.inner.active_runs,
            run_id,
        };
        let started_at = Utc::now();
        let started = Instant::now();
        let span = tracing::info_span!("workflow_run", %run_id, workflow_id = def.id.as_str(), depth);

        let mut state = RunState {
            run_id,
            def: Arc::clone(&def),
            depth,
            ctx: ExecutionContext::new(input.user_input).with_variables(input.variables),
            fan: Arc::new(FanGroupTracker::from_steps(&def.steps)),
            tasks: JoinSet::new(),
            scheduled: HashSet::new(),
            awaiting: BTreeMap::new(),
            running: 0,
            completed: Vec::new(),
            attempts: BTreeMap::new(),
            final_output: None,
        };

        let (status, failure) = async {
            tracing::info!("workflow run started");
            self.set_status(run_id, RunStatus::Running);
            self.publish(RunEvent::RunStarted {
                run_id,
                workflow_id: def.id.clone(),
                depth,
            });

            let drive = self.drive(&mut state);
            let bounded = async {
                match self.inner.config.run_timeout() {
                    Some(limit) => tokio::time::timeout(limit, drive).await.unwrap_or_else(|_| {
                        Err(RunFailure::new(
                            ErrorKind::Timeout,
                            format!("run exceeded its {}s deadline", limit.as_secs()),
                        ))
                    }),
                    None => drive.await,
                }
            };

            tokio::select! {
                _ = token.cancelled() => (RunStatus::Cancelled, None),
                result = bounded => match result {
                    Ok(()) => (RunStatus::Completed, None),
                    Err(failure) => (RunStatus::Failed, Some(failure)),
                },
            }
        }
        .instrument(span.clone())
        .await;

        state.tasks.abort_all();
        let duration_ms = started.elapsed().as_millis() as u64;

        span.in_scope(|| match (&status, &failure) {
            (RunStatus::Completed, _) => {
                tracing::info!(duration_ms, steps = state.completed.len(), "workflow run completed");
                self.publish(RunEvent::RunCompleted {
                    run_id,
                    workflow_id: def.id.clone(),
                    duration_ms,
                    steps_completed: state.completed.len() as u32,
                });
            }
            (RunStatus::Cancelled, _) => {
                tracing::info!(duration_ms, "workflow run cancelled");
                self.publish(RunEvent::RunCancelled {
                    run_id,
                    workflow_id: def.id.clone(),
                });
            }
            (_, failure) => {
                let error = failure
                    .as_ref()
                    .map(|f| f.message.clone())
                    .unwrap_or_default();
                tracing::warn!(duration_ms, error = error.as_str(), "workflow run failed");
                self.publish(RunEvent::RunFailed {
                    run_id,
                    workflow_id: def.id.clone(),
                    error,
                });
            }
        });

        let output = match status {
            RunStatus::Completed => state.final_output.take(),
            _ => None,
        };
        RunReport {
            run_id,
            workflow_id: def.id.clone(),
            status,
            output,
            error: failure.as_ref().map(|f| f.message.clone()),
            error_kind: failure.and_then(|f| f.kind),
            context: std::mem::take(&mut state.ctx),
            completed_steps: std::mem::take(&mut state.completed),
            attempts: std::mem::take(&mut state.attempts),
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// The coordinator loop.
    async fn drive(&self, state: &mut RunState) -> Result<(), RunFailure> {
        let Some(entry) = state.def.entry_step_id().map(str::to_string) else {
            return Err(RunFailure::unclassified("workflow has no entry step"));
        };
        self.schedule(state, &entry)?;

        loop {
            if state.running == 0 {
                let stuck: Vec<&str> = state
                    .awaiting
                    .iter()
                    .filter(|(key, _)| !state.fan.is_ready(key))
                    .map(|(_, step_id)| step_id.as_str())
                    .collect();
                if !stuck.is_empty() {
                    return Err(RunFailure::unclassified(
                        format!(
                            "deadlock: fan-in step(s) {} can never run because members did not complete",
                            stuck.join(", ")
                        ),
                    ));
                }
                if state.awaiting.is_empty() {
                    break;
                }
            }

            let Some(joined) = state.tasks.join_next().await else {
                break;
            };
            match joined {
                Err(e) => {
                    return Err(RunFailure::new(
                        ErrorKind::HandlerExecutionError,
                        format!("step task aborted: {e}"),
                    ));
                }
                Ok(TaskOutcome::FanInReady { fan_key }) => {
                    if let Some(step_id) = state.awaiting.remove(&fan_key) {
                        tracing::debug!(fan_key = fan_key.as_str(), step_id = step_id.as_str(), "fan-in released");
                        self.publish(RunEvent::FanInReleased {
                            run_id: state.run_id,
                            fan_key,
                            step_id: step_id.clone(),
                        });
                        self.spawn_step(state, &step_id)?;
                    }
                }
                Ok(TaskOutcome::Step {
                    step_id,
                    attempts,
                    result,
                }) => {
                    state.running -= 1;
                    state.attempts.insert(step_id.clone(), attempts);
                    let step = lookup_step(&state.def, &step_id)?;
                    match result {
                        Ok(output) => self.on_step_succeeded(state, &step, output)?,
                        Err(e) => self.on_step_failed(state, &step, e, attempts)?,
                    }
                }
            }
        }

        match state.final_output {
            Some(_) => Ok(()),
            None => Err(RunFailure::unclassified("run finished without reaching a user edge")),
        }
    }

    /// Queue a step, holding fan-in steps until their group is ready.
    fn schedule(&self, state: &mut RunState, step_id: &str) -> Result<(), RunFailure> {
        if !state.scheduled.insert(step_id.to_string()) {
            tracing::debug!(step_id, "step already scheduled");
            return Ok(());
        }
        let step = lookup_step(&state.def, step_id)?;

        if let (true, Some(fan_key)) = (step.is_fan_in, &step.fan_key) {
            if !state.fan.is_ready(fan_key) {
                let missing = state.fan.missing(fan_key);
                tracing::debug!(step_id, fan_key = fan_key.as_str(), ?missing, "fan-in step waiting");
                state.awaiting.insert(fan_key.clone(), step_id.to_string());
                self.publish(RunEvent::FanInAwaiting {
                    run_id: state.run_id,
                    fan_key: fan_key.clone(),
                    step_id: step_id.to_string(),
                    missing,
                });
                if state.running == 0 {
                    self.set_status(state.run_id, RunStatus::AwaitingFanIn);
                }

                let fan = Arc::clone(&state.fan);
                let fan_key = fan_key.clone();
                state.tasks.spawn(async move {
                    fan.wait_ready(&fan_key).await;
                    TaskOutcome::FanInReady { fan_key }
                });
                return Ok(());
            }
        }

        self.spawn_step(state, step_id)
    }

    /// Interpolate a step's input and start its task.
    fn spawn_step(&self, state: &mut RunState, step_id: &str) -> Result<(), RunFailure> {
        let step = lookup_step(&state.def, step_id)?;
        let input = match state
            .ctx
            .interpolate(&step.input, self.inner.config.unresolved_policy)
        {
            Ok(input) => input,
            Err(e) => return self.on_step_failed(state, &step, StepError::Template(e), 0),
        };

        state.running += 1;
        self.set_status(state.run_id, RunStatus::Running);
        let task = self
            .clone()
            .run_step(state.run_id, state.depth, step, input)
            .instrument(tracing::debug_span!("step", step_id));
        state.tasks.spawn(task);
        Ok(())
    }

    /// Run every attempt of one step. Executes on its own task.
    async fn run_step(
        self,
        run_id: Uuid,
        depth: u32,
        step: StepDefinition,
        input: String,
    ) -> TaskOutcome {
        let nested = NestedRunner {
            orchestrator: self.clone(),
            depth: depth + 1,
        };
        let config = &self.inner.config;
        let timeout = config.step_timeout(step.timeout_secs);
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.publish(RunEvent::StepStarted {
                run_id,
                step_id: step.id.clone(),
                step_kind: step.kind.to_string(),
                attempt,
            });
            let started = Instant::now();

            let result = match tokio::time::timeout(
                timeout,
                self.inner.runner.run_attempt(&step, &input, &nested),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(StepError::Timeout(timeout.as_secs())),
            };

            match result {
                Ok(output) => {
                    let duration_ms = started.elapsed().as_millis() as u64;
                    tracing::debug!(attempt, duration_ms, "step completed");
                    self.publish(RunEvent::StepCompleted {
                        run_id,
                        step_id: step.id.clone(),
                        duration_ms,
                    });
                    return TaskOutcome::Step {
                        step_id: step.id,
                        attempts: attempt,
                        result: Ok(output),
                    };
                }
                Err(e) => {
                    let will_retry = RetryHandler::should_retry(&step, attempt, e.kind());
                    tracing::warn!(
                        attempt,
                        max_attempts = RetryHandler::max_attempts(&step),
                        will_retry,
                        error = %e,
                        "step attempt failed"
                    );
                    self.publish(RunEvent::StepFailed {
                        run_id,
                        step_id: step.id.clone(),
                        error: e.to_string(),
                        will_retry,
                    });
                    if !will_retry {
                        return TaskOutcome::Step {
                            step_id: step.id,
                            attempts: attempt,
                            result: Err(e),
                        };
                    }
                    let backoff = RetryHandler::backoff(config, attempt);
                    if !backoff.is_zero() {
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }
    }

    fn on_step_succeeded(
        &self,
        state: &mut RunState,
        step: &StepDefinition,
        output: String,
    ) -> Result<(), RunFailure> {
        let stored = state
            .ctx
            .set_step_output(&step.id, output)
            .map_err(|e| RunFailure::unclassified(e.to_string()))?
            .to_string();
        if let Some(var) = &step.output_var {
            state.ctx.set_variable(var.clone(), parse_text(&stored));
        }
        state.completed.push(step.id.clone());
        self.mark_fan_progress(state, step);

        let targets: Vec<String> = match &step.navigation {
            Some(nav) => {
                let reads_choice = step.kind != StepKind::Function
                    && matches!(nav.mode, NavigationMode::Manual | NavigationMode::Hybrid);
                let choice = if reads_choice {
                    AgentChoice::parse(&stored)
                } else {
                    None
                };
                let decision = self
                    .inner
                    .navigation
                    .decide(nav, &state.ctx, choice.as_ref())
                    .map_err(|e| {
                        RunFailure::new(
                            ErrorKind::NavigationInvalidChoice,
                            format!("step '{}': {e}", step.id),
                        )
                    })?;
                tracing::info!(
                    from_step = step.id.as_str(),
                    mode = %nav.mode,
                    chosen = decision.chosen_step_id.as_str(),
                    confidence = decision.confidence,
                    reasoning = decision.reasoning.as_str(),
                    "navigation decided"
                );
                self.publish(RunEvent::NavigationDecided {
                    run_id: state.run_id,
                    from_step: step.id.clone(),
                    decision: decision.clone(),
                });
                let chosen = decision.chosen_step_id.clone();
                state.ctx.record_navigation(NavigationRecord {
                    from_step: step.id.clone(),
                    mode: nav.mode,
                    decision,
                    decided_at: Utc::now(),
                });
                vec![chosen]
            }
            None if step.outputs.is_empty() => vec![USER_EDGE.to_string()],
            None => step.outputs.clone(),
        };

        for target in targets {
            if target == USER_EDGE {
                state.final_output = Some(stored.clone());
            } else {
                self.schedule(state, &target)?;
            }
        }
        Ok(())
    }

    fn on_step_failed(
        &self,
        state: &mut RunState,
        step: &StepDefinition,
        error: StepError,
        attempts: u32,
    ) -> Result<(), RunFailure> {
        let Some(on_error) = &step.on_error else {
            let kind = RetryHandler::terminal_kind(step, error.kind());
            tracing::error!(step_id = step.id.as_str(), attempts, error = %error, "step failed, no on_error path");
            return Err(RunFailure::new(
                kind,
                format!("step '{}' failed after {attempts} attempt(s): {error}", step.id),
            ));
        };

        let message = error.to_string();
        let output = if message.starts_with("[ERROR]") {
            message
        } else {
            format!("[ERROR] {message}")
        };
        tracing::warn!(
            step_id = step.id.as_str(),
            on_error = on_error.as_str(),
            attempts,
            "step failed, taking on_error path"
        );
        state
            .ctx
            .set_step_output(&step.id, output)
            .map_err(|e| RunFailure::unclassified(e.to_string()))?;
        self.mark_fan_progress(state, step);
        self.schedule(state, on_error)
    }

    fn mark_fan_progress(&self, state: &mut RunState, step: &StepDefinition) {
        let Some(fan_key) = &step.fan_key else { return };
        if step.is_fan_in {
            state.fan.release(fan_key);
        } else {
            state.fan.register_completion(fan_key, &step.id);
        }
    }
}

fn lookup_step(def: &WorkflowDefinition, step_id: &str) -> Result<StepDefinition, RunFailure> {
    def.step(step_id)
        .cloned()
        .ok_or_else(|| RunFailure::unclassified(format!("unknown step '{step_id}'")))
}

impl std::fmt::Debug for WorkflowOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowOrchestrator")
            .field("workflows", &self.inner.workflows.len())
            .field("active_runs", &self.inner.active_runs.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Sub-workflows
// ---------------------------------------------------------------------------

/// Serves intent calls made from inside a run at `depth`.
struct NestedRunner {
    orchestrator: WorkflowOrchestrator,
    depth: u32,
}

impl SubWorkflowRunner for NestedRunner {
    fn run_sub_workflow<'a>(
        &'a self,
        workflow_id: &'a str,
        user_input: String,
    ) -> BoxFuture<'a, Result<String, SubWorkflowError>> {
        Box::pin(async move {
            let max = self.orchestrator.inner.config.max_sub_workflow_depth;
            if self.depth > max {
                return Err(SubWorkflowError::DepthExceeded {
                    depth: self.depth,
                    max,
                });
            }
            let def = self
                .orchestrator
                .workflow(workflow_id)
                .ok_or_else(|| SubWorkflowError::NotFound(workflow_id.to_string()))?;

            let (run_id, token) = self.orchestrator.register_run();
            let report = self
                .orchestrator
                .execute(def, RunInput::new(user_input), self.depth, run_id, token)
                .await;
            match report.status {
                RunStatus::Completed => Ok(report.output.unwrap_or_default()),
                status => Err(SubWorkflowError::Failed(
                    report.error.unwrap_or_else(|| format!("sub-workflow {status}")),
                )),
            }
        })
    }
}
