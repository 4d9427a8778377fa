use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::defaults::{
    default_local_tool_timeout_secs, default_max_concurrency, default_max_iterations,
};
use crate::error::{Mcp2AiError, Result};
use crate::model::ModelAdapter;
use crate::models::{
    Conversation, Message, ModelTurn, ToolCallRequest, ToolCallResult, ToolErrorKind, ToolSchema,
};
use crate::registry::{BuiltinTool, ToolHandler, ToolRegistry};
use crate::retry::RetryPolicy;

pub const DEFAULT_LIMIT_MESSAGE: &str =
    "I apologize, but I couldn't complete your request after multiple attempts.";

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound on model calls per run.
    pub max_iterations: u32,
    /// Tool calls of one turn executed at the same time.
    pub max_concurrency: usize,
    /// Applied to the model call, and only for `InferenceUnavailable`.
    pub model_retry: RetryPolicy,
    pub local_tool_timeout: Duration,
    /// Answer given when a run hits `max_iterations`.
    pub limit_message: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_concurrency: default_max_concurrency(),
            model_retry: RetryPolicy::none(),
            local_tool_timeout: Duration::from_secs(default_local_tool_timeout_secs()),
            limit_message: DEFAULT_LIMIT_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    AwaitingModel,
    ToolCallsPending,
    ExecutingTools,
    Terminal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The model produced a turn without tool calls.
    Answered,
    /// The run stopped at `max_iterations` with a synthesized answer.
    IterationLimitExceeded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub answer: String,
    pub termination: Termination,
    pub turns: u32,
}

/// Progress notifications for whoever renders a run.
#[derive(Debug, Clone)]
pub enum RunEvent {
    TurnStarted { turn: u32 },
    ToolCallsDetected { calls: Vec<ToolCallRequest> },
    ToolCallStarted { call: ToolCallRequest },
    ToolCallFinished { call: ToolCallRequest, result: ToolCallResult },
    IterationLimitReached { max_iterations: u32 },
}

pub type RunObserver = Arc<dyn Fn(&RunEvent) + Send + Sync>;

/// State of one query from the user message to its answer.
///
/// The conversation only ever grows by whole turns: an assistant message
/// with tool calls is appended together with all of its tool messages, so a
/// run interrupted mid-turn leaves no unanswered calls behind.
#[derive(Debug)]
pub struct OrchestrationRun {
    id: Uuid,
    conversation: Conversation,
    turn: u32,
    max_iterations: u32,
    state: RunState,
    pending: Option<ModelTurn>,
    outcome: Option<RunOutcome>,
}

impl OrchestrationRun {
    pub fn new(history: Conversation, input: impl Into<String>, max_iterations: u32) -> Self {
        let mut conversation = history;
        conversation.push(Message::user(input));

        Self {
            id: Uuid::new_v4(),
            conversation,
            turn: 0,
            max_iterations,
            state: RunState::AwaitingModel,
            pending: None,
            outcome: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn into_conversation(self) -> Conversation {
        self.conversation
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn outcome(&self) -> Option<&RunOutcome> {
        self.outcome.as_ref()
    }

    fn finish(&mut self, answer: String, termination: Termination) -> RunOutcome {
        let outcome = RunOutcome {
            answer,
            termination,
            turns: self.turn,
        };
        self.state = RunState::Terminal;
        self.outcome = Some(outcome.clone());
        outcome
    }
}

/// Drives runs against one model adapter and one tool registry. The
/// registry is read-only here and may be shared by any number of runs.
pub struct Orchestrator {
    model: Arc<dyn ModelAdapter>,
    registry: Arc<ToolRegistry>,
    config: OrchestratorConfig,
    observer: Option<RunObserver>,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn ModelAdapter>,
        registry: Arc<ToolRegistry>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            model,
            registry,
            config,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: RunObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn start(&self, history: Conversation, input: impl Into<String>) -> OrchestrationRun {
        OrchestrationRun::new(history, input, self.config.max_iterations)
    }

    /// One-shot query on an empty conversation.
    pub async fn answer(&self, input: impl Into<String>) -> Result<RunOutcome> {
        let mut run = self.start(Conversation::new(), input);
        self.drive(&mut run, &CancellationToken::new()).await
    }

    /// Run until Terminal. On error or cancellation the run is left Terminal
    /// with its conversation still well-formed.
    pub async fn drive(
        &self,
        run: &mut OrchestrationRun,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        let span = info_span!("run", run_id = %run.id);
        let result = self.drive_inner(run, cancel).instrument(span).await;
        if result.is_err() {
            run.pending = None;
            run.state = RunState::Terminal;
        }
        result
    }

    async fn drive_inner(
        &self,
        run: &mut OrchestrationRun,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        loop {
            match run.state {
                RunState::AwaitingModel => {
                    if run.turn >= run.max_iterations {
                        warn!(max_iterations = run.max_iterations, "iteration limit reached");
                        self.emit(&RunEvent::IterationLimitReached {
                            max_iterations: run.max_iterations,
                        });
                        let answer = self.config.limit_message.clone();
                        run.conversation
                            .push(Message::assistant(answer.clone(), Vec::new()));
                        return Ok(run.finish(answer, Termination::IterationLimitExceeded));
                    }

                    run.turn += 1;
                    debug!(turn = run.turn, "requesting model turn");
                    self.emit(&RunEvent::TurnStarted { turn: run.turn });

                    let schemas = self.registry.list_schemas();
                    let turn = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(Mcp2AiError::Cancelled),
                        turn = self.complete_with_retry(&run.conversation, &schemas) => turn?,
                    };

                    if turn.has_tool_calls() {
                        run.pending = Some(turn);
                        run.state = RunState::ToolCallsPending;
                    } else {
                        info!(turns = run.turn, "run answered");
                        run.conversation
                            .push(Message::assistant(turn.text.clone(), Vec::new()));
                        return Ok(run.finish(turn.text, Termination::Answered));
                    }
                }
                RunState::ToolCallsPending => {
                    if let Some(turn) = &run.pending {
                        info!(count = turn.tool_calls.len(), "model requested tool calls");
                        self.emit(&RunEvent::ToolCallsDetected {
                            calls: turn.tool_calls.clone(),
                        });
                    }
                    run.state = RunState::ExecutingTools;
                }
                RunState::ExecutingTools => {
                    let Some(turn) = run.pending.take() else {
                        run.state = RunState::AwaitingModel;
                        continue;
                    };

                    let results = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(Mcp2AiError::Cancelled),
                        results = self.execute_calls(&turn.tool_calls) => results,
                    };

                    let ModelTurn { text, tool_calls } = turn;
                    let replies: Vec<Message> = tool_calls
                        .iter()
                        .zip(&results)
                        .map(|(call, result)| Message::tool_result(call, result))
                        .collect();
                    run.conversation.push(Message::assistant(text, tool_calls));
                    for reply in replies {
                        run.conversation.push(reply);
                    }
                    run.state = RunState::AwaitingModel;
                }
                RunState::Terminal => {
                    return run.outcome.clone().ok_or_else(|| {
                        Mcp2AiError::Other("run ended without an outcome".to_string())
                    });
                }
            }
        }
    }

    async fn complete_with_retry(
        &self,
        conversation: &Conversation,
        schemas: &[ToolSchema],
    ) -> Result<ModelTurn> {
        let policy = self.config.model_retry;
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.model.complete(conversation, schemas).await {
                Err(e @ Mcp2AiError::InferenceUnavailable(_)) if policy.allows_retry(attempts) => {
                    let delay = policy.delay_for(attempts);
                    warn!(
                        attempt = attempts,
                        model = self.model.name(),
                        "model call failed, retrying in {:?}: {}",
                        delay,
                        e
                    );
                    sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    /// Results come back in request order regardless of completion order.
    async fn execute_calls(&self, calls: &[ToolCallRequest]) -> Vec<ToolCallResult> {
        let concurrency = self.config.max_concurrency.max(1);
        stream::iter(calls.iter().map(|call| self.execute_one(call)))
            .buffered(concurrency)
            .collect()
            .await
    }

    async fn execute_one(&self, call: &ToolCallRequest) -> ToolCallResult {
        self.emit(&RunEvent::ToolCallStarted { call: call.clone() });

        let result = match self.registry.lookup(&call.name) {
            Err(_) => ToolCallResult::failure(
                &call.id,
                ToolErrorKind::UnknownTool,
                format!("Tool '{}' not found", call.name),
            ),
            Ok(tool) => match &tool.handler {
                ToolHandler::Backend(backend) => backend.invoke(call).await,
                ToolHandler::Builtin(builtin) => self.run_builtin(*builtin, call).await,
            },
        };

        match result.error() {
            Some(error) => warn!(tool = %call.name, call_id = %call.id, "tool call failed: {}", error),
            None => debug!(tool = %call.name, call_id = %call.id, "tool call succeeded"),
        }

        self.emit(&RunEvent::ToolCallFinished {
            call: call.clone(),
            result: result.clone(),
        });
        result
    }

    async fn run_builtin(&self, builtin: BuiltinTool, call: &ToolCallRequest) -> ToolCallResult {
        if let Err(e) = self
            .registry
            .validate_arguments(&call.name, &call.arguments_value())
        {
            let message = match e {
                Mcp2AiError::InvalidArguments { message, .. } => message,
                other => other.to_string(),
            };
            return ToolCallResult::failure(&call.id, ToolErrorKind::InvalidArguments, message);
        }

        match timeout(self.config.local_tool_timeout, builtin.run(&call.arguments)).await {
            Ok(Ok(content)) => ToolCallResult::success(&call.id, content),
            Ok(Err(message)) => {
                ToolCallResult::failure(&call.id, ToolErrorKind::BackendInvocation, message)
            }
            Err(_) => ToolCallResult::failure(
                &call.id,
                ToolErrorKind::BackendInvocation,
                format!(
                    "Tool '{}' timed out after {:?}",
                    call.name, self.config.local_tool_timeout
                ),
            ),
        }
    }

    fn emit(&self, event: &RunEvent) {
        if let Some(observer) = &self.observer {
            observer(event);
        }
    }
}
