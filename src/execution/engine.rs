//! Workflow Execution Engine
//!
//! Drives a session through the workflow graph:
//! - Runs one step per node, strictly in sequence
//! - Merges each step's patch into the session context
//! - Resolves the next node from the transition table and loop limits
//! - Suspends at the approval node with a durable checkpoint
//! - Resumes from that checkpoint with the reviewer's reply
//!
//! The engine holds no per-session state, so one instance can serve
//! many sessions from different threads.

use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

use log::{debug, error, info};
use serde::Serialize;

use super::script::ScriptRunner;
use super::workspace::SessionWorkspace;
use crate::error::WorkflowError;
use crate::llm::Generator;
use crate::monitoring::progress::{self, Progress};
use crate::monitoring::{EventType, ExecutionTimeline};
use crate::steps::{self, StepServices};
use crate::warehouse::Warehouse;
use crate::workflow::checkpoint::{Checkpoint, CheckpointStore, SessionId};
use crate::workflow::context::{fields, Context, ContextPatch};
use crate::workflow::graph::{self, LoopLimits, ENTRY};
use crate::workflow::node::Node;

/// Instruction shown to the reviewer while a session is suspended.
pub const REVIEW_TASK: &str = "Review the generated demo and questions.";

/// What the caller sees when a session pauses for approval.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SuspendedPayload {
    pub session_id: SessionId,
    pub task: String,
    pub scenario: String,
    pub questions: Vec<String>,
    pub message: String,
}

/// What the caller sees when a session reaches the end.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct FinalResult {
    pub session_id: SessionId,
    pub summary: String,
    pub agent_name: String,
    pub schema: String,
    pub sample_questions: Vec<String>,
    pub agent_record: String,
    /// Full context at completion
    pub context: Context,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Suspended(SuspendedPayload),
    Completed(FinalResult),
}

impl RunOutcome {
    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::Suspended(payload) => &payload.session_id,
            Self::Completed(result) => &result.session_id,
        }
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::Suspended(_))
    }
}

/// Workflow execution engine.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use demoforge::execution::{Engine, ProcessScriptRunner};
/// use demoforge::llm::{OpenAiConfig, OpenAiGenerator};
/// use demoforge::warehouse::LocalWarehouse;
/// use demoforge::workflow::FileCheckpointStore;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let generator = OpenAiGenerator::new(OpenAiConfig {
///         api_key: std::env::var("OPENAI_API_KEY").ok(),
///         base_url: "https://api.openai.com/v1".to_string(),
///         model: "gpt-4o".to_string(),
///         timeout: Duration::from_secs(120),
///         api_key_env: "OPENAI_API_KEY".to_string(),
///     })?;
///
///     let engine = Engine::new(
///         Arc::new(generator),
///         Arc::new(ProcessScriptRunner::new("python3")),
///         Arc::new(LocalWarehouse::new(".demoforge/warehouse", "DEMO_DB")?),
///         Arc::new(FileCheckpointStore::new(".demoforge/checkpoints")),
///     );
///
///     let outcome = engine.start("build a retail demo")?;
///     let outcome = engine.resume(outcome.session_id(), "yes")?;
///     assert!(!outcome.is_suspended());
///     Ok(())
/// }
/// ```
pub struct Engine {
    generator: Arc<dyn Generator>,
    runner: Arc<dyn ScriptRunner>,
    warehouse: Arc<dyn Warehouse>,
    store: Arc<dyn CheckpointStore>,
    work_root: PathBuf,
    limits: LoopLimits,
    progress: Mutex<Option<Sender<Progress>>>,
}

impl Engine {
    pub fn new(
        generator: Arc<dyn Generator>,
        runner: Arc<dyn ScriptRunner>,
        warehouse: Arc<dyn Warehouse>,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            generator,
            runner,
            warehouse,
            store,
            work_root: PathBuf::from(".demoforge").join("sessions"),
            limits: LoopLimits::default(),
            progress: Mutex::new(None),
        }
    }

    /// Sets the directory holding per-session workspaces.
    pub fn set_work_root(&mut self, dir: impl Into<PathBuf>) {
        self.work_root = dir.into();
    }

    pub fn set_limits(&mut self, limits: LoopLimits) {
        self.limits = limits;
    }

    /// Sends a [`Progress`] event on every node visit.
    pub fn set_progress(&mut self, sender: Sender<Progress>) {
        self.progress = Mutex::new(Some(sender));
    }

    pub fn limits(&self) -> &LoopLimits {
        &self.limits
    }

    pub fn work_root(&self) -> &PathBuf {
        &self.work_root
    }

    /// Starts a new session from a demo prompt.
    ///
    /// Runs until the session suspends for approval.
    pub fn start(&self, prompt: &str) -> Result<RunOutcome, WorkflowError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(WorkflowError::EmptyPrompt);
        }

        let session_id = SessionId::generate();
        let workspace = SessionWorkspace::create(&self.work_root, &session_id)?;
        info!("Starting session {}", session_id);

        self.drive(&session_id, &workspace, ENTRY, Context::with_prompt(prompt), None)
    }

    /// Continues a suspended session with the reviewer's reply.
    ///
    /// The checkpoint is claimed for the duration of the run, so a second
    /// resume of the same session fails with `UnknownSession`. On error the
    /// claimed checkpoint is put back and the session can be resumed again.
    pub fn resume(&self, session_id: &SessionId, reply: &str) -> Result<RunOutcome, WorkflowError> {
        let checkpoint = self
            .store
            .claim(session_id)?
            .ok_or_else(|| WorkflowError::UnknownSession(session_id.to_string()))?;

        if !checkpoint.node.is_suspend_point() {
            self.store.save(&checkpoint)?;
            return Err(WorkflowError::NotSuspended {
                session: session_id.to_string(),
                node: checkpoint.node,
            });
        }

        info!("Resuming session {} at {}", session_id, checkpoint.node);
        let result = SessionWorkspace::create(&self.work_root, session_id)
            .map_err(WorkflowError::from)
            .and_then(|workspace| {
                self.drive(
                    session_id,
                    &workspace,
                    checkpoint.node,
                    checkpoint.context.clone(),
                    Some(reply),
                )
            });

        if result.is_err() {
            if let Err(e) = self.store.save(&checkpoint) {
                error!("Could not restore checkpoint for session {}: {}", session_id, e);
            }
        }
        result
    }

    /// Discards a suspended session: its checkpoint and its workspace.
    pub fn abandon(&self, session_id: &SessionId) -> Result<(), WorkflowError> {
        if self.store.load(session_id)?.is_none() {
            return Err(WorkflowError::UnknownSession(session_id.to_string()));
        }

        self.store.clear(session_id)?;
        SessionWorkspace::for_session(&self.work_root, session_id).remove()?;
        info!("Abandoned session {}", session_id);
        Ok(())
    }

    /// Sessions waiting for a reply, oldest first.
    pub fn pending_sessions(&self) -> Result<Vec<Checkpoint>, WorkflowError> {
        Ok(self.store.list()?)
    }

    fn drive(
        &self,
        session_id: &SessionId,
        workspace: &SessionWorkspace,
        node: Node,
        context: Context,
        reply: Option<&str>,
    ) -> Result<RunOutcome, WorkflowError> {
        let mut timeline = ExecutionTimeline::new();
        let result = self.run_segment(session_id, workspace, node, context, reply, &mut timeline);
        debug!("{}", timeline.gantt_chart());
        result
    }

    fn run_segment(
        &self,
        session_id: &SessionId,
        workspace: &SessionWorkspace,
        mut node: Node,
        mut context: Context,
        mut reply: Option<&str>,
        timeline: &mut ExecutionTimeline,
    ) -> Result<RunOutcome, WorkflowError> {
        let services = StepServices {
            generator: self.generator.as_ref(),
            runner: self.runner.as_ref(),
            warehouse: self.warehouse.as_ref(),
            workspace,
        };

        loop {
            if node.is_terminal() {
                self.report(session_id, node);
                self.store.clear(session_id)?;
                info!("Session {} completed", session_id);
                return Ok(RunOutcome::Completed(final_result(session_id, context)));
            }

            if node.is_suspend_point() {
                // A reply is consumed once; the next arrival suspends again
                match reply.take() {
                    Some(text) => context.apply(ContextPatch::new().set(fields::HUMAN_INPUT, text)),
                    None => {
                        self.store
                            .save(&Checkpoint::new(session_id.clone(), node, context.clone()))?;
                        info!("Session {} waiting for approval", session_id);
                        return Ok(RunOutcome::Suspended(suspended_payload(session_id, &context)));
                    }
                }
            }

            self.report(session_id, node);
            debug!("Session {}: running {}", session_id, node);
            timeline.add_event(node, EventType::Started);

            match steps::execute(node, &context, &services) {
                Ok(patch) => {
                    context.apply(patch);
                    timeline.add_event(node, EventType::Completed);
                }
                Err(source) => {
                    timeline.add_event(node, EventType::Failed);
                    error!("Session {} failed at {}: {}", session_id, node, source);
                    return Err(WorkflowError::StepFailed { node, source });
                }
            }

            node = graph::next_node(node, &context, &self.limits).map_err(|e| {
                error!("Session {} stopped: {}", session_id, e);
                e
            })?;
        }
    }

    fn report(&self, session_id: &SessionId, node: Node) {
        if let Ok(sender) = self.progress.lock() {
            progress::report(sender.as_ref(), session_id, node);
        }
    }
}

fn suspended_payload(session_id: &SessionId, context: &Context) -> SuspendedPayload {
    SuspendedPayload {
        session_id: session_id.clone(),
        task: REVIEW_TASK.to_string(),
        scenario: context.get_str(fields::DEMO_DESCRIPTION).to_string(),
        questions: context.get_strings(fields::QUESTIONS),
        message: context.get_str(fields::PRESENTATION).to_string(),
    }
}

fn final_result(session_id: &SessionId, context: Context) -> FinalResult {
    FinalResult {
        session_id: session_id.clone(),
        summary: context.get_str(fields::FINAL_RESPONSE).to_string(),
        agent_name: steps::agent::agent_name(&context).to_string(),
        schema: context.get_str(fields::SCHEMA).to_string(),
        sample_questions: context.get_strings(fields::SAMPLE_QUESTIONS),
        agent_record: context.get_str(fields::AGENT_RECORD).to_string(),
        context,
    }
}
