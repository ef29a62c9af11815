//! Per-thread session execution.
//!
//! `AppRunner` drives a compiled [`App`] one superstep at a time, one
//! logical thread of control per session id. Within a step the frontier
//! nodes run sequentially in frontier order; their partial updates are
//! merged at the barrier and the next frontier is resolved from frontier
//! commands, static edges, and conditional edges, in that precedence.
//!
//! Two things make a step non-advancing:
//!
//! - a node **error** aborts the step; the pre-step checkpoint stays the
//!   durable state, and a retried invocation resumes from before the
//!   failure, never mid-node;
//! - a node **suspension** parks the thread with a pending interrupt;
//!   nothing from the step is applied, and [`AppRunner::resume`] later
//!   re-enters the suspended node with the external answer. The tool
//!   call that suspended is the sole resumption point.

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

use crate::app::{App, BarrierOutcome};
use crate::channels::Channel;
use crate::channels::errors::{ErrorDetail, ErrorEvent};
use crate::control::FrontierCommand;
use crate::event_bus::EventBus;
use crate::node::{
    Interrupt, NodeContext, NodeError, NodeOutput, NodePartial, ResumeValue,
};
use crate::runtimes::checkpointer::{
    Checkpoint, Checkpointer, CheckpointerError, CheckpointerType, InMemoryCheckpointer,
    restore_session_state,
};
use crate::state::VersionedState;
use crate::types::NodeKind;

/// Session state persisted across steps.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub state: VersionedState,
    pub step: u64,
    pub frontier: Vec<NodeKind>,
    /// Outstanding human-in-the-loop interrupt, at most one per thread.
    pub pending_interrupt: Option<PendingInterrupt>,
    /// Answer to inject into the suspended node on the next step.
    pub resume: Option<ResumeValue>,
}

/// An interrupt recorded when a node suspended the thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInterrupt {
    pub node: NodeKind,
    pub question: String,
    pub tool_call_id: String,
}

/// How a session was initialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionInit {
    Fresh,
    Resumed { checkpoint_step: u64 },
}

/// Channel versions after a step, for observability and tests.
#[derive(Debug, Clone)]
pub struct StateVersions {
    pub messages_version: u32,
    pub extra_version: u32,
}

/// Result of one completed superstep.
#[derive(Debug, Clone)]
pub struct StepReport {
    pub step: u64,
    pub ran_nodes: Vec<NodeKind>,
    pub skipped_nodes: Vec<NodeKind>,
    pub barrier_outcome: BarrierOutcome,
    pub next_frontier: Vec<NodeKind>,
    pub state_versions: StateVersions,
    pub completed: bool,
}

/// Result of attempting to run a step.
#[derive(Debug, Clone)]
pub enum StepResult {
    Completed(StepReport),
    Suspended(Interrupt),
}

/// Result of driving a session until it settles.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The frontier reached End (or emptied); final state attached.
    Complete(VersionedState),
    /// A node suspended the thread awaiting external input.
    Suspended(Interrupt),
}

#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    #[error("session not found: {session_id}")]
    #[diagnostic(code(relaygraph::runner::session_not_found))]
    SessionNotFound { session_id: String },

    #[error("no nodes to run from Start (empty frontier)")]
    #[diagnostic(
        code(relaygraph::runner::no_start_nodes),
        help("Add edges from Start or set the entry node correctly.")
    )]
    NoStartNodes,

    /// A frontier command or persisted route names a node that is not
    /// part of the compiled graph. Configuration drift is surfaced, not
    /// silently rerouted.
    #[error("stale route: {origin} routed to unknown node {target}")]
    #[diagnostic(
        code(relaygraph::runner::stale_route),
        help("A persisted thread or handoff references a node removed from the graph.")
    )]
    StaleRoute { origin: String, target: String },

    #[error("node {kind} failed at step {step}: {source}")]
    #[diagnostic(code(relaygraph::runner::node_run))]
    NodeRun {
        kind: String,
        step: u64,
        #[source]
        source: NodeError,
    },

    #[error("barrier failed: {0}")]
    #[diagnostic(code(relaygraph::runner::barrier))]
    Barrier(#[from] crate::reducers::ReducerError),

    #[error(transparent)]
    #[diagnostic(code(relaygraph::runner::checkpointer))]
    Checkpointer(#[from] CheckpointerError),

    /// `resume` called on a thread that is not suspended.
    #[error("session {session_id} is not suspended")]
    #[diagnostic(code(relaygraph::runner::not_suspended))]
    NotSuspended { session_id: String },

    /// `resume` called with a tool-call id that does not pair with the
    /// outstanding interrupt. Thread state is left untouched.
    #[error("resume key mismatch: expected {expected}, got {got}")]
    #[diagnostic(code(relaygraph::runner::interrupt_mismatch))]
    InterruptMismatch { expected: String, got: String },

    /// The session already has an outstanding interrupt; it must be
    /// resumed (or discarded) before new input is processed.
    #[error("session {session_id} is suspended awaiting external input")]
    #[diagnostic(code(relaygraph::runner::already_suspended))]
    AlreadySuspended { session_id: String },

    /// A graph not expected to suspend produced an interrupt.
    #[error("unexpected interrupt from node during one-shot invocation")]
    #[diagnostic(code(relaygraph::runner::unexpected_interrupt))]
    UnexpectedInterrupt,
}

/// Runtime execution engine for compiled graphs.
pub struct AppRunner {
    app: Arc<App>,
    sessions: FxHashMap<String, SessionState>,
    checkpointer: Option<Arc<dyn Checkpointer>>,
    autosave: bool,
    event_bus: EventBus,
}

impl AppRunner {
    pub async fn new(app: App, checkpointer_type: CheckpointerType) -> Self {
        Self::with_options(app, checkpointer_type, true).await
    }

    pub async fn with_options(
        app: App,
        checkpointer_type: CheckpointerType,
        autosave: bool,
    ) -> Self {
        let sqlite_db_name = app.runtime_config().sqlite_db_name.clone();
        let checkpointer = Self::create_checkpointer(checkpointer_type, sqlite_db_name).await;
        let event_bus = EventBus::new();
        event_bus.listen();
        Self {
            app: Arc::new(app),
            sessions: FxHashMap::default(),
            checkpointer,
            autosave,
            event_bus,
        }
    }

    async fn create_checkpointer(
        checkpointer_type: CheckpointerType,
        sqlite_db_name: Option<String>,
    ) -> Option<Arc<dyn Checkpointer>> {
        match checkpointer_type {
            CheckpointerType::InMemory => Some(Arc::new(InMemoryCheckpointer::new())),
            #[cfg(feature = "sqlite")]
            CheckpointerType::SQLite => {
                let db_name = sqlite_db_name.unwrap_or_else(|| "relaygraph.db".to_string());
                match crate::runtimes::checkpointer_sqlite::SQLiteCheckpointer::connect(&db_name)
                    .await
                {
                    Ok(cp) => Some(Arc::new(cp) as Arc<dyn Checkpointer>),
                    Err(e) => {
                        tracing::error!(db = %db_name, error = %e, "SQLite checkpointer init failed");
                        None
                    }
                }
            }
        }
    }

    /// The event bus owned by this runner.
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Initialize a session, resuming from the latest checkpoint when
    /// one exists for this id.
    #[instrument(skip(self, initial_state), err)]
    pub async fn create_session(
        &mut self,
        session_id: String,
        initial_state: VersionedState,
    ) -> Result<SessionInit, RunnerError> {
        let restored = if let Some(cp) = &self.checkpointer {
            cp.load_latest(&session_id).await?
        } else {
            None
        };

        if let Some(stored) = restored {
            let session = restore_session_state(&stored);
            self.sessions.insert(session_id, session);
            return Ok(SessionInit::Resumed {
                checkpoint_step: stored.step,
            });
        }

        let frontier = self
            .app
            .edges()
            .get(&NodeKind::Start)
            .cloned()
            .unwrap_or_default();
        if frontier.is_empty() {
            return Err(RunnerError::NoStartNodes);
        }
        let session = SessionState {
            state: initial_state,
            step: 0,
            frontier,
            pending_interrupt: None,
            resume: None,
        };
        self.sessions.insert(session_id.clone(), session);
        self.maybe_checkpoint(&session_id).await;
        Ok(SessionInit::Fresh)
    }

    #[must_use]
    pub fn get_session(&self, session_id: &str) -> Option<&SessionState> {
        self.sessions.get(session_id)
    }

    /// Mutable session access for callers seeding the next turn
    /// (appending the incoming user message, resetting the frontier).
    pub fn get_session_mut(&mut self, session_id: &str) -> Option<&mut SessionState> {
        self.sessions.get_mut(session_id)
    }

    /// Execute one superstep for the session.
    #[instrument(skip(self), err)]
    pub async fn run_step(&mut self, session_id: &str) -> Result<StepResult, RunnerError> {
        let mut session =
            self.sessions
                .remove(session_id)
                .ok_or_else(|| RunnerError::SessionNotFound {
                    session_id: session_id.to_string(),
                })?;

        if Self::is_terminal(&session.frontier) {
            let report = StepReport {
                step: session.step,
                ran_nodes: vec![],
                skipped_nodes: session.frontier.clone(),
                barrier_outcome: BarrierOutcome::default(),
                next_frontier: vec![],
                state_versions: Self::versions_of(&session.state),
                completed: true,
            };
            self.sessions.insert(session_id.to_string(), session);
            return Ok(StepResult::Completed(report));
        }

        let step = session.step + 1;
        let snapshot = session.state.snapshot();
        let frontier = session.frontier.clone();
        let mut ran_nodes: Vec<NodeKind> = Vec::new();
        let mut skipped_nodes: Vec<NodeKind> = Vec::new();
        let mut partials: Vec<NodePartial> = Vec::new();

        for kind in &frontier {
            if kind.is_start() || kind.is_end() {
                skipped_nodes.push(kind.clone());
                continue;
            }
            let Some(node) = self.app.nodes().get(kind).cloned() else {
                self.sessions.insert(session_id.to_string(), session);
                return Err(RunnerError::StaleRoute {
                    origin: "frontier".to_string(),
                    target: kind.encode(),
                });
            };

            let resume = session
                .resume
                .clone()
                .filter(|_| session.pending_interrupt.is_none());
            let ctx = NodeContext {
                node_id: kind.to_string(),
                step,
                event_sender: self.event_bus.sender(),
                resume,
            };

            match node.run(snapshot.clone(), ctx).await {
                Ok(NodeOutput::Update(partial)) => {
                    ran_nodes.push(kind.clone());
                    partials.push(partial);
                }
                Ok(NodeOutput::Suspend(interrupt)) => {
                    // Nothing from this step is applied; the pre-step
                    // checkpoint remains the durable state.
                    session.pending_interrupt = Some(PendingInterrupt {
                        node: kind.clone(),
                        question: interrupt.question.clone(),
                        tool_call_id: interrupt.tool_call_id.clone(),
                    });
                    session.resume = None;
                    self.sessions.insert(session_id.to_string(), session);
                    self.maybe_checkpoint(session_id).await;
                    return Ok(StepResult::Suspended(interrupt));
                }
                Err(source) => {
                    let event = ErrorEvent::node(
                        kind.encode(),
                        step,
                        ErrorDetail::msg(source.to_string()),
                    )
                    .with_tag("node");
                    let error_partial = NodePartial::new().with_errors(vec![event]);
                    let _ = self
                        .app
                        .apply_barrier(&mut session.state, &[kind.clone()], vec![error_partial]);
                    self.sessions.insert(session_id.to_string(), session);
                    self.maybe_checkpoint(session_id).await;
                    return Err(RunnerError::NodeRun {
                        kind: kind.encode(),
                        step,
                        source,
                    });
                }
            }
        }

        let barrier_outcome = self
            .app
            .apply_barrier(&mut session.state, &ran_nodes, partials)?;

        let next_frontier = match self.compute_next_frontier(&session, &ran_nodes, &barrier_outcome)
        {
            Ok(frontier) => frontier,
            Err(err) => {
                self.sessions.insert(session_id.to_string(), session);
                return Err(err);
            }
        };

        let completed = Self::is_terminal(&next_frontier);
        session.step = step;
        session.frontier = next_frontier.clone();
        session.resume = None;
        let state_versions = Self::versions_of(&session.state);
        self.sessions.insert(session_id.to_string(), session);
        self.maybe_checkpoint(session_id).await;

        Ok(StepResult::Completed(StepReport {
            step,
            ran_nodes,
            skipped_nodes,
            barrier_outcome,
            next_frontier,
            state_versions,
            completed,
        }))
    }

    /// Drive the session until it completes or suspends.
    #[instrument(skip(self), err)]
    pub async fn run_until_settled(
        &mut self,
        session_id: &str,
    ) -> Result<RunOutcome, RunnerError> {
        {
            let session =
                self.sessions
                    .get(session_id)
                    .ok_or_else(|| RunnerError::SessionNotFound {
                        session_id: session_id.to_string(),
                    })?;
            if session.pending_interrupt.is_some() {
                return Err(RunnerError::AlreadySuspended {
                    session_id: session_id.to_string(),
                });
            }
        }

        loop {
            match self.run_step(session_id).await? {
                StepResult::Completed(report) if report.completed => break,
                StepResult::Completed(_) => continue,
                StepResult::Suspended(interrupt) => {
                    return Ok(RunOutcome::Suspended(interrupt));
                }
            }
        }

        let session = self
            .sessions
            .get(session_id)
            .expect("session exists after run loop");
        Ok(RunOutcome::Complete(session.state.clone()))
    }

    /// Resume a suspended thread with the external answer for the
    /// recorded tool call. The suspended node is re-entered from its
    /// start; the matching tool call receives `answer` as its return
    /// value and execution continues from there.
    #[instrument(skip(self, answer), err)]
    pub async fn resume(
        &mut self,
        session_id: &str,
        tool_call_id: &str,
        answer: serde_json::Value,
    ) -> Result<RunOutcome, RunnerError> {
        let session =
            self.sessions
                .get_mut(session_id)
                .ok_or_else(|| RunnerError::SessionNotFound {
                    session_id: session_id.to_string(),
                })?;

        let Some(pending) = session.pending_interrupt.clone() else {
            return Err(RunnerError::NotSuspended {
                session_id: session_id.to_string(),
            });
        };
        if pending.tool_call_id != tool_call_id {
            return Err(RunnerError::InterruptMismatch {
                expected: pending.tool_call_id,
                got: tool_call_id.to_string(),
            });
        }

        session.pending_interrupt = None;
        session.frontier = vec![pending.node];
        session.resume = Some(ResumeValue {
            tool_call_id: tool_call_id.to_string(),
            value: answer,
        });
        self.run_until_settled(session_id).await
    }

    fn is_terminal(frontier: &[NodeKind]) -> bool {
        frontier.is_empty() || frontier.iter().all(NodeKind::is_end)
    }

    fn versions_of(state: &VersionedState) -> StateVersions {
        StateVersions {
            messages_version: state.messages.version(),
            extra_version: state.extra.version(),
        }
    }

    /// Resolve the next frontier for the nodes that ran.
    ///
    /// Precedence per node: an explicit `Replace` command wins outright;
    /// otherwise static edges seed the targets, `Append` commands extend
    /// them, and conditional edges contribute their selections. Unknown
    /// targets are a hard stale-route error.
    fn compute_next_frontier(
        &self,
        session: &SessionState,
        ran: &[NodeKind],
        barrier: &BarrierOutcome,
    ) -> Result<Vec<NodeKind>, RunnerError> {
        let snapshot = session.state.snapshot();
        let mut commands_by_node: FxHashMap<&NodeKind, Vec<&FrontierCommand>> =
            FxHashMap::default();
        for (origin, command) in &barrier.frontier_commands {
            commands_by_node.entry(origin).or_default().push(command);
        }

        let mut next_frontier: Vec<NodeKind> = Vec::new();
        for id in ran {
            let default_edges = self.app.edges().get(id).cloned().unwrap_or_default();
            let mut targets: Vec<NodeKind> = Vec::new();
            let mut replaced = false;

            if let Some(commands) = commands_by_node.get(id) {
                for command in commands {
                    match command {
                        FrontierCommand::Replace(entries) => {
                            if replaced {
                                tracing::warn!(
                                    origin = %id.encode(),
                                    "second Replace command in one step ignored"
                                );
                                continue;
                            }
                            targets = entries.clone();
                            replaced = true;
                        }
                        FrontierCommand::Append(entries) => {
                            if targets.is_empty() && !replaced {
                                targets.extend(default_edges.clone());
                            }
                            targets.extend(entries.iter().cloned());
                        }
                    }
                }
            }
            if !replaced && targets.is_empty() {
                targets.extend(default_edges);
            }

            if !replaced {
                for edge in self
                    .app
                    .conditional_edges()
                    .iter()
                    .filter(|ce| ce.from() == id)
                {
                    for name in (edge.predicate())(snapshot.clone()) {
                        targets.push(NodeKind::from(name.as_str()));
                    }
                }
            }

            for target in targets {
                let valid = match &target {
                    NodeKind::End | NodeKind::Start => true,
                    custom => self.app.nodes().contains_key(custom),
                };
                if !valid {
                    return Err(RunnerError::StaleRoute {
                        origin: id.encode(),
                        target: target.encode(),
                    });
                }
                if !next_frontier.contains(&target) {
                    next_frontier.push(target);
                }
            }
        }
        Ok(next_frontier)
    }

    async fn maybe_checkpoint(&self, session_id: &str) {
        if self.autosave
            && let Some(checkpointer) = &self.checkpointer
            && let Some(session) = self.sessions.get(session_id)
        {
            if let Err(e) = checkpointer
                .save(Checkpoint::from_session(session_id, session))
                .await
            {
                tracing::warn!(session = %session_id, error = %e, "checkpoint save failed");
            }
        }
    }
}

impl App {
    /// One-shot convenience: run this graph to completion in a fresh
    /// in-memory session. Graphs that may suspend should use
    /// [`AppRunner`] directly.
    pub async fn invoke(&self, initial_state: VersionedState) -> Result<VersionedState, RunnerError> {
        let mut runner =
            AppRunner::with_options(self.clone(), CheckpointerType::InMemory, false).await;
        let session_id = self
            .runtime_config()
            .session_id
            .clone()
            .unwrap_or_else(|| {
                crate::utils::id_generator::IdGenerator::new().generate_run_id()
            });
        runner
            .create_session(session_id.clone(), initial_state)
            .await?;
        match runner.run_until_settled(&session_id).await? {
            RunOutcome::Complete(state) => Ok(state),
            RunOutcome::Suspended(_) => Err(RunnerError::UnexpectedInterrupt),
        }
    }
}
