//! Swarm assembly and the conversation-thread surface.
//!
//! The swarm graph has one entry point, the active-agent router, and
//! five agents: the coordinator, three direct specialists, and the RAG
//! pipeline mounted as an agent. Any agent can answer the user
//! directly; handoffs are optional and carry exactly the state the
//! caller chooses to propagate.
//!
//! [`SwarmRunner`] is the caller-facing surface: `invoke` feeds a user
//! turn into a thread and `resume` answers an outstanding
//! human-in-the-loop question. Both return either the settled state or
//! a suspension signal carrying the question and its pairing key.

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use relaygraph::app::App;
use relaygraph::graphs::{GraphBuilder, GraphCompileError};
use relaygraph::message::Message;
use relaygraph::runtimes::{
    AppRunner, CheckpointerType, RunOutcome, RunnerError, SessionInit, SessionState,
};
use relaygraph::state::VersionedState;
use relaygraph::types::NodeKind;

use crate::agents::AgentBuilder;
use crate::handoff::HandoffTool;
use crate::infer::StructuredInfer;
use crate::rag::RagPipelineNode;
use crate::router::ActiveAgentRouter;
use crate::tools::human::AskUserTool;
use crate::tools::math::CalculateTool;
use crate::tools::records::{CaseLookupTool, DocketLookupTool, WebSearchTool};
use crate::tools::weather::GetWeatherTool;

pub const ROUTER: &str = "router";
pub const COORDINATOR: &str = "coordinator";
pub const MATH_SPECIALIST: &str = "math_specialist";
pub const WEATHER_SPECIALIST: &str = "weather_specialist";
pub const RAG_PIPELINE: &str = "rag_pipeline";
pub const PROCESS_SEARCH: &str = "process_search";

fn custom(name: &str) -> NodeKind {
    NodeKind::Custom(name.to_string())
}

/// Compile the full swarm graph.
pub fn build_swarm_app(infer: Arc<dyn StructuredInfer>) -> Result<App, GraphCompileError> {
    let coordinator = AgentBuilder::new(COORDINATOR, infer.clone())
        .identity("the coordinator, responsible for routing tasks and user interaction")
        .responsibility("Route tasks to the appropriate specialist")
        .responsibility("Answer general questions about the system's capabilities")
        .responsibility("Ask the user for clarification with ask_user when needed")
        .tool(AskUserTool)
        .tool(HandoffTool::task_framed(
            MATH_SPECIALIST,
            "Delegate a calculation as a clean sub-task to the math specialist.",
            None,
        ))
        .tool(HandoffTool::task_framed(
            WEATHER_SPECIALIST,
            "Delegate a weather lookup as a clean sub-task to the weather specialist.",
            None,
        ))
        .tool(HandoffTool::task_framed(
            RAG_PIPELINE,
            "Delegate document retrieval and analysis to the RAG pipeline. \
             Covers legislation, rulings, resolutions, and jurisprudence.",
            None,
        ))
        .tool(HandoffTool::state_propagating(
            PROCESS_SEARCH,
            "Hand the conversation to the process-search specialist for case, \
             docket, and web queries.",
            None,
        ))
        .build();

    let math = AgentBuilder::new(MATH_SPECIALIST, infer.clone())
        .identity("the math specialist, expert in numeric calculation")
        .responsibility("Solve arithmetic expressions accurately")
        .constraint("Always use the calculate tool to evaluate expressions")
        .constraint("Never answer questions unrelated to math")
        .tool(CalculateTool)
        .tool(HandoffTool::state_propagating(
            COORDINATOR,
            "Return the conversation to the coordinator with full context.",
            None,
        ))
        .build();

    let weather = AgentBuilder::new(WEATHER_SPECIALIST, infer.clone())
        .identity("the weather specialist")
        .responsibility("Provide accurate weather reports")
        .constraint("Never make assumptions beyond the given location")
        .constraint("Ask the user with ask_user when the location is ambiguous")
        .tool(GetWeatherTool::new(infer.clone()))
        .tool(AskUserTool)
        .tool(HandoffTool::state_propagating(
            COORDINATOR,
            "Return the conversation to the coordinator with full context.",
            None,
        ))
        .build();

    let search = AgentBuilder::new(PROCESS_SEARCH, infer.clone())
        .identity("the process-search specialist for case, docket, and web lookups")
        .responsibility("Look up case and docket records by their numbers")
        .responsibility("Search the web for current institutional information")
        .constraint("Validate record numbers before looking them up")
        .tool(CaseLookupTool::new(infer.clone()))
        .tool(DocketLookupTool::new(infer.clone()))
        .tool(WebSearchTool::new(infer.clone()))
        .tool(HandoffTool::state_propagating(
            COORDINATOR,
            "Return the conversation to the coordinator with full context.",
            None,
        ))
        .tool(HandoffTool::task_framed(
            RAG_PIPELINE,
            "Delegate document retrieval and analysis to the RAG pipeline.",
            None,
        ))
        .build();

    let rag = RagPipelineNode::new(infer)?;

    let agents = [
        COORDINATOR,
        MATH_SPECIALIST,
        WEATHER_SPECIALIST,
        RAG_PIPELINE,
        PROCESS_SEARCH,
    ];
    let router = ActiveAgentRouter::new(
        agents.iter().map(|a| a.to_string()).collect(),
        COORDINATOR,
    );

    let mut builder = GraphBuilder::new()
        .add_node(custom(ROUTER), router)
        .add_node(custom(COORDINATOR), coordinator)
        .add_node(custom(MATH_SPECIALIST), math)
        .add_node(custom(WEATHER_SPECIALIST), weather)
        .add_node(custom(RAG_PIPELINE), rag)
        .add_node(custom(PROCESS_SEARCH), search)
        .add_edge(NodeKind::Start, custom(ROUTER));
    for agent in agents {
        builder = builder.add_edge(custom(agent), NodeKind::End);
    }
    builder
        .with_destinations(custom(ROUTER), agents.iter().map(|a| custom(a)).collect())
        .with_destinations(
            custom(COORDINATOR),
            vec![
                custom(MATH_SPECIALIST),
                custom(WEATHER_SPECIALIST),
                custom(RAG_PIPELINE),
                custom(PROCESS_SEARCH),
            ],
        )
        .with_destinations(custom(MATH_SPECIALIST), vec![custom(COORDINATOR)])
        .with_destinations(custom(WEATHER_SPECIALIST), vec![custom(COORDINATOR)])
        .with_destinations(
            custom(RAG_PIPELINE),
            vec![custom(COORDINATOR), custom(PROCESS_SEARCH)],
        )
        .with_destinations(
            custom(PROCESS_SEARCH),
            vec![custom(COORDINATOR), custom(RAG_PIPELINE)],
        )
        .compile()
}

/// Result of feeding one turn (or one resume) into a thread.
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    /// The thread settled; final state attached.
    Complete(VersionedState),
    /// The thread paused on a question for the user. Resume with the
    /// same `tool_call_id` to continue.
    Suspended {
        question: String,
        tool_call_id: String,
    },
}

#[derive(Debug, Error, Diagnostic)]
pub enum SwarmError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Runner(#[from] RunnerError),

    /// New input arrived while the thread still awaits a human answer.
    #[error("thread {thread_id} is suspended awaiting a human answer; resume it first")]
    #[diagnostic(code(rg_swarm::swarm::thread_suspended))]
    ThreadSuspended { thread_id: String },
}

/// Caller-facing runner: one instance serves many conversation threads.
pub struct SwarmRunner {
    runner: AppRunner,
}

impl SwarmRunner {
    pub async fn new(app: App) -> Self {
        Self {
            runner: AppRunner::new(app, CheckpointerType::InMemory).await,
        }
    }

    /// Feed one user turn into the thread, creating it on first use.
    /// Every turn enters at the router, which dispatches to whichever
    /// agent currently owns the conversation.
    pub async fn invoke(
        &mut self,
        thread_id: &str,
        user_text: &str,
    ) -> Result<TurnOutcome, SwarmError> {
        self.invoke_with_context(thread_id, user_text, FxHashMap::default())
            .await
    }

    /// Like [`invoke`](Self::invoke), additionally merging caller-supplied
    /// domain fields (uploaded source refs, user metadata) into the
    /// thread's state before the turn runs.
    pub async fn invoke_with_context(
        &mut self,
        thread_id: &str,
        user_text: &str,
        context: FxHashMap<String, Value>,
    ) -> Result<TurnOutcome, SwarmError> {
        tracing::info!(thread = %thread_id, "user turn received");
        let mut initial = VersionedState::new_with_user_message(user_text);
        for (key, value) in &context {
            initial.add_extra(key, value.clone());
        }
        let init = self
            .runner
            .create_session(thread_id.to_string(), initial)
            .await?;

        let session = self
            .runner
            .get_session_mut(thread_id)
            .expect("session exists after create_session");
        if session.pending_interrupt.is_some() {
            return Err(SwarmError::ThreadSuspended {
                thread_id: thread_id.to_string(),
            });
        }
        if matches!(init, SessionInit::Resumed { .. }) {
            session.state.add_message(Message::user(user_text));
            for (key, value) in context {
                session.state.add_extra(&key, value);
            }
            session.frontier = vec![custom(ROUTER)];
        }

        Ok(Self::outcome(self.runner.run_until_settled(thread_id).await?))
    }

    /// Answer an outstanding human-in-the-loop question.
    pub async fn resume(
        &mut self,
        thread_id: &str,
        tool_call_id: &str,
        answer: Value,
    ) -> Result<TurnOutcome, SwarmError> {
        tracing::info!(thread = %thread_id, call = %tool_call_id, "resuming suspended thread");
        Ok(Self::outcome(
            self.runner.resume(thread_id, tool_call_id, answer).await?,
        ))
    }

    /// Read access to a thread's session state.
    #[must_use]
    pub fn thread(&self, thread_id: &str) -> Option<&SessionState> {
        self.runner.get_session(thread_id)
    }

    fn outcome(run: RunOutcome) -> TurnOutcome {
        match run {
            RunOutcome::Complete(state) => TurnOutcome::Complete(state),
            RunOutcome::Suspended(interrupt) => TurnOutcome::Suspended {
                question: interrupt.question,
                tool_call_id: interrupt.tool_call_id,
            },
        }
    }
}
