//! End-to-end swarm scenarios driven by scripted inference.

use std::sync::Arc;

use serde_json::json;

use relaygraph::message::Message;
use relaygraph::node::NodeError;
use relaygraph::runtimes::{AppRunner, CheckpointerType, RunnerError};
use relaygraph::state::{ACTIVE_AGENT_KEY, VersionedState};

use rg_swarm::fields;
use rg_swarm::infer::ScriptedInfer;
use rg_swarm::swarm::{COORDINATOR, SwarmRunner, TurnOutcome, build_swarm_app};

#[tokio::test]
async fn task_framed_math_delegation_round_trip() {
    // coordinator -> (task-framed) math -> calculate -> (propagating)
    // coordinator -> final answer.
    let infer = Arc::new(ScriptedInfer::new(vec![
        json!({"action": "use_tool", "tool": "handoff_to_math_specialist",
               "arguments": {"task_message": "Calculate 12 * 4"}}),
        json!({"action": "use_tool", "tool": "calculate",
               "arguments": {"expression": "12 * 4"}}),
        json!({"action": "use_tool", "tool": "transfer_to_coordinator", "arguments": {}}),
        json!({"action": "respond", "message": "12 * 4 is 48."}),
    ]));
    let app = build_swarm_app(infer).unwrap();
    let mut runner = SwarmRunner::new(app).await;

    let outcome = runner.invoke("thread-1", "What is 12 * 4?").await.unwrap();
    let TurnOutcome::Complete(state) = outcome else {
        panic!("expected completion");
    };
    let snapshot = state.snapshot();

    // Control returned to the coordinator; the specialist's result is in
    // the shared domain fields.
    assert_eq!(snapshot.active_agent(), Some(COORDINATOR));
    assert_eq!(snapshot.extra.get(fields::MATH_RESULT), Some(&json!(48)));
    assert_eq!(
        snapshot.extra.get(fields::MATH_EXPRESSION),
        Some(&json!("12 * 4"))
    );

    // The task-framed handoff replaced the transcript: exactly one task
    // seed, and the original user phrasing is gone.
    let user_messages: Vec<&Message> = snapshot
        .messages
        .iter()
        .filter(|m| m.has_role(Message::USER))
        .collect();
    assert_eq!(user_messages.len(), 1);
    assert_eq!(user_messages[0].content, "Calculate 12 * 4");
    assert!(
        snapshot
            .messages
            .iter()
            .all(|m| m.content != "What is 12 * 4?")
    );
    assert_eq!(
        snapshot.messages.last().unwrap().content,
        "12 * 4 is 48."
    );
}

#[tokio::test]
async fn second_turn_reenters_the_active_agent() {
    let infer = Arc::new(ScriptedInfer::new(vec![
        json!({"action": "respond", "message": "I coordinate specialists for you."}),
        json!({"action": "respond", "message": "Still here."}),
    ]));
    let app = build_swarm_app(infer).unwrap();
    let mut runner = SwarmRunner::new(app).await;

    let TurnOutcome::Complete(first) = runner
        .invoke("thread-2", "What can you do?")
        .await
        .unwrap()
    else {
        panic!("expected completion");
    };
    assert_eq!(first.snapshot().active_agent(), Some(COORDINATOR));

    let TurnOutcome::Complete(second) = runner.invoke("thread-2", "Are you there?").await.unwrap()
    else {
        panic!("expected completion");
    };
    let snapshot = second.snapshot();
    // Both turns accumulated in one transcript.
    assert_eq!(
        snapshot
            .messages
            .iter()
            .filter(|m| m.has_role(Message::USER))
            .count(),
        2
    );
    assert_eq!(snapshot.messages.last().unwrap().content, "Still here.");
}

#[tokio::test]
async fn rag_delegation_produces_cited_answer() {
    // Script covers the coordinator decision plus every pipeline stage
    // the sub-graph consumes, in call order.
    let infer = Arc::new(ScriptedInfer::new(vec![
        json!({"action": "use_tool", "tool": "handoff_to_rag_pipeline",
               "arguments": {"task_message": "What does resolution 42 establish?"}}),
        // setup: collections
        json!(["legislation"]),
        // query analysis: in-domain, classified
        json!({"processed_query": "resolution 42 provisions", "query_type": "resolution",
               "complexity": "simple"}),
        // retrieval
        json!([
            {"chunk_id": "c1", "content": "Resolution 42 establishes audit deadlines.",
             "source": "res-42"},
            {"chunk_id": "c2", "content": "Audit deadlines are set each fiscal year.",
             "source": "res-42"}
        ]),
        // grading: clearly relevant
        json!([
            {"relevance_score": 0.9, "confidence": 0.8},
            {"relevance_score": 0.8, "confidence": 0.8}
        ]),
        // enrichment and reranking fall through to their defaults
        json!([]),
        json!([]),
        // generation
        json!("Resolution 42 establishes audit deadlines [1]."),
        // validation: passes the quality gate
        json!({"quality_score": 0.9, "needs_rewrite": false}),
    ]));
    let app = build_swarm_app(infer.clone()).unwrap();
    let mut runner = SwarmRunner::new(app).await;

    let TurnOutcome::Complete(state) = runner
        .invoke("thread-3", "What does resolution 42 establish?")
        .await
        .unwrap()
    else {
        panic!("expected completion");
    };
    let snapshot = state.snapshot();

    assert_eq!(snapshot.active_agent(), Some("rag_pipeline"));
    assert_eq!(
        snapshot.extra.get(fields::RAG_RESPONSE),
        Some(&json!("Resolution 42 establishes audit deadlines [1]."))
    );
    let citations = snapshot.extra.get(fields::CITATIONS).unwrap();
    assert_eq!(citations.as_array().unwrap().len(), 2);
    assert_eq!(
        snapshot.messages.last().unwrap().content,
        "Resolution 42 establishes audit deadlines [1]."
    );
    assert_eq!(infer.remaining(), 0, "every scripted call was consumed");
}

#[tokio::test]
async fn caller_context_is_merged_into_the_thread() {
    let infer = Arc::new(ScriptedInfer::new(vec![json!({
        "action": "respond", "message": "I see one uploaded document."
    })]));
    let app = build_swarm_app(infer).unwrap();
    let mut runner = SwarmRunner::new(app).await;

    let mut context = rustc_hash::FxHashMap::default();
    context.insert(
        fields::SOURCE_REFS.to_string(),
        json!(["uploads/resolution-042.pdf"]),
    );
    let TurnOutcome::Complete(state) = runner
        .invoke_with_context("thread-ctx", "summarize my upload", context)
        .await
        .unwrap()
    else {
        panic!("expected completion");
    };
    assert_eq!(
        state.snapshot().extra.get(fields::SOURCE_REFS),
        Some(&json!(["uploads/resolution-042.pdf"]))
    );
}

#[tokio::test]
async fn persisted_stale_agent_fails_loudly() {
    let infer = Arc::new(ScriptedInfer::new(vec![]));
    let app = build_swarm_app(infer).unwrap();
    let mut runner = AppRunner::new(app, CheckpointerType::InMemory).await;

    // A thread persisted before a deployment change references an agent
    // that no longer exists.
    let mut state = VersionedState::new_with_user_message("hello again");
    state.add_extra(ACTIVE_AGENT_KEY, json!("legacy_agent"));
    runner.create_session("drifted".into(), state).await.unwrap();

    let err = runner.run_until_settled("drifted").await.unwrap_err();
    match err {
        RunnerError::NodeRun { source, .. } => {
            assert!(matches!(source, NodeError::StaleRoute { .. }));
        }
        other => panic!("expected stale-route node failure, got {other:?}"),
    }
}
