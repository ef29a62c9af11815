use std::sync::Arc;

use relaygraph::graphs::{EdgePredicate, GraphBuilder};
use relaygraph::runtimes::{
    AppRunner, CheckpointerType, RunOutcome, RunnerError, SessionInit, StepResult,
};
use relaygraph::state::StateSnapshot;
use relaygraph::types::NodeKind;

mod common;
use common::*;

fn custom(name: &str) -> NodeKind {
    NodeKind::Custom(name.to_string())
}

#[tokio::test]
async fn linear_graph_runs_to_completion() {
    let app = GraphBuilder::new()
        .add_node(custom("a"), TestNode { name: "a" })
        .add_node(custom("b"), TestNode { name: "b" })
        .add_edge(NodeKind::Start, custom("a"))
        .add_edge(custom("a"), custom("b"))
        .add_edge(custom("b"), NodeKind::End)
        .compile()
        .unwrap();

    let mut runner = AppRunner::new(app, CheckpointerType::InMemory).await;
    runner
        .create_session("s1".into(), state_with_user("hi"))
        .await
        .unwrap();
    let outcome = runner.run_until_settled("s1").await.unwrap();

    let RunOutcome::Complete(state) = outcome else {
        panic!("expected completion");
    };
    let messages = state.snapshot().messages;
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].content, "a ran");
    assert_eq!(messages[2].content, "b ran");
}

#[tokio::test]
async fn conditional_edge_selects_branch() {
    let pred: EdgePredicate = Arc::new(|snap: StateSnapshot| {
        if snap.extra.contains_key("go_yes") {
            vec!["yes".to_string()]
        } else {
            vec!["no".to_string()]
        }
    });
    let app = GraphBuilder::new()
        .add_node(custom("root"), TestNode { name: "root" })
        .add_node(custom("yes"), TestNode { name: "yes" })
        .add_node(custom("no"), TestNode { name: "no" })
        .add_edge(NodeKind::Start, custom("root"))
        .add_conditional_edge(custom("root"), pred)
        .add_edge(custom("yes"), NodeKind::End)
        .add_edge(custom("no"), NodeKind::End)
        .compile()
        .unwrap();

    let mut runner = AppRunner::new(app, CheckpointerType::InMemory).await;
    let mut state = state_with_user("hi");
    state.add_extra("go_yes", serde_json::json!(true));
    runner.create_session("s1".into(), state).await.unwrap();

    let StepResult::Completed(report) = runner.run_step("s1").await.unwrap() else {
        panic!("expected completed step");
    };
    assert_eq!(report.next_frontier, vec![custom("yes")]);
}

#[tokio::test]
async fn frontier_replace_overrides_static_edges() {
    let app = GraphBuilder::new()
        .add_node(custom("router"), GotoNode { target: "math" })
        .add_node(custom("math"), TestNode { name: "math" })
        .add_node(custom("unused"), TestNode { name: "unused" })
        .add_edge(NodeKind::Start, custom("router"))
        .add_edge(custom("router"), custom("unused"))
        .add_edge(custom("math"), NodeKind::End)
        .add_edge(custom("unused"), NodeKind::End)
        .with_destinations(custom("router"), vec![custom("math")])
        .compile()
        .unwrap();

    let mut runner = AppRunner::new(app, CheckpointerType::InMemory).await;
    runner
        .create_session("s1".into(), state_with_user("hi"))
        .await
        .unwrap();
    let StepResult::Completed(report) = runner.run_step("s1").await.unwrap() else {
        panic!("expected completed step");
    };
    assert_eq!(report.next_frontier, vec![custom("math")]);
}

#[tokio::test]
async fn unknown_replace_target_is_stale_route() {
    let app = GraphBuilder::new()
        .add_node(custom("router"), GotoNode { target: "removed" })
        .add_edge(NodeKind::Start, custom("router"))
        .add_edge(custom("router"), NodeKind::End)
        .compile()
        .unwrap();

    let mut runner = AppRunner::new(app, CheckpointerType::InMemory).await;
    runner
        .create_session("s1".into(), state_with_user("hi"))
        .await
        .unwrap();
    let err = runner.run_step("s1").await.unwrap_err();
    assert!(matches!(err, RunnerError::StaleRoute { .. }));
}

#[tokio::test]
async fn suspend_then_resume_round_trip() {
    let app = GraphBuilder::new()
        .add_node(
            custom("gate"),
            AskingNode {
                question: "Which year do you mean?",
            },
        )
        .add_edge(NodeKind::Start, custom("gate"))
        .add_edge(custom("gate"), NodeKind::End)
        .compile()
        .unwrap();

    let mut runner = AppRunner::new(app, CheckpointerType::InMemory).await;
    runner
        .create_session("s1".into(), state_with_user("look it up"))
        .await
        .unwrap();

    let outcome = runner.run_until_settled("s1").await.unwrap();
    let RunOutcome::Suspended(interrupt) = outcome else {
        panic!("expected suspension");
    };
    assert_eq!(interrupt.question, "Which year do you mean?");

    // Nothing from the suspended step is applied.
    let session = runner.get_session("s1").unwrap();
    assert_eq!(session.state.snapshot().messages.len(), 1);
    assert!(session.pending_interrupt.is_some());

    let outcome = runner
        .resume("s1", &interrupt.tool_call_id, serde_json::json!("2024"))
        .await
        .unwrap();
    let RunOutcome::Complete(state) = outcome else {
        panic!("expected completion after resume");
    };
    let snapshot = state.snapshot();
    assert_eq!(snapshot.extra.get("human_answer"), Some(&serde_json::json!("2024")));
    assert!(
        snapshot.messages[1].content.contains("The user answered"),
        "tool result should land in the transcript"
    );
    assert!(runner.get_session("s1").unwrap().pending_interrupt.is_none());
}

#[tokio::test]
async fn resume_on_running_thread_is_protocol_error() {
    let app = GraphBuilder::new()
        .add_node(custom("a"), TestNode { name: "a" })
        .add_edge(NodeKind::Start, custom("a"))
        .add_edge(custom("a"), NodeKind::End)
        .compile()
        .unwrap();
    let mut runner = AppRunner::new(app, CheckpointerType::InMemory).await;
    runner
        .create_session("s1".into(), state_with_user("hi"))
        .await
        .unwrap();

    let err = runner
        .resume("s1", "call-a-1-0", serde_json::json!("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::NotSuspended { .. }));
}

#[tokio::test]
async fn resume_with_wrong_key_leaves_state_untouched() {
    let app = GraphBuilder::new()
        .add_node(custom("gate"), AskingNode { question: "Q?" })
        .add_edge(NodeKind::Start, custom("gate"))
        .add_edge(custom("gate"), NodeKind::End)
        .compile()
        .unwrap();
    let mut runner = AppRunner::new(app, CheckpointerType::InMemory).await;
    runner
        .create_session("s1".into(), state_with_user("hi"))
        .await
        .unwrap();
    let RunOutcome::Suspended(interrupt) = runner.run_until_settled("s1").await.unwrap() else {
        panic!("expected suspension");
    };

    let err = runner
        .resume("s1", "call-other-9-9", serde_json::json!("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::InterruptMismatch { .. }));

    // Still suspended with the original interrupt.
    let session = runner.get_session("s1").unwrap();
    assert_eq!(
        session.pending_interrupt.as_ref().unwrap().tool_call_id,
        interrupt.tool_call_id
    );
}

#[tokio::test]
async fn node_failure_keeps_pre_step_state() {
    let app = GraphBuilder::new()
        .add_node(custom("boom"), FailingNode)
        .add_edge(NodeKind::Start, custom("boom"))
        .add_edge(custom("boom"), NodeKind::End)
        .compile()
        .unwrap();
    let mut runner = AppRunner::new(app, CheckpointerType::InMemory).await;
    runner
        .create_session("s1".into(), state_with_user("hi"))
        .await
        .unwrap();

    let err = runner.run_until_settled("s1").await.unwrap_err();
    assert!(matches!(err, RunnerError::NodeRun { .. }));

    let session = runner.get_session("s1").unwrap();
    assert_eq!(session.step, 0, "failed step must not advance the counter");
    assert_eq!(
        session.state.snapshot().errors.len(),
        1,
        "failure is recorded as an error event"
    );
}

#[tokio::test]
async fn create_session_resumes_from_checkpoint() {
    let app = GraphBuilder::new()
        .add_node(custom("a"), TestNode { name: "a" })
        .add_edge(NodeKind::Start, custom("a"))
        .add_edge(custom("a"), NodeKind::End)
        .compile()
        .unwrap();

    let mut runner = AppRunner::new(app, CheckpointerType::InMemory).await;
    match runner
        .create_session("s1".into(), state_with_user("hi"))
        .await
        .unwrap()
    {
        SessionInit::Fresh => {}
        SessionInit::Resumed { .. } => panic!("expected fresh session"),
    }
    runner.run_until_settled("s1").await.unwrap();

    // Same id, same runner: the checkpoint wins over the new state.
    match runner
        .create_session("s1".into(), state_with_user("ignored"))
        .await
        .unwrap()
    {
        SessionInit::Resumed { checkpoint_step } => assert!(checkpoint_step >= 1),
        SessionInit::Fresh => panic!("expected resumed session"),
    }
    let session = runner.get_session("s1").unwrap();
    assert!(
        session
            .state
            .snapshot()
            .messages
            .iter()
            .any(|m| m.content == "a ran")
    );
}
