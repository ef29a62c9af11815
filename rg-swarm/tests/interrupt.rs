//! Human-in-the-loop suspend/resume through the full swarm.

use std::sync::Arc;

use serde_json::json;

use rg_swarm::fields;
use rg_swarm::infer::ScriptedInfer;
use rg_swarm::swarm::{SwarmError, SwarmRunner, TurnOutcome, build_swarm_app};

#[tokio::test]
async fn ask_user_suspends_and_resumes_at_the_same_call() {
    // The suspended agent is re-entered from its start on resume, so the
    // script carries the ask_user decision twice: once for the original
    // pass, once for the replay.
    let infer = Arc::new(ScriptedInfer::new(vec![
        json!({"action": "use_tool", "tool": "ask_user",
               "arguments": {"question": "Which city do you mean?"}}),
        json!({"action": "use_tool", "tool": "ask_user",
               "arguments": {"question": "Which city do you mean?"}}),
        json!({"action": "respond", "message": "Noted: Belem it is."}),
    ]));
    let app = build_swarm_app(infer).unwrap();
    let mut runner = SwarmRunner::new(app).await;

    let outcome = runner.invoke("thread-hitl", "weather please").await.unwrap();
    let TurnOutcome::Suspended {
        question,
        tool_call_id,
    } = outcome
    else {
        panic!("expected suspension");
    };
    assert_eq!(question, "Which city do you mean?");

    // While suspended, new turns are refused.
    let err = runner
        .invoke("thread-hitl", "hello?")
        .await
        .expect_err("suspended thread must not accept new turns");
    assert!(matches!(err, SwarmError::ThreadSuspended { .. }));

    let outcome = runner
        .resume("thread-hitl", &tool_call_id, json!("Belem"))
        .await
        .unwrap();
    let TurnOutcome::Complete(state) = outcome else {
        panic!("expected completion after resume");
    };
    let snapshot = state.snapshot();

    // The tool's return value is a deterministic function of the answer,
    // and the awaiting flag is gone.
    assert_eq!(
        snapshot.extra.get(fields::HUMAN_RESPONSE),
        Some(&json!("Belem"))
    );
    assert!(
        snapshot
            .messages
            .iter()
            .any(|m| m.content == "The user answered: Belem")
    );
    assert!(
        runner
            .thread("thread-hitl")
            .unwrap()
            .pending_interrupt
            .is_none()
    );
    assert_eq!(snapshot.messages.last().unwrap().content, "Noted: Belem it is.");
}

#[tokio::test]
async fn resume_with_wrong_key_is_rejected_and_thread_stays_suspended() {
    let infer = Arc::new(ScriptedInfer::new(vec![json!({
        "action": "use_tool", "tool": "ask_user",
        "arguments": {"question": "Proceed?"}
    })]));
    let app = build_swarm_app(infer).unwrap();
    let mut runner = SwarmRunner::new(app).await;

    let TurnOutcome::Suspended { tool_call_id, .. } =
        runner.invoke("thread-key", "do the thing").await.unwrap()
    else {
        panic!("expected suspension");
    };

    let err = runner
        .resume("thread-key", "call-nonsense-0-0", json!("yes"))
        .await
        .expect_err("mismatched pairing key must fail");
    assert!(matches!(
        err,
        SwarmError::Runner(relaygraph::runtimes::RunnerError::InterruptMismatch { .. })
    ));

    let pending = runner
        .thread("thread-key")
        .unwrap()
        .pending_interrupt
        .as_ref()
        .expect("still suspended");
    assert_eq!(pending.tool_call_id, tool_call_id);
}
