//! Drives one coordinator → math specialist → coordinator round trip
//! with scripted inference, printing the transcript and domain fields.
//!
//! ```sh
//! cargo run -p rg-swarm --example swarm_demo
//! ```

use std::sync::Arc;

use serde_json::json;

use rg_swarm::infer::ScriptedInfer;
use rg_swarm::swarm::{SwarmRunner, TurnOutcome, build_swarm_app};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    relaygraph::telemetry::init();

    let infer = Arc::new(ScriptedInfer::new(vec![
        json!({"action": "use_tool", "tool": "handoff_to_math_specialist",
               "arguments": {"task_message": "Calculate (7 + 5) * 4"}}),
        json!({"action": "use_tool", "tool": "calculate",
               "arguments": {"expression": "(7 + 5) * 4"}}),
        json!({"action": "use_tool", "tool": "transfer_to_coordinator", "arguments": {}}),
        json!({"action": "respond",
               "message": "The math specialist computed (7 + 5) * 4 = 48."}),
    ]));

    let app = build_swarm_app(infer)?;
    let mut runner = SwarmRunner::new(app).await;

    match runner.invoke("demo-thread", "What is (7 + 5) * 4?").await? {
        TurnOutcome::Complete(state) => {
            let snapshot = state.snapshot();
            println!("--- transcript ---");
            for message in &snapshot.messages {
                println!("{:>9}: {}", message.role, message.content);
            }
            println!("--- domain fields ---");
            let mut keys: Vec<_> = snapshot.extra.keys().collect();
            keys.sort();
            for key in keys {
                println!("{key} = {}", snapshot.extra[key]);
            }
        }
        TurnOutcome::Suspended {
            question,
            tool_call_id,
        } => {
            println!("paused on {tool_call_id}: {question}");
        }
    }
    Ok(())
}
