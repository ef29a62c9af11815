//! Weather lookup for the weather specialist, mocked through the
//! inference seam.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

use relaygraph::message::Message;

use super::{Tool, ToolError, ToolInvocation, ToolOutcome, require_str_arg};
use crate::fields;
use crate::infer::{StructuredInfer, schema};

pub struct GetWeatherTool {
    infer: Arc<dyn StructuredInfer>,
}

impl GetWeatherTool {
    #[must_use]
    pub fn new(infer: Arc<dyn StructuredInfer>) -> Self {
        Self { infer }
    }
}

#[async_trait]
impl Tool for GetWeatherTool {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Look up the current weather for a location."
    }

    async fn invoke(&self, invocation: ToolInvocation<'_>) -> Result<ToolOutcome, ToolError> {
        let location = match require_str_arg(
            &invocation.arguments,
            "location",
            self.name(),
            invocation.tool_call_id,
        ) {
            Ok(l) => l.to_string(),
            Err(outcome) => return Ok(*outcome),
        };

        let instruction = format!(
            "Produce a plausible current weather report for {location} \
             with fields temperature, conditions, and date."
        );
        let context = json!({ "location": location });
        let report = self
            .infer
            .infer(&instruction, Some(schema::WEATHER_REPORT), &context)
            .await
            // Documented fallback for transient inference failures.
            .unwrap_or_else(|_| json!({ "temperature": "70 degrees", "conditions": "clear" }));

        let temperature = report
            .get("temperature")
            .and_then(Value::as_str)
            .unwrap_or("70 degrees")
            .to_string();
        let conditions = report
            .get("conditions")
            .and_then(Value::as_str)
            .unwrap_or("clear")
            .to_string();

        let mut fields = relaygraph::utils::collections::new_extra_map();
        fields.insert(fields::LOCATION.to_string(), json!(location));
        fields.insert(fields::TEMPERATURE.to_string(), json!(temperature));
        fields.insert(fields::CONDITIONS.to_string(), json!(conditions));

        Ok(ToolOutcome::update(
            Message::tool(
                &format!("The weather for {location} is {temperature}, {conditions}."),
                invocation.tool_call_id,
            ),
            fields,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::{ScriptedInfer, UnavailableInfer};
    use relaygraph::state::VersionedState;

    #[tokio::test]
    async fn records_weather_fields() {
        let infer = Arc::new(ScriptedInfer::new(vec![json!({
            "temperature": "31C",
            "conditions": "humid",
            "date": "2025-01-01"
        })]));
        let tool = GetWeatherTool::new(infer);
        let state = VersionedState::new_with_user_message("weather?");
        let snapshot = state.snapshot();
        let outcome = tool
            .invoke(ToolInvocation {
                arguments: json!({ "location": "Belem" }),
                tool_call_id: "call-weather-1-0",
                snapshot: &snapshot,
            })
            .await
            .unwrap();

        let ToolOutcome::Update { messages, fields } = outcome else {
            panic!("expected update");
        };
        assert!(messages[0].content.contains("31C"));
        assert_eq!(fields.get("location"), Some(&json!("Belem")));
        assert_eq!(fields.get("conditions"), Some(&json!("humid")));
    }

    #[tokio::test]
    async fn falls_back_when_inference_is_down() {
        let tool = GetWeatherTool::new(Arc::new(UnavailableInfer));
        let state = VersionedState::new_with_user_message("weather?");
        let snapshot = state.snapshot();
        let outcome = tool
            .invoke(ToolInvocation {
                arguments: json!({ "location": "Belem" }),
                tool_call_id: "call-weather-1-0",
                snapshot: &snapshot,
            })
            .await
            .unwrap();
        let ToolOutcome::Update { fields, .. } = outcome else {
            panic!("expected update");
        };
        assert_eq!(fields.get("temperature"), Some(&json!("70 degrees")));
    }
}
