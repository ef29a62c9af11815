//! Error events recorded in the errors channel.
//!
//! Non-fatal failures (a tool that could not parse its input, an
//! inference call that fell back to a default) are recorded here and
//! carried in state, while fatal failures travel as `Err` values through
//! the runner. The two paths never mix.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An error event with scope, cause chain, tags, and free-form context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ErrorEvent {
    #[serde(default = "chrono::Utc::now")]
    pub when: DateTime<Utc>,
    #[serde(default)]
    pub scope: ErrorScope,
    #[serde(default)]
    pub error: ErrorDetail,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub context: serde_json::Value,
}

impl ErrorEvent {
    /// Create a node-scoped error event.
    pub fn node<S: Into<String>>(kind: S, step: u64, error: ErrorDetail) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::Node {
                kind: kind.into(),
                step,
            },
            error,
            tags: Vec::new(),
            context: serde_json::Value::Null,
        }
    }

    /// Create a runner-scoped error event.
    pub fn runner<S: Into<String>>(session: S, step: u64, error: ErrorDetail) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::Runner {
                session: session.into(),
                step,
            },
            error,
            tags: Vec::new(),
            context: serde_json::Value::Null,
        }
    }

    pub fn with_tag<S: Into<String>>(mut self, tag: S) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }
}

/// Where an error event originated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ErrorScope {
    Node { kind: String, step: u64 },
    Runner { session: String, step: u64 },
    #[default]
    App,
}

/// A message with an optional nested cause and structured details.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<ErrorDetail>>,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl Default for ErrorDetail {
    fn default() -> Self {
        ErrorDetail {
            message: String::new(),
            cause: None,
            details: serde_json::Value::Null,
        }
    }
}

impl std::fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ErrorDetail {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_ref().map(|c| c as &dyn std::error::Error)
    }
}

impl ErrorDetail {
    pub fn msg<M: Into<String>>(m: M) -> Self {
        ErrorDetail {
            message: m.into(),
            cause: None,
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_cause(mut self, cause: ErrorDetail) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}
