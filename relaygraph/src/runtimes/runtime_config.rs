use crate::utils::id_generator::IdGenerator;

use super::CheckpointerType;

/// Runtime settings attached to a compiled graph.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Session id used by one-shot invocation; generated when absent.
    pub session_id: Option<String>,
    /// Persistence backend for checkpoints.
    pub checkpointer: Option<CheckpointerType>,
    /// Database name for the SQLite backend.
    pub sqlite_db_name: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            session_id: Some(IdGenerator::new().generate_run_id()),
            checkpointer: Some(CheckpointerType::InMemory),
            sqlite_db_name: Self::resolve_sqlite_db_name(None),
        }
    }
}

impl RuntimeConfig {
    fn resolve_sqlite_db_name(provided: Option<String>) -> Option<String> {
        if let Some(name) = provided {
            return Some(name);
        }
        dotenvy::dotenv().ok();
        Some(std::env::var("RELAYGRAPH_SQLITE_DB").unwrap_or_else(|_| "relaygraph.db".to_string()))
    }

    pub fn new(
        session_id: Option<String>,
        checkpointer: Option<CheckpointerType>,
        sqlite_db_name: Option<String>,
    ) -> Self {
        Self {
            session_id,
            checkpointer,
            sqlite_db_name: Self::resolve_sqlite_db_name(sqlite_db_name),
        }
    }
}
