//! Runtime infrastructure: sessions, checkpointing, and resumable
//! execution.
//!
//! [`AppRunner`] owns per-thread [`SessionState`] and drives supersteps;
//! [`Checkpointer`] abstracts thread-keyed persistence. The in-memory
//! store is the default; a durable SQLite backend is available behind
//! the `sqlite` feature.

pub mod checkpointer;
#[cfg(feature = "sqlite")]
pub mod checkpointer_sqlite;
pub mod persistence;
pub mod runner;
pub mod runtime_config;

pub use checkpointer::{
    Checkpoint, Checkpointer, CheckpointerError, CheckpointerType, InMemoryCheckpointer,
    restore_session_state,
};
#[cfg(feature = "sqlite")]
pub use checkpointer_sqlite::SQLiteCheckpointer;
pub use persistence::{
    PersistedCheckpoint, PersistedInterrupt, PersistedMapChannel, PersistedState,
    PersistedVecChannel,
};
pub use runner::{
    AppRunner, PendingInterrupt, RunOutcome, RunnerError, SessionInit, SessionState,
    StateVersions, StepReport, StepResult,
};
pub use runtime_config::RuntimeConfig;
