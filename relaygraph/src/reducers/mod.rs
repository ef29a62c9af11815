//! Barrier merge strategies.
//!
//! Every reducer folds a [`NodePartial`] delta into [`VersionedState`]
//! for one channel. The registry applies them at the barrier; nodes
//! never write shared state directly, which is what keeps the model
//! safe without locking.

mod add_errors;
mod add_messages;
mod map_merge;
mod reducer_registry;

pub use add_errors::AddErrors;
pub use add_messages::AddMessages;
pub use map_merge::MapMerge;
pub use reducer_registry::ReducerRegistry;
pub(crate) use reducer_registry::channel_guard;

use crate::node::NodePartial;
use crate::state::VersionedState;
use crate::types::ChannelType;
use std::fmt;

/// Unified reducer trait: mutate `VersionedState` using a partial delta.
pub trait Reducer: Send + Sync {
    fn apply(&self, state: &mut VersionedState, update: &NodePartial);
}

#[derive(Debug)]
pub enum ReducerError {
    UnknownChannel(ChannelType),
}

impl fmt::Display for ReducerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReducerError::UnknownChannel(channel) => {
                write!(f, "no reducers registered for channel: {channel:?}")
            }
        }
    }
}

impl std::error::Error for ReducerError {}
