use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::{
    node::NodePartial,
    reducers::{AddErrors, AddMessages, MapMerge, Reducer, ReducerError},
    state::VersionedState,
    types::ChannelType,
};

/// Maps channels to the reducers applied at the barrier.
#[derive(Clone)]
pub struct ReducerRegistry {
    reducer_map: FxHashMap<ChannelType, Vec<Arc<dyn Reducer>>>,
}

/// Whether the partial carries data for the channel; lets the registry
/// skip reducers (and version bumps) when there is nothing to do.
pub(crate) fn channel_guard(channel: &ChannelType, partial: &NodePartial) -> bool {
    match channel {
        ChannelType::Message => {
            partial.reset_messages
                || partial
                    .messages
                    .as_ref()
                    .map(|v| !v.is_empty())
                    .unwrap_or(false)
        }
        ChannelType::Extra => partial
            .extra
            .as_ref()
            .map(|m| !m.is_empty())
            .unwrap_or(false),
        ChannelType::Error => partial
            .errors
            .as_ref()
            .map(|v| !v.is_empty())
            .unwrap_or(false),
    }
}

impl Default for ReducerRegistry {
    fn default() -> Self {
        let mut registry = Self {
            reducer_map: FxHashMap::default(),
        };
        registry
            .register(ChannelType::Message, Arc::new(AddMessages))
            .register(ChannelType::Extra, Arc::new(MapMerge))
            .register(ChannelType::Error, Arc::new(AddErrors));
        registry
    }
}

impl ReducerRegistry {
    pub fn register(&mut self, channel: ChannelType, reducer: Arc<dyn Reducer>) -> &mut Self {
        self.reducer_map.entry(channel).or_default().push(reducer);
        self
    }

    /// Apply all reducers registered for `channel` if the partial has
    /// data for it. Returns whether anything was applied.
    pub fn try_update(
        &self,
        channel: ChannelType,
        state: &mut VersionedState,
        partial: &NodePartial,
    ) -> Result<bool, ReducerError> {
        if !channel_guard(&channel, partial) {
            return Ok(false);
        }
        let Some(reducers) = self.reducer_map.get(&channel) else {
            return Err(ReducerError::UnknownChannel(channel));
        };
        for reducer in reducers {
            reducer.apply(state, partial);
        }
        Ok(true)
    }

    /// Channels that have at least one registered reducer.
    pub fn channels(&self) -> impl Iterator<Item = &ChannelType> {
        self.reducer_map.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[test]
    fn guard_skips_empty_partials() {
        let registry = ReducerRegistry::default();
        let mut state = VersionedState::new_with_user_message("hi");
        let applied = registry
            .try_update(ChannelType::Message, &mut state, &NodePartial::new())
            .unwrap();
        assert!(!applied);
    }

    #[test]
    fn reset_with_empty_list_clears_transcript() {
        let registry = ReducerRegistry::default();
        let mut state = VersionedState::new_with_user_message("hi");
        let partial = NodePartial::new().with_reset_messages(Vec::<Message>::new());
        let applied = registry
            .try_update(ChannelType::Message, &mut state, &partial)
            .unwrap();
        assert!(applied);
        assert!(state.snapshot().messages.is_empty());
    }
}
