//! Versioned channel containers backing [`VersionedState`](crate::state::VersionedState).
//!
//! Each channel owns one category of state (messages, extras, errors) and
//! an independent version counter. Versions are bumped once per barrier
//! when the channel was updated, giving checkpoints a cheap way to track
//! state evolution without diffing contents.

pub mod errors;

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::message::Message;
use errors::ErrorEvent;

/// Common behavior of a versioned state channel.
pub trait Channel {
    /// The collection type held by this channel.
    type Payload: Clone;

    /// Mutable access to the underlying payload. Mutating does not bump
    /// the version; the barrier owns version increments.
    fn get_mut(&mut self) -> &mut Self::Payload;

    /// Cloned view of the payload.
    fn snapshot(&self) -> Self::Payload;

    /// Current version counter.
    fn version(&self) -> u32;

    /// Set the version counter (used by the barrier and restore paths).
    fn set_version(&mut self, version: u32);
}

macro_rules! versioned_channel {
    ($(#[$doc:meta])* $name:ident, $payload:ty) => {
        $(#[$doc])*
        #[derive(Clone, Debug, PartialEq)]
        pub struct $name {
            payload: $payload,
            version: u32,
        }

        impl $name {
            #[must_use]
            pub fn new(payload: $payload, version: u32) -> Self {
                Self { payload, version }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    payload: Default::default(),
                    version: 1,
                }
            }
        }

        impl Channel for $name {
            type Payload = $payload;

            fn get_mut(&mut self) -> &mut Self::Payload {
                &mut self.payload
            }

            fn snapshot(&self) -> Self::Payload {
                self.payload.clone()
            }

            fn version(&self) -> u32 {
                self.version
            }

            fn set_version(&mut self, version: u32) {
                self.version = version;
            }
        }
    };
}

versioned_channel!(
    /// Conversation transcript channel.
    MessagesChannel,
    Vec<Message>
);

versioned_channel!(
    /// Domain-field channel: a shallow JSON map owned by the agents.
    ExtrasChannel,
    FxHashMap<String, Value>
);

versioned_channel!(
    /// Error event channel.
    ErrorsChannel,
    Vec<ErrorEvent>
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_is_independent_of_later_mutation() {
        let mut ch = MessagesChannel::default();
        ch.get_mut().push(Message::user("hi"));
        let snap = ch.snapshot();
        ch.get_mut().clear();
        assert_eq!(snap.len(), 1);
        assert!(ch.snapshot().is_empty());
    }

    #[test]
    fn versions_start_at_one() {
        assert_eq!(ExtrasChannel::default().version(), 1);
        assert_eq!(ErrorsChannel::default().version(), 1);
    }
}
