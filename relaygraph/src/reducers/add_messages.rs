use super::Reducer;
use crate::{channels::Channel, node::NodePartial, state::VersionedState};

/// Message reducer: appends by default; honors the explicit reset flag,
/// which is the only sanctioned way the transcript shrinks.
#[derive(Debug, PartialEq, Clone, Hash, Eq)]
pub struct AddMessages;

impl Reducer for AddMessages {
    fn apply(&self, state: &mut VersionedState, update: &NodePartial) {
        let Some(incoming) = &update.messages else {
            return;
        };
        let transcript = state.messages.get_mut();
        if update.reset_messages {
            transcript.clear();
        } else if incoming.is_empty() {
            return;
        }
        transcript.extend(incoming.iter().cloned());
    }
}
