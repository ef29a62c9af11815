//! Collection constructors for the state types.

use rustc_hash::FxHashMap;
use serde_json::Value;

/// New empty extra-channel map, typed to match `NodePartial::extra`.
#[must_use]
pub fn new_extra_map() -> FxHashMap<String, Value> {
    FxHashMap::default()
}
