//! Server configuration shape.
//!
//! The server owns this configuration and pushes it to clients whenever it
//! changes. Clients only ever replace their copy wholesale.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// User-tunable server configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Config {
    /// Whether the UI appends a `limit:` clause to queries lacking one.
    pub auto_insert_limit_to_query: bool,
}

impl Config {
    /// Creates a configuration.
    pub fn new(auto_insert_limit_to_query: bool) -> Self {
        Self {
            auto_insert_limit_to_query,
        }
    }
}

/// Returns true if `value` has the shape of a [`Config`].
///
/// Never panics and never mutates the input.
pub fn is_config(value: &Value) -> bool {
    value.is_object() && Config::deserialize(value).is_ok()
}
