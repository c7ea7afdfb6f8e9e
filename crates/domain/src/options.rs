//! Per-Thing engine options.

use serde::{Deserialize, Serialize};

use crate::error::DefinitionError;

/// Tunables for a single Thing. Missing fields take their defaults when
/// deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThingOptions {
    /// Match property, action and event names case-insensitively.
    pub ignore_case: bool,
    /// Number of action instances retained; only terminal ones are evicted.
    pub max_actions: usize,
    /// Capacity of the event history ring buffer.
    pub max_events: usize,
    /// Capacity of each subscriber's outbound queue.
    pub subscriber_queue: usize,
    /// Prefix for every `href` in descriptions, e.g. `/things/lamp/`.
    pub href_prefix: String,
}

impl Default for ThingOptions {
    fn default() -> Self {
        Self {
            ignore_case: false,
            max_actions: 100,
            max_events: 100,
            subscriber_queue: 64,
            href_prefix: "/".to_string(),
        }
    }
}

impl ThingOptions {
    /// Check that every bound is usable.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError::ZeroOption`] naming the first bound set to 0.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.max_actions == 0 {
            return Err(DefinitionError::ZeroOption("max_actions"));
        }
        if self.max_events == 0 {
            return Err(DefinitionError::ZeroOption("max_events"));
        }
        if self.subscriber_queue == 0 {
            return Err(DefinitionError::ZeroOption("subscriber_queue"));
        }
        Ok(())
    }

    /// Key under which `name` is stored and looked up.
    #[must_use]
    pub fn key(&self, name: &str) -> String {
        if self.ignore_case {
            name.to_lowercase()
        } else {
            name.to_string()
        }
    }

    /// Join `path` onto the href prefix, with exactly one `/` between them.
    #[must_use]
    pub fn href(&self, path: &str) -> String {
        let prefix = self.href_prefix.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{prefix}/{path}")
    }
}
