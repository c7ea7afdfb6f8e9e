//! Human-readable and semantic annotations shared by properties, actions and
//! events.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Optional annotations rendered into the Thing description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Semantic capability annotation, e.g. `"OnOffProperty"`.
    #[serde(rename = "@type", default, skip_serializing_if = "Option::is_none")]
    pub semantic_type: Option<String>,
}

impl Metadata {
    /// Insert the present annotations into a description object.
    pub fn write_into(&self, target: &mut Map<String, Value>) {
        if let Some(title) = &self.title {
            target.insert("title".to_string(), Value::from(title.as_str()));
        }
        if let Some(description) = &self.description {
            target.insert("description".to_string(), Value::from(description.as_str()));
        }
        if let Some(semantic_type) = &self.semantic_type {
            target.insert("@type".to_string(), Value::from(semantic_type.as_str()));
        }
    }
}
