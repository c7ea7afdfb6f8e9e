//! Thing description documents.
//!
//! The description is what a consumer fetches to discover a Thing: its
//! identity, every property (with schema), action and event, and the links
//! to reach them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON-LD context advertised by every description.
pub const CONTEXT: &str = "https://iot.mozilla.org/schemas";

/// A typed hyperlink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub rel: String,
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

impl Link {
    #[must_use]
    pub fn to(rel: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            rel: rel.into(),
            href: href.into(),
            media_type: None,
        }
    }

    /// Wrap this link as the single-element `links` array of an entry.
    #[must_use]
    pub fn into_array(self) -> Value {
        let mut link = Map::new();
        link.insert("rel".to_string(), Value::String(self.rel));
        link.insert("href".to_string(), Value::String(self.href));
        if let Some(media_type) = self.media_type {
            link.insert("mediaType".to_string(), Value::String(media_type));
        }
        Value::Array(vec![Value::Object(link)])
    }
}

/// Identity of a Thing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThingInfo {
    /// Stable identifier, usually a URN such as `urn:dev:ops:lamp-1`.
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Semantic capabilities, e.g. `["OnOffSwitch", "Light"]`.
    #[serde(rename = "@type", default, skip_serializing_if = "Vec::is_empty")]
    pub semantic_types: Vec<String>,
}

/// Full description document of a Thing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThingDescription {
    #[serde(rename = "@context")]
    pub context: String,
    #[serde(flatten)]
    pub info: ThingInfo,
    pub properties: BTreeMap<String, Value>,
    pub actions: BTreeMap<String, Value>,
    pub events: BTreeMap<String, Value>,
    pub links: Vec<Link>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn should_serialize_link_without_media_type() {
        let link = Link::to("property", "/properties/on");
        assert_eq!(
            serde_json::to_value(link).unwrap(),
            json!({"rel": "property", "href": "/properties/on"})
        );
    }

    #[test]
    fn should_wrap_link_in_single_element_array() {
        assert_eq!(
            Link::to("event", "/events/overheated").into_array(),
            json!([{"rel": "event", "href": "/events/overheated"}])
        );
    }

    #[test]
    fn should_serialize_media_type_in_camel_case() {
        let link = Link {
            media_type: Some("text/html".to_string()),
            ..Link::to("alternate", "/ui")
        };
        assert_eq!(
            serde_json::to_value(link).unwrap()["mediaType"],
            json!("text/html")
        );
    }

    #[test]
    fn should_flatten_thing_info_into_description() {
        let description = ThingDescription {
            context: CONTEXT.to_string(),
            info: ThingInfo {
                id: "urn:dev:ops:lamp-1".to_string(),
                title: "Lamp".to_string(),
                description: None,
                semantic_types: vec!["Light".to_string()],
            },
            properties: BTreeMap::new(),
            actions: BTreeMap::new(),
            events: BTreeMap::new(),
            links: vec![Link::to("properties", "/properties")],
        };

        assert_eq!(
            serde_json::to_value(description).unwrap(),
            json!({
                "@context": CONTEXT,
                "id": "urn:dev:ops:lamp-1",
                "title": "Lamp",
                "@type": ["Light"],
                "properties": {},
                "actions": {},
                "events": {},
                "links": [{"rel": "properties", "href": "/properties"}]
            })
        );
    }
}
