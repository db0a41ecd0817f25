//! Link values.
//!
//! A link is stored inside a field as
//! `{"sys": {"type": "Link", "linkType": "Entry", "id": "..."}}`. It is never
//! persisted as a record of its own; it is resolved by looking up its target id.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Kind of record a link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkType {
    /// Link to an entry.
    Entry,
    /// Link to an asset.
    Asset,
}

impl LinkType {
    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::Entry => "Entry",
            LinkType::Asset => "Asset",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "Entry" => Some(LinkType::Entry),
            "Asset" => Some(LinkType::Asset),
            _ => None,
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unresolved reference to another record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Link {
    /// What kind of record is referenced.
    pub link_type: LinkType,
    /// Id of the referenced record.
    pub id: String,
}

impl Link {
    /// Creates a link to an entry.
    pub fn entry(id: impl Into<String>) -> Self {
        Self {
            link_type: LinkType::Entry,
            id: id.into(),
        }
    }

    /// Creates a link to an asset.
    pub fn asset(id: impl Into<String>) -> Self {
        Self {
            link_type: LinkType::Asset,
            id: id.into(),
        }
    }

    /// Parses a field value as a link.
    ///
    /// Returns `None` for anything that is not an Entry or Asset link,
    /// including links to content types.
    pub fn from_value(value: &Value) -> Option<Self> {
        let sys = value.get("sys")?;
        if sys.get("type")?.as_str()? != "Link" {
            return None;
        }
        let link_type = LinkType::parse(sys.get("linkType")?.as_str()?)?;
        let id = sys.get("id")?.as_str()?;
        Some(Self {
            link_type,
            id: id.to_string(),
        })
    }

    /// Returns true if the value is an Entry or Asset link.
    pub fn is_link(value: &Value) -> bool {
        Self::from_value(value).is_some()
    }

    /// Encodes the link in its wire shape.
    pub fn to_value(&self) -> Value {
        json!({
            "sys": {
                "type": "Link",
                "linkType": self.link_type.as_str(),
                "id": self.id,
            }
        })
    }
}

impl From<Link> for Value {
    fn from(link: Link) -> Self {
        link.to_value()
    }
}

/// Collects every link found in `value`, descending into arrays.
pub fn collect_links(value: &Value, out: &mut Vec<Link>) {
    if let Some(link) = Link::from_value(value) {
        out.push(link);
        return;
    }
    if let Value::Array(items) = value {
        for item in items {
            collect_links(item, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_roundtrip() {
        let link = Link::entry("abc");
        let value = link.to_value();
        assert_eq!(Link::from_value(&value), Some(link));
    }

    #[test]
    fn content_type_links_are_not_record_links() {
        let value = json!({"sys": {"type": "Link", "linkType": "ContentType", "id": "page"}});
        assert!(!Link::is_link(&value));
    }

    #[test]
    fn scalars_are_not_links() {
        assert!(Link::from_value(&json!("x")).is_none());
        assert!(Link::from_value(&json!({"sys": {"type": "Entry", "id": "x"}})).is_none());
    }

    #[test]
    fn collect_descends_into_arrays() {
        let value = json!([Link::entry("a").to_value(), "text", Link::asset("b").to_value()]);
        let mut links = Vec::new();
        collect_links(&value, &mut links);
        assert_eq!(links, vec![Link::entry("a"), Link::asset("b")]);
    }
}
