//! Content type descriptors and the registry that holds them.
//!
//! Records are never turned into per-type structs. Anything that needs to
//! know the shape of a content type asks the registry instead.

use crate::error::{CoreError, CoreResult};
use crate::link::LinkType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Value kind of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    /// Short text.
    Symbol,
    /// Long text.
    Text,
    /// Structured rich text document.
    RichText,
    /// Integer number.
    Integer,
    /// Floating point number.
    Number,
    /// ISO-8601 date.
    Date,
    /// Boolean.
    Boolean,
    /// Geographic coordinates.
    Location,
    /// Free-form JSON object.
    Object,
    /// Link to an entry or asset.
    Link,
    /// Array of items (see [`ItemsDescriptor`]).
    Array,
}

/// Describes the items of an `Array` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemsDescriptor {
    /// Item kind.
    #[serde(rename = "type")]
    pub kind: FieldKind,
    /// Link target for `Link` items.
    #[serde(rename = "linkType", default, skip_serializing_if = "Option::is_none")]
    pub link_type: Option<LinkType>,
}

/// Describes a single field of a content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field id, as used in `fields.<id>`.
    pub id: String,
    /// Value kind.
    #[serde(rename = "type")]
    pub kind: FieldKind,
    /// Whether the field carries one value per locale.
    #[serde(default)]
    pub localized: bool,
    /// Whether a value is required for publishing.
    #[serde(default)]
    pub required: bool,
    /// Link target for `Link` fields.
    #[serde(rename = "linkType", default, skip_serializing_if = "Option::is_none")]
    pub link_type: Option<LinkType>,
    /// Item descriptor for `Array` fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<ItemsDescriptor>,
}

impl FieldDescriptor {
    /// Creates a descriptor of the given kind.
    pub fn new(id: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            id: id.into(),
            kind,
            localized: false,
            required: false,
            link_type: None,
            items: None,
        }
    }

    /// Creates a single-link field.
    pub fn link(id: impl Into<String>, link_type: LinkType) -> Self {
        let mut field = Self::new(id, FieldKind::Link);
        field.link_type = Some(link_type);
        field
    }

    /// Creates an array-of-links field.
    pub fn links(id: impl Into<String>, link_type: LinkType) -> Self {
        let mut field = Self::new(id, FieldKind::Array);
        field.items = Some(ItemsDescriptor {
            kind: FieldKind::Link,
            link_type: Some(link_type),
        });
        field
    }

    /// Marks the field as localized.
    #[must_use]
    pub fn localized(mut self) -> Self {
        self.localized = true;
        self
    }

    /// Marks the field as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Returns the link target if this field holds one link or an array of links.
    pub fn link_target(&self) -> Option<LinkType> {
        match self.kind {
            FieldKind::Link => self.link_type,
            FieldKind::Array => self
                .items
                .as_ref()
                .filter(|items| items.kind == FieldKind::Link)
                .and_then(|items| items.link_type),
            _ => None,
        }
    }

    /// Returns true if the field holds links to entries.
    pub fn links_entries(&self) -> bool {
        self.link_target() == Some(LinkType::Entry)
    }
}

/// Schema of one content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentType {
    /// Content type id.
    pub id: String,
    /// Human readable name.
    #[serde(default)]
    pub name: String,
    /// Field used as the entry title.
    #[serde(rename = "displayField", default, skip_serializing_if = "Option::is_none")]
    pub display_field: Option<String>,
    /// Field descriptors, in declaration order.
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

impl ContentType {
    /// Creates a content type with no fields.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            display_field: None,
            fields: Vec::new(),
        }
    }

    /// Adds a field.
    #[must_use]
    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Sets the display field.
    #[must_use]
    pub fn with_display_field(mut self, field: impl Into<String>) -> Self {
        self.display_field = Some(field.into());
        self
    }

    /// Looks up a field by id.
    pub fn field(&self, id: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.id == id)
    }
}

/// Table of known content types.
///
/// Owned by the application and passed explicitly to whatever needs type
/// information.
#[derive(Debug, Clone, Default)]
pub struct ContentTypeRegistry {
    types: HashMap<String, ContentType>,
}

impl ContentTypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a content type, replacing any previous one with the same id.
    pub fn register(&mut self, content_type: ContentType) -> Option<ContentType> {
        self.types.insert(content_type.id.clone(), content_type)
    }

    /// Builder-style registration.
    #[must_use]
    pub fn with(mut self, content_type: ContentType) -> Self {
        self.register(content_type);
        self
    }

    /// Loads content types from the JSON array returned by the remote API.
    pub fn from_json(json: &str) -> CoreResult<Self> {
        let types: Vec<ContentType> = serde_json::from_str(json)?;
        Ok(types.into_iter().fold(Self::new(), Self::with))
    }

    /// Looks up a content type.
    pub fn get(&self, id: &str) -> Option<&ContentType> {
        self.types.get(id)
    }

    /// Looks up a content type, failing if it is unknown.
    pub fn require(&self, id: &str) -> CoreResult<&ContentType> {
        self.get(id)
            .ok_or_else(|| CoreError::UnknownContentType { id: id.to_string() })
    }

    /// Returns true if the content type is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.types.contains_key(id)
    }

    /// Checks that `field` exists on `content_type`.
    ///
    /// Unregistered content types are not checked.
    pub fn validate_field(&self, content_type: &str, field: &str) -> CoreResult<()> {
        match self.get(content_type) {
            Some(ct) if ct.field(field).is_none() => Err(CoreError::UnknownField {
                content_type: content_type.to_string(),
                field: field.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Returns the number of registered content types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterates over registered content types.
    pub fn iter(&self) -> impl Iterator<Item = &ContentType> {
        self.types.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> ContentType {
        ContentType::new("page")
            .with_field(FieldDescriptor::new("slug", FieldKind::Symbol).required())
            .with_field(FieldDescriptor::link("parent", LinkType::Entry))
            .with_field(FieldDescriptor::links("images", LinkType::Asset))
            .with_display_field("slug")
    }

    #[test]
    fn link_targets() {
        let ct = page();
        assert_eq!(ct.field("slug").unwrap().link_target(), None);
        assert_eq!(ct.field("parent").unwrap().link_target(), Some(LinkType::Entry));
        assert_eq!(ct.field("images").unwrap().link_target(), Some(LinkType::Asset));
        assert!(ct.field("parent").unwrap().links_entries());
        assert!(!ct.field("images").unwrap().links_entries());
    }

    #[test]
    fn validate_field() {
        let registry = ContentTypeRegistry::new().with(page());
        assert!(registry.validate_field("page", "slug").is_ok());
        assert!(matches!(
            registry.validate_field("page", "nope"),
            Err(CoreError::UnknownField { .. })
        ));
        // unknown content types are not validated
        assert!(registry.validate_field("post", "anything").is_ok());
    }

    #[test]
    fn require_unknown_type() {
        let registry = ContentTypeRegistry::new();
        assert!(matches!(
            registry.require("page"),
            Err(CoreError::UnknownContentType { .. })
        ));
    }

    #[test]
    fn loads_remote_json() {
        let registry = ContentTypeRegistry::from_json(
            r#"[{
                "id": "post",
                "name": "Post",
                "displayField": "title",
                "fields": [
                    {"id": "title", "type": "Symbol", "localized": true},
                    {"id": "author", "type": "Link", "linkType": "Entry"},
                    {"id": "tags", "type": "Array", "items": {"type": "Symbol"}}
                ]
            }]"#,
        )
        .unwrap();

        let post = registry.get("post").unwrap();
        assert_eq!(post.display_field.as_deref(), Some("title"));
        assert!(post.field("title").unwrap().localized);
        assert!(post.field("author").unwrap().links_entries());
        assert_eq!(post.field("tags").unwrap().link_target(), None);
    }
}
