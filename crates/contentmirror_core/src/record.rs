//! Records of the content graph.

use crate::error::{CoreError, CoreResult};
use crate::link::{collect_links, Link};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Content type id reported for assets.
pub const ASSET_CONTENT_TYPE: &str = "Asset";

/// The kind of a record, carried as `sys.type` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    /// A published entry.
    Entry,
    /// A published asset.
    Asset,
    /// Tombstone for an entry.
    DeletedEntry,
    /// Tombstone for an asset.
    DeletedAsset,
    /// Persisted sync cursor.
    #[serde(rename = "token")]
    SyncToken,
}

impl RecordKind {
    /// Returns true for `DeletedEntry` and `DeletedAsset`.
    pub fn is_deletion(&self) -> bool {
        matches!(self, RecordKind::DeletedEntry | RecordKind::DeletedAsset)
    }

    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Entry => "Entry",
            RecordKind::Asset => "Asset",
            RecordKind::DeletedEntry => "DeletedEntry",
            RecordKind::DeletedAsset => "DeletedAsset",
            RecordKind::SyncToken => "token",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// System metadata of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sys {
    /// Record id, unique within a space and environment.
    pub id: String,
    /// Record kind.
    #[serde(rename = "type")]
    pub kind: RecordKind,
    /// Publish revision. Absent before the first publish.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<u64>,
    /// Content type id (entries only).
    #[serde(
        rename = "contentType",
        default,
        skip_serializing_if = "Option::is_none",
        with = "content_type_link"
    )]
    pub content_type: Option<String>,
    /// Locale of a single-locale record. `None` means fields are keyed by locale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// Creation timestamp.
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Last update timestamp.
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Deletion timestamp (tombstones only).
    #[serde(rename = "deletedAt", default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<String>,
}

impl Sys {
    fn new(id: impl Into<String>, kind: RecordKind) -> Self {
        Self {
            id: id.into(),
            kind,
            revision: None,
            content_type: None,
            locale: None,
            created_at: None,
            updated_at: None,
            deleted_at: None,
        }
    }
}

/// Id and kind of a record, without its content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordIdentity {
    /// Record id.
    pub id: String,
    /// Record kind.
    pub kind: RecordKind,
}

/// A node of the content graph.
///
/// Fields map a field name to `{locale: value}` unless `sys.locale` is set,
/// in which case they map directly to the value for that locale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// System metadata.
    pub sys: Sys,
    /// Field values.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
    /// Opaque cursor (sync token records only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Record {
    fn with_sys(sys: Sys) -> Self {
        Self {
            sys,
            fields: Map::new(),
            token: None,
        }
    }

    /// Creates an empty entry of the given content type.
    pub fn entry(id: impl Into<String>, content_type: impl Into<String>) -> Self {
        let mut sys = Sys::new(id, RecordKind::Entry);
        sys.content_type = Some(content_type.into());
        Self::with_sys(sys)
    }

    /// Creates an empty asset.
    pub fn asset(id: impl Into<String>) -> Self {
        Self::with_sys(Sys::new(id, RecordKind::Asset))
    }

    /// Creates an entry tombstone.
    pub fn deleted_entry(id: impl Into<String>) -> Self {
        Self::with_sys(Sys::new(id, RecordKind::DeletedEntry))
    }

    /// Creates an asset tombstone.
    pub fn deleted_asset(id: impl Into<String>) -> Self {
        Self::with_sys(Sys::new(id, RecordKind::DeletedAsset))
    }

    /// Creates the record under which a sync cursor is persisted.
    pub fn sync_token(key: impl Into<String>, token: impl Into<String>) -> Self {
        let mut record = Self::with_sys(Sys::new(key, RecordKind::SyncToken));
        record.token = Some(token.into());
        record
    }

    /// Sets the revision.
    #[must_use]
    pub fn with_revision(mut self, revision: u64) -> Self {
        self.sys.revision = Some(revision);
        self
    }

    /// Marks the record as carrying a single locale.
    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.sys.locale = Some(locale.into());
        self
    }

    /// Sets the deletion timestamp.
    #[must_use]
    pub fn with_deleted_at(mut self, deleted_at: impl Into<String>) -> Self {
        self.sys.deleted_at = Some(deleted_at.into());
        self
    }

    /// Sets a field value for one locale.
    ///
    /// On a single-locale record the locale argument is ignored and the value
    /// is stored directly.
    #[must_use]
    pub fn with_field(mut self, name: &str, locale: &str, value: impl Into<Value>) -> Self {
        self.set_field(name, locale, value.into());
        self
    }

    /// Sets a field value for one locale in place.
    pub fn set_field(&mut self, name: &str, locale: &str, value: Value) {
        if self.sys.locale.is_some() {
            self.fields.insert(name.to_string(), value);
            return;
        }
        let slot = self
            .fields
            .entry(name.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        if let Value::Object(locales) = slot {
            locales.insert(locale.to_string(), value);
        }
    }

    /// Returns the record id.
    pub fn id(&self) -> &str {
        &self.sys.id
    }

    /// Returns the record kind.
    pub fn kind(&self) -> RecordKind {
        self.sys.kind
    }

    /// Returns the revision, if published.
    pub fn revision(&self) -> Option<u64> {
        self.sys.revision
    }

    /// Returns true for tombstones.
    pub fn is_deletion(&self) -> bool {
        self.sys.kind.is_deletion()
    }

    /// Returns the content type id. Assets report [`ASSET_CONTENT_TYPE`].
    pub fn content_type_id(&self) -> Option<&str> {
        match self.sys.kind {
            RecordKind::Asset => Some(ASSET_CONTENT_TYPE),
            RecordKind::Entry => self.sys.content_type.as_deref(),
            _ => None,
        }
    }

    /// Returns id and kind.
    pub fn identity(&self) -> RecordIdentity {
        RecordIdentity {
            id: self.sys.id.clone(),
            kind: self.sys.kind,
        }
    }

    /// Returns a field value, walking `locales` in order until one is present.
    ///
    /// Single-locale records ignore the chain.
    pub fn field<S: AsRef<str>>(&self, name: &str, locales: &[S]) -> Option<&Value> {
        let raw = self.fields.get(name)?;
        if self.sys.locale.is_some() {
            return Some(raw);
        }
        let by_locale = raw.as_object()?;
        locales
            .iter()
            .find_map(|locale| by_locale.get(locale.as_ref()))
    }

    /// Returns every link held by any field in any locale.
    pub fn links(&self) -> Vec<Link> {
        let mut links = Vec::new();
        for raw in self.fields.values() {
            match (self.sys.locale.is_some(), raw) {
                (false, Value::Object(by_locale)) if !Link::is_link(raw) => {
                    for value in by_locale.values() {
                        collect_links(value, &mut links);
                    }
                }
                _ => collect_links(raw, &mut links),
            }
        }
        links
    }

    /// Decodes a record from its JSON wire shape.
    pub fn from_json(json: &str) -> CoreResult<Self> {
        let record: Record = serde_json::from_str(json)?;
        record.validate()?;
        Ok(record)
    }

    /// Decodes a record from a JSON value.
    pub fn from_value(value: Value) -> CoreResult<Self> {
        let record: Record = serde_json::from_value(value)?;
        record.validate()?;
        Ok(record)
    }

    /// Encodes the record in its JSON wire shape.
    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Encodes the record as a JSON value.
    pub fn to_value(&self) -> CoreResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn validate(&self) -> CoreResult<()> {
        if self.sys.id.is_empty() {
            return Err(CoreError::invalid_record("sys.id must not be empty"));
        }
        if self.sys.kind == RecordKind::SyncToken && self.token.is_none() {
            return Err(CoreError::invalid_record(format!(
                "token record {} carries no token",
                self.sys.id
            )));
        }
        Ok(())
    }
}

/// `sys.contentType` is a link to a content type on the wire; in memory it
/// is just the id. Plain strings are accepted on input as well.
mod content_type_link {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::{json, Value};

    pub fn serialize<S: Serializer>(id: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
        match id {
            Some(id) => json!({"sys": {"type": "Link", "linkType": "ContentType", "id": id}})
                .serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::String(id)) => Some(id),
            Some(link) => link
                .pointer("/sys/id")
                .and_then(Value::as_str)
                .map(str::to_string),
            None => None,
        })
    }
}
