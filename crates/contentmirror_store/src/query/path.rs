//! Query path normalization.
//!
//! Caller paths are short (`["slug"]`, `["author", "name"]`). They are
//! normalized left to right into groups of the form `sys.<attr>` or
//! `fields.<name>.<locale>`. A second group is a hop through a link.

use crate::error::{StoreError, StoreResult};
use contentmirror_core::LocaleConfig;

/// System attributes that can be filtered on.
pub const SYS_ATTRIBUTES: &[&str] = &[
    "id",
    "type",
    "revision",
    "contentType",
    "locale",
    "createdAt",
    "updatedAt",
];

/// Whether a path group addresses system metadata or content fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// `sys.<attr>`
    Sys,
    /// `fields.<name>.<locale>`
    Fields,
}

/// One normalized group of a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Scope of the group.
    pub scope: Scope,
    /// Attribute or field name.
    pub name: String,
    /// Locale lookup order, first entry is the requested locale.
    /// Empty for `sys` groups.
    pub locales: Vec<String>,
}

impl Segment {
    /// Returns the requested locale of a `fields` group.
    pub fn locale(&self) -> Option<&str> {
        self.locales.first().map(String::as_str)
    }

    /// Returns true for `sys.id`.
    pub fn is_sys_id(&self) -> bool {
        self.scope == Scope::Sys && self.name == "id"
    }

    fn push_flat(&self, out: &mut Vec<String>) {
        match self.scope {
            Scope::Sys => {
                out.push("sys".to_string());
                out.push(self.name.clone());
            }
            Scope::Fields => {
                out.push("fields".to_string());
                out.push(self.name.clone());
                if let Some(locale) = self.locale() {
                    out.push(locale.to_string());
                }
            }
        }
    }
}

/// A normalized query path: one group, or two groups joined through a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    /// Normalizes `raw` against the locale setup.
    ///
    /// `locale` is the query locale; `None` uses the default locale.
    pub fn parse<S: AsRef<str>>(
        raw: &[S],
        locales: &LocaleConfig,
        locale: Option<&str>,
        max_segments: usize,
    ) -> StoreResult<Self> {
        if raw.is_empty() {
            return Err(StoreError::invalid_query("empty query path"));
        }
        if raw.len() > max_segments {
            return Err(too_complex(raw));
        }

        let query_locale = locale.unwrap_or(&locales.default_locale);
        let mut segments = Vec::new();
        let mut flat_len = 0;
        let mut rest = raw;

        while let Some((head, tail)) = rest.split_first() {
            let (scope, name, tail) = match head.as_ref() {
                "sys" => match tail.split_first() {
                    Some((name, tail)) => (Scope::Sys, name.as_ref(), tail),
                    None => return Err(StoreError::invalid_query("`sys` needs an attribute")),
                },
                "fields" => match tail.split_first() {
                    Some((name, tail)) => (Scope::Fields, name.as_ref(), tail),
                    None => return Err(StoreError::invalid_query("`fields` needs a field name")),
                },
                "id" => (Scope::Sys, "id", tail),
                name => (Scope::Fields, name, tail),
            };
            validate_name(name)?;

            let (segment, tail) = match scope {
                Scope::Sys => {
                    if !SYS_ATTRIBUTES.contains(&name) {
                        return Err(StoreError::invalid_query(format!(
                            "unknown sys attribute `{name}`"
                        )));
                    }
                    let segment = Segment {
                        scope,
                        name: name.to_string(),
                        locales: Vec::new(),
                    };
                    (segment, tail)
                }
                Scope::Fields => {
                    let (locale, tail) = match tail.split_first() {
                        Some((next, tail)) if locales.is_known(next.as_ref()) => {
                            (next.as_ref(), tail)
                        }
                        _ => (query_locale, tail),
                    };
                    let segment = Segment {
                        scope,
                        name: name.to_string(),
                        locales: locales.fallback_chain(locale),
                    };
                    (segment, tail)
                }
            };

            flat_len += if scope == Scope::Sys { 2 } else { 3 };
            if flat_len > max_segments {
                return Err(too_complex(raw));
            }
            if !tail.is_empty() && scope == Scope::Sys {
                return Err(StoreError::invalid_query(format!(
                    "sys.{name} cannot be traversed"
                )));
            }
            segments.push(segment);
            rest = tail;
        }

        if segments.len() > 2 {
            return Err(too_complex(raw));
        }
        Ok(Self { segments })
    }

    /// Returns the groups of the path.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns the first group.
    pub fn head(&self) -> &Segment {
        &self.segments[0]
    }

    /// Returns the group after the link hop, if any.
    pub fn joined(&self) -> Option<&Segment> {
        self.segments.get(1)
    }

    /// Returns the flat normalized form, e.g. `["fields", "slug", "en-US"]`.
    pub fn to_flat(&self) -> Vec<String> {
        let mut out = Vec::new();
        for segment in &self.segments {
            segment.push_flat(&mut out);
        }
        out
    }
}

/// Normalizes a caller path into its flat form.
pub fn normalize_path<S: AsRef<str>>(
    raw: &[S],
    locales: &LocaleConfig,
    locale: Option<&str>,
    max_segments: usize,
) -> StoreResult<Vec<String>> {
    FieldPath::parse(raw, locales, locale, max_segments).map(|path| path.to_flat())
}

fn validate_name(name: &str) -> StoreResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::invalid_query(format!(
            "invalid field name `{name}`"
        )))
    }
}

fn too_complex<S: AsRef<str>>(raw: &[S]) -> StoreError {
    let joined: Vec<&str> = raw.iter().map(AsRef::as_ref).collect();
    StoreError::invalid_query(format!("query too complex: {}", joined.join(".")))
}
