//! Resolution options.

use contentmirror_core::Record;

/// What to do with a link that points back at an ancestor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CircularPolicy {
    /// Point at the ancestor already materialized in the graph.
    #[default]
    Reuse,
    /// Fail with [`ResolveError::CircularReference`](crate::ResolveError::CircularReference).
    Raise,
    /// Leave the link unresolved.
    Ignore,
}

/// Options for one resolution call.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveOptions {
    /// How many link levels to follow from the root.
    pub depth: usize,
    /// Root fields to resolve. `None` resolves every field.
    pub fields: Option<Vec<String>>,
    /// Locale to read fields in. `None` uses the default locale.
    pub locale: Option<String>,
    /// Cycle handling.
    pub circular: CircularPolicy,
    /// Records already visited by the caller, outermost first.
    ///
    /// Links to them are treated as back-edges and never looked up.
    pub backlinks: Vec<Record>,
}

impl ResolveOptions {
    /// Creates options for `depth` levels with default settings.
    pub fn new(depth: usize) -> Self {
        Self {
            depth,
            fields: None,
            locale: None,
            circular: CircularPolicy::default(),
            backlinks: Vec::new(),
        }
    }

    /// Restricts resolution of the root to the named fields.
    #[must_use]
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the locale.
    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Sets the cycle policy.
    #[must_use]
    pub fn with_circular(mut self, policy: CircularPolicy) -> Self {
        self.circular = policy;
        self
    }

    /// Seeds the ancestor chain.
    #[must_use]
    pub fn with_backlinks(mut self, backlinks: Vec<Record>) -> Self {
        self.backlinks = backlinks;
        self
    }
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self::new(1)
    }
}
