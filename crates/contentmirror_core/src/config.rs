//! Mirror configuration.

use std::collections::HashMap;

/// Locales known to the space and how they fall back to each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleConfig {
    /// Locale used when a query or resolution names none.
    pub default_locale: String,
    /// All locale codes of the space, default first.
    pub locales: Vec<String>,
    /// Locale code to the code it falls back to.
    pub fallbacks: HashMap<String, String>,
}

impl LocaleConfig {
    /// Creates a configuration with a single default locale.
    pub fn new(default_locale: impl Into<String>) -> Self {
        let default_locale = default_locale.into();
        Self {
            locales: vec![default_locale.clone()],
            default_locale,
            fallbacks: HashMap::new(),
        }
    }

    /// Adds a locale, optionally falling back to another one.
    #[must_use]
    pub fn with_locale(mut self, code: impl Into<String>, fallback: Option<&str>) -> Self {
        let code = code.into();
        if let Some(fallback) = fallback {
            self.fallbacks.insert(code.clone(), fallback.to_string());
        }
        if !self.locales.contains(&code) {
            self.locales.push(code);
        }
        self
    }

    /// Returns true if `code` is a locale of the space.
    pub fn is_known(&self, code: &str) -> bool {
        self.locales.iter().any(|l| l == code)
    }

    /// Returns `locale` followed by its fallbacks, in lookup order.
    ///
    /// Stops at the first repeated code so misconfigured loops terminate.
    pub fn fallback_chain(&self, locale: &str) -> Vec<String> {
        let mut chain = vec![locale.to_string()];
        let mut current = locale;
        while let Some(next) = self.fallbacks.get(current) {
            if chain.iter().any(|c| c == next) {
                break;
            }
            chain.push(next.clone());
            current = next;
        }
        chain
    }
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self::new("en-US")
    }
}

/// Configuration shared by stores, resolvers and the sync engine.
#[derive(Debug, Clone)]
pub struct Config {
    /// Locale setup of the space.
    pub locales: LocaleConfig,
    /// Upper bound for `include` depth on queries.
    pub max_include_depth: usize,
    /// Maximum number of segments in a normalized query path.
    pub max_path_segments: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            locales: LocaleConfig::default(),
            max_include_depth: 10,
            max_path_segments: 7,
        }
    }
}

impl Config {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the locale configuration.
    #[must_use]
    pub fn locales(mut self, locales: LocaleConfig) -> Self {
        self.locales = locales;
        self
    }

    /// Sets the maximum include depth.
    #[must_use]
    pub const fn max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth;
        self
    }

    /// Returns the default locale.
    pub fn default_locale(&self) -> &str {
        &self.locales.default_locale
    }
}
