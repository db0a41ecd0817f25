//! CLI command implementations.
//!
//! Commands write to any `io::Write` so they can be tested without a terminal.

pub mod cursor;
pub mod get;
pub mod inspect;
pub mod query;
pub mod resolve;

use contentmirror_core::{Config, LocaleConfig};
use contentmirror_store::SqlStore;
use std::path::Path;

/// Boxed error used by every command.
pub type CliError = Box<dyn std::error::Error>;

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    /// Human readable text.
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Builds the store configuration from the locale flags.
pub fn config(default_locale: &str, fallbacks: &[String]) -> Result<Config, CliError> {
    let mut locales = LocaleConfig::new(default_locale);
    for spec in fallbacks {
        let (code, fallback) = match spec.split_once(':') {
            Some((code, fallback)) => (code, Some(fallback)),
            None => (spec.as_str(), None),
        };
        if code.is_empty() || fallback.is_some_and(str::is_empty) {
            return Err(format!("invalid locale spec {spec:?}").into());
        }
        locales = locales.with_locale(code, fallback);
    }
    Ok(Config::new().locales(locales))
}

/// Opens an existing mirror file.
pub fn open_store(path: &Path, config: Config) -> Result<SqlStore, CliError> {
    if !path.exists() {
        return Err(format!("No mirror found at {}", path.display()).into());
    }
    Ok(SqlStore::open(path, config)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locale_flags() {
        let config = config("en-US", &["de-DE:en-US".to_string(), "fr-FR".to_string()]).unwrap();
        assert_eq!(config.locales.fallback_chain("de-DE"), vec!["de-DE", "en-US"]);
        assert!(config.locales.is_known("fr-FR"));
        assert!(super::config("en-US", &["de-DE:".to_string()]).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = open_store(&dir.path().join("absent.sqlite"), Config::default()).unwrap_err();
        assert!(err.to_string().contains("No mirror found"));
    }

    #[test]
    fn opens_existing_mirror() {
        use contentmirror_store::ContentStore;
        use contentmirror_testkit::{blog_records, fixture_config, seed, with_temp_sql_store};

        let title = with_temp_sql_store(|store, path| {
            seed(store, blog_records());
            let opened = open_store(path, fixture_config()).unwrap();
            let post = opened.find("p1").unwrap().unwrap();
            post.field("title", &["de-DE"]).cloned()
        });
        assert_eq!(title, Some(serde_json::json!("Maschinen")));
    }
}
