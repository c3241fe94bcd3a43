use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::models::SourceId;

pub const CONFIG_ENV: &str = "ISBNMETA_CONFIG";
pub const SECRETS_ENV: &str = "ISBNMETA_SECRETS";
pub const GOOGLE_BOOKS_KEY_ENV: &str = "ISBNMETA_GOOGLE_BOOKS_KEY";
pub const ISBNDB_KEY_ENV: &str = "ISBNMETA_ISBNDB_KEY";

/// Root application configuration, loaded from `~/.config/isbnmeta/config.toml`.
///
/// API keys normally live in a sibling `secrets.toml` (see [`Secrets`]) or in
/// the environment, not in the main file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub google_books: GoogleBooksConfig,
    pub open_library: OpenLibraryConfig,
    pub isbndb: IsbnDbConfig,
    pub local: LocalConfig,
    pub enrichment: EnrichmentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleBooksConfig {
    pub base_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenLibraryConfig {
    pub base_url: String,
    /// Cover URLs are `{covers_url}{isbn}{covers_suffix}`.
    pub covers_url: String,
    pub covers_suffix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IsbnDbConfig {
    pub base_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sqlite_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Providers queried for every ISBN, in reconciliation order.
    pub sources: Vec<SourceId>,
    /// Concurrent provider lookups per ISBN.
    pub concurrency: usize,
    /// Rows enriched concurrently.
    pub row_concurrency: usize,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub cache: CacheConfig,
    pub on_source_error: SourceErrorPolicy,
}

/// Bounds for the per-ISBN metadata cache. Both unset means unbounded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
}

/// What the aggregator does when a provider fails with something other than
/// "no data".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceErrorPolicy {
    /// Fail the whole lookup for that ISBN.
    #[default]
    Abort,
    /// Log the failure and treat the source as having no data.
    Skip,
}

/// API keys, kept out of the main config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Secrets {
    pub google_books_key: String,
    pub isbndb_key: String,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for GoogleBooksConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.googleapis.com/books/v1".to_string(),
            api_key: String::new(),
        }
    }
}

impl Default for OpenLibraryConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openlibrary.org".to_string(),
            covers_url: "https://covers.openlibrary.org/b/isbn/".to_string(),
            covers_suffix: "-L.jpg".to_string(),
        }
    }
}

impl Default for IsbnDbConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api2.isbndb.com".to_string(),
            api_key: String::new(),
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            sources: vec![SourceId::GoogleBooks, SourceId::OpenLibrary, SourceId::IsbnDb],
            concurrency: 6,
            row_concurrency: 4,
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            user_agent: format!("isbnmeta/{}", env!("CARGO_PKG_VERSION")),
            cache: CacheConfig::default(),
            on_source_error: SourceErrorPolicy::Abort,
        }
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl AppConfig {
    /// Standard config file path: `~/.config/isbnmeta/config.toml`
    pub fn config_path() -> PathBuf {
        // Allow override via env var
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("isbnmeta")
            .join("config.toml")
    }

    /// Secrets file path: `ISBNMETA_SECRETS`, else `secrets.toml` next to the config.
    pub fn secrets_path_for(config_path: &Path) -> PathBuf {
        if let Ok(path) = std::env::var(SECRETS_ENV) {
            return PathBuf::from(path);
        }
        config_path.with_file_name("secrets.toml")
    }

    /// Load config, secrets and environment overrides from the standard locations.
    ///
    /// Does not validate; call [`AppConfig::validate`] before serving lookups.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        let secrets_path = Self::secrets_path_for(&path);
        let mut config = Self::load_from(&path)?;
        config.apply_secrets(Secrets::load_from(&secrets_path)?);
        config.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Load config from a specific path, falling back to defaults if it doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    /// Non-empty secrets win over keys written in the main file.
    pub fn apply_secrets(&mut self, secrets: Secrets) {
        if !secrets.google_books_key.trim().is_empty() {
            self.google_books.api_key = secrets.google_books_key;
        }
        if !secrets.isbndb_key.trim().is_empty() {
            self.isbndb.api_key = secrets.isbndb_key;
        }
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(GOOGLE_BOOKS_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.google_books.api_key = key;
        }
        if let Some(key) = lookup(ISBNDB_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.isbndb.api_key = key;
        }
    }

    /// Check that every enabled source can actually run.
    pub fn validate(&self) -> Result<()> {
        let sources = &self.enrichment.sources;
        if sources.is_empty() {
            return Err(CoreError::Config("no sources enabled".to_string()));
        }
        if self.enrichment.concurrency == 0 || self.enrichment.row_concurrency == 0 {
            return Err(CoreError::Config(
                "concurrency and row_concurrency must be at least 1".to_string(),
            ));
        }
        if self.enrichment.cache.capacity == Some(0) {
            return Err(CoreError::Config("cache capacity must be at least 1".to_string()));
        }

        for source in sources {
            match source {
                SourceId::GoogleBooks if self.google_books.api_key.trim().is_empty() => {
                    return Err(CoreError::MissingSecret {
                        name: "Google Books API key",
                        hint: "set google_books_key in secrets.toml or ISBNMETA_GOOGLE_BOOKS_KEY",
                    });
                }
                SourceId::IsbnDb if self.isbndb.api_key.trim().is_empty() => {
                    return Err(CoreError::MissingSecret {
                        name: "ISBNdb API key",
                        hint: "set isbndb_key in secrets.toml or ISBNMETA_ISBNDB_KEY",
                    });
                }
                SourceId::LocalCsv if self.local.csv_path.is_none() => {
                    return Err(CoreError::Config(
                        "csv source enabled but local.csv_path is not set".to_string(),
                    ));
                }
                SourceId::Sqlite if self.local.sqlite_path.is_none() => {
                    return Err(CoreError::Config(
                        "sqlite source enabled but local.sqlite_path is not set".to_string(),
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl Secrets {
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Write an empty secrets template readable only by the owner.
    ///
    /// An existing file is left alone; returns whether a file was written.
    pub fn write_template(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let template = toml::to_string_pretty(&Self::default())?;
        std::fs::write(path, template)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn keyed() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.google_books.api_key = "g-key".to_string();
        cfg.isbndb.api_key = "i-key".to_string();
        cfg
    }

    #[test]
    fn test_default_config_uses_three_remote_sources() {
        let cfg = AppConfig::default();
        assert_eq!(
            cfg.enrichment.sources,
            vec![SourceId::GoogleBooks, SourceId::OpenLibrary, SourceId::IsbnDb]
        );
        assert_eq!(cfg.enrichment.concurrency, 6);
        assert_eq!(cfg.enrichment.on_source_error, SourceErrorPolicy::Abort);
        assert!(cfg.enrichment.cache.capacity.is_none());
    }

    #[test]
    fn test_missing_keys_fail_validation() {
        let cfg = AppConfig::default();
        assert!(matches!(
            cfg.validate(),
            Err(CoreError::MissingSecret { name: "Google Books API key", .. })
        ));

        let mut cfg = keyed();
        cfg.isbndb.api_key = "   ".to_string();
        assert!(matches!(
            cfg.validate(),
            Err(CoreError::MissingSecret { name: "ISBNdb API key", .. })
        ));

        assert!(keyed().validate().is_ok());
    }

    #[test]
    fn test_keys_only_required_for_enabled_sources() {
        let mut cfg = AppConfig::default();
        cfg.enrichment.sources = vec![SourceId::OpenLibrary];
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_local_sources_need_paths() {
        let mut cfg = keyed();
        cfg.enrichment.sources.push(SourceId::Sqlite);
        assert!(matches!(cfg.validate(), Err(CoreError::Config(_))));
        cfg.local.sqlite_path = Some(PathBuf::from("isbn.db"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let mut cfg = keyed();
        cfg.enrichment.concurrency = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_config_toml_roundtrip_omits_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut cfg = AppConfig::default();
        cfg.enrichment.cache.capacity = Some(128);
        cfg.save_to(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(!written.contains("api_key"));

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.enrichment.cache.capacity, Some(128));
        assert_eq!(loaded.open_library.covers_suffix, "-L.jpg");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[enrichment]\nsources = [\"ol\", \"csv\"]\non_source_error = \"skip\"\n",
        )
        .unwrap();

        let cfg = AppConfig::load_from(&path).unwrap();
        assert_eq!(cfg.enrichment.sources, vec![SourceId::OpenLibrary, SourceId::LocalCsv]);
        assert_eq!(cfg.enrichment.on_source_error, SourceErrorPolicy::Skip);
        assert_eq!(cfg.enrichment.row_concurrency, 4);
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let cfg =
            AppConfig::load_from(Path::new("/tmp/nonexistent_isbnmeta_config.toml")).unwrap();
        assert_eq!(cfg.isbndb.base_url, "https://api2.isbndb.com");
    }

    #[test]
    fn test_secrets_then_env_override() {
        let dir = TempDir::new().unwrap();
        let secrets_path = dir.path().join("secrets.toml");
        std::fs::write(&secrets_path, "google_books_key = \"from-file\"\nisbndb_key = \"db-file\"\n")
            .unwrap();

        let mut cfg = AppConfig::default();
        cfg.apply_secrets(Secrets::load_from(&secrets_path).unwrap());
        assert_eq!(cfg.google_books.api_key, "from-file");

        cfg.apply_env_overrides(|name| {
            (name == GOOGLE_BOOKS_KEY_ENV).then(|| "from-env".to_string())
        });
        assert_eq!(cfg.google_books.api_key, "from-env");
        assert_eq!(cfg.isbndb.api_key, "db-file");
    }

    #[test]
    fn test_secrets_template_is_written_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.toml");
        assert!(Secrets::write_template(&path).unwrap());
        assert!(!Secrets::write_template(&path).unwrap());

        let loaded = Secrets::load_from(&path).unwrap();
        assert!(loaded.google_books_key.is_empty());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }
}
