use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use confyg::{env, Confygery};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{IngestError, IngestResult};
use crate::lastfm::{DEFAULT_PAGE_SIZE, LASTFM_API_BASE};

/// Tags swept when the configuration does not name any.
pub const DEFAULT_TAGS: [&str; 8] = [
    "jazz",
    "electronic",
    "90s",
    "soul",
    "ambient",
    "hip hop",
    "rnb",
    "rock",
];

/// Configuration for crate-diggin.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. Environment variables (DIGGIN_* prefix, highest priority)
/// 2. Config file (~/.config/crate-diggin/config.toml)
/// 3. Built-in defaults (lowest priority)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Last.fm API key. Required to run the scheduler.
    ///
    /// Can be set via:
    /// - ENV: DIGGIN_LASTFM_API_KEY
    /// - Config: lastfm_api_key = "..."
    pub lastfm_api_key: Option<String>,

    /// Last.fm API root.
    pub lastfm_base_url: String,

    /// Tags to sweep, in order. Falls back to [`DEFAULT_TAGS`] when empty.
    #[serde(deserialize_with = "list_or_csv")]
    pub tags: Vec<String>,

    /// Qdrant REST endpoint.
    pub qdrant_url: String,

    /// Name of the vector collection holding the albums.
    pub collection_name: String,

    /// Ollama endpoint used for embeddings.
    pub ollama_url: String,

    /// Ollama embedding model.
    pub embedding_model: String,

    /// Length of the vectors produced by `embedding_model`.
    #[serde(deserialize_with = "number_or_string")]
    pub embedding_dimensions: usize,

    /// Timing and paging of the ingestion loop.
    pub schedule: ScheduleConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lastfm_api_key: None,
            lastfm_base_url: LASTFM_API_BASE.to_string(),
            tags: Vec::new(),
            qdrant_url: "http://localhost:6333".to_string(),
            collection_name: "albums".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            embedding_dimensions: diggin_core::EMBEDDING_DIMENSIONS,
            schedule: ScheduleConfig::default(),
        }
    }
}

/// The `[schedule]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Pause before the first sweep so Qdrant and Ollama can start.
    #[serde(deserialize_with = "number_or_string")]
    pub warmup_secs: u64,
    /// Pause after each tag.
    #[serde(deserialize_with = "number_or_string")]
    pub politeness_ms: u64,
    /// Pause between the end of one sweep and the start of the next.
    #[serde(deserialize_with = "number_or_string")]
    pub cycle_secs: u64,
    /// Pause after a failed sweep.
    #[serde(deserialize_with = "number_or_string")]
    pub recovery_secs: u64,
    /// Pages are drawn from `1..max_page`.
    #[serde(deserialize_with = "number_or_string")]
    pub max_page: u32,
    /// Albums requested per tag.
    #[serde(deserialize_with = "number_or_string")]
    pub page_size: u32,
    /// Upper bound on every outbound HTTP request.
    #[serde(deserialize_with = "number_or_string")]
    pub request_timeout_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            warmup_secs: 10,
            politeness_ms: 2000,
            cycle_secs: 3600,
            recovery_secs: 60,
            max_page: 20,
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout_secs: 30,
        }
    }
}

// Environment overrides arrive as strings, so every non-string field also
// accepts its textual form.

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    Text(String),
}

fn number_or_string<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64> + FromStr,
    <T as TryFrom<u64>>::Error: Display,
    <T as FromStr>::Err: Display,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => T::try_from(n).map_err(D::Error::custom),
        NumberOrString::Text(text) => text
            .trim()
            .parse()
            .map_err(|e| D::Error::custom(format!("invalid number {text:?}: {e}"))),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListOrCsv {
    List(Vec<String>),
    Csv(String),
}

/// A list, or a comma separated string such as `"jazz, soul"`.
fn list_or_csv<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match ListOrCsv::deserialize(deserializer)? {
        ListOrCsv::List(items) => items,
        ListOrCsv::Csv(text) => text
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
    })
}

impl ScheduleConfig {
    pub fn warmup(&self) -> Duration {
        Duration::from_secs(self.warmup_secs)
    }

    pub fn politeness(&self) -> Duration {
        Duration::from_millis(self.politeness_ms)
    }

    pub fn cycle(&self) -> Duration {
        Duration::from_secs(self.cycle_secs)
    }

    pub fn recovery(&self) -> Duration {
        Duration::from_secs(self.recovery_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Searches for config file at: ~/.config/crate-diggin/config.toml
    /// Reads environment variables with DIGGIN_ prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific file (if it exists) and the
    /// environment.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let mut builder = Confygery::new().context("Failed to create config builder")?;

        if config_path.exists() {
            let path_str = config_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder
                .add_file(path_str)
                .context("Failed to load config file")?;
        }

        let env_opts = env::Options::with_top_level("diggin");
        builder
            .add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder.build().context("Failed to build configuration")?;

        Ok(config)
    }

    /// The tags to sweep: configured tags, trimmed, with blanks dropped,
    /// or [`DEFAULT_TAGS`] when nothing usable is configured.
    pub fn tags(&self) -> Vec<String> {
        let tags: Vec<String> = self
            .tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        if tags.is_empty() {
            log::warn!("No tags configured, using defaults");
            return DEFAULT_TAGS.iter().map(|t| (*t).to_string()).collect();
        }
        tags
    }

    /// The Last.fm API key, or [`IngestError::ConfigurationMissing`].
    pub fn require_lastfm_api_key(&self) -> IngestResult<&str> {
        self.lastfm_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(IngestError::ConfigurationMissing("lastfm_api_key"))
    }
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/crate-diggin/config.toml
/// - macOS: ~/Library/Application Support/crate-diggin/config.toml
/// - Windows: %APPDATA%\crate-diggin\config.toml
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("crate-diggin")
        .join("config.toml")
}

/// Get the example config file content.
pub fn example_config() -> &'static str {
    r#"# Crate Diggin Configuration File
#
# Configuration is loaded from multiple sources with the following priority:
# 1. Environment variables (DIGGIN_* prefix)
# 2. This config file
# 3. Built-in defaults (lowest priority)

# Last.fm API key (required for `diggin run` and `diggin sweep`)
#
# Register for a free API key at: https://www.last.fm/api/account/create
#
# Can also be set via:
# - Environment: DIGGIN_LASTFM_API_KEY=your-key-here
#lastfm_api_key = "your-lastfm-api-key-here"

# Tags swept on every cycle, in order.
# Leave empty to use: jazz, electronic, 90s, soul, ambient, hip hop, rnb, rock
tags = ["jazz", "electronic", "90s", "soul", "ambient", "hip hop", "rnb", "rock"]

#qdrant_url = "http://localhost:6333"
#collection_name = "albums"
#ollama_url = "http://localhost:11434"
#embedding_model = "nomic-embed-text"
#embedding_dimensions = 768

[schedule]
#warmup_secs = 10
#politeness_ms = 2000
#cycle_secs = 3600
#recovery_secs = 60
#max_page = 20
#page_size = 5
#request_timeout_secs = 30
"#
}

/// Create default config file if it doesn't exist.
///
/// Returns true if a new file was created, false if it already existed.
pub fn ensure_config_file() -> Result<bool> {
    let config_path = config_file_path();

    if config_path.exists() {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    std::fs::write(&config_path, example_config()).context("Failed to write config file")?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.lastfm_api_key.is_none());
        assert_eq!(config.collection_name, "albums");
        assert_eq!(config.embedding_dimensions, 768);
        assert_eq!(config.schedule.warmup(), Duration::from_secs(10));
        assert_eq!(config.schedule.politeness(), Duration::from_millis(2000));
        assert_eq!(config.schedule.cycle(), Duration::from_secs(3600));
        assert_eq!(config.schedule.recovery(), Duration::from_secs(60));
        assert_eq!(config.lastfm_base_url, LASTFM_API_BASE);
        assert_eq!(config.schedule.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_config_load_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load_from(&dir.path().join("missing.toml"));
        assert!(result.is_ok());
    }

    #[test]
    fn test_config_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
lastfm_api_key = "abc123"
tags = ["shoegaze", "dub"]

[schedule]
cycle_secs = 120
"#
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.require_lastfm_api_key().unwrap(), "abc123");
        assert_eq!(config.tags(), vec!["shoegaze", "dub"]);
        assert_eq!(config.schedule.cycle_secs, 120);
        assert_eq!(config.schedule.warmup_secs, 10);
        assert_eq!(config.qdrant_url, "http://localhost:6333");
    }

    #[test]
    fn test_numbers_and_tags_accept_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
embedding_dimensions = "384"
tags = "shoegaze, dub,, krautrock"

[schedule]
cycle_secs = " 120 "
max_page = "7"
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.embedding_dimensions, 384);
        assert_eq!(config.tags(), vec!["shoegaze", "dub", "krautrock"]);
        assert_eq!(config.schedule.cycle_secs, 120);
        assert_eq!(config.schedule.max_page, 7);
        assert_eq!(config.schedule.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_non_numeric_text_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[schedule]\ncycle_secs = \"hourly\"\n").unwrap();

        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_env_override_of_numeric_field() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("DIGGIN_EMBEDDING_DIMENSIONS", "384");
        let result = Config::load_from(&dir.path().join("missing.toml"));
        std::env::remove_var("DIGGIN_EMBEDDING_DIMENSIONS");

        assert_eq!(result.unwrap().embedding_dimensions, 384);
    }

    #[test]
    fn test_tags_fall_back_to_defaults() {
        let mut config = Config::default();
        assert_eq!(config.tags().len(), DEFAULT_TAGS.len());

        config.tags = vec!["  ".to_string(), String::new()];
        assert_eq!(config.tags()[0], "jazz");
    }

    #[test]
    fn test_tags_are_trimmed() {
        let config = Config {
            tags: vec![" jazz ".to_string(), String::new(), "soul".to_string()],
            ..Config::default()
        };
        assert_eq!(config.tags(), vec!["jazz", "soul"]);
    }

    #[test]
    fn test_missing_api_key_is_configuration_error() {
        let mut config = Config::default();
        assert!(matches!(
            config.require_lastfm_api_key(),
            Err(IngestError::ConfigurationMissing("lastfm_api_key"))
        ));

        config.lastfm_api_key = Some("   ".to_string());
        assert!(config.require_lastfm_api_key().is_err());
    }

    #[test]
    fn test_example_config_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, example_config()).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.tags().len(), 8);
        assert_eq!(config.schedule, ScheduleConfig::default());
    }
}
