//! Configuration loading.
//!
//! The configuration file is TOML with `[FILE]` and `[AI]` sections and
//! optional `[INDEX]` and `[LOG]` sections:
//!
//! ```toml
//! [FILE]
//! input_kb_folder = "data"
//! log_folder = "logs"
//! main_log_file = "app.log"
//!
//! [AI]
//! model = "gpt-3.5-turbo"
//! temperature = 0.7
//! ```
//!
//! Relative paths are resolved against the directory that contains the
//! configuration file, so the binary behaves the same wherever it is
//! launched from. The API key comes from `AI.api_key` or, failing that,
//! from `OPENAI_API_KEY`.

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Environment variable holding the API credential.
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    #[serde(rename = "FILE", default)]
    file: FileSection,
    #[serde(rename = "AI", default)]
    ai: AiSection,
    #[serde(rename = "INDEX", default)]
    index: IndexSection,
    #[serde(rename = "LOG", default)]
    log: LogSection,
}

#[derive(Debug, Deserialize)]
struct FileSection {
    #[serde(default = "default_kb_folder")]
    input_kb_folder: PathBuf,
    #[serde(default = "default_log_folder")]
    log_folder: PathBuf,
    #[serde(default = "default_log_file")]
    main_log_file: String,
    #[serde(default)]
    main_log_file_path: Option<PathBuf>,
}

impl Default for FileSection {
    fn default() -> Self {
        Self {
            input_kb_folder: default_kb_folder(),
            log_folder: default_log_folder(),
            main_log_file: default_log_file(),
            main_log_file_path: None,
        }
    }
}

fn default_kb_folder() -> PathBuf {
    PathBuf::from("data")
}
fn default_log_folder() -> PathBuf {
    PathBuf::from("logs")
}
fn default_log_file() -> String {
    "app.log".to_string()
}

#[derive(Debug, Deserialize)]
struct AiSection {
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default = "default_model")]
    model: String,
    #[serde(default = "default_temperature")]
    temperature: f32,
    #[serde(default = "default_embedding_model")]
    embedding_model: String,
    #[serde(default = "default_api_base")]
    api_base: String,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    max_retries: u32,
}

impl Default for AiSection {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            embedding_model: default_embedding_model(),
            api_base: default_api_base(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    2
}

#[derive(Debug, Deserialize)]
struct IndexSection {
    #[serde(default = "default_top_k")]
    top_k: usize,
    #[serde(default = "default_chunk_size")]
    chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    chunk_overlap: usize,
    #[serde(default)]
    recursive: bool,
    #[serde(default)]
    include_globs: Vec<String>,
    #[serde(default)]
    exclude_globs: Vec<String>,
}

impl Default for IndexSection {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            recursive: false,
            include_globs: Vec::new(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_top_k() -> usize {
    2
}
fn default_chunk_size() -> usize {
    1024
}
fn default_chunk_overlap() -> usize {
    20
}

#[derive(Debug, Deserialize)]
struct LogSection {
    #[serde(default = "default_log_level")]
    level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Validated, immutable application configuration.
#[derive(Clone)]
pub struct Config {
    pub api_key: String,
    pub input_kb_folder: PathBuf,
    pub log_folder: PathBuf,
    pub main_log_file_path: PathBuf,
    pub model: String,
    pub temperature: f32,
    pub embedding_model: String,
    pub api_base: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub index: IndexConfig,
    pub log_level: String,
    /// Directory relative paths were resolved against.
    pub config_dir: PathBuf,
}

/// Settings for document discovery, chunking and retrieval.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub top_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub recursive: bool,
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("input_kb_folder", &self.input_kb_folder)
            .field("log_folder", &self.log_folder)
            .field("main_log_file_path", &self.main_log_file_path)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("embedding_model", &self.embedding_model)
            .field("api_base", &self.api_base)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("index", &self.index)
            .field("log_level", &self.log_level)
            .field("config_dir", &self.config_dir)
            .finish()
    }
}

impl Config {
    /// Load the configuration, reading the credential fallback from the
    /// process environment.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Load the configuration with an explicit environment lookup.
    ///
    /// Creates the knowledge-base and log directories when they are missing.
    pub fn load_with_env<F>(path: &Path, env: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let raw: RawConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let config_dir = base_dir(path);
        let config = Self::from_raw(raw, config_dir, env)?;
        config.create_directories()?;
        Ok(config)
    }

    fn from_raw<F>(raw: RawConfig, config_dir: PathBuf, env: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = raw
            .ai
            .api_key
            .filter(|k| !k.trim().is_empty())
            .or_else(|| env(API_KEY_VAR).filter(|k| !k.trim().is_empty()))
            .ok_or(ConfigError::MissingCredential)?;

        if !(0.0..=2.0).contains(&raw.ai.temperature) {
            return Err(ConfigError::Invalid(format!(
                "AI.temperature must be in [0.0, 2.0], got {}",
                raw.ai.temperature
            )));
        }
        if raw.ai.timeout_secs == 0 {
            return Err(ConfigError::Invalid("AI.timeout_secs must be > 0".into()));
        }
        if raw.index.top_k == 0 {
            return Err(ConfigError::Invalid("INDEX.top_k must be >= 1".into()));
        }
        if raw.index.chunk_size == 0 {
            return Err(ConfigError::Invalid("INDEX.chunk_size must be > 0".into()));
        }
        if raw.index.chunk_overlap >= raw.index.chunk_size {
            return Err(ConfigError::Invalid(
                "INDEX.chunk_overlap must be smaller than INDEX.chunk_size".into(),
            ));
        }
        for pattern in raw
            .index
            .include_globs
            .iter()
            .chain(raw.index.exclude_globs.iter())
        {
            globset::Glob::new(pattern)
                .map_err(|e| ConfigError::Invalid(format!("bad glob '{}': {}", pattern, e)))?;
        }

        crate::logging::parse_level(&raw.log.level)
            .map_err(|e| ConfigError::Invalid(format!("LOG.level: {}", e)))?;

        let input_kb_folder = resolve(&config_dir, &raw.file.input_kb_folder);
        let (log_folder, main_log_file_path) = match raw.file.main_log_file_path {
            Some(p) => {
                let full = resolve(&config_dir, &p);
                let folder = full
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| config_dir.clone());
                (folder, full)
            }
            None => {
                let folder = resolve(&config_dir, &raw.file.log_folder);
                let file = folder.join(&raw.file.main_log_file);
                (folder, file)
            }
        };

        Ok(Config {
            api_key,
            input_kb_folder,
            log_folder,
            main_log_file_path,
            model: raw.ai.model,
            temperature: raw.ai.temperature,
            embedding_model: raw.ai.embedding_model,
            api_base: raw.ai.api_base.trim_end_matches('/').to_string(),
            timeout_secs: raw.ai.timeout_secs,
            max_retries: raw.ai.max_retries,
            index: IndexConfig {
                top_k: raw.index.top_k,
                chunk_size: raw.index.chunk_size,
                chunk_overlap: raw.index.chunk_overlap,
                recursive: raw.index.recursive,
                include_globs: raw.index.include_globs,
                exclude_globs: raw.index.exclude_globs,
            },
            log_level: raw.log.level,
            config_dir,
        })
    }

    fn create_directories(&self) -> Result<(), ConfigError> {
        for dir in [&self.input_kb_folder, &self.log_folder] {
            std::fs::create_dir_all(dir).map_err(|source| ConfigError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

/// Directory of the config file, made absolute when possible.
fn base_dir(config_path: &Path) -> PathBuf {
    let parent = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::canonicalize(parent).unwrap_or_else(|_| parent.to_path_buf())
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("config.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = Config::load_with_env(&tmp.path().join("nope.toml"), no_env).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn unparsable_file_is_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(tmp.path(), "[FILE\ninput_kb_folder = ");
        let err = Config::load_with_env(&path, no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_credential_fails_without_creating_config() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(tmp.path(), "[FILE]\ninput_kb_folder = \"docs\"\n");
        let err = Config::load_with_env(&path, no_env).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential));
    }

    #[test]
    fn blank_credential_counts_as_missing() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(tmp.path(), "[AI]\napi_key = \"  \"\n");
        let err = Config::load_with_env(&path, |_| Some(String::new())).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential));
    }

    #[test]
    fn credential_falls_back_to_environment() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(tmp.path(), "[FILE]\n");
        let cfg = Config::load_with_env(&path, |k| {
            (k == API_KEY_VAR).then(|| "sk-env".to_string())
        })
        .unwrap();
        assert_eq!(cfg.api_key, "sk-env");
    }

    #[test]
    fn file_credential_wins_over_environment() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(tmp.path(), "[AI]\napi_key = \"sk-file\"\n");
        let cfg = Config::load_with_env(&path, |_| Some("sk-env".to_string())).unwrap();
        assert_eq!(cfg.api_key, "sk-file");
    }

    #[test]
    fn defaults_and_relative_paths() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(tmp.path(), "[AI]\napi_key = \"sk\"\n");
        let cfg = Config::load_with_env(&path, no_env).unwrap();

        let base = std::fs::canonicalize(tmp.path()).unwrap();
        assert_eq!(cfg.model, "gpt-3.5-turbo");
        assert!((cfg.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(cfg.input_kb_folder, base.join("data"));
        assert_eq!(cfg.main_log_file_path, base.join("logs").join("app.log"));
        assert_eq!(cfg.index.top_k, 2);
        assert!(cfg.input_kb_folder.is_dir());
        assert!(cfg.log_folder.is_dir());
    }

    #[test]
    fn legacy_log_file_path_key() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            tmp.path(),
            "[FILE]\nmain_log_file_path = \"var/log/documentor.log\"\n[AI]\napi_key = \"sk\"\n",
        );
        let cfg = Config::load_with_env(&path, no_env).unwrap();
        assert!(cfg.main_log_file_path.ends_with("var/log/documentor.log"));
        assert!(cfg.log_folder.ends_with("var/log"));
        assert!(cfg.log_folder.is_dir());
    }

    #[test]
    fn temperature_out_of_range_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(tmp.path(), "[AI]\napi_key = \"sk\"\ntemperature = 3.5\n");
        let err = Config::load_with_env(&path, no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn overlap_must_be_below_chunk_size() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            tmp.path(),
            "[AI]\napi_key = \"sk\"\n[INDEX]\nchunk_size = 10\nchunk_overlap = 10\n",
        );
        let err = Config::load_with_env(&path, no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(tmp.path(), "[AI]\napi_key = \"sk\"\n[LOG]\nlevel = \"loud\"\n");
        let err = Config::load_with_env(&path, no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref msg) if msg.contains("LOG.level")));
    }

    #[test]
    fn debug_output_redacts_key() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(tmp.path(), "[AI]\napi_key = \"sk-secret\"\n");
        let cfg = Config::load_with_env(&path, no_env).unwrap();
        let rendered = format!("{:?}", cfg);
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
