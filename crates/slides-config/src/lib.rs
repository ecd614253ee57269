//! Configuration management for slides.
//!
//! Parses `slides.toml` with serde and auto-discovers the file in the
//! current directory or any of its parents. CLI flags are layered on top
//! through [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! `${VAR}` and `${VAR:-default}` are expanded in:
//! - `server.host`
//! - `deck.root_dir`

mod expand;

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "slides.toml";

/// Longest shutdown grace window accepted in a config file.
const MAX_SHUTDOWN_GRACE_MS: u64 = 60_000;

/// CLI settings that override configuration file values.
///
/// Only `Some` values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override server host.
    pub host: Option<String>,
    /// Override server port.
    pub port: Option<u16>,
    /// Override deck root directory.
    pub root_dir: Option<PathBuf>,
    /// Override live reload enabled flag.
    pub live_reload_enabled: Option<bool>,
}

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Deck location as written in TOML (relative to the config file).
    deck: DeckConfigRaw,
    /// Live reload configuration.
    pub live_reload: LiveReloadConfig,

    /// Resolved deck configuration (set after loading).
    #[serde(skip)]
    pub deck_resolved: DeckConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// How long live sessions get to tear down after a shutdown signal.
    pub shutdown_grace_ms: u64,
}

impl ServerConfig {
    /// Shutdown grace window as a [`Duration`].
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8080,
            shutdown_grace_ms: 3000,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct DeckConfigRaw {
    root_dir: Option<String>,
}

/// Resolved deck configuration.
#[derive(Debug, Default)]
pub struct DeckConfig {
    /// Directory holding `*.tpl` templates, `res/` and `*.slide` sources.
    pub root_dir: PathBuf,
}

/// Live reload configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LiveReloadConfig {
    /// Whether the `/ws` push endpoint is served.
    pub enabled: bool,
    /// Files every session watches from the start, relative to the root.
    pub watch: Vec<String>,
}

impl Default for LiveReloadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            watch: vec![
                "index.tpl".to_owned(),
                "slides.tpl".to_owned(),
                "res/style.css".to_owned(),
                "res/script.js".to_owned(),
            ],
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`server.host`").
        field: String,
        /// Error message (e.g., "${`SLIDES_HOST`} not set").
        message: String,
    },
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file. Otherwise
    /// searches for `slides.toml` in the current directory and parents,
    /// falling back to defaults rooted at the current directory.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the resulting configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(host) = &settings.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = settings.port {
            self.server.port = port;
        }
        if let Some(root_dir) = &settings.root_dir {
            self.deck_resolved.root_dir.clone_from(root_dir);
        }
        if let Some(enabled) = settings.live_reload_enabled {
            self.live_reload.enabled = enabled;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    fn default_with_base(base: &Path) -> Self {
        Self {
            server: ServerConfig::default(),
            deck: DeckConfigRaw::default(),
            live_reload: LiveReloadConfig::default(),
            deck_resolved: DeckConfig {
                root_dir: base.to_path_buf(),
            },
            config_path: None,
        }
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_live_reload()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.host.is_empty() {
            return Err(ConfigError::Validation(
                "server.host cannot be empty".to_owned(),
            ));
        }
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port cannot be 0".to_owned(),
            ));
        }
        if self.server.shutdown_grace_ms > MAX_SHUTDOWN_GRACE_MS {
            return Err(ConfigError::Validation(format!(
                "server.shutdown_grace_ms cannot exceed {MAX_SHUTDOWN_GRACE_MS}"
            )));
        }
        Ok(())
    }

    fn validate_live_reload(&self) -> Result<(), ConfigError> {
        for entry in &self.live_reload.watch {
            if entry.is_empty() {
                return Err(ConfigError::Validation(
                    "live_reload.watch entries cannot be empty".to_owned(),
                ));
            }
            let escapes_root = Path::new(entry)
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
            if escapes_root {
                return Err(ConfigError::Validation(format!(
                    "live_reload.watch entry {entry:?} must be relative to deck.root_dir"
                )));
            }
        }
        Ok(())
    }

    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.server.host = expand::expand_env(&self.server.host, "server.host")?;
        if let Some(ref root_dir) = self.deck.root_dir {
            self.deck.root_dir = Some(expand::expand_env(root_dir, "deck.root_dir")?);
        }
        Ok(())
    }

    /// Resolve relative paths against the config file's directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        self.deck_resolved = DeckConfig {
            root_dir: self
                .deck
                .root_dir
                .as_deref()
                .map_or_else(|| config_dir.to_path_buf(), |dir| config_dir.join(dir)),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn assert_validation_error(config: &Config, needles: &[&str]) {
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation(_)),
            "Expected ConfigError::Validation, got {err:?}"
        );
        let message = err.to_string();
        for needle in needles {
            assert!(message.contains(needle), "{message:?} should mention {needle:?}");
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default_with_base(Path::new("/talks"));
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.shutdown_grace(), Duration::from_secs(3));
        assert_eq!(config.deck_resolved.root_dir, PathBuf::from("/talks"));
        assert!(config.live_reload.enabled);
        assert_eq!(
            config.live_reload.watch,
            vec!["index.tpl", "slides.tpl", "res/style.css", "res/script.js"]
        );
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert!(config.live_reload.enabled);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[server]
host = "0.0.0.0"
port = 9000
shutdown_grace_ms = 500

[deck]
root_dir = "talks"

[live_reload]
enabled = false
watch = ["deck.tpl", "res/theme.css"]
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.shutdown_grace(), Duration::from_millis(500));
        assert_eq!(config.deck_resolved.root_dir, PathBuf::from("/project/talks"));
        assert!(!config.live_reload.enabled);
        assert_eq!(config.live_reload.watch, vec!["deck.tpl", "res/theme.css"]);
    }

    #[test]
    fn test_root_dir_defaults_to_config_dir() {
        let mut config: Config = toml::from_str("").unwrap();
        config.resolve_paths(Path::new("/project"));
        assert_eq!(config.deck_resolved.root_dir, PathBuf::from("/project"));
    }

    #[test]
    fn test_apply_cli_settings() {
        let mut config = Config::default_with_base(Path::new("/talks"));
        config.apply_cli_settings(&CliSettings {
            host: Some("0.0.0.0".to_owned()),
            port: Some(3000),
            root_dir: Some(PathBuf::from("/elsewhere")),
            live_reload_enabled: Some(false),
        });

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.deck_resolved.root_dir, PathBuf::from("/elsewhere"));
        assert!(!config.live_reload.enabled);
    }

    #[test]
    fn test_apply_cli_settings_empty_keeps_values() {
        let mut config = Config::default_with_base(Path::new("/talks"));
        config.apply_cli_settings(&CliSettings::default());

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.deck_resolved.root_dir, PathBuf::from("/talks"));
        assert!(config.live_reload.enabled);
    }

    #[test]
    fn test_load_from_file_resolves_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[deck]\nroot_dir = \"decks\"\n[server]\nport = 8181\n").unwrap();

        let config = Config::load(Some(&path), None).unwrap();

        assert_eq!(config.server.port, 8181);
        assert_eq!(config.deck_resolved.root_dir, dir.path().join("decks"));
        assert_eq!(config.config_path, Some(path));
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let err = Config::load(Some(Path::new("/nonexistent/slides.toml")), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_rejects_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[server\nport = ").unwrap();

        let err = Config::load(Some(&path), None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_validates_cli_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "").unwrap();

        let settings = CliSettings {
            port: Some(0),
            ..CliSettings::default()
        };
        let err = Config::load(Some(&path), Some(&settings)).unwrap_err();
        assert!(err.to_string().contains("server.port"));
    }

    #[test]
    fn test_validate_default_config_passes() {
        let config = Config::default_with_base(Path::new("/talks"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_server_host_empty() {
        let mut config = Config::default_with_base(Path::new("/talks"));
        config.server.host = String::new();
        assert_validation_error(&config, &["server.host", "empty"]);
    }

    #[test]
    fn test_validate_server_port_zero() {
        let mut config = Config::default_with_base(Path::new("/talks"));
        config.server.port = 0;
        assert_validation_error(&config, &["server.port"]);
    }

    #[test]
    fn test_validate_grace_too_long() {
        let mut config = Config::default_with_base(Path::new("/talks"));
        config.server.shutdown_grace_ms = 120_000;
        assert_validation_error(&config, &["shutdown_grace_ms", "60000"]);
    }

    #[test]
    fn test_validate_watch_entry_empty() {
        let mut config = Config::default_with_base(Path::new("/talks"));
        config.live_reload.watch.push(String::new());
        assert_validation_error(&config, &["live_reload.watch", "empty"]);
    }

    #[test]
    fn test_validate_watch_entry_escaping_root() {
        let mut config = Config::default_with_base(Path::new("/talks"));
        config.live_reload.watch = vec!["../secrets.txt".to_owned()];
        assert_validation_error(&config, &["../secrets.txt", "relative"]);

        config.live_reload.watch = vec!["/etc/hosts".to_owned()];
        assert_validation_error(&config, &["/etc/hosts"]);
    }

    #[test]
    fn test_expand_env_vars_in_file() {
        // SAFETY: variable name is unique to this test
        unsafe {
            std::env::set_var("SLIDES_TEST_CFG_ROOT", "keynotes");
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[deck]\nroot_dir = \"${SLIDES_TEST_CFG_ROOT}\"\n").unwrap();

        let config = Config::load(Some(&path), None).unwrap();
        assert_eq!(config.deck_resolved.root_dir, dir.path().join("keynotes"));

        unsafe {
            std::env::remove_var("SLIDES_TEST_CFG_ROOT");
        }
    }
}
