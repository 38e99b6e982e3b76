//! Configuration module for twinsync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, SyncRoot};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for twinsync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub sync: SyncConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The two mirrored roots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Watched tree (A). Absolute, or relative to the working directory.
    pub left: PathBuf,
    /// Mirror tree (B). Absolute, or relative to the working directory.
    pub right: PathBuf,
    /// Capacity of the channel between the watcher and the engine.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

fn default_event_buffer() -> usize {
    1024
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/twinsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("twinsync")
            .join("config.yaml")
    }

    /// Resolve both configured roots to canonical [`SyncRoot`] values.
    ///
    /// Relative paths are interpreted against the current directory.
    /// Identical or nested roots are rejected even if [`Config::validate`]
    /// was never called.
    pub fn resolve_roots(&self) -> Result<(SyncRoot, SyncRoot), DomainError> {
        let left = SyncRoot::resolve(&self.sync.left)?;
        let right = SyncRoot::resolve(&self.sync.right)?;

        if left.contains(right.as_path()) || right.contains(left.as_path()) {
            return Err(DomainError::ValidationFailed(format!(
                "sync roots must be distinct and not nested: {left} and {right}"
            )));
        }

        Ok((left, right))
    }
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

// Roots default to empty paths so that a missing value fails validation
// instead of silently mirroring some guessed directory.
impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            left: PathBuf::new(),
            right: PathBuf::new(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.left"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
pub const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        let left = check_root("sync.left", &self.sync.left, &mut errors);
        let right = check_root("sync.right", &self.sync.right, &mut errors);

        if let (Some(left), Some(right)) = (left, right) {
            if left == right {
                errors.push(ValidationError {
                    field: "sync.right".into(),
                    message: format!("must differ from sync.left ({})", left.display()),
                });
            } else if left.starts_with(&right) || right.starts_with(&left) {
                errors.push(ValidationError {
                    field: "sync.right".into(),
                    message: format!(
                        "roots must not be nested: {} and {}",
                        left.display(),
                        right.display()
                    ),
                });
            }
        }

        if self.sync.event_buffer == 0 {
            errors.push(ValidationError {
                field: "sync.event_buffer".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

/// Checks one root and returns its canonical form when it is usable.
fn check_root(field: &str, path: &Path, errors: &mut Vec<ValidationError>) -> Option<PathBuf> {
    if path.as_os_str().is_empty() {
        errors.push(ValidationError {
            field: field.into(),
            message: "must be set".into(),
        });
        return None;
    }

    match SyncRoot::resolve(path) {
        Ok(root) => Some(root.into_path_buf()),
        Err(e) => {
            errors.push(ValidationError {
                field: field.into(),
                message: e.to_string(),
            });
            None
        }
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use twinsync_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .sync_left(PathBuf::from("/srv/left"))
///     .sync_right(PathBuf::from("/srv/right"))
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Start from an already loaded configuration.
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    // --- sync ---

    pub fn sync_left(mut self, left: PathBuf) -> Self {
        self.config.sync.left = left;
        self
    }

    pub fn sync_right(mut self, right: PathBuf) -> Self {
        self.config.sync.right = right;
        self
    }

    pub fn sync_event_buffer(mut self, capacity: usize) -> Self {
        self.config.sync.event_buffer = capacity;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
