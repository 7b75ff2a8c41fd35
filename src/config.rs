//! Configuration System
//!
//! Layered configuration for the review console: built-in defaults, the user's global
//! file, workspace files, then `DOCKET_*` environment variables. Validation collects
//! every problem instead of stopping at the first.

use crate::access::{ReviewerIdentity, ReviewerRole};
use crate::error::ConfigError;
use crate::types::ScopeKey;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use crate::logging::LoggingConfig;
pub use crate::refresh::RefreshConfig;

mod merge;
mod sources;

pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocketConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub refresh: RefreshConfig,

    /// Reviewer the CLI acts as, unless overridden by flags
    #[serde(default)]
    pub reviewer: Option<ReviewerConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Collaborator store connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub api_token: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:8080/admin".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
            api_token: None,
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<(), String> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err("base_url cannot be empty".to_string());
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(format!("base_url must use http or https: {}", url));
        }
        if self.timeout_ms == 0 {
            return Err("timeout_ms must be greater than zero".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewerConfig {
    pub id: String,

    #[serde(default = "default_role")]
    pub role: ReviewerRole,

    /// Queue or tab keys a scoped reviewer may see
    #[serde(default)]
    pub scopes: Vec<String>,
}

fn default_role() -> ReviewerRole {
    ReviewerRole::Scoped
}

impl ReviewerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("id cannot be empty".to_string());
        }
        if self.scopes.iter().any(|scope| scope.trim().is_empty()) {
            return Err("scopes cannot contain empty keys".to_string());
        }
        Ok(())
    }

    pub fn identity(&self) -> ReviewerIdentity {
        ReviewerIdentity {
            id: self.id.trim().to_string(),
            role: self.role,
            scopes: self
                .scopes
                .iter()
                .map(|scope| ScopeKey::new(scope.trim()))
                .collect(),
        }
    }
}

impl From<&ReviewerConfig> for ReviewerIdentity {
    fn from(config: &ReviewerConfig) -> Self {
        config.identity()
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Store(String),
    Refresh(String),
    Reviewer(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Store(msg) => write!(f, "Store: {}", msg),
            ValidationError::Refresh(msg) => write!(f, "Refresh: {}", msg),
            ValidationError::Reviewer(msg) => write!(f, "Reviewer: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl DocketConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.store.validate() {
            errors.push(ValidationError::Store(e));
        }

        if self.refresh.interval_secs == 0 {
            errors.push(ValidationError::Refresh(
                "interval_secs must be greater than zero".to_string(),
            ));
        }

        if let Some(reviewer) = &self.reviewer {
            if let Err(e) = reviewer.validate() {
                errors.push(ValidationError::Reviewer(e));
            }
        }

        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate, folding every problem into one error
    pub fn ensure_valid(&self) -> Result<(), ConfigError> {
        self.validate().map_err(|errors| {
            let lines: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ConfigError::Invalid(lines.join("\n"))
        })
    }
}

/// Loads [`DocketConfig`] from layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load defaults, global file, workspace files and environment, in that order
    pub fn load(workspace_root: &Path) -> Result<DocketConfig, ConfigError> {
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = sources::env::add_to_builder(builder);
        Ok(builder.build()?.try_deserialize()?)
    }

    /// Load a single explicit file over the defaults, still honouring the environment
    pub fn load_from_file(path: &Path) -> Result<DocketConfig, ConfigError> {
        let builder = merge::merge_policy::builder_with_defaults()?
            .add_source(config::File::from(path).required(true));
        let builder = sources::env::add_to_builder(builder);
        Ok(builder.build()?.try_deserialize()?)
    }

    /// Built-in defaults only
    pub fn defaults() -> DocketConfig {
        DocketConfig::default()
    }
}
