//! Engine configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use workflow_types::{
    IdentityProvider, SequentialIdentity, UuidIdentity, WorkflowError, WorkflowResult,
};

/// How reference objects without an identity are given one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IdentityScheme {
    /// Random v4 UUIDs
    #[default]
    Uuid,
    /// `<type>-<n>`, counted per runtime
    Sequential,
}

impl IdentityScheme {
    pub fn provider(&self) -> Arc<dyn IdentityProvider> {
        match self {
            Self::Uuid => Arc::new(UuidIdentity),
            Self::Sequential => Arc::new(SequentialIdentity::new()),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Mark an instance failed when a step breaks a firing rule
    pub fail_on_violation: bool,

    /// Leave non-terminal current details once an instance is terminal
    pub retire_on_terminal: bool,

    /// Seal a workflow when its first instance is created
    pub seal_on_first_instance: bool,

    pub identity: IdentityScheme,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fail_on_violation: true,
            retire_on_terminal: true,
            seal_on_first_instance: true,
            identity: IdentityScheme::Uuid,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(contents: &str) -> WorkflowResult<Self> {
        toml::from_str(contents).map_err(|e| WorkflowError::Config(e.to_string()))
    }

    /// Load configuration from file; a missing file yields the defaults
    pub fn load(path: Option<&str>) -> WorkflowResult<Self> {
        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => Self::default_config_path()?,
        };

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .map_err(|e| WorkflowError::Config(e.to_string()))?;
            let config = Self::from_toml_str(&contents)?;
            tracing::debug!(path = %config_path.display(), "Engine configuration loaded");
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    fn default_config_path() -> WorkflowResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| WorkflowError::Config("Cannot find config directory".into()))?;
        Ok(config_dir.join("workflow").join("engine.toml"))
    }

    pub fn with_identity(mut self, identity: IdentityScheme) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_fail_on_violation(mut self, enabled: bool) -> Self {
        self.fail_on_violation = enabled;
        self
    }

    pub fn with_retire_on_terminal(mut self, enabled: bool) -> Self {
        self.retire_on_terminal = enabled;
        self
    }

    pub fn with_seal_on_first_instance(mut self, enabled: bool) -> Self {
        self.seal_on_first_instance = enabled;
        self
    }
}
