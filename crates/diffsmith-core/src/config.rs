//! Diffsmith configuration
//!
//! Loaded from TOML; every section and field has a default, so an empty file
//! is a valid configuration.
//!
//! ```toml
//! [pipeline]
//! max_attempts = 3
//!
//! [llm]
//! model = "gpt-4o"
//!
//! [workspace]
//! root = "/usr/share/nginx/html"
//! patch_tool = "native"
//! ```

use crate::types::{BatchContext, Category};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for this schema
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Value out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffsmithConfig {
    pub pipeline: PipelineConfig,
    pub llm: LlmConfig,
    pub workspace: WorkspaceConfig,
    pub logging: LoggingConfig,
}

impl DiffsmithConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate TOML text
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] or [`ConfigError::Invalid`]
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// Returns [`ConfigError::Read`] when the file cannot be read
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the first bad field
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.pipeline;
        if p.max_attempts == 0 {
            return Err(ConfigError::Invalid("pipeline.max_attempts must be at least 1".into()));
        }
        for (name, secs) in [
            ("fetch_timeout_secs", p.fetch_timeout_secs),
            ("synthesis_timeout_secs", p.synthesis_timeout_secs),
            ("validation_timeout_secs", p.validation_timeout_secs),
            ("apply_timeout_secs", p.apply_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::Invalid(format!("pipeline.{name} must be greater than 0")));
            }
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Invalid("llm.temperature must be within 0.0..=2.0".into()));
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Invalid("llm.model must not be empty".into()));
        }
        for category in Category::ALL {
            let name = self.workspace.files.get(category);
            if name.is_empty() || name.contains('/') || name.contains('\\') {
                return Err(ConfigError::Invalid(format!(
                    "workspace.files.{category} must be a bare file name, got '{name}'"
                )));
            }
        }
        Ok(())
    }

    /// With attempt budget
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.pipeline.max_attempts = attempts;
        self
    }

    /// With model name
    #[inline]
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.llm.model = model.into();
        self
    }

    /// With workspace root
    #[inline]
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace.root = root.into();
        self
    }

    /// With patch tool
    #[inline]
    #[must_use]
    pub fn with_patch_tool(mut self, tool: PatchToolKind) -> Self {
        self.workspace.patch_tool = tool;
        self
    }
}

/// Retry budget and call deadlines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Synthesis attempts per task
    pub max_attempts: u32,
    pub fetch_timeout_secs: u64,
    pub synthesis_timeout_secs: u64,
    pub validation_timeout_secs: u64,
    pub apply_timeout_secs: u64,
}

impl PipelineConfig {
    #[inline]
    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    #[inline]
    #[must_use]
    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.synthesis_timeout_secs)
    }

    #[inline]
    #[must_use]
    pub fn validation_timeout(&self) -> Duration {
        Duration::from_secs(self.validation_timeout_secs)
    }

    #[inline]
    #[must_use]
    pub fn apply_timeout(&self) -> Duration {
        Duration::from_secs(self.apply_timeout_secs)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            fetch_timeout_secs: 10,
            synthesis_timeout_secs: 120,
            validation_timeout_secs: 30,
            apply_timeout_secs: 30,
        }
    }
}

/// Text-synthesis service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub temperature: f32,
    /// Base URL of an OpenAI-compatible API, without `/chat/completions`
    pub base_url: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub max_tokens: Option<u32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            temperature: 0.0,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_tokens: None,
        }
    }
}

/// Which structural-patch tool applies candidates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchToolKind {
    /// GNU `patch` subprocess
    #[default]
    Gnu,
    /// In-process grammar applier
    Native,
}

/// Target directory settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub root: PathBuf,
    pub patch_tool: PatchToolKind,
    /// `patch` executable for [`PatchToolKind::Gnu`]
    pub patch_binary: String,
    pub files: FileNames,
}

impl WorkspaceConfig {
    /// Batch context for this workspace with a fresh session id
    #[must_use]
    pub fn batch_context(&self) -> BatchContext {
        Category::ALL.into_iter().fold(
            BatchContext::new(self.root.display().to_string()),
            |ctx, category| ctx.with_file_name(category, self.files.get(category)),
        )
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            patch_tool: PatchToolKind::default(),
            patch_binary: "patch".to_string(),
            files: FileNames::default(),
        }
    }
}

/// Target file name per category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileNames {
    pub structure: String,
    pub style: String,
    pub behavior: String,
}

impl FileNames {
    /// File name of `category`
    #[must_use]
    pub fn get(&self, category: Category) -> &str {
        match category {
            Category::Structure => &self.structure,
            Category::Style => &self.style,
            Category::Behavior => &self.behavior,
        }
    }
}

impl Default for FileNames {
    fn default() -> Self {
        Self {
            structure: Category::Structure.default_file_name().to_string(),
            style: Category::Style.default_file_name().to_string(),
            behavior: Category::Behavior.default_file_name().to_string(),
        }
    }
}

/// Log output settings; `RUST_LOG` takes precedence over `filter`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}
