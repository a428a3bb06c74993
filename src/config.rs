use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AutoSwaggerError, Result};

/// Config file names probed when no explicit path is given
pub const CONFIG_CANDIDATES: [&str; 2] = ["auto-swagger.toml", ".auto-swagger.toml"];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Source discovery and route extraction
    pub parsing: ParsingConfig,

    /// Model call behaviour
    pub generation: GenerationConfig,

    /// Prompt template customization
    pub templates: TemplateConfig,

    /// LLM integration settings
    pub llm: LlmConfig,

    /// Branch and commit settings
    pub git: GitConfig,

    /// Fine-tuning dataset preparation
    pub finetune: FinetuneConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project name
    pub name: String,

    /// Directory names skipped during discovery
    pub ignore_dirs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsingConfig {
    /// File extensions considered for route extraction
    pub file_extensions: Vec<String>,

    /// Maximum file size to parse (in bytes)
    pub max_file_size: usize,

    /// Skip routes that already carry an @swagger/@openapi block
    pub skip_documented: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Attempts per batch before giving up
    pub max_retries: u32,

    /// Hard deadline for a single model call
    pub timeout_secs: u64,

    /// How often to report that a model call is still running
    pub progress_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TemplateConfig {
    /// Directory holding `system.tera` / `user.tera` overrides
    pub template_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// LLM provider (openai, huggingface, openai-compatible, ollama)
    pub provider: String,

    /// Model name (e.g., "deepseek-ai/deepseek-coder-1.3b-instruct", "gpt-4o")
    pub model: String,

    /// API key (takes precedence over `api_key_env`)
    pub api_key: Option<String>,

    /// Environment variable consulted when `api_key` is unset
    pub api_key_env: String,

    /// Base URL for OpenAI-style endpoints
    pub base_url: Option<String>,

    /// Maximum tokens for LLM responses
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Nucleus sampling threshold
    pub top_p: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// Branch the documentation is committed to
    pub branch_name: String,

    /// First line of every commit message
    pub commit_message: String,

    /// Fallback author when the repository has no user configured
    pub author_name: Option<String>,
    pub author_email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FinetuneConfig {
    /// Directory of already-documented route files
    pub input_dir: PathBuf,

    /// JSONL file the training pairs are written to
    pub output_file: PathBuf,

    /// Marker appended to every completion
    pub stop_token: String,

    /// JSDoc tags that mark a block as route documentation
    pub doc_tags: Vec<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "Unnamed Project".to_string(),
            ignore_dirs: vec![
                "node_modules".to_string(),
                ".git".to_string(),
                "dist".to_string(),
                "build".to_string(),
                "coverage".to_string(),
            ],
        }
    }
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            file_extensions: ["js", "ts", "jsx", "tsx", "mjs", "cjs"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            max_file_size: 1024 * 1024, // 1MB
            skip_documented: true,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout_secs: 600,
            progress_interval_secs: 10,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "huggingface".to_string(),
            model: "deepseek-ai/deepseek-coder-1.3b-instruct".to_string(),
            api_key: None,
            api_key_env: "API_KEY".to_string(),
            base_url: None,
            max_tokens: 8192,
            temperature: 0.2,
            top_p: 0.95,
        }
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            branch_name: "swagger-docs-update".to_string(),
            commit_message: "Add Swagger documentation".to_string(),
            author_name: None,
            author_email: None,
        }
    }
}

impl Default for FinetuneConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("data/swagger_docs"),
            output_file: PathBuf::from("data/jsdocs_finetune.jsonl"),
            stop_token: "<|endofjsdoc|>".to_string(),
            doc_tags: vec!["@openapi".to_string(), "@swagger".to_string()],
        }
    }
}

impl LlmConfig {
    /// Resolve the API key from config or the configured environment variable
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| AutoSwaggerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| AutoSwaggerError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => {
                if p.as_ref().exists() {
                    Self::load(p)
                } else {
                    Err(AutoSwaggerError::Config(format!(
                        "Config file not found: {}",
                        p.as_ref().display()
                    )))
                }
            }
            None => {
                for candidate in &CONFIG_CANDIDATES {
                    if Path::new(candidate).exists() {
                        return Self::load(candidate);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.generation.max_retries == 0 {
            return Err(AutoSwaggerError::Config(
                "generation.max_retries must be at least 1".to_string(),
            ));
        }
        if self.generation.timeout_secs == 0 {
            return Err(AutoSwaggerError::Config(
                "generation.timeout_secs must be positive".to_string(),
            ));
        }
        if self.git.branch_name.trim().is_empty() {
            return Err(AutoSwaggerError::Config("git.branch_name is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.generation.max_retries, 3);
        assert_eq!(config.llm.max_tokens, 8192);
        assert_eq!(config.llm.api_key_env, "API_KEY");
        assert_eq!(config.git.branch_name, "swagger-docs-update");
        assert!(config.parsing.skip_documented);
        assert!(config.project.ignore_dirs.contains(&"node_modules".to_string()));
    }

    #[test]
    fn test_partial_file_fills_missing_sections() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("auto-swagger.toml");
        std::fs::write(
            &path,
            "[llm]\nprovider = \"openai\"\nmodel = \"gpt-4o\"\n\n[generation]\nmax_retries = 5\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.max_tokens, 8192);
        assert_eq!(config.generation.max_retries, 5);
        assert_eq!(config.generation.timeout_secs, 600);
        assert_eq!(config.git.commit_message, "Add Swagger documentation");
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("auto-swagger.toml");
        let mut config = Config::default();
        config.project.name = "shop-api".to_string();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.project.name, "shop-api");
    }

    #[test]
    fn test_zero_retries_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("auto-swagger.toml");
        std::fs::write(&path, "[generation]\nmax_retries = 0\n").unwrap();

        assert!(matches!(Config::load(&path), Err(AutoSwaggerError::Config(_))));
    }

    #[test]
    fn test_missing_explicit_path_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = Config::load_or_default(Some(dir.path().join("nope.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_explicit_api_key_wins() {
        let llm = LlmConfig {
            api_key: Some("sk-test".to_string()),
            api_key_env: "AUTO_SWAGGER_TEST_UNSET_VAR".to_string(),
            ..LlmConfig::default()
        };
        assert_eq!(llm.resolve_api_key().as_deref(), Some("sk-test"));

        let llm = LlmConfig {
            api_key: None,
            api_key_env: "AUTO_SWAGGER_TEST_UNSET_VAR".to_string(),
            ..LlmConfig::default()
        };
        assert_eq!(llm.resolve_api_key(), None);
    }
}
