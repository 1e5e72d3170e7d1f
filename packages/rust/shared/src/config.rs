//! Application configuration for campaignsmith.
//!
//! User config lives at `~/.campaignsmith/campaignsmith.toml`.
//! CLI flags override config file values, which override defaults.
//!
//! Only the CLI reads config and credentials. The pipeline receives
//! already-resolved values.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CampaignError, Result};
use crate::types::{CampaignBrief, ModelTarget, PipelineState};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "campaignsmith.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".campaignsmith";

// ---------------------------------------------------------------------------
// Config structs (matching campaignsmith.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Provider endpoints and credential env vars, keyed by provider name.
    #[serde(default = "default_providers")]
    pub providers: BTreeMap<String, ProviderConfig>,

    /// Sampling and transport settings for every model call.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Retry budgets.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Per-stage model overrides, keyed by stage config key.
    #[serde(default)]
    pub stages: BTreeMap<String, StageOverride>,

    /// What the campaign is about.
    #[serde(default)]
    pub brief: CampaignBrief,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            defaults: DefaultsConfig::default(),
            providers: default_providers(),
            generation: GenerationConfig::default(),
            retry: RetryConfig::default(),
            stages: BTreeMap::new(),
            brief: CampaignBrief::default(),
        }
    }
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Provider used by every stage without an override.
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model used by every stage without an override.
    #[serde(default = "default_model")]
    pub model: String,

    /// Directory campaign reports are written under.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// How many social posts to draft.
    #[serde(default = "default_social_post_count")]
    pub social_post_count: usize,

    /// Maximum concurrent social-post evaluations.
    #[serde(default = "default_evaluation_concurrency")]
    pub evaluation_concurrency: usize,

    /// Fewest ideas the idea stage must return.
    #[serde(default = "default_idea_count_min")]
    pub idea_count_min: usize,

    /// Most ideas the idea stage may return.
    #[serde(default = "default_idea_count_max")]
    pub idea_count_max: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            output_dir: default_output_dir(),
            social_post_count: default_social_post_count(),
            evaluation_concurrency: default_evaluation_concurrency(),
            idea_count_min: default_idea_count_min(),
            idea_count_max: default_idea_count_max(),
        }
    }
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_output_dir() -> String {
    "campaigns".into()
}
fn default_social_post_count() -> usize {
    10
}
fn default_evaluation_concurrency() -> usize {
    4
}
fn default_idea_count_min() -> usize {
    5
}
fn default_idea_count_max() -> usize {
    7
}

/// `[providers.<name>]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Name of the env var holding the API key (never store the key itself).
    pub api_key_env: String,

    /// API base URL.
    pub base_url: url::Url,
}

fn default_providers() -> BTreeMap<String, ProviderConfig> {
    let mut providers = BTreeMap::new();
    if let Ok(base_url) = url::Url::parse("https://api.openai.com/v1") {
        providers.insert(
            "openai".to_string(),
            ProviderConfig {
                api_key_env: "OPENAI_API_KEY".into(),
                base_url,
            },
        );
    }
    if let Ok(base_url) = url::Url::parse("https://api.anthropic.com") {
        providers.insert(
            "anthropic".to_string(),
            ProviderConfig {
                api_key_env: "ANTHROPIC_API_KEY".into(),
                base_url,
            },
        );
    }
    providers
}

/// `[generation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Per-call timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl GenerationConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_max_tokens() -> u32 {
    4096
}
fn default_top_p() -> f32 {
    1.0
}
fn default_request_timeout() -> u64 {
    60
}

/// `[retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Extra attempts after a response breaks its contract.
    #[serde(default = "default_parse_retries")]
    pub parse_retries: u32,

    /// Total attempts allowed for retryable provider errors.
    #[serde(default = "default_provider_attempts")]
    pub provider_attempts: u32,

    /// First backoff delay in milliseconds.
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    /// Backoff ceiling in milliseconds.
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            parse_retries: default_parse_retries(),
            provider_attempts: default_provider_attempts(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

fn default_parse_retries() -> u32 {
    2
}
fn default_provider_attempts() -> u32 {
    3
}
fn default_base_delay() -> u64 {
    500
}
fn default_max_delay() -> u64 {
    8_000
}

/// `[stages.<key>]` entry. Unset fields fall back to `[defaults]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl AppConfig {
    /// The provider/model pair a given stage should call.
    pub fn target_for(&self, state: PipelineState) -> ModelTarget {
        let stage = state
            .config_key()
            .and_then(|key| self.stages.get(key))
            .cloned()
            .unwrap_or_default();

        ModelTarget {
            provider: stage
                .provider
                .unwrap_or_else(|| self.defaults.provider.clone()),
            model: stage.model.unwrap_or_else(|| self.defaults.model.clone()),
        }
    }

    /// Check the values that have hard constraints.
    pub fn validate(&self) -> Result<()> {
        let d = &self.defaults;
        if d.idea_count_min == 0 || d.idea_count_min > d.idea_count_max {
            return Err(CampaignError::config(format!(
                "idea_count_min ({}) must be at least 1 and at most idea_count_max ({})",
                d.idea_count_min, d.idea_count_max
            )));
        }
        if d.social_post_count == 0 {
            return Err(CampaignError::config("social_post_count must be at least 1"));
        }
        if d.evaluation_concurrency == 0 {
            return Err(CampaignError::config(
                "evaluation_concurrency must be at least 1",
            ));
        }
        if self.retry.provider_attempts == 0 {
            return Err(CampaignError::config("provider_attempts must be at least 1"));
        }
        for state in PipelineState::SEQUENCE {
            let target = self.target_for(state);
            if !self.providers.contains_key(&target.provider) {
                return Err(CampaignError::config(format!(
                    "stage {state} uses provider '{}' which has no [providers.{}] entry",
                    target.provider, target.provider
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.campaignsmith/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CampaignError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.campaignsmith/campaignsmith.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CampaignError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        CampaignError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Load a standalone campaign brief (same shape as the `[brief]` section).
pub fn load_brief_from(path: &Path) -> Result<CampaignBrief> {
    let content = std::fs::read_to_string(path).map_err(|e| CampaignError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        CampaignError::config(format!("failed to parse brief {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CampaignError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CampaignError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CampaignError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the API key for `provider` from the env var its config names.
pub fn resolve_api_key(config: &AppConfig, provider: &str) -> Result<String> {
    let provider_config = config.providers.get(provider).ok_or_else(|| {
        CampaignError::config(format!("no [providers.{provider}] section configured"))
    })?;

    let var_name = &provider_config.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(CampaignError::config(format!(
            "API key for provider '{provider}' not found. Set the {var_name} environment variable."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("output_dir"));
        assert!(toml_str.contains("OPENAI_API_KEY"));
        assert!(toml_str.contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.social_post_count, 10);
        assert_eq!(parsed.retry.parse_retries, 2);
        assert_eq!(parsed.providers["openai"].api_key_env, "OPENAI_API_KEY");
        assert_eq!(parsed.brief, CampaignBrief::default());
    }

    #[test]
    fn empty_file_yields_defaults() {
        let config: AppConfig = toml::from_str("").expect("parse");
        assert_eq!(config.defaults.model, "gpt-4o-mini");
        assert_eq!(config.generation.max_tokens, 4096);
        assert!(config.providers.contains_key("anthropic"));
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn stage_overrides_resolve_targets() {
        let toml_str = r#"
[defaults]
provider = "openai"
model = "gpt-4o-mini"

[stages.blog]
provider = "anthropic"
model = "claude-sonnet"

[stages.social_evaluation]
model = "gpt-4o"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(
            config.target_for(PipelineState::DraftingBlog),
            ModelTarget::new("anthropic", "claude-sonnet")
        );
        assert_eq!(
            config.target_for(PipelineState::EvaluatingSocial),
            ModelTarget::new("openai", "gpt-4o")
        );
        assert_eq!(
            config.target_for(PipelineState::GeneratingIdeas),
            ModelTarget::new("openai", "gpt-4o-mini")
        );
    }

    #[test]
    fn validate_rejects_unknown_provider() {
        let mut config = AppConfig::default();
        config.stages.insert(
            "email".into(),
            StageOverride {
                provider: Some("mystery".into()),
                model: None,
            },
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("mystery"));
    }

    #[test]
    fn validate_rejects_bad_idea_bounds() {
        let mut config = AppConfig::default();
        config.defaults.idea_count_min = 8;
        assert!(config.validate().is_err());
    }

    #[test]
    fn api_key_resolution() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        if let Some(p) = config.providers.get_mut("openai") {
            p.api_key_env = "CS_TEST_NONEXISTENT_KEY_12345".into();
        }
        let result = resolve_api_key(&config, "openai");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key"));

        assert!(resolve_api_key(&config, "nobody").is_err());
    }
}
