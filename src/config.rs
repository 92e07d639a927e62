use crate::cli::Cli;
use crate::error::{ConfigError, ConfigResult as Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub assistant: AssistantConfig,
    pub display: DisplayConfig,
    pub script: ScriptConfig,
}

/// Query assistant configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssistantConfig {
    /// Chat model name
    pub model: String,
    /// Base URL of an OpenAI-compatible API
    pub base_url: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Maximum bytes of serialized XML sent as a sample
    pub sample_bytes: usize,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct DisplayConfig {
    /// Verbose output
    pub verbose: bool,
    /// Quiet mode (results and errors only)
    pub quiet: bool,
    /// Disable ANSI colors even on a terminal
    pub no_color: bool,
}

/// Script interpreter configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScriptConfig {
    /// Interpreter executable
    pub program: String,
    /// Arguments placed before the script text
    pub args: Vec<String>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_seconds: 60,
            sample_bytes: 4096,
        }
    }
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            program: "python3".to_string(),
            args: vec!["-c".to_string()],
        }
    }
}

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: file -> environment -> CLI
    pub async fn load_config(cli: &Cli) -> Result<Config> {
        let mut config = match &cli.config {
            Some(config_path) => Self::load_from_file(config_path).await?,
            None => Self::find_config_file().await?.unwrap_or_default(),
        };

        config = Self::apply_environment_overrides(config)?;
        config = Self::merge_with_cli(config, cli);

        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub async fn load_from_file(path: &Path) -> Result<Config> {
        let content = tokio::fs::read_to_string(path).await?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                // Try to parse as TOML first, then JSON
                if let Ok(config) = toml::from_str::<Config>(&content) {
                    Ok(config)
                } else {
                    Ok(serde_json::from_str(&content)?)
                }
            }
        }
    }

    /// Find configuration file in standard locations
    pub async fn find_config_file() -> Result<Option<Config>> {
        let config_names = [
            "xpathfinder.toml",
            "xpathfinder.json",
            ".xpathfinder.toml",
            ".xpathfinder.json",
        ];

        for name in &config_names {
            let path = PathBuf::from(name);
            if path.exists() {
                return Ok(Some(Self::load_from_file(&path).await?));
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let app_config_dir = config_dir.join("xpathfinder");
            for name in &config_names {
                let path = app_config_dir.join(name);
                if path.exists() {
                    return Ok(Some(Self::load_from_file(&path).await?));
                }
            }
        }

        Ok(None)
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: Config) -> Result<Config> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        // Assistant settings
        if let Some(model) = env.get("XPATHFINDER_MODEL") {
            config.assistant.model = model;
        }

        if let Some(base_url) = env.get("XPATHFINDER_BASE_URL") {
            config.assistant.base_url = base_url;
        }

        if let Some(api_key_env) = env.get("XPATHFINDER_API_KEY_ENV") {
            config.assistant.api_key_env = api_key_env;
        }

        if let Some(timeout) = env.get("XPATHFINDER_TIMEOUT") {
            config.assistant.timeout_seconds = parse_env("XPATHFINDER_TIMEOUT", &timeout)?;
        }

        if let Some(sample_bytes) = env.get("XPATHFINDER_SAMPLE_BYTES") {
            config.assistant.sample_bytes = parse_env("XPATHFINDER_SAMPLE_BYTES", &sample_bytes)?;
        }

        // Display settings
        if let Some(verbose) = env.get("XPATHFINDER_VERBOSE") {
            config.display.verbose = parse_env("XPATHFINDER_VERBOSE", &verbose)?;
        }

        if let Some(quiet) = env.get("XPATHFINDER_QUIET") {
            config.display.quiet = parse_env("XPATHFINDER_QUIET", &quiet)?;
        }

        if env.get("NO_COLOR").is_some_and(|value| !value.is_empty()) {
            config.display.no_color = true;
        }

        // Script settings
        if let Some(program) = env.get("XPATHFINDER_SCRIPT_PROGRAM") {
            config.script.program = program;
        }

        if let Some(args) = env.get("XPATHFINDER_SCRIPT_ARGS") {
            config.script.args = args.split_whitespace().map(str::to_string).collect();
        }

        Ok(config)
    }

    /// Merge CLI arguments with configuration (CLI takes precedence)
    pub fn merge_with_cli(mut config: Config, cli: &Cli) -> Config {
        if let Some(model) = &cli.model {
            config.assistant.model = model.clone();
        }
        if let Some(base_url) = &cli.base_url {
            config.assistant.base_url = base_url.clone();
        }
        if let Some(timeout) = cli.timeout {
            config.assistant.timeout_seconds = timeout;
        }

        if cli.verbose > 0 {
            config.display.verbose = true;
            config.display.quiet = false;
        }
        if cli.quiet {
            config.display.quiet = true;
            config.display.verbose = false;
        }

        config
    }

    /// Validate configuration values
    pub fn validate_config(config: &Config) -> Result<()> {
        if config.assistant.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        if config.assistant.model.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Assistant model must not be empty".to_string(),
            ));
        }

        if !(config.assistant.base_url.starts_with("http://")
            || config.assistant.base_url.starts_with("https://"))
        {
            return Err(ConfigError::Validation(format!(
                "Assistant base URL must be http(s): {}",
                config.assistant.base_url
            )));
        }

        if config.assistant.api_key_env.trim().is_empty() {
            return Err(ConfigError::Validation(
                "API key environment variable name must not be empty".to_string(),
            ));
        }

        if config.display.verbose && config.display.quiet {
            return Err(ConfigError::Validation(
                "Cannot enable both verbose and quiet modes".to_string(),
            ));
        }

        if config.script.program.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Script program must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Convert configuration to Duration for the assistant timeout
    pub fn get_timeout_duration(config: &AssistantConfig) -> Duration {
        Duration::from_secs(config.timeout_seconds)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| ConfigError::Environment(format!("Invalid {} value: {}", key, value)))
}
