use anyhow::{bail, Context, Result};
use migration::SchemaVersions;
use platform_client::{Endpoints, DEFAULT_API_HOST, DEFAULT_VIDEO_HOST};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration file layout shared with the other platform tools
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationDefinition {
    /// Unique identifier for this configuration (e.g., "migrate")
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The tool that reads this configuration
    pub provider: String,
    pub version: String,
    pub values: HashMap<String, Value>,
}

/// Settings for one invocation of the tool
#[derive(Debug, Clone, PartialEq)]
pub struct MigrateConfig {
    /// Host template; `{org}` becomes the tenant
    pub api_host: String,
    /// Host template; `{org}` becomes the organization, `{env}` the environment
    pub video_host: String,
    pub versions: SchemaVersions,
    pub request_timeout: Duration,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            api_host: DEFAULT_API_HOST.to_string(),
            video_host: DEFAULT_VIDEO_HOST.to_string(),
            versions: SchemaVersions::default(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl MigrateConfig {
    /// Load the file at `path`; a missing file means defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No configuration at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration {:?}", path))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid configuration {:?}", path))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let definition: ConfigurationDefinition = serde_yaml::from_str(content)?;
        Self::from_definition(&definition)
    }

    fn from_definition(definition: &ConfigurationDefinition) -> Result<Self> {
        if definition.id.is_empty() {
            bail!("Configuration ID cannot be empty");
        }
        if definition.provider.is_empty() {
            bail!("Configuration provider cannot be empty");
        }

        let values = &definition.values;
        let defaults = Self::default();
        let request_timeout = match values.get("request_timeout_secs") {
            None => defaults.request_timeout,
            Some(value) => match value.as_u64() {
                Some(secs) if secs > 0 => Duration::from_secs(secs),
                _ => bail!("`request_timeout_secs` must be a positive integer"),
            },
        };

        Ok(Self {
            api_host: string_value(values, "api_host")?.unwrap_or(defaults.api_host),
            video_host: string_value(values, "video_host")?.unwrap_or(defaults.video_host),
            versions: SchemaVersions {
                story: string_value(values, "story_ans_version")?.unwrap_or(defaults.versions.story),
                video: string_value(values, "video_ans_version")?.unwrap_or(defaults.versions.video),
            },
            request_timeout,
        })
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints::new(&self.api_host, &self.video_host)
    }
}

fn string_value(values: &HashMap<String, Value>, key: &str) -> Result<Option<String>> {
    match values.get(key) {
        None => Ok(None),
        Some(Value::String(text)) if !text.trim().is_empty() => Ok(Some(text.clone())),
        Some(_) => bail!("`{}` must be a non-empty string", key),
    }
}
