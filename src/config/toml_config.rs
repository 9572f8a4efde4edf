use crate::core::{ResultFormat, RetryPolicy};
use crate::imdb::BASE_URL;
use crate::utils::error::{FlowError, Result};
use crate::utils::validation::{
    validate_one_of, validate_path, validate_positive_number, validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "configs/flows.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowsConfig {
    pub project: ProjectConfig,
    pub http: HttpConfig,
    pub retry: RetryConfig,
    pub imdb: ImdbConfig,
    pub results: ResultsConfig,
    pub flows: BTreeMap<String, FlowSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "imdb-flows".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_seconds: Option<u64>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImdbConfig {
    pub base_url: String,
    pub concurrent_requests: usize,
}

impl Default for ImdbConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            concurrent_requests: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultsBackend {
    #[default]
    Local,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultsConfig {
    pub backend: ResultsBackend,
    pub directory: String,
    pub formats: Vec<String>,
}

impl Default for ResultsConfig {
    fn default() -> Self {
        Self {
            backend: ResultsBackend::Local,
            directory: "./results".to_string(),
            formats: vec!["json".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowSettings {
    pub parameters: BTreeMap<String, Value>,
}

impl FlowsConfig {
    /// Loads `path`, or the default location when it exists, or the built-in
    /// defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::from_file(&default_path)
                } else {
                    tracing::debug!("No configuration file found, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            FlowError::config(format!(
                "cannot read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut table: toml::Table = toml::from_str(content)
            .map_err(|e| FlowError::config(format!("TOML parsing error: {}", e)))?;

        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| FlowError::config(format!("invalid substitution pattern: {}", e)))?;
        for (_, value) in table.iter_mut() {
            Self::substitute_env_vars(&re, value);
        }

        toml::Value::Table(table)
            .try_into()
            .map_err(|e| FlowError::config(format!("TOML parsing error: {}", e)))
    }

    /// Replaces `${VAR}` inside string values with the environment value;
    /// unknown variables are left as written. Keys and comments are untouched.
    fn substitute_env_vars(re: &Regex, value: &mut toml::Value) {
        match value {
            toml::Value::String(text) => {
                let replaced = re
                    .replace_all(text.as_str(), |caps: &regex::Captures| {
                        let var_name = &caps[1];
                        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
                    })
                    .into_owned();
                *text = replaced;
            }
            toml::Value::Array(items) => {
                for item in items {
                    Self::substitute_env_vars(re, item);
                }
            }
            toml::Value::Table(table) => {
                for (_, item) in table.iter_mut() {
                    Self::substitute_env_vars(re, item);
                }
            }
            _ => {}
        }
    }

    pub fn with_results_dir(mut self, directory: Option<String>) -> Self {
        if let Some(directory) = directory {
            self.results.directory = directory;
        }
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_retries,
            Duration::from_secs(self.retry.retry_delay_seconds),
        )
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.http.timeout_seconds.map(Duration::from_secs)
    }

    pub fn result_formats(&self) -> Result<Vec<ResultFormat>> {
        self.results.formats.iter().map(|f| f.parse()).collect()
    }

    /// Parameter defaults configured for `flow`, empty when none are set.
    pub fn flow_parameters(&self, flow: &str) -> BTreeMap<String, Value> {
        self.flows
            .get(flow)
            .map(|settings| settings.parameters.clone())
            .unwrap_or_default()
    }
}

impl Validate for FlowsConfig {
    fn validate(&self) -> Result<()> {
        validate_url("imdb.base_url", &self.imdb.base_url)?;
        validate_positive_number("imdb.concurrent_requests", self.imdb.concurrent_requests, 1)?;

        if self.results.backend == ResultsBackend::Local {
            validate_path("results.directory", &self.results.directory)?;
        }
        validate_one_of("results.formats", &self.results.formats, &ResultFormat::NAMES)?;

        if let Some(user_agent) = &self.http.user_agent {
            if user_agent.trim().is_empty() {
                return Err(FlowError::InvalidConfigValue {
                    field: "http.user_agent".to_string(),
                    value: user_agent.clone(),
                    reason: "User agent cannot be empty".to_string(),
                });
            }
        }

        Ok(())
    }
}
