use crate::utils::logger::LogFormat;
use clap::Parser;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "imdb-flows")]
#[command(about = "Runs the movie chart scraping flows")]
pub struct CliConfig {
    /// TOML configuration file (defaults to configs/flows.toml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Flow to run, repeatable; every registered flow runs when omitted
    #[arg(short, long = "flow")]
    pub flows: Vec<String>,

    /// Parameter override as key=value; values are read as JSON when they parse
    #[arg(short, long = "param", value_parser = parse_param)]
    pub params: Vec<(String, Value)>,

    /// Overrides results.directory from the configuration file
    #[arg(long)]
    pub results_dir: Option<String>,

    /// Validate configuration and show the resolved parameters without running
    #[arg(short, long)]
    pub test: bool,

    /// List the registered flows and exit
    #[arg(long)]
    pub list: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, default_value = "compact", help = "Log format: compact or json")]
    pub log_format: LogFormat,
}

impl CliConfig {
    /// Command-line overrides, later occurrences winning.
    pub fn overrides(&self) -> BTreeMap<String, Value> {
        self.params.iter().cloned().collect()
    }
}

fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing parameter name in '{}'", raw));
    }

    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::from(value));
    Ok((key.to_string(), value))
}
