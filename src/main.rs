use anyhow::Context;
use clap::Parser;
use imdb_flows::adapters::http::DEFAULT_USER_AGENT;
use imdb_flows::config::ResultsBackend;
use imdb_flows::core::{Flow, Storage};
use imdb_flows::utils::error::ErrorSeverity;
use imdb_flows::utils::{logger, validation::Validate};
use imdb_flows::{
    builtin_registry, CliConfig, FlowError, FlowRunner, FlowsConfig,
    HttpPageFetcher, LocalStorage, LogNotifier, NullStorage,
};
use std::collections::BTreeMap;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    logger::init_logger(cli.verbose, cli.log_format);
    tracing::info!("Starting imdb-flows");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => exit_with(&e),
    };

    let user_agent = config.http.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
    let fetcher = HttpPageFetcher::new(user_agent, config.request_timeout())
        .context("failed to build the HTTP client")?;
    let registry = builtin_registry(Arc::new(fetcher), &config.imdb.base_url);

    if cli.list {
        for name in registry.names() {
            println!("{}", name);
        }
        return Ok(());
    }

    let flows = match registry.select(&cli.flows) {
        Ok(flows) => flows,
        Err(e) => {
            eprintln!("Available flows: {}", registry.names().join(", "));
            exit_with(&e)
        }
    };

    if let Err(e) = check_cli_params(&flows, &cli) {
        exit_with(&e);
    }

    if cli.test {
        show_plan(&flows, &config, &cli);
        return Ok(());
    }

    let outcome = match config.results.backend {
        ResultsBackend::Local => {
            let storage = LocalStorage::new(&config.results.directory);
            run_flows(storage, &flows, &config, &cli).await
        }
        ResultsBackend::None => run_flows(NullStorage, &flows, &config, &cli).await,
    };

    if let Err(e) = outcome {
        exit_with(&e);
    }
    Ok(())
}

fn load_config(cli: &CliConfig) -> imdb_flows::Result<FlowsConfig> {
    let config =
        FlowsConfig::load(cli.config.as_deref())?.with_results_dir(cli.results_dir.clone());
    config.validate()?;
    Ok(config)
}

/// Config-file parameters with command-line overrides on top. A command-line
/// override only reaches the flows that declare it.
fn overrides_for(
    flow: &dyn Flow,
    config: &FlowsConfig,
    cli: &CliConfig,
) -> BTreeMap<String, serde_json::Value> {
    let declared: Vec<&str> = flow.parameters().iter().map(|spec| spec.name).collect();
    let mut overrides = config.flow_parameters(flow.name());
    overrides.extend(
        cli.overrides()
            .into_iter()
            .filter(|(key, _)| declared.contains(&key.as_str())),
    );
    overrides
}

fn check_cli_params(flows: &[Arc<dyn Flow>], cli: &CliConfig) -> imdb_flows::Result<()> {
    for key in cli.overrides().keys() {
        let declared = flows.iter().any(|flow| {
            flow.parameters()
                .iter()
                .any(|spec| spec.name == key.as_str())
        });
        if !declared {
            return Err(FlowError::validation(format!(
                "no selected flow takes a parameter named '{}'",
                key
            )));
        }
    }
    Ok(())
}

fn show_plan(flows: &[Arc<dyn Flow>], config: &FlowsConfig, cli: &CliConfig) {
    println!("Configuration OK ({})", config.project.name);
    for flow in flows {
        let overrides = overrides_for(flow.as_ref(), config, cli);
        let defaults = flow.parameters();
        println!("{}", flow.name());
        for spec in &defaults {
            let value = overrides.get(spec.name).unwrap_or(&spec.default);
            println!("  {} = {}", spec.name, value);
        }
    }
}

async fn run_flows<S: Storage>(
    storage: S,
    flows: &[Arc<dyn Flow>],
    config: &FlowsConfig,
    cli: &CliConfig,
) -> imdb_flows::Result<()> {
    let runner = FlowRunner::new(storage, Arc::new(LogNotifier))
        .with_retry(config.retry_policy())
        .with_concurrency(config.imdb.concurrent_requests)
        .with_formats(config.result_formats()?);

    let mut first_error: Option<FlowError> = None;
    for flow in flows {
        let overrides = overrides_for(flow.as_ref(), config, cli);
        match runner.run(flow.as_ref(), &overrides).await {
            Ok(record) => {
                println!("✅ {} finished ({})", record.flow, record.run_id);
            }
            Err(e) => {
                tracing::error!(
                    "Flow '{}' failed: {} (Category: {:?}, Severity: {:?})",
                    flow.name(),
                    e,
                    e.category(),
                    e.severity()
                );
                eprintln!("❌ {}: {}", flow.name(), e.user_friendly_message());
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn exit_with(e: &FlowError) -> ! {
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code)
}
