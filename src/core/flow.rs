use crate::core::retry::RetryPolicy;
use crate::domain::model::{Notification, RunState, TaskRun};
use crate::domain::ports::Notifier;
use crate::utils::error::{FlowError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;

/// A declared flow parameter and the value used when the caller gives none.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub default: Value,
}

impl ParameterSpec {
    pub fn new(name: &'static str, default: impl Into<Value>) -> Self {
        Self {
            name,
            default: default.into(),
        }
    }
}

/// Resolved parameter values for one flow run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    values: BTreeMap<String, Value>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults of `specs`, then `overrides` on top. Override keys the flow
    /// does not declare are rejected.
    pub fn resolve(specs: &[ParameterSpec], overrides: &BTreeMap<String, Value>) -> Result<Self> {
        let mut values: BTreeMap<String, Value> = specs
            .iter()
            .map(|spec| (spec.name.to_string(), spec.default.clone()))
            .collect();

        for (key, value) in overrides {
            if !values.contains_key(key) {
                return Err(FlowError::InvalidConfigValue {
                    field: "parameters".to_string(),
                    value: key.clone(),
                    reason: format!(
                        "unknown parameter; expected one of: {}",
                        specs.iter().map(|s| s.name).collect::<Vec<_>>().join(", ")
                    ),
                });
            }
            values.insert(key.clone(), value.clone());
        }

        Ok(Self { values })
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn str(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| FlowError::MissingConfig {
                field: key.to_string(),
            })?
            .as_str()
            .ok_or_else(|| FlowError::InvalidConfigValue {
                field: key.to_string(),
                value: self.values[key].to_string(),
                reason: "expected a string".to_string(),
            })
    }

    /// Integer parameter; numeric strings such as `"3"` are accepted too.
    pub fn int(&self, key: &str) -> Result<i64> {
        let value = self.get(key).ok_or_else(|| FlowError::MissingConfig {
            field: key.to_string(),
        })?;

        value
            .as_i64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
            .ok_or_else(|| FlowError::InvalidConfigValue {
                field: key.to_string(),
                value: value.to_string(),
                reason: "expected an integer".to_string(),
            })
    }

    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.values
    }
}

/// A named, parameterised unit of work executed by the runner.
#[async_trait]
pub trait Flow: Send + Sync {
    fn name(&self) -> &str;

    fn parameters(&self) -> Vec<ParameterSpec> {
        Vec::new()
    }

    /// Runs the flow and returns the value persisted with the run record.
    async fn run(&self, params: &Parameters, ctx: &FlowContext) -> Result<Value>;
}

/// Per-run execution context handed to a flow.
///
/// Carries the injected notifier and the task policies; every task run is
/// recorded here so the runner can persist it.
#[derive(Clone)]
pub struct FlowContext {
    flow_name: Arc<str>,
    run_id: Arc<str>,
    notifier: Arc<dyn Notifier>,
    retry: RetryPolicy,
    concurrency: usize,
    task_runs: Arc<Mutex<Vec<TaskRun>>>,
}

impl FlowContext {
    pub fn new(flow_name: &str, run_id: &str, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            flow_name: Arc::from(flow_name),
            run_id: Arc::from(run_id),
            notifier,
            retry: RetryPolicy::default(),
            concurrency: 4,
            task_runs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// The policy configured for tasks that talk to the network.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn task_runs(&self) -> Vec<TaskRun> {
        self.task_runs
            .lock()
            .map(|runs| runs.clone())
            .unwrap_or_default()
    }

    fn record(&self, run: TaskRun) {
        if let Ok(mut runs) = self.task_runs.lock() {
            runs.push(run);
        }
    }

    /// Runs `f` as the task `name`, retrying retryable failures under `retry`.
    pub async fn task<T, F, Fut>(&self, name: &str, retry: RetryPolicy, f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let span = tracing::info_span!(
            "task",
            flow = %self.flow_name,
            run_id = %self.run_id,
            task = name
        );

        async {
            tracing::info!("Task '{}': Starting task run...", name);
            let started = Instant::now();
            let (result, attempts) = run_attempts(name, retry, f).await;

            self.record(TaskRun {
                name: name.to_string(),
                state: if result.is_ok() {
                    RunState::Success
                } else {
                    RunState::Failed
                },
                attempts,
                duration_ms: duration_ms(started.elapsed()),
                error: result.as_ref().err().map(|e| e.to_string()),
            });

            match &result {
                Ok(_) => tracing::info!(
                    "Task '{}': Finished task run with final state: 'Success'",
                    name
                ),
                Err(e) => tracing::error!(
                    "Task '{}': Finished task run with final state: 'Failed' after {} attempt(s): {}",
                    name,
                    attempts,
                    e
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Fans `f` out over `inputs` concurrently and returns the results in
    /// input order. Each item is its own task with the context retry policy.
    /// The first failure fails the whole map.
    pub async fn map<I, T, F, Fut>(&self, name: &str, inputs: Vec<I>, f: F) -> Result<Vec<T>>
    where
        I: Clone + Send + 'static,
        T: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let total = inputs.len();
        tracing::info!(
            "Task '{}': Mapping over {} input(s), at most {} at a time",
            name,
            total,
            self.concurrency
        );

        let f = Arc::new(f);
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut branches = JoinSet::new();

        for (index, input) in inputs.into_iter().enumerate() {
            let ctx = self.clone();
            let f = Arc::clone(&f);
            let permits = Arc::clone(&permits);
            let task_name = format!("{}[{}]", name, index);

            branches.spawn(async move {
                // The semaphore is never closed, so acquiring cannot fail.
                let _permit = permits.acquire_owned().await.ok();
                let retry = ctx.retry;
                let result = ctx
                    .task(&task_name, retry, move || (*f)(input.clone()))
                    .await;
                (index, result)
            });
        }

        let mut slots: Vec<Option<T>> = (0..total).map(|_| None).collect();
        while let Some(joined) = branches.join_next().await {
            let (index, result) = joined.map_err(|e| FlowError::Task {
                task: name.to_string(),
                message: e.to_string(),
            })?;
            // Returning drops `branches`, which aborts the branches still running.
            slots[index] = Some(result?);
        }

        Ok(slots.into_iter().flatten().collect())
    }

    pub async fn notify(&self, notification: Notification) -> Result<()> {
        self.task("send notification", RetryPolicy::none(), || {
            self.notifier.send(&notification)
        })
        .await
    }
}

async fn run_attempts<T, F, Fut>(name: &str, retry: RetryPolicy, mut f: F) -> (Result<T>, u32)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = retry.max_attempts();
    let mut attempts = 0;

    loop {
        attempts += 1;
        match f().await {
            Ok(value) => return (Ok(value), attempts),
            Err(e) if e.is_retryable() && attempts < max_attempts => {
                tracing::warn!(
                    "Task '{}': attempt {}/{} failed: {}. Retrying in {:?}",
                    name,
                    attempts,
                    max_attempts,
                    e,
                    retry.retry_delay
                );
                tokio::time::sleep(retry.retry_delay).await;
            }
            Err(e) => return (Err(e), attempts),
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
