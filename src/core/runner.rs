use crate::core::flow::{Flow, FlowContext, Parameters};
use crate::core::retry::RetryPolicy;
use crate::domain::model::{FlowRunRecord, Notification, RunState};
use crate::domain::ports::{Notifier, Storage};
use crate::utils::error::{FlowError, Result};
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::Instrument;

/// Process-wide run counter; keeps run ids unique within one timestamp.
static RUN_SEQUENCE: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultFormat {
    Json,
    Csv,
}

impl ResultFormat {
    pub const NAMES: [&'static str; 2] = ["json", "csv"];
}

impl FromStr for ResultFormat {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(FlowError::InvalidConfigValue {
                field: "results.formats".to_string(),
                value: other.to_string(),
                reason: format!("Allowed values: {}", Self::NAMES.join(", ")),
            }),
        }
    }
}

/// Executes flows one run at a time and persists a record of each run.
pub struct FlowRunner<S: Storage> {
    storage: S,
    notifier: Arc<dyn Notifier>,
    retry: RetryPolicy,
    concurrency: usize,
    formats: Vec<ResultFormat>,
}

impl<S: Storage> FlowRunner<S> {
    pub fn new(storage: S, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            storage,
            notifier,
            retry: RetryPolicy::default(),
            concurrency: 4,
            formats: vec![ResultFormat::Json],
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_formats(mut self, formats: Vec<ResultFormat>) -> Self {
        self.formats = formats;
        self
    }

    /// Runs `flow` with its defaults overlaid by `overrides`.
    ///
    /// The run record is persisted whether or not the flow succeeds; a failed
    /// flow is reported as the flow's own error.
    pub async fn run(
        &self,
        flow: &dyn Flow,
        overrides: &BTreeMap<String, Value>,
    ) -> Result<FlowRunRecord> {
        let params = Parameters::resolve(&flow.parameters(), overrides)?;
        let started_at = Utc::now();
        let run_id = format!(
            "{}-{:04}-{}",
            started_at.format("%Y%m%dT%H%M%S%.3f"),
            RUN_SEQUENCE.fetch_add(1, Ordering::Relaxed),
            flow.name()
        );

        let ctx = FlowContext::new(flow.name(), &run_id, Arc::clone(&self.notifier))
            .with_retry(self.retry)
            .with_concurrency(self.concurrency);

        let span = tracing::info_span!("flow", flow = flow.name(), run_id = %run_id);
        let outcome = async {
            tracing::info!(
                "Beginning flow run for '{}' with parameters {:?}",
                flow.name(),
                params.as_map()
            );
            flow.run(&params, &ctx).await
        }
        .instrument(span)
        .await;

        let mut record = FlowRunRecord {
            run_id: run_id.clone(),
            flow: flow.name().to_string(),
            parameters: params.as_map().clone(),
            state: RunState::Success,
            result: None,
            error: None,
            tasks: ctx.task_runs(),
            started_at,
            finished_at: Utc::now(),
        };

        match outcome {
            Ok(result) => {
                tracing::info!(
                    "Flow run SUCCESS: '{}' finished {} task(s)",
                    flow.name(),
                    record.tasks.len()
                );
                record.result = Some(result);
                self.persist(&record).await?;
                Ok(record)
            }
            Err(e) => {
                tracing::error!("Flow run FAILED: '{}': {}", flow.name(), e);
                record.state = RunState::Failed;
                record.error = Some(e.to_string());
                if let Err(store_err) = self.persist(&record).await {
                    tracing::error!("Could not persist failed run {}: {}", run_id, store_err);
                }
                Err(e)
            }
        }
    }

    async fn persist(&self, record: &FlowRunRecord) -> Result<()> {
        let stem = format!("{}/{}", record.flow, record.run_id);

        if self.formats.contains(&ResultFormat::Json) {
            let path = format!("{}.json", stem);
            let data = serde_json::to_vec_pretty(record)?;
            self.storage.write_file(&path, &data).await?;
            tracing::info!("Run record saved to: {}", self.storage.describe(&path));
        }

        if self.formats.contains(&ResultFormat::Csv) {
            if let Some(data) = films_csv(record)? {
                let path = format!("{}.csv", stem);
                self.storage.write_file(&path, &data).await?;
                tracing::info!("Film list saved to: {}", self.storage.describe(&path));
            }
        }

        Ok(())
    }
}

/// CSV rendering of a run whose result is a film list; `None` for any other
/// result.
fn films_csv(record: &FlowRunRecord) -> Result<Option<Vec<u8>>> {
    let films = match record
        .result
        .clone()
        .and_then(|value| serde_json::from_value::<Notification>(value).ok())
    {
        Some(Notification::Films(films)) => films,
        _ => return Ok(None),
    };

    let mut writer = csv::Writer::from_writer(Vec::new());
    for film in &films {
        writer.serialize(film)?;
    }
    let data = writer
        .into_inner()
        .map_err(|e| FlowError::Io(e.into_error()))?;
    Ok(Some(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::flow::ParameterSpec;
    use crate::domain::model::FilmDetails;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            self.files.lock().await.get(path).cloned()
        }

        async fn paths(&self) -> Vec<String> {
            let mut paths: Vec<String> = self.files.lock().await.keys().cloned().collect();
            paths.sort();
            paths
        }
    }

    impl Storage for MockStorage {
        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            self.files
                .lock()
                .await
                .insert(path.to_string(), data.to_vec());
            Ok(())
        }

        fn describe(&self, path: &str) -> String {
            format!("memory://{}", path)
        }
    }

    struct QuietNotifier;

    #[async_trait]
    impl Notifier for QuietNotifier {
        async fn send(&self, _notification: &Notification) -> Result<()> {
            Ok(())
        }
    }

    struct EchoFlow;

    #[async_trait]
    impl Flow for EchoFlow {
        fn name(&self) -> &str {
            "echo"
        }

        fn parameters(&self) -> Vec<ParameterSpec> {
            vec![ParameterSpec::new("word", "hello")]
        }

        async fn run(&self, params: &Parameters, ctx: &FlowContext) -> Result<Value> {
            let word = params.str("word")?.to_string();
            ctx.task("echo", RetryPolicy::none(), || {
                let word = word.clone();
                async move { Ok(Value::from(word)) }
            })
            .await
        }
    }

    struct FilmsFlow;

    #[async_trait]
    impl Flow for FilmsFlow {
        fn name(&self) -> &str {
            "films"
        }

        async fn run(&self, _params: &Parameters, _ctx: &FlowContext) -> Result<Value> {
            let films = vec![FilmDetails {
                name: "Northbound".to_string(),
                poster_url: "https://example.com/n.jpg".to_string(),
                directors: "Idris Vale".to_string(),
                rating: 8.1,
                synopsis: "A train, the tundra, one last ride.".to_string(),
            }];
            Ok(serde_json::to_value(Notification::Films(films))?)
        }
    }

    struct BrokenFlow;

    #[async_trait]
    impl Flow for BrokenFlow {
        fn name(&self) -> &str {
            "broken"
        }

        async fn run(&self, _params: &Parameters, _ctx: &FlowContext) -> Result<Value> {
            Err(FlowError::extraction("http://localhost/", "name", "missing"))
        }
    }

    fn runner(storage: MockStorage) -> FlowRunner<MockStorage> {
        FlowRunner::new(storage, Arc::new(QuietNotifier))
    }

    #[tokio::test]
    async fn test_run_persists_success_record() {
        let storage = MockStorage::default();
        let mut overrides = BTreeMap::new();
        overrides.insert("word".to_string(), Value::from("bonjour"));

        let record = runner(storage.clone())
            .run(&EchoFlow, &overrides)
            .await
            .unwrap();

        assert_eq!(record.state, RunState::Success);
        assert_eq!(record.result, Some(Value::from("bonjour")));
        assert_eq!(record.tasks.len(), 1);
        assert!(record.run_id.ends_with("-echo"));

        let saved = storage
            .get_file(&format!("echo/{}.json", record.run_id))
            .await
            .unwrap();
        let saved: FlowRunRecord = serde_json::from_slice(&saved).unwrap();
        assert_eq!(saved.parameters["word"], "bonjour");
    }

    #[tokio::test]
    async fn test_back_to_back_runs_keep_separate_records() {
        let storage = MockStorage::default();
        let runner = runner(storage.clone());

        let first = runner.run(&EchoFlow, &BTreeMap::new()).await.unwrap();
        let second = runner.run(&EchoFlow, &BTreeMap::new()).await.unwrap();

        assert_ne!(first.run_id, second.run_id);
        let mut expected = vec![
            format!("echo/{}.json", first.run_id),
            format!("echo/{}.json", second.run_id),
        ];
        expected.sort();
        assert_eq!(storage.paths().await, expected);
    }

    #[tokio::test]
    async fn test_run_rejects_unknown_parameters() {
        let storage = MockStorage::default();
        let mut overrides = BTreeMap::new();
        overrides.insert("volume".to_string(), Value::from(11));

        let result = runner(storage.clone()).run(&EchoFlow, &overrides).await;
        assert!(result.is_err());
        assert!(storage.paths().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_run_is_persisted_and_returned() {
        let storage = MockStorage::default();

        let err = runner(storage.clone())
            .run(&BrokenFlow, &BTreeMap::new())
            .await
            .unwrap_err();

        assert!(matches!(err, FlowError::Extraction { .. }));
        let paths = storage.paths().await;
        assert_eq!(paths.len(), 1);

        let saved = storage.get_file(&paths[0]).await.unwrap();
        let saved: FlowRunRecord = serde_json::from_slice(&saved).unwrap();
        assert_eq!(saved.state, RunState::Failed);
        assert!(saved.error.unwrap().contains("name"));
    }

    #[tokio::test]
    async fn test_csv_written_for_film_results() {
        let storage = MockStorage::default();

        let record = runner(storage.clone())
            .with_formats(vec![ResultFormat::Json, ResultFormat::Csv])
            .run(&FilmsFlow, &BTreeMap::new())
            .await
            .unwrap();

        let csv_data = storage
            .get_file(&format!("films/{}.csv", record.run_id))
            .await
            .unwrap();
        let csv_text = String::from_utf8(csv_data).unwrap();
        let lines: Vec<&str> = csv_text.lines().collect();
        assert_eq!(lines[0], "name,poster_url,directors,rating,synopsis");
        assert!(lines[1].starts_with("Northbound,"));
    }

    #[tokio::test]
    async fn test_csv_skipped_for_other_results() {
        let storage = MockStorage::default();

        runner(storage.clone())
            .with_formats(vec![ResultFormat::Csv])
            .run(&EchoFlow, &BTreeMap::new())
            .await
            .unwrap();

        assert!(storage.paths().await.is_empty());
    }

    #[test]
    fn test_parse_result_format() {
        assert_eq!("csv".parse::<ResultFormat>().unwrap(), ResultFormat::Csv);
        assert!("zip".parse::<ResultFormat>().is_err());
    }
}
