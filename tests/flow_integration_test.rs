use async_trait::async_trait;
use httpmock::prelude::*;
use imdb_flows::app::flows::VALIDATION_FAILED_MESSAGE;
use imdb_flows::core::{Notifier, ResultFormat, RunState};
use imdb_flows::domain::model::FlowRunRecord;
use imdb_flows::{
    builtin_registry, FilmDetails, FlowError, FlowRunner, HttpPageFetcher, LocalStorage,
    Notification, RetryPolicy,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const CHART: &str = include_str!("fixtures/chart.html");
const FILM_1: &str = include_str!("fixtures/film_tt0000001.html");
const FILM_2: &str = include_str!("fixtures/film_tt0000002.html");
const FILM_3: &str = include_str!("fixtures/film_tt0000003.html");

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> imdb_flows::Result<()> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

fn fetcher() -> Arc<HttpPageFetcher> {
    Arc::new(HttpPageFetcher::new("imdb-flows-tests", Some(Duration::from_secs(5))).unwrap())
}

fn mock_chart<'a>(server: &'a MockServer, sort: &str) -> httpmock::Mock<'a> {
    server.mock(|when, then| {
        when.method(GET)
            .path("/chart/moviemeter")
            .query_param("mode", "simpl")
            .query_param("page", "1")
            .query_param("sort", sort);
        then.status(200)
            .header("Content-Type", "text/html; charset=utf-8")
            .body(CHART);
    })
}

fn mock_film<'a>(server: &'a MockServer, id: &str, page: &str) -> httpmock::Mock<'a> {
    server.mock(|when, then| {
        when.method(GET).path(format!("/title/{}/", id));
        then.status(200)
            .header("Content-Type", "text/html; charset=utf-8")
            .body(page);
    })
}

fn overrides(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

fn expected_films() -> Vec<FilmDetails> {
    vec![
        FilmDetails {
            name: "The Quiet Harbor".to_string(),
            poster_url: "https://m.media-amazon.com/images/M/quiet-harbor.jpg".to_string(),
            directors: "Ada Lind".to_string(),
            rating: 7.8,
            synopsis: "A lighthouse keeper finds a stranger washed ashore during a winter storm."
                .to_string(),
        },
        FilmDetails {
            name: "Glass Orchard".to_string(),
            poster_url: "https://m.media-amazon.com/images/M/glass-orchard.jpg".to_string(),
            directors: "Marta Kowal, Ben Ostrowski".to_string(),
            rating: 6.4,
            synopsis: "Two sisters inherit a failing orchard and the secrets buried beneath it."
                .to_string(),
        },
        FilmDetails {
            name: "Northbound".to_string(),
            poster_url: "https://m.media-amazon.com/images/M/northbound.jpg".to_string(),
            directors: "Idris Vale".to_string(),
            rating: 8.1,
            synopsis: "A retired conductor takes one last overnight train across the tundra."
                .to_string(),
        },
    ]
}

#[tokio::test]
async fn test_top_movies_end_to_end_with_real_http() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start();

    let chart_mock = mock_chart(&server, "rk,asc");
    let film_mocks = vec![
        mock_film(&server, "tt0000001", FILM_1),
        mock_film(&server, "tt0000002", FILM_2),
        mock_film(&server, "tt0000003", FILM_3),
    ];

    let notifier = Arc::new(RecordingNotifier::default());
    let registry = builtin_registry(fetcher(), &server.base_url());
    let flow = registry.get("imdb-top-movies").unwrap();

    let runner = FlowRunner::new(LocalStorage::new(temp_dir.path()), notifier.clone())
        .with_retry(RetryPolicy::new(1, Duration::ZERO))
        .with_concurrency(2)
        .with_formats(vec![ResultFormat::Json, ResultFormat::Csv]);

    let record = runner.run(flow.as_ref(), &BTreeMap::new()).await.unwrap();

    chart_mock.assert();
    for film_mock in &film_mocks {
        film_mock.assert();
    }

    assert_eq!(notifier.sent(), vec![Notification::Films(expected_films())]);
    assert_eq!(record.state, RunState::Success);
    assert_eq!(record.parameters["limit"], 3);

    let task_names: Vec<&str> = record.tasks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(
        task_names[..3],
        [
            "check parameter validity for ranking, ASC & 3",
            "get search url",
            "extract film urls",
        ]
    );
    assert_eq!(task_names.last(), Some(&"send notification"));

    let run_dir = temp_dir.path().join("imdb-top-movies");
    let json = std::fs::read(run_dir.join(format!("{}.json", record.run_id))).unwrap();
    let saved: FlowRunRecord = serde_json::from_slice(&json).unwrap();
    assert_eq!(saved.run_id, record.run_id);
    assert_eq!(
        saved.result,
        Some(serde_json::to_value(Notification::Films(expected_films())).unwrap())
    );

    let csv_text =
        std::fs::read_to_string(run_dir.join(format!("{}.csv", record.run_id))).unwrap();
    assert!(csv_text.starts_with("name,poster_url,directors,rating,synopsis"));
    assert!(csv_text.contains("Glass Orchard"));
    assert_eq!(csv_text.lines().count(), 4);
}

#[tokio::test]
async fn test_sort_options_reach_the_chart_query() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start();

    let chart_mock = mock_chart(&server, "ir,desc");
    let film_mock = mock_film(&server, "tt0000001", FILM_1);

    let notifier = Arc::new(RecordingNotifier::default());
    let registry = builtin_registry(fetcher(), &server.base_url());
    let flow = registry.get("imdb-top-movies").unwrap();
    let runner = FlowRunner::new(LocalStorage::new(temp_dir.path()), notifier.clone());

    runner
        .run(
            flow.as_ref(),
            &overrides(&[
                ("sort_by", Value::from("imdb_rating")),
                ("sort_direction", Value::from("DESC")),
                ("limit", Value::from(1)),
            ]),
        )
        .await
        .unwrap();

    chart_mock.assert();
    film_mock.assert();
    assert_eq!(
        notifier.sent(),
        vec![Notification::Films(expected_films()[..1].to_vec())]
    );
}

#[tokio::test]
async fn test_invalid_parameters_notify_failure_without_requests() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start();
    let chart_mock = mock_chart(&server, "rk,asc");

    let notifier = Arc::new(RecordingNotifier::default());
    let registry = builtin_registry(fetcher(), &server.base_url());
    let flow = registry.get("imdb-top-movies").unwrap();
    let runner = FlowRunner::new(LocalStorage::new(temp_dir.path()), notifier.clone());

    for bad in [
        overrides(&[("sort_by", Value::from("popularity"))]),
        overrides(&[("sort_direction", Value::from("asc"))]),
        overrides(&[("limit", Value::from(6))]),
    ] {
        let record = runner.run(flow.as_ref(), &bad).await.unwrap();
        assert_eq!(record.state, RunState::Success);
    }

    chart_mock.assert_hits(0);
    let message = Notification::Message(VALIDATION_FAILED_MESSAGE.to_string());
    assert_eq!(notifier.sent(), vec![message.clone(), message.clone(), message]);
}

#[tokio::test]
async fn test_server_error_on_detail_page_is_retried_then_fails() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start();

    mock_chart(&server, "rk,asc");
    mock_film(&server, "tt0000001", FILM_1);
    let broken_mock = server.mock(|when, then| {
        when.method(GET).path("/title/tt0000002/");
        then.status(503);
    });

    let notifier = Arc::new(RecordingNotifier::default());
    let registry = builtin_registry(fetcher(), &server.base_url());
    let flow = registry.get("imdb-top-movies").unwrap();
    let runner = FlowRunner::new(LocalStorage::new(temp_dir.path()), notifier.clone())
        .with_retry(RetryPolicy::new(2, Duration::ZERO));

    let err = runner
        .run(flow.as_ref(), &overrides(&[("limit", Value::from(2))]))
        .await
        .unwrap_err();

    assert!(matches!(err, FlowError::Fetch { status: 503, .. }));
    broken_mock.assert_hits(3);
    assert!(notifier.sent().is_empty());

    let run_dir = temp_dir.path().join("imdb-top-movies");
    let saved_runs: Vec<_> = std::fs::read_dir(run_dir).unwrap().collect();
    assert_eq!(saved_runs.len(), 1);
}

#[tokio::test]
async fn test_extraction_error_is_not_retried() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start();

    mock_chart(&server, "rk,asc");
    let film_mock = mock_film(
        &server,
        "tt0000001",
        "<html><body><h1>No hero block here</h1></body></html>",
    );

    let notifier = Arc::new(RecordingNotifier::default());
    let registry = builtin_registry(fetcher(), &server.base_url());
    let flow = registry.get("imdb-top-movies").unwrap();
    let runner = FlowRunner::new(LocalStorage::new(temp_dir.path()), notifier)
        .with_retry(RetryPolicy::new(3, Duration::ZERO));

    let err = runner
        .run(flow.as_ref(), &overrides(&[("limit", Value::from(1))]))
        .await
        .unwrap_err();

    assert!(matches!(err, FlowError::Extraction { ref field, .. } if field == "name"));
    film_mock.assert_hits(1);
}

#[tokio::test]
async fn test_hello_flows_through_the_runner() {
    let temp_dir = TempDir::new().unwrap();
    let notifier = Arc::new(RecordingNotifier::default());
    let registry = builtin_registry(fetcher(), "http://127.0.0.1:1");
    let runner = FlowRunner::new(LocalStorage::new(temp_dir.path()), notifier);

    let simple = registry.get("simple-flow").unwrap();
    let record = runner.run(simple.as_ref(), &BTreeMap::new()).await.unwrap();
    assert_eq!(record.result, Some(Value::from("Hello world!")));

    let named = registry.get("flow-with-parameter").unwrap();
    let record = runner
        .run(named.as_ref(), &overrides(&[("name", Value::from("marvin"))]))
        .await
        .unwrap();
    assert_eq!(record.result, Some(Value::from("Hello Marvin!")));
    assert_eq!(record.tasks[0].name, "hello name task");
}

#[tokio::test]
async fn test_repeated_runs_each_leave_a_record_on_disk() {
    let temp_dir = TempDir::new().unwrap();
    let notifier = Arc::new(RecordingNotifier::default());
    let registry = builtin_registry(fetcher(), "http://127.0.0.1:1");
    let runner = FlowRunner::new(LocalStorage::new(temp_dir.path()), notifier);

    let flows = registry
        .select(&["simple-flow".to_string(), "simple-flow".to_string()])
        .unwrap();
    let mut run_ids = Vec::new();
    for _ in 0..10 {
        for flow in &flows {
            let record = runner.run(flow.as_ref(), &BTreeMap::new()).await.unwrap();
            run_ids.push(record.run_id);
        }
    }

    let mut distinct = run_ids.clone();
    distinct.sort();
    distinct.dedup();
    assert_eq!(distinct.len(), 20);

    let saved = std::fs::read_dir(temp_dir.path().join("simple-flow"))
        .unwrap()
        .count();
    assert_eq!(saved, 20);
}

#[test]
fn test_unknown_flow_is_reported() {
    let registry = builtin_registry(fetcher(), "http://127.0.0.1:1");
    let err = registry.select(&["imdb-bottom-movies".to_string()]).err().expect("expected select to fail");
    assert!(matches!(err, FlowError::UnknownFlow { .. }));
    assert_eq!(registry.len(), 3);
}
