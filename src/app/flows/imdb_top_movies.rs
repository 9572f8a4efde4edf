use crate::core::{Flow, FlowContext, ParameterSpec, Parameters, RetryPolicy};
use crate::domain::model::{Notification, SortSpec};
use crate::domain::ports::PageFetcher;
use crate::imdb::{
    build_search_url_with_base, extract_film_details, extract_film_urls, fetch_document, BASE_URL,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub const VALIDATION_FAILED_MESSAGE: &str = "Parameter validation failed!";

/// Scrapes the top of the movie popularity chart and notifies the film list.
///
/// Invalid parameters take the failure branch: a fixed message is notified
/// and the run itself still succeeds.
pub struct ImdbTopMoviesFlow {
    fetcher: Arc<dyn PageFetcher>,
    base_url: String,
}

impl ImdbTopMoviesFlow {
    pub const NAME: &'static str = "imdb-top-movies";

    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            fetcher,
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

// Wrong parameter types are treated like out-of-range values.
fn sort_spec(params: &Parameters) -> Option<SortSpec> {
    Some(SortSpec::new(
        params.str("sort_by").ok()?,
        params.str("sort_direction").ok()?,
        params.int("limit").ok()?,
    ))
}

#[async_trait]
impl Flow for ImdbTopMoviesFlow {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::new("sort_by", "ranking"),
            ParameterSpec::new("sort_direction", "ASC"),
            ParameterSpec::new("limit", 3),
        ]
    }

    async fn run(&self, params: &Parameters, ctx: &FlowContext) -> Result<Value> {
        let spec = sort_spec(params);
        let check_name = match &spec {
            Some(spec) => format!(
                "check parameter validity for {}, {} & {}",
                spec.sort_by, spec.sort_direction, spec.limit
            ),
            None => "check parameter validity".to_string(),
        };

        let valid_spec = ctx
            .task(&check_name, RetryPolicy::none(), || async {
                Ok(spec.clone().filter(SortSpec::is_valid))
            })
            .await?;

        let Some(spec) = valid_spec else {
            let notification = Notification::Message(VALIDATION_FAILED_MESSAGE.to_string());
            ctx.notify(notification.clone()).await?;
            return Ok(serde_json::to_value(notification)?);
        };

        let search_url = ctx
            .task("get search url", RetryPolicy::none(), || async {
                build_search_url_with_base(&self.base_url, &spec.sort_by, &spec.sort_direction)
            })
            .await?;
        tracing::info!("Search URL: {}", search_url);

        let film_urls = ctx
            .task("extract film urls", ctx.retry_policy(), || async {
                let chart = fetch_document(self.fetcher.as_ref(), &search_url).await?;
                extract_film_urls(&chart, spec.row_limit())
            })
            .await?;

        let fetcher = Arc::clone(&self.fetcher);
        let films = ctx
            .map("extract film data", film_urls, move |url: String| {
                let fetcher = Arc::clone(&fetcher);
                async move {
                    let page = fetch_document(fetcher.as_ref(), &url).await?;
                    extract_film_details(&page)
                }
            })
            .await?;

        let notification = Notification::Films(films);
        ctx.notify(notification.clone()).await?;
        Ok(serde_json::to_value(notification)?)
    }
}
