use crate::domain::ports::PageFetcher;
use crate::utils::error::{FlowError, Result};
use scraper::Html;
use url::Url;

/// A parsed page together with the URL it was loaded from.
///
/// Lives only for one fetch-and-extract step; relative links found in the
/// page are resolved against `url`.
#[derive(Debug)]
pub struct Document {
    url: Url,
    html: Html,
}

impl Document {
    /// html5ever is a lenient parser, so malformed markup still yields a tree.
    pub fn parse(url: &str, body: &str) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| FlowError::validation(format!("invalid page URL '{}': {}", url, e)))?;
        Ok(Self {
            url,
            html: Html::parse_document(body),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn html(&self) -> &Html {
        &self.html
    }
}

/// GET `url` through `fetcher` and parse the body.
pub async fn fetch_document(fetcher: &dyn PageFetcher, url: &str) -> Result<Document> {
    let body = fetcher.fetch_html(url).await?;
    tracing::debug!("Fetched {} ({} bytes)", url, body.len());
    Document::parse(url, &body)
}
