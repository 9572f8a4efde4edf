//! DOM extraction for the chart listing and film detail pages.
//!
//! Every lookup is an explicit step returning `Result`; the first node that
//! is missing fails the whole extraction with [`FlowError::Extraction`].
//! There is no partial-result mode.

use crate::domain::model::FilmDetails;
use crate::imdb::document::Document;
use crate::utils::error::{FlowError, Result};
use scraper::{ElementRef, Selector};
use tracing::{debug, info};

const CHART_TABLE: &str = "table.chart.full-width";
const CHART_BODY: &str = "tbody";
const CHART_ROW: &str = "tr";
const TITLE_CELL: &str = "td.titleColumn";
const LINK: &str = "a";

const TITLE: &str = r#"h1[data-testid="hero-title-block__title"]"#;
const POSTER: &str = r#"div.ipc-poster[data-testid="hero-media__poster"]"#;
const POSTER_IMAGE: &str = "img.ipc-image";
const CREDITS: &str = r#"div[data-testid="title-pc-wide-screen"]"#;
const PRINCIPAL_CREDIT: &str = r#"li[data-testid="title-pc-principal-credit"]"#;
const CREDIT_CONTENT: &str = "div.ipc-metadata-list-item__content-container";
const CREDIT_ENTRY: &str = "li";
const PLOT: &str = r#"p[data-testid="plot"]"#;
const PLOT_TEXT: &str = r#"span[data-testid="plot-xl"]"#;
const RATING: &str = r#"div[data-testid="hero-rating-bar__aggregate-rating__score"]"#;
const RATING_VALUE: &str = "span";

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| FlowError::config(format!("invalid selector `{}`: {:?}", css, e)))
}

fn find<'a>(
    scope: ElementRef<'a>,
    css: &str,
    document: &Document,
    field: &str,
) -> Result<ElementRef<'a>> {
    let sel = selector(css)?;
    scope.select(&sel).next().ok_or_else(|| {
        FlowError::extraction(
            document.url().as_str(),
            field,
            format!("no element matches `{}`", css),
        )
    })
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Absolute, query-free detail page URL for a chart row link.
fn film_url(document: &Document, href: &str) -> Result<String> {
    let path = href.split_once('?').map_or(href, |(path, _)| path);
    let mut url = document.url().join(path).map_err(|e| {
        FlowError::extraction(
            document.url().as_str(),
            "film link",
            format!("cannot resolve '{}': {}", href, e),
        )
    })?;
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.into())
}

/// Detail page URLs of the first `limit` chart rows, in chart order.
///
/// A chart with fewer rows than `limit` yields all of them.
pub fn extract_film_urls(document: &Document, limit: usize) -> Result<Vec<String>> {
    let root = document.html().root_element();
    let table = find(root, CHART_TABLE, document, "chart table")?;
    let body = find(table, CHART_BODY, document, "chart body")?;
    let row_selector = selector(CHART_ROW)?;

    let mut urls = Vec::with_capacity(limit);
    for (index, row) in body.select(&row_selector).take(limit).enumerate() {
        let field = format!("chart row {}", index + 1);
        let cell = find(row, TITLE_CELL, document, &field)?;
        let link = find(cell, LINK, document, &field)?;
        let href = link.value().attr("href").ok_or_else(|| {
            FlowError::extraction(document.url().as_str(), &field, "title link has no href")
        })?;
        urls.push(film_url(document, href)?);
    }

    info!("URLs: {:?}", urls);
    Ok(urls)
}

pub fn extract_film_details(document: &Document) -> Result<FilmDetails> {
    let root = document.html().root_element();

    let name = text_of(find(root, TITLE, document, "name")?);
    info!("Name: {}", name);

    let poster = find(root, POSTER, document, "poster_url")?;
    let poster_url = find(poster, POSTER_IMAGE, document, "poster_url")?
        .value()
        .attr("src")
        .map(str::to_string)
        .ok_or_else(|| {
            FlowError::extraction(document.url().as_str(), "poster_url", "poster image has no src")
        })?;
    info!("Poster URL: {}", poster_url);

    let directors = extract_directors(root, document)?;
    info!("Directors: {}", directors);

    let plot = find(root, PLOT, document, "synopsis")?;
    let synopsis = text_of(find(plot, PLOT_TEXT, document, "synopsis")?);
    info!("Synopsis: {}", synopsis);

    let score = find(root, RATING, document, "rating")?;
    let rating_text = text_of(find(score, RATING_VALUE, document, "rating")?);
    let rating = rating_text.parse::<f64>().map_err(|e| {
        FlowError::extraction(
            document.url().as_str(),
            "rating",
            format!("'{}' is not a number: {}", rating_text, e),
        )
    })?;
    info!("Rating: {}", rating);

    Ok(FilmDetails {
        name,
        poster_url,
        directors,
        rating,
        synopsis,
    })
}

// Reads the first principal credit group only; on film pages that group is
// the director list.
fn extract_directors(root: ElementRef<'_>, document: &Document) -> Result<String> {
    let credits = find(root, CREDITS, document, "directors")?;
    let principal = find(credits, PRINCIPAL_CREDIT, document, "directors")?;
    let content = find(principal, CREDIT_CONTENT, document, "directors")?;

    let entry = selector(CREDIT_ENTRY)?;
    // Blank entries are kept; the joined string mirrors the credit list.
    let names: Vec<String> = content.select(&entry).map(text_of).collect();
    debug!("Principal credit entries: {}", names.len());

    if names.is_empty() {
        return Err(FlowError::extraction(
            document.url().as_str(),
            "directors",
            "principal credit list is empty",
        ));
    }

    Ok(names.join(", "))
}
