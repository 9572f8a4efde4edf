//! Chart search, page fetching and DOM extraction for the IMDb movie charts.

pub mod document;
pub mod extract;
pub mod search;

pub use document::{fetch_document, Document};
pub use extract::{extract_film_details, extract_film_urls};
pub use search::{build_search_url, build_search_url_with_base, validate};

pub const BASE_URL: &str = "https://www.imdb.com";

/// Largest number of films a chart query may ask for.
pub const MAX_RESULT_LENGTH: i64 = 5;
