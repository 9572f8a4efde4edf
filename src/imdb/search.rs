use crate::domain::model::{SortBy, SortDirection};
use crate::imdb::{BASE_URL, MAX_RESULT_LENGTH};
use crate::utils::error::{FlowError, Result};
use url::Url;

/// Parameter check for the chart query. Invalid input is an ordinary `false`,
/// never an error.
pub fn validate(sort_by: &str, sort_direction: &str, limit: i64) -> bool {
    sort_by.parse::<SortBy>().is_ok()
        && sort_direction.parse::<SortDirection>().is_ok()
        && limit <= MAX_RESULT_LENGTH
}

/// Builds the chart listing URL on the public site.
pub fn build_search_url(sort_by: &str, sort_direction: &str) -> Result<String> {
    build_search_url_with_base(BASE_URL, sort_by, sort_direction)
}

/// Same as [`build_search_url`] against another site root, e.g. a mirror or a
/// test server.
pub fn build_search_url_with_base(
    base_url: &str,
    sort_by: &str,
    sort_direction: &str,
) -> Result<String> {
    let sort_by = sort_by.parse::<SortBy>().map_err(FlowError::validation)?;
    let sort_direction = sort_direction
        .parse::<SortDirection>()
        .map_err(FlowError::validation)?;

    let mut url = Url::parse(base_url)
        .and_then(|base| base.join("/chart/moviemeter"))
        .map_err(|e| FlowError::InvalidConfigValue {
            field: "imdb.base_url".to_string(),
            value: base_url.to_string(),
            reason: e.to_string(),
        })?;

    url.query_pairs_mut()
        .append_pair("mode", "simpl")
        .append_pair("page", "1")
        .append_pair(
            "sort",
            &format!("{},{}", sort_by.code(), sort_direction.code()),
        );

    Ok(url.into())
}
