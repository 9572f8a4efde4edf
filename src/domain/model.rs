use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Chart sort keys accepted by the search page, with their provider codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    Ranking,
    ImdbRating,
    ReleaseDate,
    NumberOfRatings,
}

impl SortBy {
    pub const ALL: [SortBy; 4] = [
        SortBy::Ranking,
        SortBy::ImdbRating,
        SortBy::ReleaseDate,
        SortBy::NumberOfRatings,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortBy::Ranking => "ranking",
            SortBy::ImdbRating => "imdb_rating",
            SortBy::ReleaseDate => "release_date",
            SortBy::NumberOfRatings => "number_of_ratings",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            SortBy::Ranking => "rk",
            SortBy::ImdbRating => "ir",
            SortBy::ReleaseDate => "us",
            SortBy::NumberOfRatings => "nv",
        }
    }
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortBy::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| format!("unsupported sort key '{}'", s))
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    #[serde(rename = "ASC")]
    Asc,
    #[serde(rename = "DESC")]
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

impl FromStr for SortDirection {
    type Err = String;

    // Case-sensitive: only the upper-case spellings are accepted
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ASC" => Ok(SortDirection::Asc),
            "DESC" => Ok(SortDirection::Desc),
            other => Err(format!("unsupported sort direction '{}'", other)),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw chart query parameters as received from the caller.
///
/// Nothing about the type guarantees validity; check with
/// [`SortSpec::is_valid`] before building a search URL from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub sort_by: String,
    pub sort_direction: String,
    pub limit: i64,
}

impl SortSpec {
    pub fn new(sort_by: impl Into<String>, sort_direction: impl Into<String>, limit: i64) -> Self {
        Self {
            sort_by: sort_by.into(),
            sort_direction: sort_direction.into(),
            limit,
        }
    }

    pub fn is_valid(&self) -> bool {
        crate::imdb::search::validate(&self.sort_by, &self.sort_direction, self.limit)
    }

    /// Number of chart rows to read. Non-positive limits read nothing.
    pub fn row_limit(&self) -> usize {
        usize::try_from(self.limit).unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilmDetails {
    pub name: String,
    pub poster_url: String,
    /// Comma-and-space separated director names.
    pub directors: String,
    pub rating: f64,
    pub synopsis: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Notification {
    Message(String),
    Films(Vec<FilmDetails>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRun {
    pub name: String,
    pub state: RunState,
    pub attempts: u32,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Persisted summary of a single flow execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowRunRecord {
    pub run_id: String,
    pub flow: String,
    pub parameters: BTreeMap<String, serde_json::Value>,
    pub state: RunState,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub tasks: Vec<TaskRun>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
