pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod imdb;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;

pub use crate::adapters::{HttpPageFetcher, LocalStorage, LogNotifier, NullStorage};
pub use crate::app::flows::{builtin_registry, ImdbTopMoviesFlow};
pub use crate::config::FlowsConfig;
pub use crate::core::{Flow, FlowContext, FlowRegistry, FlowRunner, RetryPolicy};
pub use crate::domain::model::{FilmDetails, Notification, SortSpec};
pub use crate::utils::error::{FlowError, Result};
