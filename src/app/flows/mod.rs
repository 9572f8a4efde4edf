pub mod hello;
pub mod imdb_top_movies;

pub use hello::{HelloFlow, HelloNameFlow};
pub use imdb_top_movies::{ImdbTopMoviesFlow, VALIDATION_FAILED_MESSAGE};

use crate::core::FlowRegistry;
use crate::domain::ports::PageFetcher;
use std::sync::Arc;

/// Registry with every flow shipped in this crate.
pub fn builtin_registry(fetcher: Arc<dyn PageFetcher>, base_url: &str) -> FlowRegistry {
    let mut registry = FlowRegistry::new();
    registry
        .register(Arc::new(HelloFlow))
        .register(Arc::new(HelloNameFlow))
        .register(Arc::new(
            ImdbTopMoviesFlow::new(fetcher).with_base_url(base_url),
        ));
    registry
}
