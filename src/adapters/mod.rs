// Adapters layer: concrete implementations of the domain ports for external systems.

pub mod http;
pub mod notify;
pub mod storage;

pub use http::HttpPageFetcher;
pub use notify::LogNotifier;
pub use storage::{LocalStorage, NullStorage};
