pub mod flow;
pub mod registry;
pub mod retry;
pub mod runner;

pub use crate::domain::model::{FlowRunRecord, Notification, RunState, TaskRun};
pub use crate::domain::ports::{Notifier, PageFetcher, Storage};
pub use crate::utils::error::Result;
pub use flow::{Flow, FlowContext, ParameterSpec, Parameters};
pub use registry::FlowRegistry;
pub use retry::RetryPolicy;
pub use runner::{FlowRunner, ResultFormat};
