use crate::core::{Flow, FlowContext, ParameterSpec, Parameters, RetryPolicy};
use crate::utils::error::Result;
use crate::utils::text::capitalize;
use async_trait::async_trait;
use serde_json::Value;

/// Smoke-test flow with a single greeting task.
#[derive(Debug, Clone, Copy, Default)]
pub struct HelloFlow;

impl HelloFlow {
    pub const NAME: &'static str = "simple-flow";
}

#[async_trait]
impl Flow for HelloFlow {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(&self, _params: &Parameters, ctx: &FlowContext) -> Result<Value> {
        let greeting = ctx
            .task("hello task", RetryPolicy::none(), || async {
                let greeting = "Hello world!".to_string();
                tracing::info!("{}", greeting);
                Ok(greeting)
            })
            .await?;
        Ok(Value::from(greeting))
    }
}

/// Greets the `name` parameter.
#[derive(Debug, Clone, Copy, Default)]
pub struct HelloNameFlow;

impl HelloNameFlow {
    pub const NAME: &'static str = "flow-with-parameter";
}

#[async_trait]
impl Flow for HelloNameFlow {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![ParameterSpec::new("name", "world")]
    }

    async fn run(&self, params: &Parameters, ctx: &FlowContext) -> Result<Value> {
        let name = params.str("name")?;
        let greeting = ctx
            .task("hello name task", RetryPolicy::none(), || async {
                let greeting = format!("Hello {}!", capitalize(name));
                tracing::info!("{}", greeting);
                Ok(greeting)
            })
            .await?;
        Ok(Value::from(greeting))
    }
}
