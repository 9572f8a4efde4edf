use crate::core::flow::Flow;
use crate::utils::error::{FlowError, Result};
use std::sync::Arc;

/// Flows known to the binary, in registration order.
#[derive(Clone, Default)]
pub struct FlowRegistry {
    flows: Vec<Arc<dyn Flow>>,
}

impl FlowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `flow`; a flow with the same name is replaced.
    pub fn register(&mut self, flow: Arc<dyn Flow>) -> &mut Self {
        match self.flows.iter().position(|f| f.name() == flow.name()) {
            Some(index) => {
                tracing::warn!("Replacing already registered flow '{}'", flow.name());
                self.flows[index] = flow;
            }
            None => self.flows.push(flow),
        }
        self
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Flow>> {
        self.flows
            .iter()
            .find(|flow| flow.name() == name)
            .cloned()
            .ok_or_else(|| FlowError::UnknownFlow {
                name: name.to_string(),
            })
    }

    /// Looks up every name, or returns all flows when `names` is empty.
    pub fn select(&self, names: &[String]) -> Result<Vec<Arc<dyn Flow>>> {
        if names.is_empty() {
            return Ok(self.flows.clone());
        }
        names.iter().map(|name| self.get(name)).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.flows.iter().map(|flow| flow.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}
