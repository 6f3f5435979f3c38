//! Tool registry: name -> handler lookup, consulted by the kernel's
//! `unknownToolCritic` and by the runtime's dispatch path.

use std::sync::Arc;

use dashmap::DashMap;

use crate::handler::ToolHandler;
use crate::types::ToolSchema;

#[derive(Default)]
pub struct ToolRegistry {
    handlers: DashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handler: Arc<dyn ToolHandler>) {
        let name = handler.schema().name.clone();
        self.handlers.insert(name, handler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(name).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.handlers.iter().map(|entry| entry.value().schema()).collect()
    }
}
