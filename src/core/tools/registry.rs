use std::collections::HashMap;
use std::sync::Arc;

use super::base::ToolHandler;
use super::builtin::{TakeInterviewNotes, get_school_info};
use crate::core::upstream::FunctionDeclaration;

/// Static name to handler table.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<&'static str, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the interviewer tools.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry
            .register(Arc::new(get_school_info()))
            .register(Arc::new(TakeInterviewNotes));
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn ToolHandler>) -> &mut Self {
        self.tools.insert(tool.name(), tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.tools.get(name).cloned()
    }

    /// Declarations sorted by name so the setup message is stable
    pub fn declarations(&self) -> Vec<FunctionDeclaration> {
        let mut declarations: Vec<_> = self.tools.values().map(|t| t.declaration()).collect();
        declarations.sort_by(|a, b| a.name.cmp(&b.name));
        declarations
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
