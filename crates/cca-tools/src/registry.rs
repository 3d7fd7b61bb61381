use crate::handler::ToolHandler;
use crate::handlers::{
    FileEditHandler, FileGlobHandler, FileGrepHandler, FileReadHandler, FileWriteHandler,
    ShellExecHandler, StoredResultHandler,
};
use cca_store::Store;
use std::collections::HashMap;

/// Dynamic dispatch over string tool names, not a closed enum: the spec
/// requires user-registerable tools, so new handlers can be added at
/// runtime rather than only at compile time.
#[derive(Default)]
pub struct ToolRegistry {
    handlers: HashMap<&'static str, Box<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins(store: Store) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(FileReadHandler));
        registry.register(Box::new(FileGlobHandler));
        registry.register(Box::new(FileGrepHandler));
        registry.register(Box::new(FileWriteHandler));
        registry.register(Box::new(FileEditHandler));
        registry.register(Box::new(ShellExecHandler));
        registry.register(Box::new(StoredResultHandler::new(store)));
        registry
    }

    pub fn register(&mut self, handler: Box<dyn ToolHandler>) {
        self.handlers.insert(handler.name(), handler);
    }

    pub fn get(&self, name: &str) -> Option<&dyn ToolHandler> {
        self.handlers.get(name).map(|h| h.as_ref())
    }
}
