//! Tool Runtime (spec §4.4): a registry of dynamically dispatched tool
//! handlers, gated by the permission evaluator and audited through the
//! store layer.

mod confirmation;
mod glob;
mod handler;
mod handlers;
mod registry;
mod runtime;

pub use confirmation::{ConfirmationGate, ConfirmationResponse};
pub use handler::{ToolContext, ToolHandler};
pub use handlers::{
    FileEditHandler, FileGlobHandler, FileGrepHandler, FileReadHandler, FileWriteHandler,
    ShellExecHandler, StoredResultHandler,
};
pub use registry::ToolRegistry;
pub use runtime::{ToolRequest, ToolResponse, ToolRuntime};
