mod file_edit;
mod file_glob;
mod file_grep;
mod file_read;
mod file_write;
mod shell_exec;
mod stored_result;

pub use file_edit::FileEditHandler;
pub use file_glob::FileGlobHandler;
pub use file_grep::FileGrepHandler;
pub use file_read::FileReadHandler;
pub use file_write::FileWriteHandler;
pub use shell_exec::ShellExecHandler;
pub use stored_result::StoredResultHandler;
