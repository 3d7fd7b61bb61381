mod changes;
mod context_items;
mod decisions;
mod executions;
mod iterations;
mod permissions;
mod reviews;
mod sessions;
mod stored_results;
mod tool_calls;
