//! Typed, collision-resistant entity identifiers.
//!
//! Every durable entity is keyed by a ULID (Crockford base32, 26 chars,
//! lexicographically sortable by creation time). The spec only forbids
//! relying on that ordering for correctness, not generating it — no
//! module in this crate compares IDs for anything but equality.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declare a newtype wrapper around a ULID string for one entity family.
///
/// Each wrapper is distinct at the type level so a `ChangeId` can never be
/// passed where an `IterationId` is expected, even though both are plain
/// strings underneath.
macro_rules! id_type {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a new, unique identifier.
            pub fn new() -> Self {
                Self(format!("{}-{}", $prefix, ulid::Ulid::new()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Wrap an externally-supplied identifier (e.g. loaded from storage
            /// or received over RPC) without re-validating its shape.
            pub fn from_raw(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

id_type!(SessionId, "sess");
id_type!(IterationId, "iter");
id_type!(ChangeId, "chg");
id_type!(ReviewId, "rev");
id_type!(DecisionId, "dec");
id_type!(ToolCallId, "tc");
id_type!(ContextItemId, "ctxi");
id_type!(ExecutionId, "exec");
id_type!(NodeExecutionId, "node");
id_type!(CheckpointId, "ckpt");
id_type!(StoredResultId, "ctx");
id_type!(PermissionId, "perm");
id_type!(FeedEntryId, "feed");
id_type!(WorkflowId, "wf");
id_type!(AgentId, "agent");
id_type!(CriticId, "critic");
