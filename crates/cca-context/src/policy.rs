//! Per-tool size caps (spec §4.2). Defaults match the spec table; callers
//! load overrides from `cca-config`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizePolicy {
    pub file_read_chars: usize,
    pub file_glob_entries: usize,
    pub file_grep_matches: usize,
    pub shell_exec_chars: usize,
    pub other_chars: usize,
}

impl Default for SizePolicy {
    fn default() -> Self {
        Self {
            file_read_chars: 50_000,
            file_glob_entries: 100,
            file_grep_matches: 50,
            shell_exec_chars: 20_000,
            other_chars: 30_000,
        }
    }
}

impl SizePolicy {
    /// Cap applicable to a given tool name, in the unit that tool's
    /// truncation strategy operates on (chars or entries).
    pub fn cap_for(&self, tool_name: &str) -> usize {
        match tool_name {
            "file-read" => self.file_read_chars,
            "file-glob" => self.file_glob_entries,
            "file-grep" => self.file_grep_matches,
            "shell-exec" => self.shell_exec_chars,
            _ => self.other_chars,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let policy = SizePolicy::default();
        assert_eq!(policy.cap_for("file-read"), 50_000);
        assert_eq!(policy.cap_for("file-glob"), 100);
        assert_eq!(policy.cap_for("file-grep"), 50);
        assert_eq!(policy.cap_for("shell-exec"), 20_000);
        assert_eq!(policy.cap_for("get-stored-result"), 30_000);
    }
}
