//! Minimal glob matcher: translates a `**`/`*`/`?` pattern into a regex.
//! Not a full glob implementation (no character classes, no brace
//! expansion) — enough for the file-glob/file-grep built-ins.

use regex::Regex;

pub fn pattern_to_regex(pattern: &str) -> Regex {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    out.push_str(".*");
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            '.' | '+' | '(' | ')' | '|' | '^' | '$' | '[' | ']' | '{' | '}' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            other => out.push(other),
        }
    }
    out.push('$');
    Regex::new(&out).unwrap_or_else(|_| Regex::new("$^").expect("empty-match fallback is valid"))
}

pub fn walk_files(root: &std::path::Path) -> Vec<std::path::PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                out.push(path);
            }
        }
    }
    out.sort();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_star_matches_any_depth() {
        let re = pattern_to_regex("**/*.rs");
        assert!(re.is_match("src/main.rs"));
        assert!(re.is_match("src/nested/deep/lib.rs"));
        assert!(!re.is_match("src/main.py"));
    }

    #[test]
    fn single_star_does_not_cross_directory_boundaries() {
        let re = pattern_to_regex("src/*.rs");
        assert!(re.is_match("src/main.rs"));
        assert!(!re.is_match("src/nested/main.rs"));
    }
}
