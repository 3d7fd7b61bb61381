//! Truncation strategies (spec §4.2). Each strategy keeps the agent-facing
//! summary under a cap while preserving enough of the shape of the result
//! that the agent can tell what was cut.

use std::collections::BTreeMap;

const HEAD_FRACTION: f64 = 0.70;
const TAIL_FRACTION: f64 = 0.25;
const SHELL_STDOUT_SHARE: f64 = 0.80;
const SHELL_PREFIX_FRACTION: f64 = 0.30;
const SHELL_TAIL_FRACTION: f64 = 0.60;

/// file-read: head slice (~70% of cap) + tail slice (~25%), with a marker
/// naming the spill id and the number of omitted lines.
pub fn truncate_text(content: &str, cap: usize, store_id: &str) -> (String, bool) {
    let chars: Vec<char> = content.chars().collect();
    if chars.len() <= cap {
        return (content.to_string(), false);
    }
    let head_len = ((cap as f64) * HEAD_FRACTION) as usize;
    let tail_len = ((cap as f64) * TAIL_FRACTION) as usize;
    let head: String = chars[..head_len.min(chars.len())].iter().collect();
    let tail_start = chars.len().saturating_sub(tail_len);
    let tail: String = chars[tail_start.max(head_len)..].iter().collect();
    let omitted_lines = content
        .chars()
        .skip(head_len)
        .take(tail_start.saturating_sub(head_len))
        .collect::<String>()
        .lines()
        .count();
    let marker = format!(
        "\n...[truncated, {omitted_lines} lines omitted, full result at {store_id}]...\n"
    );
    (format!("{head}{marker}{tail}"), true)
}

/// shell-exec: independent prefix/tail split for stdout and stderr, stdout
/// given the larger share of the combined cap. "Most recent wins" means
/// each stream's tail slice is prioritized over its prefix when both must
/// shrink.
pub fn truncate_shell(stdout: &str, stderr: &str, cap: usize, store_id: &str) -> (String, bool) {
    let stdout_cap = ((cap as f64) * SHELL_STDOUT_SHARE) as usize;
    let stderr_cap = cap - stdout_cap;
    let (stdout_summary, stdout_truncated) = truncate_stream(stdout, stdout_cap);
    let (stderr_summary, stderr_truncated) = truncate_stream(stderr, stderr_cap);
    let truncated = stdout_truncated || stderr_truncated;
    let mut summary = format!("--- stdout ---\n{stdout_summary}");
    if !stderr.is_empty() {
        summary.push_str(&format!("\n--- stderr ---\n{stderr_summary}"));
    }
    if truncated {
        summary.push_str(&format!("\n...[truncated, full output at {store_id}]...\n"));
    }
    (summary, truncated)
}

fn truncate_stream(content: &str, cap: usize) -> (String, bool) {
    let chars: Vec<char> = content.chars().collect();
    if chars.len() <= cap {
        return (content.to_string(), false);
    }
    let prefix_len = ((cap as f64) * SHELL_PREFIX_FRACTION) as usize;
    let tail_len = ((cap as f64) * SHELL_TAIL_FRACTION) as usize;
    let prefix: String = chars[..prefix_len.min(chars.len())].iter().collect();
    let tail_start = chars.len().saturating_sub(tail_len);
    let tail: String = chars[tail_start.max(prefix_len)..].iter().collect();
    (format!("{prefix}\n...\n{tail}"), true)
}

/// List-shaped results (file-glob, file-grep): first N entries plus a
/// summary object with total/omitted counts and, for search results, an
/// omitted-by-file histogram.
pub fn truncate_list(
    entries: &[String],
    cap: usize,
    omitted_by_file: Option<&BTreeMap<String, usize>>,
) -> (serde_json::Value, bool) {
    if entries.len() <= cap {
        return (
            serde_json::json!({ "entries": entries, "total": entries.len(), "omitted": 0 }),
            false,
        );
    }
    let kept = &entries[..cap];
    let omitted = entries.len() - cap;
    let mut summary = serde_json::json!({
        "entries": kept,
        "total": entries.len(),
        "omitted": omitted,
    });
    if let Some(histogram) = omitted_by_file {
        summary["omitted_by_file"] = serde_json::to_value(histogram).unwrap_or_default();
    }
    (summary, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_under_cap_is_unchanged() {
        let (summary, truncated) = truncate_text("hello world", 100, "ctx-1");
        assert_eq!(summary, "hello world");
        assert!(!truncated);
    }

    #[test]
    fn text_over_cap_keeps_head_and_tail_with_marker() {
        let content = "a".repeat(50) + &"b".repeat(50) + &"c".repeat(50);
        let (summary, truncated) = truncate_text(&content, 60, "ctx-42");
        assert!(truncated);
        assert!(summary.starts_with("aaaa"));
        assert!(summary.ends_with("cccc"));
        assert!(summary.contains("ctx-42"));
    }

    #[test]
    fn shell_output_under_cap_is_unchanged() {
        let (summary, truncated) = truncate_shell("ok", "", 1000, "ctx-1");
        assert!(!truncated);
        assert!(summary.contains("ok"));
        assert!(!summary.contains("stderr"));
    }

    #[test]
    fn shell_output_over_cap_is_truncated_and_notes_spill_id() {
        let stdout = "x".repeat(1000);
        let (summary, truncated) = truncate_shell(&stdout, "", 100, "ctx-7");
        assert!(truncated);
        assert!(summary.contains("ctx-7"));
    }

    #[test]
    fn list_under_cap_reports_zero_omitted() {
        let entries = vec!["a.rs".to_string(), "b.rs".to_string()];
        let (summary, truncated) = truncate_list(&entries, 10, None);
        assert!(!truncated);
        assert_eq!(summary["omitted"], 0);
    }

    #[test]
    fn list_over_cap_reports_omitted_and_histogram() {
        let entries: Vec<String> = (0..10).map(|i| format!("entry-{i}")).collect();
        let mut histogram = BTreeMap::new();
        histogram.insert("src/lib.rs".to_string(), 5usize);
        let (summary, truncated) = truncate_list(&entries, 4, Some(&histogram));
        assert!(truncated);
        assert_eq!(summary["omitted"], 6);
        assert_eq!(summary["entries"].as_array().unwrap().len(), 4);
        assert_eq!(summary["omitted_by_file"]["src/lib.rs"], 5);
    }
}
