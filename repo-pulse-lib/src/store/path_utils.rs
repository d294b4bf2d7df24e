//! File naming for store documents.

use crate::model::DailyKey;

/// Sanitize a string for use as a single path component.
///
/// Replaces `..` and characters that are separators or reserved on common
/// filesystems, so repository names and usernames can be used directly as file
/// names. `@` is replaced too; it separates the parts of composite file stems.
#[must_use]
pub fn sanitize_path_component(s: &str) -> String {
    let s = s.replace("..", "__");
    s.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|', '@'], "_")
}

/// File stem for a repository's snapshot log, `owner@name`.
#[must_use]
pub fn repo_file_stem(owner: &str, name: &str) -> String {
    format!("{}@{}", sanitize_path_component(owner), sanitize_path_component(name))
}

/// File stem for a daily aggregate, `project@owner@name@date`.
///
/// Every part of the key is sanitized on its own, so distinct keys never share a file.
#[must_use]
pub fn daily_file_stem(key: &DailyKey) -> String {
    let repo = key.repo_key.split('/').map(sanitize_path_component).collect::<Vec<_>>().join("@");
    format!("{}@{repo}@{}", sanitize_path_component(&key.project_id), key.date.format("%Y-%m-%d"))
}
