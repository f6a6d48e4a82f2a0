use dirs::data_dir;
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const DESCRIPTION_LIMIT: usize = 2000;
const ELLIPSIS: &str = "...";

pub fn data_root() -> PathBuf {
    let base = data_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    base.join("local-events-sync")
}

pub fn database_path() -> PathBuf {
    data_root().join("events.sqlite")
}

pub fn config_path() -> PathBuf {
    data_root().join("config.json")
}

pub fn ensure_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            tracing::warn!(path = ?parent, error = %err, "failed to create parent directory");
        }
    }
}

/// Caps a description at [`DESCRIPTION_LIMIT`] characters, replacing the tail with `...`.
pub fn truncate_description(input: &str) -> String {
    if input.chars().count() <= DESCRIPTION_LIMIT {
        return input.to_string();
    }
    let keep = DESCRIPTION_LIMIT - ELLIPSIS.len();
    let mut out: String = input.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

pub fn clean_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Joins the non-blank parts with `", "`.
pub fn join_present(parts: &[Option<&str>]) -> String {
    parts
        .iter()
        .flatten()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}
