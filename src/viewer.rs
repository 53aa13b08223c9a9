//! Terminal rendition of the tabbed file viewer

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::deliverables::DeliverableKind;
use crate::error::{HdlForgeError, Result};
use crate::normalizer::GeneratedOutput;

/// Tab label for a deliverable id; unknown ids are shown as-is
pub fn tab_label(key: &str) -> &str {
    match DeliverableKind::from_id(key) {
        Some(kind) => kind.label(),
        None => key,
    }
}

/// Tab bar line with the active tab bracketed
pub fn render_tabs(output: &GeneratedOutput, active: Option<&str>) -> String {
    output
        .keys()
        .map(|key| {
            if Some(key) == active {
                format!("[{}]", tab_label(key))
            } else {
                format!(" {} ", tab_label(key))
            }
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Header, tab bar and the active file's contents
pub fn render(output: &GeneratedOutput, active: Option<&str>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", render_tabs(output, active));
    if let Some(record) = active.and_then(|key| output.get(key)) {
        let _ = writeln!(out, "--- {} ({}) ---", record.filename, record.language);
        out.push_str(&record.code);
        if !record.code.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

/// Deliverable key reduced to characters safe in a file name
fn key_stem(key: &str) -> String {
    let stem: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() { "file".to_string() } else { stem }
}

/// Reduce a model-supplied filename to a bare file name
fn safe_file_name(key: &str, filename: &str) -> String {
    Path::new(filename.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty() && *n != "." && *n != "..")
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}.txt", key_stem(key)))
}

/// First name not already taken: the bare name, then `{key}_{name}`, then a numeric suffix
fn unique_file_name(key: &str, filename: &str, taken: &HashSet<String>) -> String {
    let base = safe_file_name(key, filename);
    if !taken.contains(&base) {
        return base;
    }
    tracing::debug!("{} already written; renaming {}'s file", base, key);
    let prefixed = format!("{}_{}", key_stem(key), base);
    if !taken.contains(&prefixed) {
        return prefixed;
    }
    (2..)
        .map(|n| format!("{}_{}_{}", key_stem(key), n, base))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or(prefixed)
}

/// Write every file into `dir`, creating it if needed. Files whose bare names collide
/// are renamed so none is overwritten. Returns the written paths in output order.
pub fn write_files(dir: &Path, output: &GeneratedOutput) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).map_err(|e| HdlForgeError::Io {
        message: format!("Failed to create {}: {}", dir.display(), e),
    })?;

    let mut taken = HashSet::with_capacity(output.len());
    let mut written = Vec::with_capacity(output.len());
    for (key, record) in output.iter() {
        let name = unique_file_name(key, &record.filename, &taken);
        let path = dir.join(&name);
        std::fs::write(&path, &record.code).map_err(|e| HdlForgeError::Io {
            message: format!("Failed to write {}: {}", path.display(), e),
        })?;
        tracing::debug!("Wrote {} ({} bytes)", path.display(), record.code.len());
        taken.insert(name);
        written.push(path);
    }
    Ok(written)
}
