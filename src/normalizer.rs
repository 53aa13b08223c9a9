//! Response normalizer: parses the model's JSON reply into file records
//!
//! The reply is untrusted. Any top-level entry whose value is not an object
//! carrying the three text fields is dropped rather than coerced.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::deliverables::DeliverableKind;

/// A single generated file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub filename: String,
    pub language: String,
    pub code: String,
}

impl FileRecord {
    /// All three fields non-empty
    pub fn is_complete(&self) -> bool {
        !self.filename.trim().is_empty()
            && !self.language.trim().is_empty()
            && !self.code.trim().is_empty()
    }
}

#[derive(Debug, Error)]
#[error("reply is not valid JSON: {message}")]
pub struct ParseError {
    pub message: String,
}

/// Deliverable id to file record, in reply order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GeneratedOutput {
    entries: Vec<(String, FileRecord)>,
}

impl GeneratedOutput {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&FileRecord> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, record)| record)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn first_key(&self) -> Option<&str> {
        self.entries.first().map(|(k, _)| k.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileRecord)> {
        self.entries.iter().map(|(k, record)| (k.as_str(), record))
    }

    /// Reorder by the deliverable enumeration; ids outside it keep reply order at the end
    pub fn into_canonical_order(mut self) -> Self {
        self.entries.sort_by_key(|(k, _)| {
            DeliverableKind::from_id(k)
                .map(|kind| kind.ordinal())
                .unwrap_or(DeliverableKind::ALL.len())
        });
        self
    }

    fn insert(&mut self, key: String, record: FileRecord) {
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = record;
        } else {
            self.entries.push((key, record));
        }
    }
}

impl Serialize for GeneratedOutput {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, record) in &self.entries {
            map.serialize_entry(key, record)?;
        }
        map.end()
    }
}

impl FromIterator<(String, FileRecord)> for GeneratedOutput {
    fn from_iter<I: IntoIterator<Item = (String, FileRecord)>>(iter: I) -> Self {
        let mut output = GeneratedOutput::default();
        for (key, record) in iter {
            output.insert(key, record);
        }
        output
    }
}

pub fn normalize(raw: &str) -> Result<GeneratedOutput, ParseError> {
    let parsed: Value = serde_json::from_str(raw.trim()).map_err(|e| ParseError {
        message: e.to_string(),
    })?;

    let Value::Object(map) = parsed else {
        tracing::debug!("Reply is valid JSON but not an object; nothing to extract");
        return Ok(GeneratedOutput::default());
    };

    let mut output = GeneratedOutput::default();
    for (key, value) in map {
        if !value.is_object() {
            tracing::debug!("Dropping entry '{}': value is not an object", key);
            continue;
        }
        match serde_json::from_value::<FileRecord>(value) {
            Ok(record) => output.insert(key, record),
            Err(e) => tracing::debug!("Dropping entry '{}': {}", key, e),
        }
    }

    Ok(output)
}

/// Remove a surrounding Markdown code fence, if the whole reply is wrapped in one
pub fn strip_code_fences(raw: &str) -> &str {
    static FENCE_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)\r?\n?```$").expect("fence regex")
    });
    let trimmed = raw.trim();
    FENCE_RE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(trimmed)
}
