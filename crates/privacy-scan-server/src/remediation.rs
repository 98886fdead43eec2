//! Remediation snippets keyed by violation id.
//!
//! The catalog ships embedded in the binary and can be replaced by a JSON
//! file with the same shape: an array of `{id, title, html, react}`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

const EMBEDDED: &str = include_str!("remediation.json");

/// Example fix for one violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    pub title: String,
    pub html: String,
    pub react: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Entry {
    id: String,
    #[serde(flatten)]
    snippet: Snippet,
}

/// How a lookup was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Substring,
    Placeholder,
}

/// Ordered snippet catalog.
#[derive(Debug, Clone)]
pub struct RemediationCatalog {
    entries: Vec<Entry>,
}

impl RemediationCatalog {
    /// The catalog compiled into the binary.
    pub fn embedded() -> Result<Self> {
        Self::from_json(EMBEDDED).context("embedded remediation catalog is invalid")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read remediation catalog: {}", path.display()))?;
        Self::from_json(&raw)
            .with_context(|| format!("invalid remediation catalog: {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let entries: Vec<Entry> = serde_json::from_str(raw)?;
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|e| e.id.as_str())
    }

    /// Find the snippet for `violation_id`.
    ///
    /// The id is trimmed, lowercased and has spaces replaced by `_`. An exact
    /// match wins; otherwise the first entry (in catalog order) whose id
    /// contains the query or is contained by it. Anything else gets a
    /// placeholder naming the original id.
    pub fn lookup(&self, violation_id: &str) -> (Snippet, MatchKind) {
        let wanted = normalize_id(violation_id);

        if !wanted.is_empty() {
            if let Some(e) = self.entries.iter().find(|e| e.id == wanted) {
                return (e.snippet.clone(), MatchKind::Exact);
            }
            if let Some(e) = self
                .entries
                .iter()
                .find(|e| e.id.contains(&wanted) || wanted.contains(&e.id))
            {
                tracing::warn!("fuzzy matched '{wanted}' to '{}'", e.id);
                return (e.snippet.clone(), MatchKind::Substring);
            }
        }

        tracing::warn!("no remediation snippet for '{violation_id}'");
        (placeholder(violation_id), MatchKind::Placeholder)
    }
}

/// `" Cookies Before Consent "` → `"cookies_before_consent"`.
pub fn normalize_id(raw: &str) -> String {
    raw.trim().to_lowercase().replace(' ', "_")
}

fn placeholder(violation_id: &str) -> Snippet {
    Snippet {
        title: format!("No snippet found for '{violation_id}'"),
        html: "<!-- No snippet available -->".to_string(),
        react: format!("// No snippet available for violation ID: {violation_id}"),
    }
}
