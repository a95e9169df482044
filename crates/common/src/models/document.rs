//! Document entity
//!
//! Documents are loaded once per run and never mutated afterwards; derived
//! vectors and assignments live in the engine's own structures.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Stable external identifier (DOI, catalog id, ...)
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default, rename = "abstract", alias = "abstract_text")]
    pub abstract_text: String,

    /// Publication year, reporting only
    #[serde(default)]
    pub year: Option<i32>,

    /// Publication venue, reporting only
    #[serde(default)]
    pub venue: Option<String>,

    /// External identifiers of cited works; missing means unknown
    #[serde(default, deserialize_with = "nullable_references")]
    pub references: Vec<String>,
}

/// Treat an explicit `null` the same as a missing field
fn nullable_references<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Document {
    pub fn new(id: impl Into<String>, title: impl Into<String>, abstract_text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            abstract_text: abstract_text.into(),
            year: None,
            venue: None,
            references: Vec::new(),
        }
    }

    /// Builder-style helper to attach a reference list
    pub fn with_references<I, S>(mut self, references: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.references = references.into_iter().map(Into::into).collect();
        self
    }

    /// Title and abstract joined into the payload used for text features
    pub fn text_payload(&self) -> String {
        match (self.title.trim().is_empty(), self.abstract_text.trim().is_empty()) {
            (true, true) => String::new(),
            (false, true) => self.title.clone(),
            (true, false) => self.abstract_text.clone(),
            (false, false) => format!("{}. {}", self.title, self.abstract_text),
        }
    }

    /// Distinct, non-blank reference identifiers in sorted order
    pub fn reference_set(&self) -> Vec<&str> {
        let mut refs: Vec<&str> = self
            .references
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .collect();
        refs.sort_unstable();
        refs.dedup();
        refs
    }
}
