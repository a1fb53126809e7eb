use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};

use crate::text::fold;

/// Author and edition ids the user never wants added automatically.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExclusionSet {
    pub authors: HashSet<String>,
    pub editions: HashSet<String>,
}

impl ExclusionSet {
    pub fn contains_author(&self, author_id: &str) -> bool {
        self.authors.contains(author_id)
    }

    pub fn contains_edition(&self, edition_id: &str) -> bool {
        self.editions.contains(edition_id)
    }
}

/// Read-only view of the library a reconciliation pass decides against.
pub trait LibrarySnapshot {
    fn current_authors(&self) -> &HashSet<String>;
    fn current_editions(&self) -> &HashSet<String>;
    fn exclusion_set(&self) -> &ExclusionSet;

    /// Title lookup for items without an edition id. Snapshots that cannot
    /// answer it report nothing present.
    fn contains_title(&self, _author_id: &str, _title: &str) -> bool {
        false
    }
}

/// In-memory snapshot, also the on-disk shape of a library export.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryState {
    pub authors: HashSet<String>,
    pub editions: HashSet<String>,
    /// `(author id, folded title)` pairs of books already in the library.
    #[serde(deserialize_with = "folded_titles")]
    pub titles: HashSet<(String, String)>,
    pub exclusions: ExclusionSet,
}

impl LibraryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_author(mut self, author_id: impl Into<String>) -> Self {
        self.authors.insert(author_id.into());
        self
    }

    pub fn with_edition(mut self, edition_id: impl Into<String>) -> Self {
        self.editions.insert(edition_id.into());
        self
    }

    pub fn with_title(mut self, author_id: impl Into<String>, title: &str) -> Self {
        self.titles.insert((author_id.into(), fold(title)));
        self
    }
}

impl LibrarySnapshot for LibraryState {
    fn current_authors(&self) -> &HashSet<String> {
        &self.authors
    }

    fn current_editions(&self) -> &HashSet<String> {
        &self.editions
    }

    fn exclusion_set(&self) -> &ExclusionSet {
        &self.exclusions
    }

    fn contains_title(&self, author_id: &str, title: &str) -> bool {
        self.titles.contains(&(author_id.to_string(), fold(title)))
    }
}

fn folded_titles<'de, D>(deserializer: D) -> Result<HashSet<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<(String, String)>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(author, title)| (author, fold(&title)))
        .collect())
}
