use serde::{Deserialize, Serialize};

use crate::text::{clean_spaces, fold};
use crate::SourceId;

/// Provider-agnostic record every later stage works with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImportListItem {
    pub author_name: String,
    pub author_external_id: String,
    pub book_title: String,
    pub edition_external_id: Option<String>,
    pub source_list_id: SourceId,
}

/// Identity used to collapse duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DedupKey {
    Ids { author: String, edition: String },
    Names { author: String, title: String },
}

impl ImportListItem {
    /// Builds an item with whitespace-normalized name and title.
    pub fn new(
        author_name: &str,
        author_external_id: impl Into<String>,
        book_title: &str,
        edition_external_id: Option<String>,
        source_list_id: SourceId,
    ) -> Self {
        Self {
            author_name: clean_spaces(author_name),
            author_external_id: author_external_id.into().trim().to_string(),
            book_title: clean_spaces(book_title),
            edition_external_id: edition_external_id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty()),
            source_list_id,
        }
    }

    /// Re-applies the whitespace invariant to an item built field by field.
    pub fn normalized(self) -> Self {
        Self::new(
            &self.author_name,
            self.author_external_id,
            &self.book_title,
            self.edition_external_id,
            self.source_list_id,
        )
    }

    pub fn dedup_key(&self) -> DedupKey {
        match self.edition_external_id.as_deref() {
            Some(edition) if !self.author_external_id.is_empty() => DedupKey::Ids {
                author: self.author_external_id.clone(),
                edition: edition.to_string(),
            },
            _ => DedupKey::Names {
                author: fold(&self.author_name),
                title: fold(&self.book_title),
            },
        }
    }

    /// Who wrote the item: the external id, or the folded name when the
    /// provider gave no id.
    pub fn author_key(&self) -> String {
        if self.author_external_id.is_empty() {
            fold(&self.author_name)
        } else {
            self.author_external_id.clone()
        }
    }

    /// True when there is nothing meaningful left to add.
    pub fn is_degenerate(&self) -> bool {
        self.author_name.is_empty() || self.book_title.is_empty()
    }
}
