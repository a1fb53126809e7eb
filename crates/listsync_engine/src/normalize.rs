use listsync_core::text::{clean_spaces, title_without_series};
use listsync_core::{ImportListItem, SourceId};
use serde::{Deserialize, Serialize};

use crate::NormalizeError;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorResource {
    pub id: Option<u64>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BookResource {
    pub id: Option<u64>,
    pub title: Option<String>,
    pub title_without_series: Option<String>,
    pub authors: Vec<AuthorResource>,
}

/// Entry of an owned-books page.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OwnedBookResource {
    pub book: BookResource,
    pub original_purchase_date: Option<String>,
}

/// Entry of a shelf (review list) page.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewResource {
    pub book: BookResource,
    pub rating: Option<u8>,
    pub shelves: Vec<String>,
}

/// Provider-native item. Only the normalizer looks inside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawItem {
    OwnedBook(OwnedBookResource),
    Review(ReviewResource),
}

impl RawItem {
    fn book(&self) -> &BookResource {
        match self {
            RawItem::OwnedBook(owned) => &owned.book,
            RawItem::Review(review) => &review.book,
        }
    }
}

/// One page as returned by a `SourceClient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    pub page: u32,
    pub items: Vec<RawItem>,
    pub has_more: bool,
}

/// Maps a raw item to the canonical record.
///
/// Works with several credited authors are attributed to the first one
/// only. Exclusions and dedup key off that author's id, so changing the
/// choice changes which library entries match.
pub fn normalize(raw: &RawItem, source_id: SourceId) -> Result<ImportListItem, NormalizeError> {
    let book = raw.book();
    let author = book.authors.first().ok_or(NormalizeError::MissingAuthor)?;
    let author_id = author.id.ok_or(NormalizeError::MissingAuthorId)?;
    let author_name = author
        .name
        .as_deref()
        .map(clean_spaces)
        .filter(|name| !name.is_empty())
        .ok_or(NormalizeError::MissingAuthorName)?;

    let title = book
        .title_without_series
        .as_deref()
        .map(clean_spaces)
        .filter(|title| !title.is_empty())
        .or_else(|| {
            book.title
                .as_deref()
                .map(title_without_series)
                .filter(|title| !title.is_empty())
        })
        .ok_or(NormalizeError::MissingTitle)?;

    Ok(ImportListItem::new(
        &author_name,
        author_id.to_string(),
        &title,
        book.id.map(|id| id.to_string()),
        source_id,
    ))
}
