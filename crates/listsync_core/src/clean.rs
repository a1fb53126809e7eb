use std::collections::HashSet;

use crate::ImportListItem;

/// Drops degenerate items and collapses duplicates, keeping the first
/// occurrence of every dedup key in input order.
pub fn clean(items: impl IntoIterator<Item = ImportListItem>) -> Vec<ImportListItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .map(ImportListItem::normalized)
        .filter(|item| !item.is_degenerate())
        .filter(|item| seen.insert(item.dedup_key()))
        .collect()
}

/// Merges the cleaned output of several sources, in the given order, and
/// cleans the union so one book listed on two sources appears once.
pub fn merge_sources<I>(per_source: I) -> Vec<ImportListItem>
where
    I: IntoIterator,
    I::Item: IntoIterator<Item = ImportListItem>,
{
    clean(per_source.into_iter().flatten())
}
