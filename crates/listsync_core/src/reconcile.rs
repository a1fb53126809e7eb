use std::collections::{BTreeMap, HashSet};

use sync_logging::sync_debug;

use crate::{
    AddDefaults, ExclusionMatch, ImportListItem, IntentAction, LibrarySnapshot, MutationIntent,
    SkipReason, SourceId,
};

/// Add settings per source, looked up through each item's `source_list_id`.
pub type DefaultsBySource = BTreeMap<SourceId, AddDefaults>;

/// Decides what to do with each cleaned item against the library snapshot.
///
/// Rules per item, first match wins:
/// 1. author or edition id excluded -> `Excluded`
/// 2. edition already in the library -> `Skip(AlreadyInLibrary)`
/// 3. author known (library or added earlier in this pass) -> `AddBook`.
///    Authors without an external id are told apart by name.
/// 4. otherwise -> `AddAuthor` then `AddBook`
///
/// Output follows input order and never repeats `AddAuthor` for one author.
pub fn reconcile(
    items: &[ImportListItem],
    snapshot: &dyn LibrarySnapshot,
    defaults: &DefaultsBySource,
) -> Vec<MutationIntent> {
    let exclusions = snapshot.exclusion_set();
    let mut added_authors: HashSet<String> = HashSet::new();
    let mut intents = Vec::with_capacity(items.len());

    for item in items {
        let item_defaults = defaults
            .get(&item.source_list_id)
            .cloned()
            .unwrap_or_default();
        let intent = |action| MutationIntent {
            action,
            item: item.clone(),
            defaults: item_defaults.clone(),
        };
        let edition = item.edition_external_id.as_deref();

        if exclusions.contains_author(&item.author_external_id) {
            intents.push(intent(IntentAction::Excluded(ExclusionMatch::Author)));
            continue;
        }
        if edition.is_some_and(|id| exclusions.contains_edition(id)) {
            intents.push(intent(IntentAction::Excluded(ExclusionMatch::Edition)));
            continue;
        }

        let in_library = match edition {
            Some(id) => snapshot.current_editions().contains(id),
            None => snapshot.contains_title(&item.author_external_id, &item.book_title),
        };
        if in_library {
            intents.push(intent(IntentAction::Skip(SkipReason::AlreadyInLibrary)));
            continue;
        }

        let author_in_library = !item.author_external_id.is_empty()
            && snapshot
                .current_authors()
                .contains(&item.author_external_id);
        if !author_in_library && added_authors.insert(item.author_key()) {
            intents.push(intent(IntentAction::AddAuthor));
        }
        intents.push(intent(IntentAction::AddBook));
    }

    sync_debug!(
        "Reconciled {} items into {} intents ({} new authors)",
        items.len(),
        intents.len(),
        added_authors.len()
    );
    intents
}
