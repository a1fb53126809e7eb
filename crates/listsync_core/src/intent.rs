use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{AddDefaults, ImportListItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    AlreadyInLibrary,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyInLibrary => write!(f, "already in library"),
        }
    }
}

/// Which exclusion entry stopped an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExclusionMatch {
    Author,
    Edition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentAction {
    AddAuthor,
    AddBook,
    Skip(SkipReason),
    Excluded(ExclusionMatch),
}

/// A proposed library change. Applied by the library collaborator, never here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationIntent {
    pub action: IntentAction,
    pub item: ImportListItem,
    pub defaults: AddDefaults,
}

impl MutationIntent {
    pub fn is_add(&self) -> bool {
        matches!(self.action, IntentAction::AddAuthor | IntentAction::AddBook)
    }
}
