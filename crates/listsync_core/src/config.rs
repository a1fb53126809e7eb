use serde::{Deserialize, Serialize};

pub type SourceId = u32;

/// Which provider endpoint a source reads from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderKind {
    GoodreadsOwnedBooks,
    GoodreadsBookshelf { shelf: String },
}

impl ProviderKind {
    pub fn label(&self) -> &'static str {
        match self {
            ProviderKind::GoodreadsOwnedBooks => "Goodreads Owned Books",
            ProviderKind::GoodreadsBookshelf { .. } => "Goodreads Bookshelf",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MonitorMode {
    None,
    #[default]
    SpecificBook,
    EntireAuthor,
}

/// Settings applied to anything a source adds to the library.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AddDefaults {
    pub monitor: MonitorMode,
    pub quality_profile_id: u32,
    pub metadata_profile_id: u32,
    pub root_folder: String,
    pub tags: Vec<u32>,
}

/// One configured import list. Owned by configuration storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: SourceId,
    pub name: String,
    pub provider: ProviderKind,
    #[serde(default)]
    pub auth_ref: Option<String>,
    pub user_id: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub defaults: AddDefaults,
}

fn enabled_by_default() -> bool {
    true
}
