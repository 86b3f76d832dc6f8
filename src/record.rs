// Record trait tying a stored type to its collection

use crate::config::StoreConfig;
use crate::models::{ListEntry, Task};
use serde::{Serialize, de::DeserializeOwned};

/// The two collections the store persists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Tasks,
    Lists,
}

impl Collection {
    /// Storage key for this collection under the given configuration
    pub fn key(self, config: &StoreConfig) -> &str {
        match self {
            Collection::Tasks => &config.tasks_key,
            Collection::Lists => &config.lists_key,
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Collection::Tasks => write!(f, "tasks"),
            Collection::Lists => write!(f, "lists"),
        }
    }
}

/// Core trait that any stored record must implement
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Unique identifier for this record
    fn id(&self) -> &str;

    /// Collection this record is persisted under
    fn collection() -> Collection
    where
        Self: Sized;
}

impl Record for Task {
    fn id(&self) -> &str {
        &self.id
    }

    fn collection() -> Collection {
        Collection::Tasks
    }
}

impl Record for ListEntry {
    fn id(&self) -> &str {
        &self.id
    }

    fn collection() -> Collection {
        Collection::Lists
    }
}

/// Parse a stored collection value
///
/// An empty or whitespace-only value is treated as an empty collection.
pub fn decode<T: Record>(raw: &str) -> serde_json::Result<Vec<T>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw)
}

/// Serialize a whole collection for storage
pub fn encode<T: Record>(records: &[T]) -> serde_json::Result<String> {
    serde_json::to_string(records)
}
