// Key-value storage backends

use crate::config::{Backend, StoreConfig};
use eyre::Result;
use std::sync::Arc;

pub mod file;
pub mod memory;
pub mod sqlite;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

/// Key-value storage the store persists into
///
/// Implementations must be safe to call from the write-queue worker threads.
pub trait KeyValueStorage: Send + Sync {
    /// Value stored under `key`, or `None` if nothing is stored
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`; removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<()>;

    /// All keys currently stored, sorted
    fn keys(&self) -> Result<Vec<String>>;
}

/// Build the backend selected by `config`
pub fn open_backend(config: &StoreConfig) -> Result<Arc<dyn KeyValueStorage>> {
    let storage: Arc<dyn KeyValueStorage> = match config.backend {
        Backend::Sqlite => Arc::new(SqliteStorage::open(config.resolve_data_dir()?)?),
        Backend::Files => Arc::new(FileStorage::open(config.resolve_data_dir()?)?),
        Backend::Memory => Arc::new(MemoryStorage::new()),
    };
    Ok(storage)
}
