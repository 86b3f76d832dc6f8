// TodoStore - Task and list state with key-value persistence

pub mod config;
pub mod filter;
pub mod kv;
pub mod migrate;
pub mod models;
pub mod query;
pub mod queue;
pub mod record;
pub mod snapshot;
pub mod store;

// Re-export main types for convenience
pub use config::{Backend, StoreConfig};
pub use filter::TaskFilter;
pub use kv::{FileStorage, KeyValueStorage, MemoryStorage, SqliteStorage};
pub use models::{ListEntry, NewTask, Snapshot, Task, TaskPatch};
pub use record::{Collection, Record};
pub use store::{Outcome, Phase, Store, now_ms};
