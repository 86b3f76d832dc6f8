// One-time import of per-list legacy keys
//
// Older builds kept one key per list, `TASKS_<listName>`, holding that list's
// tasks in the `text`/`done` shape. The unified scheme keeps every task under
// a single key; these helpers fold the legacy keys into it.

use crate::config::StoreConfig;
use crate::kv::KeyValueStorage;
use crate::models::Task;
use crate::record;
use eyre::Result;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Tasks recovered from legacy keys, and the keys they came from
#[derive(Debug, Default)]
pub struct LegacyImport {
    pub tasks: Vec<Task>,
    pub keys: Vec<String>,
}

impl LegacyImport {
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Read every legacy key, skipping task ids already in `existing`
///
/// Imported tasks get `listName` from their key. A key whose value does not
/// parse is left alone and not reported for removal.
pub fn collect_legacy(storage: &dyn KeyValueStorage, config: &StoreConfig, existing: &[Task]) -> Result<LegacyImport> {
    let mut seen: HashSet<String> = existing.iter().map(|t| t.id.clone()).collect();
    let mut import = LegacyImport::default();

    for key in storage.keys()? {
        let Some(list_name) = config.legacy_list_name(&key) else {
            continue;
        };
        let Some(raw) = storage.get(&key)? else {
            continue;
        };

        let tasks: Vec<Task> = match record::decode(&raw) {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!(key = %key, error = ?e, "Skipping unreadable legacy key");
                continue;
            }
        };

        let mut added = 0;
        for mut task in tasks {
            if task.id.trim().is_empty() {
                warn!(key = %key, "Skipping legacy task without id");
                continue;
            }
            if !seen.insert(task.id.clone()) {
                debug!(key = %key, id = %task.id, "Legacy task already present");
                continue;
            }
            task.list_name = Some(list_name.to_string());
            import.tasks.push(task);
            added += 1;
        }

        info!(key = %key, list = list_name, added, "Collected legacy tasks");
        import.keys.push(key);
    }

    Ok(import)
}

/// Delete legacy keys once their tasks are safely stored
pub fn remove_legacy_keys(storage: &dyn KeyValueStorage, keys: &[String]) {
    for key in keys {
        if let Err(e) = storage.remove(key) {
            warn!(key = %key, error = ?e, "Failed to remove legacy key");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStorage;
    use crate::models::NewTask;

    #[test]
    fn test_collect_legacy() {
        let storage = MemoryStorage::with_entries([
            (
                "TASKS_Groceries",
                r#"[{"id":"g1","text":"Eggs","done":false,"flagged":false,"indent":0},
                    {"id":"dup","text":"Bread","done":true,"flagged":false,"indent":0}]"#,
            ),
            ("TASKS_Broken", "{nope"),
            ("TASKS_STORAGE_KEY", "[]"),
            ("LISTS_STORAGE_KEY", "[]"),
        ]);
        let existing: Vec<Task> = vec![NewTask::new("dup", "Bread").into()];

        let import = collect_legacy(&storage, &StoreConfig::default(), &existing).unwrap();

        assert_eq!(import.keys, vec!["TASKS_Groceries".to_string()]);
        assert_eq!(import.tasks.len(), 1);
        assert_eq!(import.tasks[0].title, "Eggs");
        assert_eq!(import.tasks[0].list_name.as_deref(), Some("Groceries"));
    }

    #[test]
    fn test_collect_legacy_mixed_field_names() {
        let storage = MemoryStorage::with_entries([(
            "TASKS_Home",
            r#"[{"id":"h1","title":"Sweep","done":true,"flagged":false,"indent":0},
                {"id":"h2","title":"Dust","text":"Dust old","done":true,"completed":false}]"#,
        )]);

        let import = collect_legacy(&storage, &StoreConfig::default(), &[]).unwrap();

        assert_eq!(import.keys, vec!["TASKS_Home".to_string()]);
        assert_eq!(import.tasks.len(), 2);
        assert_eq!(import.tasks[0].title, "Sweep");
        assert!(import.tasks[0].completed);
        assert_eq!(import.tasks[1].title, "Dust");
        assert!(!import.tasks[1].completed);
        assert!(import.tasks.iter().all(|t| t.belongs_to("Home")));
    }

    #[test]
    fn test_nothing_to_import() {
        let storage = MemoryStorage::with_entries([("TASKS_STORAGE_KEY", "[]")]);
        let import = collect_legacy(&storage, &StoreConfig::default(), &[]).unwrap();
        assert!(import.is_empty());
    }

    #[test]
    fn test_remove_legacy_keys() {
        let storage = MemoryStorage::with_entries([("TASKS_Home", "[]"), ("TASKS_STORAGE_KEY", "[]")]);
        remove_legacy_keys(&storage, &["TASKS_Home".to_string()]);
        assert_eq!(storage.keys().unwrap(), vec!["TASKS_STORAGE_KEY".to_string()]);
    }
}
