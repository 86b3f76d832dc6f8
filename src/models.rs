// Data models for the task/list store

use serde::{Deserialize, Serialize};

/// A single to-do entry
///
/// Field names follow the stored JSON (camelCase). Records written by older
/// builds use `text`/`done`, and some carry both spellings at once; `title`
/// and `completed` win when both are present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredTask")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flagged: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indent: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recently_deleted: Option<bool>,
}

/// Task as found in storage, with both field spellings
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTask {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    completed: Option<bool>,
    #[serde(default)]
    done: Option<bool>,
    #[serde(default)]
    flagged: Option<bool>,
    #[serde(default)]
    indent: Option<u8>,
    #[serde(default)]
    list_name: Option<String>,
    #[serde(default)]
    schedule_date: Option<String>,
    #[serde(default)]
    button_color: Option<String>,
    #[serde(default)]
    recently_deleted: Option<bool>,
}

impl From<StoredTask> for Task {
    fn from(s: StoredTask) -> Self {
        Task {
            id: s.id,
            title: s.title.or(s.text).unwrap_or_default(),
            completed: s.completed.or(s.done).unwrap_or(false),
            flagged: s.flagged,
            indent: s.indent,
            list_name: s.list_name,
            schedule_date: s.schedule_date,
            button_color: s.button_color,
            recently_deleted: s.recently_deleted,
        }
    }
}

impl Task {
    /// Indent level, treating an absent value as top-level
    pub fn indent_level(&self) -> u8 {
        self.indent.unwrap_or(0)
    }

    pub fn is_subtask(&self) -> bool {
        self.indent_level() == 1
    }

    pub fn is_flagged(&self) -> bool {
        self.flagged.unwrap_or(false)
    }

    pub fn is_deleted(&self) -> bool {
        self.recently_deleted.unwrap_or(false)
    }

    pub fn belongs_to(&self, list_name: &str) -> bool {
        self.list_name.as_deref() == Some(list_name)
    }
}

/// A task as supplied by a caller: everything except `completed`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    pub id: String,
    pub title: String,
    pub flagged: Option<bool>,
    pub indent: Option<u8>,
    pub list_name: Option<String>,
    pub schedule_date: Option<String>,
    pub button_color: Option<String>,
    pub recently_deleted: Option<bool>,
}

impl NewTask {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn in_list(mut self, list_name: impl Into<String>) -> Self {
        self.list_name = Some(list_name.into());
        self
    }

    pub fn scheduled(mut self, date: impl Into<String>) -> Self {
        self.schedule_date = Some(date.into());
        self
    }

    pub fn indented(mut self, level: u8) -> Self {
        self.indent = Some(level);
        self
    }
}

impl From<NewTask> for Task {
    fn from(t: NewTask) -> Self {
        Task {
            id: t.id,
            title: t.title,
            completed: false,
            flagged: t.flagged,
            indent: t.indent,
            list_name: t.list_name,
            schedule_date: t.schedule_date,
            button_color: t.button_color,
            recently_deleted: t.recently_deleted,
        }
    }
}

/// Shallow update for a task: every `Some` field overwrites the stored one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub completed: Option<bool>,
    pub flagged: Option<bool>,
    pub indent: Option<u8>,
    pub list_name: Option<String>,
    pub schedule_date: Option<String>,
    pub button_color: Option<String>,
    pub recently_deleted: Option<bool>,
}

impl TaskPatch {
    /// Merge into `task`. The id is never touched.
    pub fn apply(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        if self.flagged.is_some() {
            task.flagged = self.flagged;
        }
        if self.indent.is_some() {
            task.indent = self.indent;
        }
        if self.list_name.is_some() {
            task.list_name = self.list_name;
        }
        if self.schedule_date.is_some() {
            task.schedule_date = self.schedule_date;
        }
        if self.button_color.is_some() {
            task.button_color = self.button_color;
        }
        if self.recently_deleted.is_some() {
            task.recently_deleted = self.recently_deleted;
        }
    }
}

impl From<Task> for TaskPatch {
    fn from(t: Task) -> Self {
        TaskPatch {
            title: Some(t.title),
            completed: Some(t.completed),
            flagged: t.flagged,
            indent: t.indent,
            list_name: t.list_name,
            schedule_date: t.schedule_date,
            button_color: t.button_color,
            recently_deleted: t.recently_deleted,
        }
    }
}

/// A named, user-created grouping of tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntry {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Full export of the store, as written by `Store::export_snapshot`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub lists: Vec<ListEntry>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_serializes_only_given_fields() {
        let task: Task = NewTask::new("1", "Buy milk").in_list("Home").into();
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": "1", "title": "Buy milk", "completed": false, "listName": "Home"})
        );
    }

    #[test]
    fn test_legacy_field_names() {
        let json = r#"{"id":"a","text":"Old","done":true,"flagged":false,"indent":1}"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.title, "Old");
        assert!(task.completed);
        assert!(task.is_subtask());
        assert!(!task.is_flagged());
    }

    #[test]
    fn test_both_spellings_prefer_current_names() {
        let json = r#"{"id":"1","title":"Milk","text":"Old milk","done":false,"completed":true,"indent":0}"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.title, "Milk");
        assert!(task.completed);

        // Written back with the current names only
        let out = serde_json::to_value(&task).unwrap();
        assert!(out.get("done").is_none());
        assert!(out.get("text").is_none());
    }

    #[test]
    fn test_title_with_legacy_done() {
        let task: Task = serde_json::from_str(r#"{"id":"1","title":"Eggs","done":true}"#).unwrap();
        assert_eq!(task.title, "Eggs");
        assert!(task.completed);
    }

    #[test]
    fn test_missing_completed_defaults_false() {
        let task: Task = serde_json::from_str(r#"{"id":"x","title":"T"}"#).unwrap();
        assert!(!task.completed);
        assert_eq!(task.indent_level(), 0);
        assert!(!task.is_deleted());
    }

    #[test]
    fn test_patch_is_shallow_and_keeps_id() {
        let mut task: Task = NewTask::new("7", "Draft").in_list("Work").into();
        TaskPatch {
            title: Some("Final".to_string()),
            flagged: Some(true),
            ..Default::default()
        }
        .apply(&mut task);

        assert_eq!(task.id, "7");
        assert_eq!(task.title, "Final");
        assert_eq!(task.flagged, Some(true));
        assert_eq!(task.list_name.as_deref(), Some("Work"));
        assert!(!task.completed);
    }

    #[test]
    fn test_list_color_is_optional() {
        let list: ListEntry = serde_json::from_str(r#"{"id":"a","name":"Work"}"#).unwrap();
        assert!(list.color.is_none());
        assert_eq!(serde_json::to_string(&list).unwrap(), r#"{"id":"a","name":"Work"}"#);
    }
}
