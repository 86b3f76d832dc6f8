//! Derived views over the task sequence
//!
//! Everything here is a pure function of `&[Task]` and is recomputed on every
//! call. Views hide soft-deleted tasks unless they exist to show them.

use crate::filter::TaskFilter;
use crate::models::Task;
use chrono::{DateTime, Days, NaiveDate};
use std::collections::BTreeMap;

/// Parse a stored schedule date
///
/// Accepts `YYYY-MM-DD`, `MM-DD-YYYY`, and RFC 3339 timestamps (date part).
pub fn parse_schedule_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m-%d-%Y"))
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

pub fn all_tasks(tasks: &[Task]) -> Vec<&Task> {
    TaskFilter::All.apply(tasks)
}

pub fn completed_tasks(tasks: &[Task]) -> Vec<&Task> {
    TaskFilter::Completed.apply(tasks)
}

pub fn flagged_tasks(tasks: &[Task]) -> Vec<&Task> {
    TaskFilter::Flagged.apply(tasks)
}

pub fn scheduled_tasks(tasks: &[Task]) -> Vec<&Task> {
    TaskFilter::Scheduled.apply(tasks)
}

pub fn scheduled_on(tasks: &[Task], date: NaiveDate) -> Vec<&Task> {
    TaskFilter::ScheduledOn(date).apply(tasks)
}

pub fn recently_deleted(tasks: &[Task]) -> Vec<&Task> {
    TaskFilter::RecentlyDeleted.apply(tasks)
}

pub fn tasks_in_list<'a>(tasks: &'a [Task], list_name: &str) -> Vec<&'a Task> {
    TaskFilter::InList(list_name.to_string()).apply(tasks)
}

/// A list's tasks split into the active and completed sections
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Partition<'a> {
    pub active: Vec<&'a Task>,
    pub completed: Vec<&'a Task>,
}

/// Split one list into active and completed tasks, keeping subtasks with
/// their parent.
///
/// A top-level task is completed when it is. A subtask moves to the completed
/// section only once its parent and every subtask in its run are completed;
/// until then the whole run stays visible under the active section. A subtask
/// with no top-level task before it stands in as its own parent.
pub fn partition_list<'a>(tasks: &'a [Task], list_name: &str) -> Partition<'a> {
    let list = tasks_in_list(tasks, list_name);
    let mut partition = Partition::default();

    for (i, task) in list.iter().copied().enumerate() {
        let done = if task.is_subtask() {
            let (start, end) = subtask_run(&list, i);
            let parent_done = match start.checked_sub(1) {
                Some(p) => list[p].completed,
                None => task.completed,
            };
            parent_done && list[start..end].iter().all(|t| t.completed)
        } else {
            task.completed
        };

        if done {
            partition.completed.push(task);
        } else {
            partition.active.push(task);
        }
    }

    partition
}

/// Bounds `[start, end)` of the run of consecutive subtasks containing `i`
fn subtask_run(list: &[&Task], i: usize) -> (usize, usize) {
    let mut start = i;
    while start > 0 && list[start - 1].is_subtask() {
        start -= 1;
    }
    let mut end = i + 1;
    while end < list.len() && list[end].is_subtask() {
        end += 1;
    }
    (start, end)
}

/// Whether the top-level task `parent_id` still has open subtasks
///
/// Callers check this before letting a parent be marked complete.
pub fn has_incomplete_subtasks(tasks: &[Task], list_name: &str, parent_id: &str) -> bool {
    let list = tasks_in_list(tasks, list_name);
    let Some(idx) = list.iter().position(|t| t.id == parent_id) else {
        return false;
    };
    if list[idx].is_subtask() {
        return false;
    }

    list[idx + 1..]
        .iter()
        .take_while(|t| t.is_subtask())
        .any(|t| !t.completed)
}

/// What a calendar day counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayCountMode {
    /// Completed tasks, dated by their schedule date
    Completed,
    Scheduled,
}

/// Per-day task counts for `days` days starting at `from`
///
/// Every day in the range is present, days without tasks count zero. Tasks
/// dated outside the range are ignored.
pub fn daily_counts(tasks: &[Task], mode: DayCountMode, from: NaiveDate, days: u32) -> BTreeMap<NaiveDate, usize> {
    let mut counts: BTreeMap<NaiveDate, usize> = (0..days)
        .filter_map(|d| from.checked_add_days(Days::new(u64::from(d))))
        .map(|day| (day, 0))
        .collect();

    for task in tasks {
        if task.is_deleted() {
            continue;
        }
        if mode == DayCountMode::Completed && !task.completed {
            continue;
        }
        let Some(day) = task.schedule_date.as_deref().and_then(parse_schedule_date) else {
            continue;
        };
        if let Some(count) = counts.get_mut(&day) {
            *count += 1;
        }
    }

    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTask;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(id: &str, indent: u8, completed: bool) -> Task {
        let mut t: Task = NewTask::new(id, id).in_list("Groceries").indented(indent).into();
        t.completed = completed;
        t
    }

    fn ids(tasks: &[&Task]) -> Vec<String> {
        tasks.iter().map(|t| t.id.clone()).collect()
    }

    #[test]
    fn test_parse_both_date_formats() {
        assert_eq!(parse_schedule_date("04-27-2024"), Some(date(2024, 4, 27)));
        assert_eq!(parse_schedule_date("2024-04-27"), Some(date(2024, 4, 27)));
        assert_eq!(parse_schedule_date("2024-04-27T10:30:00.000Z"), Some(date(2024, 4, 27)));
        assert_eq!(parse_schedule_date("13-01-2024"), None);
        assert_eq!(parse_schedule_date(""), None);
    }

    #[test]
    fn test_scheduled_on_tolerates_formats() {
        let tasks: Vec<Task> = vec![
            NewTask::new("a", "US").scheduled("04-27-2024").into(),
            NewTask::new("b", "ISO").scheduled("2024-04-27").into(),
            NewTask::new("c", "Other day").scheduled("2024-04-28").into(),
            NewTask::new("d", "Unscheduled").into(),
        ];

        assert_eq!(ids(&scheduled_on(&tasks, date(2024, 4, 27))), vec!["a", "b"]);
        assert_eq!(scheduled_tasks(&tasks).len(), 3);
    }

    #[test]
    fn test_views_hide_deleted() {
        let mut gone: Task = NewTask::new("x", "gone").into();
        gone.completed = true;
        gone.recently_deleted = Some(true);
        let kept: Task = NewTask::new("y", "kept").into();
        let tasks = vec![gone, kept];

        assert_eq!(ids(&all_tasks(&tasks)), vec!["y"]);
        assert!(completed_tasks(&tasks).is_empty());
        assert_eq!(ids(&recently_deleted(&tasks)), vec!["x"]);
    }

    #[test]
    fn test_flagged_view() {
        let mut a: Task = NewTask::new("a", "a").into();
        a.flagged = Some(true);
        let b: Task = NewTask::new("b", "b").into();
        assert_eq!(ids(&flagged_tasks(&[a, b])), vec!["a"]);
    }

    #[test]
    fn test_partition_keeps_run_active_until_all_done() {
        let tasks = vec![
            entry("p1", 0, true),
            entry("s1", 1, true),
            entry("s2", 1, false),
            entry("p2", 0, false),
        ];
        let part = partition_list(&tasks, "Groceries");

        assert_eq!(ids(&part.active), vec!["s1", "s2", "p2"]);
        assert_eq!(ids(&part.completed), vec!["p1"]);
    }

    #[test]
    fn test_partition_moves_finished_run() {
        let tasks = vec![
            entry("p1", 0, true),
            entry("s1", 1, true),
            entry("s2", 1, true),
            entry("p2", 0, false),
            entry("s3", 1, true),
        ];
        let part = partition_list(&tasks, "Groceries");

        assert_eq!(ids(&part.completed), vec!["p1", "s1", "s2"]);
        // parent still open, so the finished subtask stays with it
        assert_eq!(ids(&part.active), vec!["p2", "s3"]);
    }

    #[test]
    fn test_partition_orphan_subtask_and_other_lists() {
        let mut other: Task = NewTask::new("o", "other").in_list("Work").into();
        other.completed = true;
        let tasks = vec![entry("s0", 1, true), other, entry("p", 0, false)];
        let part = partition_list(&tasks, "Groceries");

        assert_eq!(ids(&part.completed), vec!["s0"]);
        assert_eq!(ids(&part.active), vec!["p"]);
    }

    #[test]
    fn test_has_incomplete_subtasks() {
        let tasks = vec![
            entry("p1", 0, false),
            entry("s1", 1, true),
            entry("s2", 1, false),
            entry("p2", 0, false),
            entry("s3", 1, true),
        ];

        assert!(has_incomplete_subtasks(&tasks, "Groceries", "p1"));
        assert!(!has_incomplete_subtasks(&tasks, "Groceries", "p2"));
        assert!(!has_incomplete_subtasks(&tasks, "Groceries", "s2"));
        assert!(!has_incomplete_subtasks(&tasks, "Groceries", "missing"));
    }

    #[test]
    fn test_daily_counts() {
        let mut done: Task = NewTask::new("a", "a").scheduled("04-27-2024").into();
        done.completed = true;
        let open: Task = NewTask::new("b", "b").scheduled("2024-04-27").into();
        let outside: Task = NewTask::new("c", "c").scheduled("2025-01-01").into();
        let tasks = vec![done, open, outside];

        let from = date(2024, 4, 25);
        let scheduled = daily_counts(&tasks, DayCountMode::Scheduled, from, 7);
        assert_eq!(scheduled.len(), 7);
        assert_eq!(scheduled[&date(2024, 4, 27)], 2);
        assert_eq!(scheduled[&date(2024, 4, 25)], 0);

        let completed = daily_counts(&tasks, DayCountMode::Completed, from, 7);
        assert_eq!(completed[&date(2024, 4, 27)], 1);
    }
}
