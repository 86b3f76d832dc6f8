// Task filters behind the derived views

use crate::models::Task;
use crate::query::parse_schedule_date;
use chrono::NaiveDate;
use eyre::{Result, eyre};
use std::str::FromStr;

/// Predicate selecting a subset of tasks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskFilter {
    /// Every task not in the recently-deleted bin
    All,
    Completed,
    Flagged,
    /// Tasks with any non-blank schedule date, readable or not
    Scheduled,
    ScheduledOn(NaiveDate),
    RecentlyDeleted,
    InList(String),
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        match self {
            TaskFilter::RecentlyDeleted => task.is_deleted(),
            _ if task.is_deleted() => false,
            TaskFilter::All => true,
            TaskFilter::Completed => task.completed,
            TaskFilter::Flagged => task.is_flagged(),
            TaskFilter::Scheduled => task.schedule_date.as_deref().is_some_and(|d| !d.trim().is_empty()),
            TaskFilter::ScheduledOn(date) => scheduled_date(task) == Some(*date),
            TaskFilter::InList(name) => task.belongs_to(name),
        }
    }

    /// Matching tasks in stored order
    pub fn apply<'a>(&self, tasks: &'a [Task]) -> Vec<&'a Task> {
        tasks.iter().filter(|t| self.matches(t)).collect()
    }
}

fn scheduled_date(task: &Task) -> Option<NaiveDate> {
    task.schedule_date.as_deref().and_then(parse_schedule_date)
}

impl std::fmt::Display for TaskFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskFilter::All => write!(f, "all"),
            TaskFilter::Completed => write!(f, "completed"),
            TaskFilter::Flagged => write!(f, "flagged"),
            TaskFilter::Scheduled => write!(f, "scheduled"),
            TaskFilter::ScheduledOn(date) => write!(f, "scheduled on {}", date),
            TaskFilter::RecentlyDeleted => write!(f, "recently deleted"),
            TaskFilter::InList(name) => write!(f, "list {}", name),
        }
    }
}

impl FromStr for TaskFilter {
    type Err = eyre::Report;

    /// Parse one of the fixed view names
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(TaskFilter::All),
            "completed" => Ok(TaskFilter::Completed),
            "flagged" => Ok(TaskFilter::Flagged),
            "scheduled" => Ok(TaskFilter::Scheduled),
            "deleted" | "recently-deleted" => Ok(TaskFilter::RecentlyDeleted),
            other => Err(eyre!("Unknown view: {}", other)),
        }
    }
}
