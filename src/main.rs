use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::{Result, eyre};
use std::path::PathBuf;
use todostore::query::{self, parse_schedule_date};
use todostore::{NewTask, Outcome, Store, StoreConfig, Task, TaskFilter};

#[derive(Parser)]
#[command(name = "todostore")]
#[command(about = "TodoStore CLI - Task and list state with key-value persistence")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Data directory (default: platform data dir)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show all lists
    Lists,

    /// Show tasks
    Tasks {
        /// all, completed, flagged, scheduled, or deleted
        #[arg(short, long, default_value = "all")]
        view: String,

        /// Show one list, split into active and completed
        #[arg(short, long, conflicts_with = "on")]
        list: Option<String>,

        /// Only tasks scheduled on this date (YYYY-MM-DD or MM-DD-YYYY)
        #[arg(long)]
        on: Option<String>,
    },

    /// Create a list
    AddList { name: String },

    /// Rename a list
    RenameList { id: String, name: String },

    /// Remove a list (its tasks stay)
    RemoveList { id: String },

    /// Create a task
    AddTask {
        title: String,

        #[arg(short, long)]
        list: Option<String>,

        /// Schedule date
        #[arg(long)]
        date: Option<String>,

        /// Nest under the previous top-level task
        #[arg(long)]
        sub: bool,
    },

    /// Flip a task between open and completed
    Toggle { id: String },

    /// Flag or unflag a task
    Flag {
        id: String,
        #[arg(long)]
        off: bool,
    },

    /// Move a task to recently deleted
    Trash { id: String },

    /// Bring a task back from recently deleted
    Restore { id: String },

    /// Permanently remove recently deleted tasks
    Purge,

    /// Import tasks from per-list legacy keys
    Migrate,

    /// Export lists and tasks to a JSON file
    Export { path: PathBuf },

    /// Replace lists and tasks with a JSON file's content
    Import { path: PathBuf },
}

fn main() -> Result<()> {
    // Setup tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => StoreConfig::default().resolve_data_dir()?,
    };
    let config = StoreConfig::load(&data_dir)?;
    let mut store = Store::open(config)?;

    let result = run(&mut store, cli.command);
    store.dispose();
    result
}

fn run(store: &mut Store, command: Commands) -> Result<()> {
    match command {
        Commands::Lists => {
            if store.lists().is_empty() {
                println!("{}", "No lists".dimmed());
            }
            for list in store.lists() {
                let count = query::tasks_in_list(store.tasks(), &list.name).len();
                println!("{}  {} ({})", list.id.dimmed(), list.name.bold(), count);
            }
        }
        Commands::Tasks { view, list, on } => {
            if let Some(name) = list {
                let partition = query::partition_list(store.tasks(), &name);
                println!("{}", name.bold());
                print_tasks(&partition.active);
                if !partition.completed.is_empty() {
                    println!("{}", "Completed".bold());
                    print_tasks(&partition.completed);
                }
                return Ok(());
            }

            let filter = match on {
                Some(raw) => {
                    let date = parse_schedule_date(&raw).ok_or_else(|| eyre!("Unrecognized date: {}", raw))?;
                    TaskFilter::ScheduledOn(date)
                }
                None => view.parse()?,
            };
            println!("{}", filter.to_string().bold());
            print_tasks(&filter.apply(store.tasks()));
        }
        Commands::AddList { name } => {
            if store.has_list_named(&name) {
                return Err(eyre!("A list named {} already exists", name));
            }
            let (id, outcome) = store.add_list(&name);
            report(outcome, &format!("Added list {}", id.unwrap_or_default()))?;
        }
        Commands::RenameList { id, name } => {
            if store.has_list_named_except(&name, Some(id.as_str())) {
                return Err(eyre!("A list named {} already exists", name));
            }
            report(store.rename_list(&id, &name), "Renamed list")?;
        }
        Commands::RemoveList { id } => {
            report(store.remove_list(&id), "Removed list")?;
        }
        Commands::AddTask { title, list, date, sub } => {
            if let Some(raw) = date.as_deref().filter(|d| parse_schedule_date(d).is_none()) {
                return Err(eyre!("Unrecognized date: {}", raw));
            }
            let id = uuid::Uuid::now_v7().to_string();
            let task = NewTask {
                id: id.clone(),
                title,
                indent: Some(u8::from(sub)),
                list_name: list,
                schedule_date: date,
                ..Default::default()
            };
            report(store.add_task(task), &format!("Added task {}", id))?;
        }
        Commands::Toggle { id } => {
            let task = store.task(&id).ok_or_else(|| eyre!("No task {}", id))?;
            let blocked = !task.completed
                && task
                    .list_name
                    .as_deref()
                    .is_some_and(|list| query::has_incomplete_subtasks(store.tasks(), list, &id));
            if blocked {
                return Err(eyre!("Complete all subtasks before completing this task"));
            }
            report(store.toggle_task(&id), "Toggled task")?;
        }
        Commands::Flag { id, off } => {
            report(store.flag_task(&id, !off), "Updated flag")?;
        }
        Commands::Trash { id } => {
            report(store.trash_task(&id), "Moved to recently deleted")?;
        }
        Commands::Restore { id } => {
            report(store.restore_task(&id), "Restored task")?;
        }
        Commands::Purge => {
            report(store.purge_deleted(), "Purged recently deleted")?;
        }
        Commands::Migrate => {
            report(store.import_legacy(), "Imported legacy tasks")?;
        }
        Commands::Export { path } => {
            store.export_snapshot(&path)?;
            println!("{} {}", "Exported to".green(), path.display());
        }
        Commands::Import { path } => {
            let outcome = store.import_snapshot(&path)?;
            report(outcome, &format!("Imported {}", path.display()))?;
        }
    }

    Ok(())
}

fn print_tasks(tasks: &[&Task]) {
    if tasks.is_empty() {
        println!("  {}", "(none)".dimmed());
        return;
    }
    for task in tasks {
        let check = if task.completed { "[x]".green() } else { "[ ]".normal() };
        let indent = if task.is_subtask() { "    " } else { "  " };
        let flag = if task.is_flagged() { " !".red().to_string() } else { String::new() };
        let date = task
            .schedule_date
            .as_deref()
            .map(|d| format!(" @{}", d).cyan().to_string())
            .unwrap_or_default();
        println!("{}{} {}{}{}  {}", indent, check, task.title, flag, date, task.id.dimmed());
    }
}

fn report(outcome: Outcome, what: &str) -> Result<()> {
    match outcome {
        Outcome::Saved => {
            println!("{}", what.green());
            Ok(())
        }
        Outcome::Unsaved => {
            println!("{} {}", what.yellow(), "(not saved to storage)".yellow());
            Ok(())
        }
        Outcome::NotFound => Err(eyre!("Nothing matched")),
        Outcome::Rejected => Err(eyre!("Invalid input")),
        Outcome::NotReady => Err(eyre!("Store is not ready")),
    }
}
