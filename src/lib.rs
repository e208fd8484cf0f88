//! Personal task tracking: tasks with a priority, an optional due date and
//! an optional category, stored in SQLite.
//!
//! Open the store with [`DatabaseConnection`], then hand a clone of it to
//! [`categories`] and [`tasks`] to get the two services.
//!
//! ```no_run
//! use task_tracker::{categories, tasks, DatabaseConnection, DatabaseLocation, NewTask};
//!
//! let connection = DatabaseConnection::new(DatabaseLocation::Default)?;
//! connection.initialize()?;
//!
//! let task = tasks(connection.clone()).create(&NewTask {
//!     title: "Ship report".into(),
//!     ..Default::default()
//! })?;
//! let task = tasks(connection).toggle_completion(task.id)?;
//! assert!(task.completed);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod data;
pub mod database;
pub mod error;
pub mod tasks;

pub use data::{
    category::{Category, CategoryChanges, NewCategory},
    priority::Priority,
    task::{NewTask, Task, TaskChanges},
};
pub use database::connection::{DatabaseConnection, DatabaseLocation};
pub use error::ErrorKind;
pub use tasks::{
    category::{categories, Categories},
    filter::TaskFilter,
    tasks::{tasks, Tasks},
};
