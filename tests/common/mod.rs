#![allow(dead_code)]

use task_tracker::{
    categories, tasks, Categories, Category, DatabaseConnection, DatabaseLocation, NewCategory,
    NewTask, Priority, Task, Tasks,
};
use tempfile::TempDir;

/// A fresh database in its own temporary directory. The directory is removed
/// when the value is dropped.
pub struct TestDb {
    _dir: TempDir,
    pub connection: DatabaseConnection,
}

impl TestDb {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("temporary directory");
        let path = dir.path().to_str().expect("utf-8 temporary path").to_owned();
        let connection =
            DatabaseConnection::new(DatabaseLocation::Path(&path, None)).expect("connection");
        connection.initialize().expect("schema");
        Self {
            _dir: dir,
            connection,
        }
    }

    pub fn categories(&self) -> Categories {
        categories(self.connection.clone())
    }

    pub fn tasks(&self) -> Tasks {
        tasks(self.connection.clone())
    }

    pub fn category(&self, name: &str, color: Option<&str>) -> Category {
        self.categories()
            .create(&NewCategory {
                name: name.to_owned(),
                color: color.map(str::to_owned),
            })
            .expect("category")
    }

    pub fn task(&self, title: &str, priority: Priority, category_id: Option<i32>) -> Task {
        self.tasks()
            .create(&NewTask {
                title: title.to_owned(),
                priority,
                category_id,
                ..Default::default()
            })
            .expect("task")
    }
}
