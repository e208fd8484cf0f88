use chrono::Utc;
use diesel::{
    dsl::not, ExpressionMethods, OptionalExtension, QueryDsl, RunQueryDsl, SelectableHelper,
};
use thiserror::Error;
use tracing::{debug, error};

use crate::{
    data::task::{NewTask, Task, TaskChanges, TaskRow},
    database::{
        self, connection::DatabaseConnection, connection::Error as ConnectionError,
        schema::tasks::dsl::tasks as tasks_table,
    },
    error::ErrorKind,
    tasks::filter::TaskFilter,
};

pub struct Tasks {
    connection: DatabaseConnection,
}

pub fn tasks(connection: DatabaseConnection) -> Tasks {
    Tasks { connection }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The operation could not be performed because the database returned an
    /// error.
    #[error("database error {0}")]
    DatabaseError(#[from] diesel::result::Error),
    /// It was not possible to establish a connection to the database.
    #[error("connection error: {0}")]
    ConnectionError(#[from] ConnectionError),
    /// The title is empty.
    #[error("task title cannot be empty")]
    EmptyTitle,
    /// The task was not found.
    #[error("task {0} not found")]
    NotFound(i32),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::EmptyTitle => ErrorKind::Validation,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::DatabaseError(_) | Error::ConnectionError(_) => ErrorKind::Store,
        }
    }
}

impl Tasks {
    /// Creates a new, not yet completed task.
    ///
    /// The category is stored as given: it is not checked to exist. An empty
    /// description is stored as no description.
    pub fn create(&self, input: &NewTask) -> Result<Task, Error> {
        self.try_create(input).inspect_err(|err| {
            error!(error = %err, title = %input.title, "task creation failed");
        })
    }

    fn try_create(&self, input: &NewTask) -> Result<Task, Error> {
        if input.title.is_empty() {
            return Err(Error::EmptyTitle);
        }

        let now = Utc::now().naive_utc();
        let row = TaskRow {
            title: &input.title,
            description: input.description.as_deref().filter(|d| !d.is_empty()),
            due_date: input.due_date,
            completed: false,
            priority: input.priority,
            category_id: input.category_id,
            created_at: now,
            updated_at: now,
        };

        let mut handle = self.connection.establish_connection()?;
        let conn = &mut *handle;
        let task: Task = diesel::insert_into(tasks_table)
            .values(&row)
            .returning(Task::as_returning())
            .get_result(conn)?;

        debug!(id = task.id, category_id = ?task.category_id, "task created");
        Ok(task)
    }

    /// Gets the task with the provided id.
    pub fn get(&self, id: i32) -> Result<Task, Error> {
        use database::schema::tasks::dsl::id as task_id;

        let mut handle = self.connection.establish_connection()?;
        let conn = &mut *handle;
        match tasks_table
            .filter(task_id.eq(id))
            .select(Task::as_select())
            .first(conn)
        {
            Err(diesel::result::Error::NotFound) => Err(Error::NotFound(id)),
            Err(err) => Err(Error::DatabaseError(err)),
            Ok(task) => Ok(task),
        }
    }

    /// List the tasks matching every predicate of `filter`, ordered by ID.
    ///
    /// Returns an error if there were problems with the database.
    pub fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>, Error> {
        use database::schema::tasks::dsl::id;

        let query = filter.apply(tasks_table.into_boxed());

        let mut handle = self.connection.establish_connection()?;
        let conn = &mut *handle;
        query
            .order(id.asc())
            .load::<Task>(conn)
            .map_err(|err| {
                error!(error = %err, ?filter, "failed to get tasks");
                Error::DatabaseError(err)
            })
    }

    /// Applies the supplied fields of `changes` to a task and refreshes its
    /// `updated_at`, even when no field was supplied.
    ///
    /// It returns [`Error::NotFound`] if the task does not exist.
    pub fn update(&self, id: i32, changes: &TaskChanges) -> Result<Task, Error> {
        self.try_update(id, changes).inspect_err(|err| {
            error!(error = %err, id, "task update failed");
        })
    }

    fn try_update(&self, id: i32, changes: &TaskChanges) -> Result<Task, Error> {
        if matches!(&changes.title, Some(title) if title.is_empty()) {
            return Err(Error::EmptyTitle);
        }

        use database::schema::tasks::dsl::id as task_id;

        let mut handle = self.connection.establish_connection()?;
        let conn = &mut *handle;
        // The timestamp is taken once the write lock is held, so commits of
        // the same task never store an older `updated_at` than the last one.
        let task: Task = conn.immediate_transaction(|conn| {
            diesel::update(tasks_table.filter(task_id.eq(id)))
                .set(changes.changeset(Utc::now().naive_utc()))
                .returning(Task::as_returning())
                .get_result(conn)
                .optional()
        })?
        .ok_or(Error::NotFound(id))?;

        debug!(id, "task updated");
        Ok(task)
    }

    /// Flips the completion state of a task and returns the updated task.
    ///
    /// The flip happens inside a single `UPDATE`, so concurrent toggles of
    /// the same task never read the same prior state.
    pub fn toggle_completion(&self, id: i32) -> Result<Task, Error> {
        self.try_toggle_completion(id).inspect_err(|err| {
            error!(error = %err, id, "task completion toggle failed");
        })
    }

    fn try_toggle_completion(&self, id: i32) -> Result<Task, Error> {
        use database::schema::tasks::dsl::{completed, id as task_id, updated_at};

        let mut handle = self.connection.establish_connection()?;
        let conn = &mut *handle;
        let task: Task = conn.immediate_transaction(|conn| {
            diesel::update(tasks_table.filter(task_id.eq(id)))
                .set((
                    completed.eq(not(completed)),
                    updated_at.eq(Utc::now().naive_utc()),
                ))
                .returning(Task::as_returning())
                .get_result(conn)
                .optional()
        })?
        .ok_or(Error::NotFound(id))?;

        debug!(id, completed = task.completed, "task completion toggled");
        Ok(task)
    }

    /// Deletes a task.
    ///
    /// Returns `false`, not an error, when there was no task with that ID.
    pub fn delete(&self, id: i32) -> Result<bool, Error> {
        use database::schema::tasks::dsl::id as task_id;

        let deleted = self
            .connection
            .establish_connection()
            .map_err(Error::from)
            .and_then(|mut conn| {
                diesel::delete(tasks_table.filter(task_id.eq(id)))
                    .execute(&mut *conn)
                    .map_err(Error::from)
            })
            .inspect_err(|err| error!(error = %err, id, "task deletion failed"))?;

        debug!(id, rows = deleted, "task deleted");
        Ok(deleted > 0)
    }
}
