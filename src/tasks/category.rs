use chrono::Utc;
use diesel::{
    dsl::count_star, ExpressionMethods, OptionalExtension, QueryDsl, RunQueryDsl,
    SelectableHelper,
};
use thiserror::Error;
use tracing::{debug, error};

use crate::{
    data::category::{Category, CategoryChanges, CategoryRow, NewCategory},
    database::{
        self,
        connection::DatabaseConnection,
        schema::{categories::dsl::categories as categories_table, tasks},
    },
    error::ErrorKind,
};

/// Categories contains the operations on task categories.
pub struct Categories {
    connection: DatabaseConnection,
}

/// This returns a new instance of the `Categories` struct that can be used to
/// perform operations on categories on the database.
pub fn categories(connection: DatabaseConnection) -> Categories {
    Categories { connection }
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
    ConnectionError(#[from] database::connection::Error),
    /// The name is empty.
    #[error("category name cannot be empty")]
    EmptyName,
    /// No category has the given ID.
    #[error("category {0} not found")]
    NotFound(i32),
    /// The category is still referenced by at least one task.
    #[error("category has assigned tasks")]
    HasAssignedTasks,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::EmptyName => ErrorKind::Validation,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::HasAssignedTasks => ErrorKind::Conflict,
            Error::DatabaseError(_) | Error::ConnectionError(_) => ErrorKind::Store,
        }
    }
}

impl Categories {
    /// Creates a new category.
    ///
    /// It returns an error if the name is empty or if there was an error on
    /// the database.
    pub fn create(&self, input: &NewCategory) -> Result<Category, Error> {
        self.try_create(input).inspect_err(|err| {
            error!(error = %err, name = %input.name, "category creation failed");
        })
    }

    fn try_create(&self, input: &NewCategory) -> Result<Category, Error> {
        if input.name.is_empty() {
            return Err(Error::EmptyName);
        }

        let row = CategoryRow {
            name: &input.name,
            color: input.color.as_deref(),
            created_at: Utc::now().naive_utc(),
        };

        let mut handle = self.connection.establish_connection()?;
        let conn = &mut *handle;
        let category: Category = diesel::insert_into(categories_table)
            .values(&row)
            .returning(Category::as_returning())
            .get_result(conn)?;

        debug!(id = category.id, "category created");
        Ok(category)
    }

    /// Gets the category with the provided id.
    pub fn get(&self, id: i32) -> Result<Category, Error> {
        use database::schema::categories::dsl::id as category_id;

        let mut handle = self.connection.establish_connection()?;
        let conn = &mut *handle;
        categories_table
            .filter(category_id.eq(id))
            .select(Category::as_select())
            .first(conn)
            .optional()?
            .ok_or(Error::NotFound(id))
    }

    /// List all categories, in the order they were created.
    ///
    /// It returns an error in case there are problems getting the list from
    /// the database.
    pub fn list(&self) -> Result<Vec<Category>, Error> {
        use database::schema::categories::dsl::id;

        let mut handle = self.connection.establish_connection()?;
        let conn = &mut *handle;
        categories_table
            .order(id.asc())
            .select(Category::as_select())
            .load(conn)
            .map_err(|err| {
                error!(error = %err, "failed to list categories");
                Error::DatabaseError(err)
            })
    }

    /// Changes the name and/or the color of a category. Fields that are not
    /// supplied keep their value.
    ///
    /// It returns an error if a supplied name is empty, if the category does
    /// not exist, or if there was an error on the database.
    pub fn update(&self, id: i32, changes: &CategoryChanges) -> Result<Category, Error> {
        self.try_update(id, changes).inspect_err(|err| {
            error!(error = %err, id, "category update failed");
        })
    }

    fn try_update(&self, id: i32, changes: &CategoryChanges) -> Result<Category, Error> {
        if matches!(&changes.name, Some(name) if name.is_empty()) {
            return Err(Error::EmptyName);
        }

        // Diesel refuses an empty changeset, and there is nothing to write.
        if changes.is_empty() {
            return self.get(id);
        }

        use database::schema::categories::dsl::id as category_id;

        let mut handle = self.connection.establish_connection()?;
        let conn = &mut *handle;
        let category: Category = diesel::update(categories_table.filter(category_id.eq(id)))
            .set(changes)
            .returning(Category::as_returning())
            .get_result(conn)
            .optional()?
            .ok_or(Error::NotFound(id))?;

        debug!(id, "category updated");
        Ok(category)
    }

    /// Deletes a category.
    ///
    /// Tasks are never detached automatically: it returns
    /// [`Error::HasAssignedTasks`] while any task still points at the
    /// category, and [`Error::NotFound`] if it does not exist.
    pub fn delete(&self, id: i32) -> Result<(), Error> {
        self.try_delete(id).inspect_err(|err| {
            error!(error = %err, id, "category deletion failed");
        })
    }

    fn try_delete(&self, id: i32) -> Result<(), Error> {
        use database::schema::categories::dsl::id as category_id;

        let mut handle = self.connection.establish_connection()?;
        let conn = &mut *handle;
        // IMMEDIATE takes the write lock up front, so no task can be assigned
        // between the count and the delete.
        conn.immediate_transaction::<_, Error, _>(|conn| {
            let exists = categories_table
                .filter(category_id.eq(id))
                .select(category_id)
                .first::<i32>(conn)
                .optional()?
                .is_some();
            if !exists {
                return Err(Error::NotFound(id));
            }

            let assigned: i64 = tasks::table
                .filter(tasks::category_id.eq(id))
                .select(count_star())
                .get_result(conn)?;
            if assigned > 0 {
                return Err(Error::HasAssignedTasks);
            }

            diesel::delete(categories_table.filter(category_id.eq(id))).execute(conn)?;
            Ok(())
        })?;

        debug!(id, "category deleted");
        Ok(())
    }
}
