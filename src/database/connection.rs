use diesel::{
    connection::SimpleConnection, sql_query, sqlite::SqliteConnection, Connection, RunQueryDsl,
};
use std::{
    fmt, fs,
    ops::{Deref, DerefMut},
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use thiserror::Error;
use tracing::{debug, info};

const MAIN_DATABASE_FILE_NAME: &str = "tasks.db";
const DATA_DIRECTORY_NAME: &str = "task-tracker";
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const MEMORY_LOCATION: &str = ":memory:";

const SCHEMA: &str = include_str!("../../migrations/schema.sql");

/// Errors that can be returned by this module.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A connection to the database could not be established.
    #[error("cannot connect to database {0}")]
    ConnectionError(#[from] diesel::ConnectionError),
    /// The connection was established but could not be configured, or the
    /// schema could not be created.
    #[error("database setup failed: {0}")]
    SetupError(#[from] diesel::result::Error),
    /// The provided path is invalid, e.g. it is empty.
    #[error("invalid path provided")]
    InvalidPath,
    /// The provided path is not a directory.
    #[error("provided path is not a directory")]
    NotADirectory,
    /// The provided database name is not valid.
    #[error("provided database name is not valid")]
    InvalidName,
    /// No data directory is known for the current platform.
    #[error("no data directory available")]
    NoDataDirectory,
    /// The data directory could not be created.
    #[error("cannot create data directory: {0}")]
    Io(#[from] std::io::Error),
}

/// This represents the location of the database.
pub enum DatabaseLocation<'a> {
    /// Path means that the database is in a `.db` file inside the computer.
    /// The first parameter is the path to the directory that contains the
    /// database file, and the second is the name of the file. In case the
    /// latter is `None` then the default one - `tasks.db` - will be used.
    Path(&'a str, Option<&'a str>),
    /// URL defines the url of the database. `:memory:` and `mode=memory`
    /// URIs are treated like [`DatabaseLocation::Memory`].
    URL(&'a str),
    /// The default `tasks.db` inside a `task-tracker` directory in the
    /// platform data directory, e.g. `~/.local/share/task-tracker` on Linux.
    /// The directory is created if missing.
    Default,
    /// A private in-memory database. It lives as long as any clone of the
    /// [`DatabaseConnection`] does.
    Memory,
}

#[derive(Clone)]
enum Store {
    File(String),
    // An in-memory database disappears with the connection that opened it,
    // so every operation goes through this one.
    Memory(Arc<Mutex<SqliteConnection>>),
}

/// This represents a database connection.
///
/// For file databases it only holds the location and settings, and every
/// operation opens its own SQLite connection. In-memory databases keep a
/// single connection that operations take turns on. Either way a value can
/// be cloned and shared between threads freely.
#[derive(Clone)]
pub struct DatabaseConnection {
    store: Store,
    busy_timeout: Duration,
}

/// A live SQLite connection, either opened for one operation or borrowed
/// from an in-memory store.
pub(crate) enum SqliteHandle<'a> {
    Owned(SqliteConnection),
    Shared(MutexGuard<'a, SqliteConnection>),
}

impl Deref for SqliteHandle<'_> {
    type Target = SqliteConnection;

    fn deref(&self) -> &SqliteConnection {
        match self {
            SqliteHandle::Owned(conn) => conn,
            SqliteHandle::Shared(conn) => conn,
        }
    }
}

impl DerefMut for SqliteHandle<'_> {
    fn deref_mut(&mut self) -> &mut SqliteConnection {
        match self {
            SqliteHandle::Owned(conn) => conn,
            SqliteHandle::Shared(conn) => conn,
        }
    }
}

impl fmt::Debug for DatabaseConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConnection")
            .field("location", &self.location())
            .field("busy_timeout", &self.busy_timeout)
            .finish()
    }
}

impl DatabaseConnection {
    /// New returns a new database connection that can be passed to all the
    /// other structures in this crate for performing operations on the
    /// database.
    ///
    /// The database connection can be established either via a file, via
    /// URL, via the platform data directory, or in memory.
    ///
    /// It returns an error in case the path is invalid, is not a directory,
    /// or if an in-memory database cannot be opened.
    pub fn new(location: DatabaseLocation) -> Result<Self, Error> {
        let store = match location {
            DatabaseLocation::Path(dir, name) => Store::File(database_file(Path::new(dir), name)?),
            DatabaseLocation::URL(url) => {
                if url.trim().is_empty() {
                    return Err(Error::InvalidPath);
                }
                if is_memory_url(url) {
                    memory_store(url)?
                } else {
                    Store::File(url.to_owned())
                }
            }
            DatabaseLocation::Default => {
                let dir = dirs_next::data_dir()
                    .ok_or(Error::NoDataDirectory)?
                    .join(DATA_DIRECTORY_NAME);
                fs::create_dir_all(&dir)?;
                Store::File(database_file(&dir, None)?)
            }
            DatabaseLocation::Memory => memory_store(MEMORY_LOCATION)?,
        };

        Ok(Self {
            store,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        })
    }

    /// Sets how long a connection waits on a locked database before giving
    /// up with a "database is locked" error.
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Creates the `categories` and `tasks` tables if they do not exist yet.
    ///
    /// It is safe to call this on every start-up.
    pub fn initialize(&self) -> Result<(), Error> {
        let mut conn = self.establish_connection()?;
        if let Store::File(_) = self.store {
            conn.batch_execute("PRAGMA journal_mode = WAL;")?;
        }
        conn.batch_execute(SCHEMA)?;
        info!(location = %self.location(), "database schema ready");
        Ok(())
    }

    /// Checks that the database can be reached and answers queries.
    pub fn health_check(&self) -> Result<(), Error> {
        let mut conn = self.establish_connection()?;
        sql_query("SELECT 1").execute(&mut *conn)?;
        Ok(())
    }

    fn location(&self) -> &str {
        match &self.store {
            Store::File(location) => location,
            Store::Memory(_) => MEMORY_LOCATION,
        }
    }

    pub(crate) fn establish_connection(&self) -> Result<SqliteHandle<'_>, Error> {
        match &self.store {
            Store::File(location) => {
                let mut conn = SqliteConnection::establish(location)?;
                conn.batch_execute(&format!(
                    "PRAGMA busy_timeout = {};",
                    self.busy_timeout.as_millis()
                ))?;
                debug!(location = %location, "connection established");
                Ok(SqliteHandle::Owned(conn))
            }
            Store::Memory(conn) => Ok(SqliteHandle::Shared(
                conn.lock().unwrap_or_else(PoisonError::into_inner),
            )),
        }
    }
}

fn is_memory_url(url: &str) -> bool {
    url == MEMORY_LOCATION || url.contains("mode=memory")
}

fn memory_store(url: &str) -> Result<Store, Error> {
    let conn = SqliteConnection::establish(url)?;
    debug!(location = %url, "in-memory database opened");
    Ok(Store::Memory(Arc::new(Mutex::new(conn))))
}

fn database_file(dir: &Path, name: Option<&str>) -> Result<String, Error> {
    if dir.as_os_str().is_empty() {
        return Err(Error::InvalidPath);
    }

    if !dir.is_dir() {
        return Err(Error::NotADirectory);
    }

    let database_name = match name {
        None => MAIN_DATABASE_FILE_NAME,
        Some(val) => {
            if val.is_empty() {
                return Err(Error::InvalidName);
            } else {
                val
            }
        }
    };

    dir.join(database_name)
        .to_str()
        .map(str::to_owned)
        .ok_or(Error::InvalidPath)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn empty_path_is_rejected() {
        assert_matches!(
            DatabaseConnection::new(DatabaseLocation::Path("", None)),
            Err(Error::InvalidPath)
        );
    }

    #[test]
    fn file_path_is_not_a_directory() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();

        assert_matches!(
            DatabaseConnection::new(DatabaseLocation::Path(path, None)),
            Err(Error::NotADirectory)
        );
    }

    #[test]
    fn empty_database_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_str().unwrap();

        assert_matches!(
            DatabaseConnection::new(DatabaseLocation::Path(path, Some(""))),
            Err(Error::InvalidName)
        );
    }

    #[test]
    fn default_file_name_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_str().unwrap();

        let connection = DatabaseConnection::new(DatabaseLocation::Path(path, None)).unwrap();
        assert!(connection.location().ends_with(MAIN_DATABASE_FILE_NAME));
    }

    #[test]
    fn initialize_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_str().unwrap();

        let connection = DatabaseConnection::new(DatabaseLocation::Path(path, None)).unwrap();
        connection.initialize().unwrap();
        connection.initialize().unwrap();
        connection.health_check().unwrap();
    }

    #[test]
    fn in_memory_url_answers_health_check() {
        let connection = DatabaseConnection::new(DatabaseLocation::URL(":memory:")).unwrap();
        connection.health_check().unwrap();
    }

    #[test]
    fn in_memory_schema_outlives_initialize() {
        use crate::database::schema::categories;
        use diesel::dsl::count_star;
        use diesel::QueryDsl;

        let connection = DatabaseConnection::new(DatabaseLocation::URL(":memory:")).unwrap();
        connection.initialize().unwrap();

        let clone = connection.clone();
        let mut conn = clone.establish_connection().unwrap();
        let count: i64 = categories::table
            .select(count_star())
            .get_result(&mut *conn)
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn memory_databases_are_private() {
        let first = DatabaseConnection::new(DatabaseLocation::Memory).unwrap();
        let second = DatabaseConnection::new(DatabaseLocation::Memory).unwrap();
        first.initialize().unwrap();

        let mut conn = second.establish_connection().unwrap();
        assert!(sql_query("SELECT id FROM categories")
            .execute(&mut *conn)
            .is_err());
    }
}
