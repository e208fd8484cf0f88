use chrono::NaiveDateTime;
use diesel::{AsChangeset, Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};

use super::{double_option, priority::Priority};
use crate::database::schema::tasks;

/// This represents a task.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = tasks)]
pub struct Task {
    /// The ID of the task in the database.
    pub id: i32,
    /// The title, never empty.
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDateTime>,
    pub completed: bool,
    pub priority: Priority,
    /// The category this task belongs to, if any. Nothing guarantees the
    /// category still exists.
    pub category_id: Option<i32>,
    pub created_at: NaiveDateTime,
    /// Refreshed by every update and toggle.
    pub updated_at: NaiveDateTime,
}

/// The input for creating a task.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub category_id: Option<i32>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = tasks)]
pub(crate) struct TaskRow<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub due_date: Option<NaiveDateTime>,
    pub completed: bool,
    pub priority: Priority,
    pub category_id: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// The fields of a task to change.
///
/// `None` leaves a field untouched. For the nullable fields, `Some(None)`
/// clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TaskChanges {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<NaiveDateTime>>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<i32>>,
}

/// What actually gets written for an update: the requested changes plus the
/// refreshed `updated_at`, so the changeset is never empty.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = tasks)]
pub(crate) struct TaskChangeset<'a> {
    pub title: Option<&'a str>,
    pub description: Option<Option<&'a str>>,
    pub due_date: Option<Option<NaiveDateTime>>,
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
    pub category_id: Option<Option<i32>>,
    pub updated_at: NaiveDateTime,
}

impl TaskChanges {
    pub(crate) fn changeset(&self, updated_at: NaiveDateTime) -> TaskChangeset<'_> {
        TaskChangeset {
            title: self.title.as_deref(),
            description: self.description.as_ref().map(Option::as_deref),
            due_date: self.due_date,
            completed: self.completed,
            priority: self.priority,
            category_id: self.category_id,
            updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_defaults() {
        let input: NewTask = serde_json::from_str(r#"{"title": "Ship report"}"#).unwrap();
        assert_eq!(input.title, "Ship report");
        assert_eq!(input.priority, Priority::Medium);
        assert_eq!(input.description, None);
        assert_eq!(input.category_id, None);
    }

    #[test]
    fn changes_distinguish_omitted_from_null() {
        let changes: TaskChanges =
            serde_json::from_str(r#"{"category_id": null, "priority": "high"}"#).unwrap();

        assert_eq!(changes.category_id, Some(None));
        assert_eq!(changes.priority, Some(Priority::High));
        assert_eq!(changes.description, None);
        assert_eq!(changes.due_date, None);
        assert_eq!(changes.title, None);
    }

    #[test]
    fn changes_carry_values() {
        let changes: TaskChanges =
            serde_json::from_str(r#"{"category_id": 4, "description": "notes"}"#).unwrap();

        assert_eq!(changes.category_id, Some(Some(4)));
        assert_eq!(changes.description, Some(Some("notes".to_owned())));
    }

    #[test]
    fn changeset_always_refreshes_updated_at() {
        let now = chrono::Utc::now().naive_utc();
        let changes = TaskChanges::default();

        let changeset = changes.changeset(now);
        assert_eq!(changeset.updated_at, now);
        assert_eq!(changeset.title, None);
        assert_eq!(changeset.description, None);
    }
}
