use chrono::NaiveDateTime;
use diesel::{AsChangeset, Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};

use super::double_option;
use crate::database::schema::categories;

/// This represents a category that tasks can be grouped under.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = categories)]
pub struct Category {
    /// The id of this category.
    pub id: i32,
    /// The name of this category.
    pub name: String,
    /// The color to display, free-form (usually hex).
    pub color: Option<String>,
    /// When the category was created, in UTC.
    pub created_at: NaiveDateTime,
}

/// The input for creating a category.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = categories)]
pub(crate) struct CategoryRow<'a> {
    pub name: &'a str,
    pub color: Option<&'a str>,
    pub created_at: NaiveDateTime,
}

/// The fields of a category to change.
///
/// `None` leaves a field untouched. For `color`, `Some(None)` clears the
/// stored value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, AsChangeset)]
#[diesel(table_name = categories)]
pub struct CategoryChanges {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub color: Option<Option<String>>,
}

impl CategoryChanges {
    /// Whether no field was supplied at all.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.color.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omitted_color_is_left_alone() {
        let changes: CategoryChanges = serde_json::from_str(r#"{"name": "Home"}"#).unwrap();
        assert_eq!(changes.name.as_deref(), Some("Home"));
        assert_eq!(changes.color, None);
    }

    #[test]
    fn null_color_is_cleared() {
        let changes: CategoryChanges = serde_json::from_str(r#"{"color": null}"#).unwrap();
        assert_eq!(changes.name, None);
        assert_eq!(changes.color, Some(None));
    }

    #[test]
    fn empty_changes() {
        let changes: CategoryChanges = serde_json::from_str("{}").unwrap();
        assert!(changes.is_empty());
    }
}
