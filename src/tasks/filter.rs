use diesel::{sqlite::Sqlite, ExpressionMethods, QueryDsl};
use serde::Deserialize;

use crate::{data::priority::Priority, database::schema::tasks};

/// Equality predicates for listing tasks. Every supplied field must match;
/// an empty filter matches every task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct TaskFilter {
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub category_id: Option<i32>,
    #[serde(default)]
    pub priority: Option<Priority>,
}

impl TaskFilter {
    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    pub fn category(mut self, category_id: i32) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Narrows `query` down to the tasks matching this filter.
    pub(crate) fn apply<'a>(
        &self,
        mut query: tasks::BoxedQuery<'a, Sqlite>,
    ) -> tasks::BoxedQuery<'a, Sqlite> {
        if let Some(completed) = self.completed {
            query = query.filter(tasks::completed.eq(completed));
        }
        if let Some(category_id) = self.category_id {
            query = query.filter(tasks::category_id.eq(category_id));
        }
        if let Some(priority) = self.priority {
            query = query.filter(tasks::priority.eq(priority));
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::debug_query;

    #[test]
    fn empty_filter_adds_no_predicate() {
        let query = TaskFilter::default().apply(tasks::table.into_boxed());
        let sql = debug_query::<Sqlite, _>(&query).to_string();
        assert!(!sql.contains("WHERE"), "{sql}");
    }

    #[test]
    fn predicates_are_anded() {
        let filter = TaskFilter::default()
            .priority(Priority::High)
            .category(3);
        let query = filter.apply(tasks::table.into_boxed());
        let sql = debug_query::<Sqlite, _>(&query).to_string();

        assert!(sql.contains("`tasks`.`category_id` = ?"), "{sql}");
        assert!(sql.contains("`tasks`.`priority` = ?"), "{sql}");
        assert!(sql.contains(" AND "), "{sql}");
        assert!(!sql.contains("`tasks`.`completed` = ?"), "{sql}");
    }

    #[test]
    fn deserializes_partial_filter() {
        let filter: TaskFilter = serde_json::from_str(r#"{"completed": true}"#).unwrap();
        assert_eq!(filter, TaskFilter::default().completed(true));
    }
}
