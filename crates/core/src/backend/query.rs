//! Table queries.

/// Sort direction for [`Query::order_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// A read against one remote table.
///
/// Supports the subset of the hosted query language the application needs:
/// column selection, equality and not-null filters, a single sort key and a
/// row limit.
///
/// ```
/// use elvora_core::backend::{Direction, Query};
///
/// let latest = Query::table("orders")
///     .select("order_number")
///     .order_by("order_number", Direction::Descending)
///     .limit(1);
/// assert_eq!(latest.table_name(), "orders");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    table: String,
    columns: String,
    filters: Vec<(String, String)>,
    non_null: Vec<String>,
    order: Option<(String, Direction)>,
    limit: Option<usize>,
}

impl Query {
    /// Select every column of `table`.
    #[must_use]
    pub fn table(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: "*".to_string(),
            filters: Vec::new(),
            non_null: Vec::new(),
            order: None,
            limit: None,
        }
    }

    /// Restrict the returned columns (comma-separated, `*` for all).
    #[must_use]
    pub fn select(mut self, columns: &str) -> Self {
        self.columns = columns.to_string();
        self
    }

    /// Keep rows whose `column` equals `value` (compared as text).
    #[must_use]
    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters.push((column.to_string(), value.to_string()));
        self
    }

    /// Keep rows where `column` is present and not null.
    #[must_use]
    pub fn not_null(mut self, column: &str) -> Self {
        self.non_null.push(column.to_string());
        self
    }

    /// Sort by `column`.
    #[must_use]
    pub fn order_by(mut self, column: &str, direction: Direction) -> Self {
        self.order = Some((column.to_string(), direction));
        self
    }

    /// Return at most `n` rows.
    #[must_use]
    pub const fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn columns(&self) -> &str {
        &self.columns
    }

    #[must_use]
    pub fn filters(&self) -> &[(String, String)] {
        &self.filters
    }

    #[must_use]
    pub fn non_null_columns(&self) -> &[String] {
        &self.non_null
    }

    #[must_use]
    pub fn ordering(&self) -> Option<(&str, Direction)> {
        self.order.as_ref().map(|(c, d)| (c.as_str(), *d))
    }

    #[must_use]
    pub const fn row_limit(&self) -> Option<usize> {
        self.limit
    }
}
