//! Read access shared by tables, views and joins.
//!
//! Filters are passed as a [`Record`] whose keys name columns, optionally
//! with an operator suffix and an `or_` prefix:
//!
//! ```ignore
//! let rows = users
//!     .fetch(&client, &record! { "age__ge" => 18, "or_name__ilike" => "a%" }, &FetchOptions::default())
//!     .await?;
//! // SELECT * FROM public.users WHERE (age >= $1 OR name ILIKE $2)
//! ```

use crate::client::GenericClient;
use crate::condition::{OnClauses, Operator};
use crate::error::{OrmError, OrmResult};
use crate::join::{Join, JoinKind};
use crate::record::Record;
use crate::types::SqlType;
use crate::value::Value;
use std::fmt;

/// A column as seen by queries: its name and, when known, its SQL type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub sql_type: Option<SqlType>,
}

impl Field {
    pub fn new(name: impl Into<String>, sql_type: Option<SqlType>) -> Self {
        Self {
            name: name.into(),
            sql_type,
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        })
    }
}

/// `ORDER BY` target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderBy {
    Column(String, Direction),
    /// Emitted verbatim after `ORDER BY`.
    Raw(String),
}

/// Modifiers for fetch queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    pub limit: Option<u64>,
    pub order_by: Option<OrderBy>,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy::Column(column.into(), direction));
        self
    }

    pub fn order_by_raw(mut self, sql: impl Into<String>) -> Self {
        self.order_by = Some(OrderBy::Raw(sql.into()));
        self
    }
}

/// A rendered WHERE clause and the parameters it consumes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WhereClause {
    pub sql: String,
    pub params: Vec<Value>,
}

impl WhereClause {
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

/// Something rows can be selected from.
pub trait Selectable: Send + Sync {
    /// The `FROM` target: a qualified name, or a join's parenthesized body.
    fn name(&self) -> &str;

    /// Short name for error messages.
    fn display_name(&self) -> &str {
        self.name()
    }

    /// Alias already carried by the `FROM` target, if any.
    fn alias(&self) -> Option<&str> {
        None
    }

    /// Output columns in order.
    fn fields(&self) -> Vec<Field>;

    fn field(&self, name: &str) -> Option<Field> {
        self.fields().into_iter().find(|f| f.name == name)
    }

    /// Render keyword filters as a WHERE clause.
    ///
    /// Placeholders start at `$first_param`. For `n` clauses the result opens
    /// `n - 1` parentheses and closes one after every clause but the first,
    /// so clauses combine left to right: `((a = $1 AND b = $2) OR c = $3)`.
    /// Null values render `IS NULL` / `IS NOT NULL` and consume no parameter.
    fn build_where_clause(&self, filters: &Record, first_param: usize) -> OrmResult<WhereClause> {
        let fields = self.fields();
        let mut clause = WhereClause::default();
        if filters.is_empty() {
            return Ok(clause);
        }

        clause.sql.push_str(&"(".repeat(filters.len() - 1));
        let mut param = first_param;

        for (i, (key, value)) in filters.iter().enumerate() {
            let first = i == 0;
            let (key, is_or) = match key.strip_prefix("or_") {
                Some(rest) if !fields.iter().any(|f| f.name == key) => {
                    if first {
                        return Err(OrmError::invalid_name(
                            "Query cannot accept OR as first clause",
                        ));
                    }
                    (rest, true)
                }
                _ => (key, false),
            };

            if !first {
                clause.sql.push_str(if is_or { " OR " } else { " AND " });
            }

            let (name, operator) = split_operator(key, &fields)?;
            let field = fields
                .iter()
                .find(|f| f.name == name)
                .ok_or_else(|| OrmError::unknown_column(name, self.display_name()))?;

            if value.is_null() {
                let symbol = operator.null_symbol().ok_or_else(|| {
                    OrmError::invalid_name(format!(
                        "Unknown null operator {} for column {}",
                        operator.suffix(),
                        name
                    ))
                })?;
                clause.sql.push_str(&format!("{name} {symbol}"));
            } else if operator == Operator::In {
                if !matches!(value, Value::Array(_)) {
                    return Err(OrmError::invalid_argument(format!(
                        "{name}__in expects an array value, got {}",
                        value.kind_name()
                    )));
                }
                let sql_type = field.sql_type.as_ref().ok_or_else(|| {
                    OrmError::invalid_argument(format!("column {name} has no known SQL type"))
                })?;
                clause
                    .sql
                    .push_str(&format!("{name} = any(${param}::{}[])", sql_type.name()));
                clause.params.push(value.clone());
                param += 1;
            } else {
                clause
                    .sql
                    .push_str(&format!("{name} {} ${param}", operator.symbol()));
                clause.params.push(value.clone());
                param += 1;
            }

            if !first {
                clause.sql.push(')');
            }
        }

        Ok(clause)
    }

    /// `SELECT * FROM <name> [WHERE ...] [ORDER BY ...] [LIMIT n]`
    fn query_fetch(&self, where_clause: Option<&str>, options: &FetchOptions) -> OrmResult<String> {
        let mut sql = format!("SELECT * FROM {}", self.name());
        if let Some(where_clause) = where_clause.filter(|w| !w.is_empty()) {
            sql.push_str(" WHERE ");
            sql.push_str(where_clause);
        }
        match &options.order_by {
            Some(OrderBy::Column(column, direction)) => {
                if self.field(column).is_none() {
                    return Err(OrmError::unknown_column(column, self.display_name()));
                }
                sql.push_str(&format!(" ORDER BY {column} {direction}"));
            }
            Some(OrderBy::Raw(raw)) => {
                sql.push_str(" ORDER BY ");
                sql.push_str(raw);
            }
            None => {}
        }
        if let Some(limit) = options.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        Ok(sql)
    }

    /// Fetch rows matching keyword filters.
    fn fetch<C: GenericClient>(
        &self,
        conn: &C,
        filters: &Record,
        options: &FetchOptions,
    ) -> impl std::future::Future<Output = OrmResult<Vec<Record>>> + Send
    where
        Self: Sized,
    {
        async move {
            let clause = self.build_where_clause(filters, 1)?;
            let sql = self.query_fetch(Some(&clause.sql), options)?;
            conn.query(&sql, &clause.params).await
        }
    }

    /// Fetch rows matching a raw WHERE clause.
    fn fetch_where<C: GenericClient>(
        &self,
        conn: &C,
        where_clause: &str,
        values: &[Value],
        options: &FetchOptions,
    ) -> impl std::future::Future<Output = OrmResult<Vec<Record>>> + Send
    where
        Self: Sized,
    {
        async move {
            let sql = self.query_fetch(Some(where_clause), options)?;
            conn.query(&sql, values).await
        }
    }

    /// Fetch the first row matching keyword filters.
    fn fetch_row<C: GenericClient>(
        &self,
        conn: &C,
        filters: &Record,
    ) -> impl std::future::Future<Output = OrmResult<Option<Record>>> + Send
    where
        Self: Sized,
    {
        async move {
            let clause = self.build_where_clause(filters, 1)?;
            let sql = self.query_fetch(Some(&clause.sql), &FetchOptions::default())?;
            conn.query_opt(&sql, &clause.params).await
        }
    }

    /// Fetch the first row matching a raw WHERE clause.
    fn fetch_row_where<C: GenericClient>(
        &self,
        conn: &C,
        where_clause: &str,
        values: &[Value],
    ) -> impl std::future::Future<Output = OrmResult<Option<Record>>> + Send
    where
        Self: Sized,
    {
        async move {
            let sql = self.query_fetch(Some(where_clause), &FetchOptions::default())?;
            conn.query_opt(&sql, values).await
        }
    }

    /// First column of the first row matching keyword filters.
    fn fetch_value<C: GenericClient>(
        &self,
        conn: &C,
        filters: &Record,
    ) -> impl std::future::Future<Output = OrmResult<Option<Value>>> + Send
    where
        Self: Sized,
    {
        async move {
            let row = self.fetch_row(conn, filters).await?;
            Ok(row.and_then(|r| r.first_value().cloned()))
        }
    }

    /// First column of the first row matching a raw WHERE clause.
    fn fetch_value_where<C: GenericClient>(
        &self,
        conn: &C,
        where_clause: &str,
        values: &[Value],
    ) -> impl std::future::Future<Output = OrmResult<Option<Value>>> + Send
    where
        Self: Sized,
    {
        async move {
            let row = self.fetch_row_where(conn, where_clause, values).await?;
            Ok(row.and_then(|r| r.first_value().cloned()))
        }
    }

    fn inner_join(&self, other: &dyn Selectable, on: impl Into<OnClauses>) -> OrmResult<Join>
    where
        Self: Sized,
    {
        Join::new(self, other, JoinKind::Inner, on.into())
    }

    fn left_join(&self, other: &dyn Selectable, on: impl Into<OnClauses>) -> OrmResult<Join>
    where
        Self: Sized,
    {
        Join::new(self, other, JoinKind::Left, on.into())
    }

    fn right_join(&self, other: &dyn Selectable, on: impl Into<OnClauses>) -> OrmResult<Join>
    where
        Self: Sized,
    {
        Join::new(self, other, JoinKind::Right, on.into())
    }

    fn full_outer_join(&self, other: &dyn Selectable, on: impl Into<OnClauses>) -> OrmResult<Join>
    where
        Self: Sized,
    {
        Join::new(self, other, JoinKind::FullOuter, on.into())
    }
}

/// Split `name__op` into the column name and operator.
///
/// A key that is itself a column name is never split.
fn split_operator<'a>(key: &'a str, fields: &[Field]) -> OrmResult<(&'a str, Operator)> {
    if fields.iter().any(|f| f.name == key) {
        return Ok((key, Operator::Eq));
    }
    match key.rsplit_once("__") {
        Some((name, suffix)) => match Operator::parse(suffix) {
            Some(operator) => Ok((name, operator)),
            None => Err(OrmError::invalid_name(format!("Unknown operator {suffix}"))),
        },
        None => Ok((key, Operator::Eq)),
    }
}
