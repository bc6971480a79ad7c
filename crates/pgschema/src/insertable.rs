//! Write access: INSERT, UPDATE and DELETE generation and execution.

use crate::client::GenericClient;
use crate::error::{OrmError, OrmResult};
use crate::record::Record;
use crate::selectable::Selectable;
use crate::value::Value;

/// What to do when an insert hits the primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictUpdate {
    /// `SET col = EXCLUDED.col` for each column.
    Columns(Vec<String>),
    /// Emitted verbatim after `DO UPDATE SET`.
    Raw(String),
}

/// A `RETURNING` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Returning {
    /// `RETURNING *`
    All,
    Columns(Vec<String>),
}

/// Modifiers for `INSERT`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertOptions {
    pub ignore_on_conflict: bool,
    pub update_on_conflict: Option<ConflictUpdate>,
    pub returning: Option<Returning>,
}

impl InsertOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// `ON CONFLICT DO NOTHING`
    pub fn ignore_on_conflict(mut self) -> Self {
        self.ignore_on_conflict = true;
        self
    }

    /// `ON CONFLICT (pk) DO UPDATE SET c = EXCLUDED.c, ...`
    pub fn update_on_conflict<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.update_on_conflict = Some(ConflictUpdate::Columns(
            columns.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn update_on_conflict_raw(mut self, sql: impl Into<String>) -> Self {
        self.update_on_conflict = Some(ConflictUpdate::Raw(sql.into()));
        self
    }

    pub fn returning_all(mut self) -> Self {
        self.returning = Some(Returning::All);
        self
    }

    pub fn returning<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.returning = Some(Returning::Columns(
            columns.into_iter().map(Into::into).collect(),
        ));
        self
    }
}

/// Rows for [`Insertable::insert_many`].
#[derive(Debug, Clone, PartialEq)]
pub enum InsertRows {
    /// An explicit column list and one value list per row.
    Positional {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
    /// Records sharing the first record's keys.
    Records(Vec<Record>),
}

impl InsertRows {
    fn into_positional(self) -> OrmResult<(Vec<String>, Vec<Vec<Value>>)> {
        match self {
            InsertRows::Positional { columns, rows } => Ok((columns, rows)),
            InsertRows::Records(records) => {
                let Some(first) = records.first() else {
                    return Ok((Vec::new(), Vec::new()));
                };
                let columns: Vec<String> = first.keys().map(str::to_string).collect();
                let names: Vec<&str> = columns.iter().map(String::as_str).collect();
                let rows = records
                    .iter()
                    .map(|r| {
                        r.project(&names).ok_or_else(|| {
                            OrmError::invalid_argument(
                                "every record must provide the first record's columns",
                            )
                        })
                    })
                    .collect::<OrmResult<Vec<_>>>()?;
                Ok((columns, rows))
            }
        }
    }
}

impl From<Vec<Record>> for InsertRows {
    fn from(records: Vec<Record>) -> Self {
        InsertRows::Records(records)
    }
}

/// A selectable that accepts writes.
pub trait Insertable: Selectable {
    /// Primary-key column names in declaration order.
    fn primary_keys(&self) -> Vec<String>;

    /// The primary-key subset of `record`.
    fn primary_key_values(&self, record: &Record) -> OrmResult<Record> {
        let keys = self.primary_keys();
        if keys.is_empty() {
            return Err(OrmError::invalid_argument(format!(
                "{} has no primary key",
                self.display_name()
            )));
        }
        keys.into_iter()
            .map(|k| match record.get(&k) {
                Some(v) => Ok((k, v.clone())),
                None => Err(OrmError::invalid_argument(format!(
                    "record is missing primary key column {k}"
                ))),
            })
            .collect()
    }

    /// Ensure every name is a column of this selectable.
    fn check_columns<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> OrmResult<()>
    where
        Self: Sized,
    {
        let fields = self.fields();
        for name in names {
            if !fields.iter().any(|f| f.name == name) {
                return Err(OrmError::unknown_column(name, self.display_name()));
            }
        }
        Ok(())
    }

    /// `INSERT INTO <name> (cols) VALUES ($1, ...) [ON CONFLICT ...] [RETURNING ...]`
    fn query_insert(&self, columns: &[&str], options: &InsertOptions) -> OrmResult<String>
    where
        Self: Sized,
    {
        if options.ignore_on_conflict && options.update_on_conflict.is_some() {
            return Err(OrmError::invalid_argument(
                "ignore_on_conflict and update_on_conflict are mutually exclusive",
            ));
        }
        self.check_columns(columns.iter().copied())?;

        let mut sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", self.name())
        } else {
            let placeholders = (1..=columns.len())
                .map(|i| format!("${i}"))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.name(),
                columns.join(", "),
                placeholders
            )
        };

        if options.ignore_on_conflict {
            sql.push_str(" ON CONFLICT DO NOTHING");
        } else if let Some(update) = &options.update_on_conflict {
            let keys = self.primary_keys();
            if keys.is_empty() {
                return Err(OrmError::invalid_argument(format!(
                    "{} has no primary key to resolve conflicts on",
                    self.display_name()
                )));
            }
            sql.push_str(&format!(" ON CONFLICT ({}) DO UPDATE SET ", keys.join(", ")));
            match update {
                ConflictUpdate::Columns(cols) => {
                    if cols.is_empty() {
                        return Err(OrmError::invalid_argument(
                            "update_on_conflict needs at least one column",
                        ));
                    }
                    self.check_columns(cols.iter().map(String::as_str))?;
                    let set = cols
                        .iter()
                        .map(|c| format!("{c} = EXCLUDED.{c}"))
                        .collect::<Vec<_>>()
                        .join(", ");
                    sql.push_str(&set);
                }
                ConflictUpdate::Raw(raw) => sql.push_str(raw),
            }
        }

        self.push_returning(&mut sql, options.returning.as_ref())?;
        Ok(sql)
    }

    /// `UPDATE <name> SET c = $offset, ... WHERE <clause> [RETURNING ...]`
    fn query_update(
        &self,
        where_clause: &str,
        offset: usize,
        columns: &[&str],
        returning: Option<&Returning>,
    ) -> OrmResult<String>
    where
        Self: Sized,
    {
        if columns.is_empty() {
            return Err(OrmError::invalid_argument("UPDATE requires at least one column"));
        }
        self.check_columns(columns.iter().copied())?;

        let set = columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{c} = ${}", offset + i))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!("UPDATE {} SET {}", self.name(), set);
        if !where_clause.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(where_clause);
        }
        self.push_returning(&mut sql, returning)?;
        Ok(sql)
    }

    /// `DELETE FROM <name> [WHERE <clause>] [RETURNING ...]`
    fn query_delete(
        &self,
        where_clause: Option<&str>,
        returning: Option<&Returning>,
    ) -> OrmResult<String>
    where
        Self: Sized,
    {
        let mut sql = format!("DELETE FROM {}", self.name());
        if let Some(where_clause) = where_clause.filter(|w| !w.is_empty()) {
            sql.push_str(" WHERE ");
            sql.push_str(where_clause);
        }
        self.push_returning(&mut sql, returning)?;
        Ok(sql)
    }

    #[doc(hidden)]
    fn push_returning(&self, sql: &mut String, returning: Option<&Returning>) -> OrmResult<()>
    where
        Self: Sized,
    {
        match returning {
            None => {}
            Some(Returning::All) => sql.push_str(" RETURNING *"),
            Some(Returning::Columns(cols)) if cols.is_empty() => {}
            Some(Returning::Columns(cols)) => {
                self.check_columns(cols.iter().map(String::as_str))?;
                sql.push_str(" RETURNING ");
                sql.push_str(&cols.join(", "));
            }
        }
        Ok(())
    }

    /// Insert one row.
    ///
    /// Returns the `RETURNING` row when one was requested.
    fn insert<C: GenericClient>(
        &self,
        conn: &C,
        values: &Record,
        options: &InsertOptions,
    ) -> impl std::future::Future<Output = OrmResult<Option<Record>>> + Send
    where
        Self: Sized,
    {
        async move {
            let columns: Vec<&str> = values.keys().collect();
            let sql = self.query_insert(&columns, options)?;
            let params: Vec<Value> = values.values().cloned().collect();
            if options.returning.is_some() {
                conn.query_opt(&sql, &params).await
            } else {
                conn.execute(&sql, &params).await?;
                Ok(None)
            }
        }
    }

    /// Insert many rows with one prepared statement.
    ///
    /// `options.returning` is ignored.
    fn insert_many<C: GenericClient>(
        &self,
        conn: &C,
        rows: InsertRows,
        options: &InsertOptions,
    ) -> impl std::future::Future<Output = OrmResult<u64>> + Send
    where
        Self: Sized,
    {
        async move {
            let (columns, rows) = rows.into_positional()?;
            if rows.is_empty() {
                return Ok(0);
            }
            if let Some(bad) = rows.iter().find(|r| r.len() != columns.len()) {
                return Err(OrmError::invalid_argument(format!(
                    "expected {} values per row, got {}",
                    columns.len(),
                    bad.len()
                )));
            }
            let names: Vec<&str> = columns.iter().map(String::as_str).collect();
            let options = InsertOptions {
                returning: None,
                ..options.clone()
            };
            let sql = self.query_insert(&names, &options)?;
            conn.execute_many(&sql, &rows).await
        }
    }

    /// Update rows matching a raw WHERE clause; returns the affected count.
    ///
    /// `where_values` bind `$1..$n`; the SET values follow them.
    fn update_where<C: GenericClient>(
        &self,
        conn: &C,
        where_clause: &str,
        where_values: &[Value],
        set: &Record,
    ) -> impl std::future::Future<Output = OrmResult<u64>> + Send
    where
        Self: Sized,
    {
        async move {
            let (sql, params) = self.prepare_update(where_clause, where_values, set, None)?;
            conn.execute(&sql, &params).await
        }
    }

    /// Like [`update_where`](Insertable::update_where), returning the updated rows.
    fn update_where_returning<C: GenericClient>(
        &self,
        conn: &C,
        where_clause: &str,
        where_values: &[Value],
        set: &Record,
    ) -> impl std::future::Future<Output = OrmResult<Vec<Record>>> + Send
    where
        Self: Sized,
    {
        async move {
            let (sql, params) =
                self.prepare_update(where_clause, where_values, set, Some(&Returning::All))?;
            conn.query(&sql, &params).await
        }
    }

    #[doc(hidden)]
    fn prepare_update(
        &self,
        where_clause: &str,
        where_values: &[Value],
        set: &Record,
        returning: Option<&Returning>,
    ) -> OrmResult<(String, Vec<Value>)>
    where
        Self: Sized,
    {
        let columns: Vec<&str> = set.keys().collect();
        let sql = self.query_update(where_clause, where_values.len() + 1, &columns, returning)?;
        let mut params = where_values.to_vec();
        params.extend(set.values().cloned());
        Ok((sql, params))
    }

    /// Update the row identified by `record`'s primary key.
    fn update_record<C: GenericClient>(
        &self,
        conn: &C,
        record: &Record,
        set: &Record,
    ) -> impl std::future::Future<Output = OrmResult<u64>> + Send
    where
        Self: Sized,
    {
        async move {
            let keys = self.primary_key_values(record)?;
            let clause = self.build_where_clause(&keys, 1)?;
            self.update_where(conn, &clause.sql, &clause.params, set)
                .await
        }
    }

    /// Delete rows matching a raw WHERE clause; returns the affected count.
    fn delete_where<C: GenericClient>(
        &self,
        conn: &C,
        where_clause: &str,
        values: &[Value],
    ) -> impl std::future::Future<Output = OrmResult<u64>> + Send
    where
        Self: Sized,
    {
        async move {
            let sql = self.query_delete(Some(where_clause), None)?;
            conn.execute(&sql, values).await
        }
    }

    /// Like [`delete_where`](Insertable::delete_where), returning the deleted rows.
    fn delete_where_returning<C: GenericClient>(
        &self,
        conn: &C,
        where_clause: &str,
        values: &[Value],
    ) -> impl std::future::Future<Output = OrmResult<Vec<Record>>> + Send
    where
        Self: Sized,
    {
        async move {
            let sql = self.query_delete(Some(where_clause), Some(&Returning::All))?;
            conn.query(&sql, values).await
        }
    }

    /// Delete rows matching keyword filters.
    fn delete<C: GenericClient>(
        &self,
        conn: &C,
        filters: &Record,
    ) -> impl std::future::Future<Output = OrmResult<u64>> + Send
    where
        Self: Sized,
    {
        async move {
            let clause = self.build_where_clause(filters, 1)?;
            self.delete_where(conn, &clause.sql, &clause.params).await
        }
    }

    /// Delete the row identified by `record`'s primary key.
    fn delete_record<C: GenericClient>(
        &self,
        conn: &C,
        record: &Record,
    ) -> impl std::future::Future<Output = OrmResult<u64>> + Send
    where
        Self: Sized,
    {
        async move {
            let keys = self.primary_key_values(record)?;
            self.delete(conn, &keys).await
        }
    }
}

#[cfg(test)]
mod tests;
