//! Tables: declaration, DDL and column migrations.
//!
//! ```ignore
//! let registry = TypeRegistry::with_defaults();
//! let users = Table::builder(&registry, "Users")
//!     .column::<i32>("id", Column::new().primary_key())
//!     .column::<String>("email", Column::new().not_null().unique())
//!     .field::<Option<String>>("_scratch")
//!     .build()?;
//!
//! users.create(&client, &CreateOptions::default()).await?;
//! ```

use crate::client::GenericClient;
use crate::column::{Column, ColumnRef};
use crate::condition::has_operator_suffix;
use crate::creatable::{
    CreateOptions, Creatable, DEFAULT_SCHEMA, DropOptions, ObjectKind, begin_scope, finish_scope,
};
use crate::error::{OrmError, OrmResult};
use crate::insertable::{InsertOptions, InsertRows, Insertable};
use crate::naming::normalise_name;
use crate::record::Record;
use crate::selectable::{FetchOptions, Field, Selectable};
use crate::types::{FieldType, TypeRegistry};
use crate::value::Value;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

const LIVE_COLUMNS_SQL: &str = "SELECT column_name::text FROM information_schema.columns WHERE table_schema = $1 AND table_name = $2";

/// Options for [`Table::migrate_to`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrateToOptions {
    /// Create the target table before copying rows.
    pub create_new_table: bool,
    /// Drop this table once rows are copied.
    pub drop_table: bool,
}

/// Declares a [`Table`] field by field.
#[derive(Debug)]
pub struct TableBuilder<'r> {
    registry: &'r TypeRegistry,
    schema: String,
    name: String,
    fields: Vec<(String, FieldType, Option<Column>)>,
}

impl<'r> TableBuilder<'r> {
    /// Override the local name derived from the declared name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// A field with a default column of `T`'s registered type.
    pub fn field<T: 'static>(self, name: &str) -> Self {
        self.push(name, FieldType::of::<T>(), None)
    }

    pub fn field_as(self, name: &str, field_type: impl Into<FieldType>) -> Self {
        self.push(name, field_type.into(), None)
    }

    /// A field of `T`'s registered type with an explicit column.
    pub fn column<T: 'static>(self, name: &str, column: Column) -> Self {
        self.push(name, FieldType::of::<T>(), Some(column))
    }

    pub fn column_as(self, name: &str, field_type: impl Into<FieldType>, column: Column) -> Self {
        self.push(name, field_type.into(), Some(column))
    }

    fn push(mut self, name: &str, field_type: FieldType, column: Option<Column>) -> Self {
        self.fields.push((name.to_string(), field_type, column));
        self
    }

    /// Resolve every field's type and bind its column.
    pub fn build(self) -> OrmResult<Table> {
        let qualified_name = format!("{}.{}", self.schema, self.name);
        let mut columns: Vec<Column> = Vec::with_capacity(self.fields.len());

        for (name, field_type, column) in self.fields {
            if name.starts_with('_') {
                tracing::debug!(target: "pgschema.schema", table = %qualified_name, field = %name, "skipping private field");
                continue;
            }
            check_column_name(&name)?;
            if columns.iter().any(|c| c.name() == name) {
                return Err(OrmError::invalid_name(format!(
                    "Column {name} is declared twice in {qualified_name}"
                )));
            }

            let sql_type = self.registry.resolve(&field_type)?;
            let mut column = column.unwrap_or_default();
            column.bind_to(&qualified_name, &name, sql_type)?;
            columns.push(column);
        }

        Ok(Table {
            schema: self.schema,
            local_name: self.name,
            qualified_name,
            columns: RwLock::new(columns),
        })
    }
}

pub(crate) fn check_column_name(name: &str) -> OrmResult<()> {
    if name.starts_with("or_") {
        return Err(OrmError::invalid_name(format!(
            "Column {name} cannot start with or_"
        )));
    }
    if has_operator_suffix(name) {
        return Err(OrmError::invalid_name(format!(
            "Column {name} cannot end with an operator suffix"
        )));
    }
    Ok(())
}

/// A database table.
///
/// The declared column set can change at runtime through
/// [`add_column`](Table::add_column), [`drop_column`](Table::drop_column)
/// and [`migrate`](Table::migrate).
#[derive(Debug)]
pub struct Table {
    schema: String,
    local_name: String,
    qualified_name: String,
    columns: RwLock<Vec<Column>>,
}

impl Table {
    /// Start declaring a table; `name` is normalised to snake case.
    pub fn builder<'r>(registry: &'r TypeRegistry, name: &str) -> TableBuilder<'r> {
        TableBuilder {
            registry,
            schema: DEFAULT_SCHEMA.to_string(),
            name: normalise_name(name),
            fields: Vec::new(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Column>> {
        self.columns.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Column>> {
        self.columns.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the current columns in order.
    pub fn columns(&self) -> Vec<Column> {
        self.read().clone()
    }

    pub fn column(&self, name: &str) -> Option<Column> {
        self.read().iter().find(|c| c.name() == name).cloned()
    }

    /// Foreign-key target for the column called `name`.
    pub fn reference(&self, name: &str) -> OrmResult<ColumnRef> {
        self.column(name)
            .ok_or_else(|| OrmError::unknown_column(name, &self.qualified_name))?
            .to_ref()
    }

    pub fn query_add_column(&self, column: &Column) -> OrmResult<String> {
        Ok(format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.qualified_name,
            column.render_ddl()?
        ))
    }

    pub fn query_drop_column(&self, name: &str) -> String {
        format!("ALTER TABLE {} DROP COLUMN {}", self.qualified_name, name)
    }

    /// Bind a new column to this table without recording it.
    fn adopt(&self, mut column: Column) -> OrmResult<Column> {
        if let Some(owner) = column.owner() {
            if owner != self.qualified_name {
                return Err(OrmError::invalid_argument(format!(
                    "column {} already belongs to {owner}",
                    column.name()
                )));
            }
        }
        let name = column.name().to_string();
        if name.is_empty() {
            return Err(OrmError::invalid_argument("column has no name"));
        }
        check_column_name(&name)?;
        let sql_type = column
            .sql_type()
            .cloned()
            .ok_or_else(|| OrmError::Type(format!("column {name} has no SQL type")))?;
        column.bind_to(&self.qualified_name, &name, sql_type)?;
        Ok(column)
    }

    /// `ALTER TABLE ... ADD COLUMN` and start tracking the column.
    pub async fn add_column<C: GenericClient>(&self, conn: &C, column: Column) -> OrmResult<()> {
        if self.column(column.name()).is_some() {
            return Err(OrmError::invalid_argument(format!(
                "{} already has a column {}",
                self.qualified_name,
                column.name()
            )));
        }
        let column = self.adopt(column)?;
        tracing::info!(target: "pgschema.ddl", table = %self.qualified_name, column = column.name(), "adding column");
        conn.execute(&self.query_add_column(&column)?, &[]).await?;
        self.write().push(column);
        Ok(())
    }

    /// `ALTER TABLE ... DROP COLUMN` and stop tracking the column.
    pub async fn drop_column<C: GenericClient>(&self, conn: &C, name: &str) -> OrmResult<()> {
        if self.column(name).is_none() {
            return Err(OrmError::unknown_column(name, &self.qualified_name));
        }
        tracing::info!(target: "pgschema.ddl", table = %self.qualified_name, column = name, "dropping column");
        conn.execute(&self.query_drop_column(name), &[]).await?;
        self.write().retain(|c| c.name() != name);
        Ok(())
    }

    /// Bring the table's columns in line with `columns`, matched by name.
    ///
    /// Tracked columns missing from `columns` are dropped first, then columns
    /// not yet tracked are added, one statement each.
    pub async fn migrate<C: GenericClient>(
        &self,
        conn: &C,
        columns: Vec<Column>,
        with_transaction: bool,
    ) -> OrmResult<()> {
        let tracked = self.columns();
        let drops: Vec<String> = tracked
            .iter()
            .filter(|c| !columns.iter().any(|t| t.name() == c.name()))
            .map(|c| c.name().to_string())
            .collect();
        let adds = columns
            .into_iter()
            .filter(|t| !tracked.iter().any(|c| c.name() == t.name()))
            .map(|t| self.adopt(t))
            .collect::<OrmResult<Vec<_>>>()?;

        if drops.is_empty() && adds.is_empty() {
            return Ok(());
        }
        tracing::info!(
            target: "pgschema.ddl",
            table = %self.qualified_name,
            dropped = drops.len(),
            added = adds.len(),
            "migrating"
        );

        let scope = begin_scope(conn, with_transaction).await?;
        let result: OrmResult<()> = async {
            for name in &drops {
                conn.execute(&self.query_drop_column(name), &[]).await?;
            }
            for column in &adds {
                conn.execute(&self.query_add_column(column)?, &[]).await?;
            }
            Ok(())
        }
        .await;
        finish_scope(conn, scope, result).await?;

        let mut guard = self.write();
        guard.retain(|c| !drops.iter().any(|d| d == c.name()));
        guard.extend(adds);
        Ok(())
    }

    /// Automatic migration for an existing table: track the live columns,
    /// then migrate to the declared ones.
    ///
    /// Runs without its own transaction; [`crate::creatable::create_all`]
    /// supplies one.
    pub(crate) async fn migrate_to_declared<C: GenericClient>(&self, conn: &C) -> OrmResult<()> {
        let declared = self.columns();
        let params = [
            Value::from(self.schema.as_str()),
            Value::from(self.local_name.as_str()),
        ];
        let live: Vec<String> = conn
            .query(LIVE_COLUMNS_SQL, &params)
            .await?
            .iter()
            .filter_map(|r| r.first_value().and_then(Value::as_str).map(str::to_string))
            .collect();

        let current: Vec<Column> = live
            .iter()
            .map(|name| {
                declared
                    .iter()
                    .find(|c| c.name() == name)
                    .cloned()
                    .unwrap_or_else(|| Column::existing(&self.qualified_name, name))
            })
            .collect();
        *self.write() = current;

        self.migrate(conn, declared, false).await
    }

    /// Copy this table's rows into `target`, mapping each through `migration`.
    ///
    /// When `target` has the same qualified name this is a column
    /// [`migrate`](Table::migrate) instead. Pass `std::convert::identity` to
    /// copy rows unchanged.
    pub async fn migrate_to<C, F>(
        &self,
        conn: &C,
        target: &Table,
        migration: F,
        options: MigrateToOptions,
    ) -> OrmResult<()>
    where
        C: GenericClient,
        F: Fn(Record) -> Record + Send,
    {
        if self.qualified_name == target.qualified_name {
            return self.migrate(conn, target.columns(), true).await;
        }

        if options.create_new_table {
            target.create(conn, &CreateOptions::default()).await?;
        }

        let rows = self
            .fetch(conn, &Record::new(), &FetchOptions::default())
            .await?;
        tracing::info!(target: "pgschema.ddl", from = %self.qualified_name, to = %target.qualified_name, rows = rows.len(), "copying rows");
        let records: Vec<Record> = rows.into_iter().map(migration).collect();
        target
            .insert_many(conn, InsertRows::Records(records), &InsertOptions::default())
            .await?;

        if options.drop_table {
            Creatable::drop(self, conn, &DropOptions::default()).await?;
        }
        Ok(())
    }
}

impl Selectable for Table {
    fn name(&self) -> &str {
        &self.qualified_name
    }

    fn fields(&self) -> Vec<Field> {
        self.read()
            .iter()
            .map(|c| Field::new(c.name(), c.sql_type().cloned()))
            .collect()
    }
}

impl Insertable for Table {
    fn primary_keys(&self) -> Vec<String> {
        self.read()
            .iter()
            .filter(|c| c.is_primary_key())
            .map(|c| c.name().to_string())
            .collect()
    }
}

impl Creatable for Table {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Table
    }

    fn schema(&self) -> &str {
        &self.schema
    }

    fn local_name(&self) -> &str {
        &self.local_name
    }

    fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    fn query_create(&self, if_not_exists: bool) -> OrmResult<String> {
        let columns = self.read();
        let mut parts = columns
            .iter()
            .map(Column::render_ddl)
            .collect::<OrmResult<Vec<_>>>()?;

        let unique: Vec<&str> = columns
            .iter()
            .filter(|c| c.is_unique() && !c.is_primary_key())
            .map(Column::name)
            .collect();
        if !unique.is_empty() {
            parts.push(format!("UNIQUE ({})", unique.join(", ")));
        }

        let primary: Vec<&str> = columns
            .iter()
            .filter(|c| c.is_primary_key())
            .map(Column::name)
            .collect();
        if !primary.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", primary.join(", ")));
        }

        let mut sql = String::from("CREATE TABLE ");
        if if_not_exists {
            sql.push_str("IF NOT EXISTS ");
        }
        sql.push_str(&self.qualified_name);
        sql.push_str(" ( ");
        sql.push_str(&parts.join(", "));
        sql.push_str(" )");
        Ok(sql)
    }

    fn query_create_extra(&self) -> Vec<String> {
        self.read()
            .iter()
            .filter(|c| c.is_indexed())
            .map(|c| {
                format!(
                    "CREATE INDEX IF NOT EXISTS {}_{}_idx ON {} ({})",
                    self.local_name,
                    c.name(),
                    self.qualified_name,
                    c.name()
                )
            })
            .collect()
    }

    fn as_table(&self) -> Option<&Table> {
        Some(self)
    }
}
