//! DDL for schema objects: create, drop, existence checks and export.

use crate::client::GenericClient;
use crate::error::{OrmError, OrmResult};
use crate::table::Table;
use crate::value::Value;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for savepoint names.
static SAVEPOINT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Schema used when none is given.
pub const DEFAULT_SCHEMA: &str = "public";

/// The kind of database object a [`Creatable`] manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Table,
    View,
    Type,
}

impl ObjectKind {
    pub fn as_sql(self) -> &'static str {
        match self {
            ObjectKind::Table => "TABLE",
            ObjectKind::View => "VIEW",
            ObjectKind::Type => "TYPE",
        }
    }

    /// Existence probe taking `$1 = schema`, `$2 = local name`.
    pub fn exists_query(self) -> &'static str {
        match self {
            ObjectKind::Table => {
                "SELECT EXISTS (SELECT FROM information_schema.tables WHERE table_schema = $1 AND table_name = $2)"
            }
            ObjectKind::View => {
                "SELECT EXISTS (SELECT FROM information_schema.views WHERE table_schema = $1 AND table_name = $2)"
            }
            ObjectKind::Type => {
                "SELECT EXISTS (SELECT FROM pg_catalog.pg_type t JOIN pg_catalog.pg_namespace n ON n.oid = t.typnamespace WHERE n.nspname = $1 AND t.typname = $2)"
            }
        }
    }
}

/// Options for [`Creatable::create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateOptions {
    /// Tolerate an existing object. Defaults to `true`.
    pub if_not_exists: bool,
    /// Create the owning schema first. Defaults to `true`.
    pub create_schema: bool,
    /// Bring an existing table's columns in line with the declaration
    /// instead of creating it. Defaults to `false`.
    pub automatic_migrations: bool,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            if_not_exists: true,
            create_schema: true,
            automatic_migrations: false,
        }
    }
}

impl CreateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn if_not_exists(mut self, value: bool) -> Self {
        self.if_not_exists = value;
        self
    }

    pub fn create_schema(mut self, value: bool) -> Self {
        self.create_schema = value;
        self
    }

    pub fn automatic_migrations(mut self, value: bool) -> Self {
        self.automatic_migrations = value;
        self
    }
}

/// Options for [`Creatable::drop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropOptions {
    /// Defaults to `true`.
    pub if_exists: bool,
    /// Defaults to `false`.
    pub cascade: bool,
}

impl Default for DropOptions {
    fn default() -> Self {
        Self {
            if_exists: true,
            cascade: false,
        }
    }
}

impl DropOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn if_exists(mut self, value: bool) -> Self {
        self.if_exists = value;
        self
    }

    pub fn cascade(mut self) -> Self {
        self.cascade = true;
        self
    }
}

/// Options for [`Creatable::export`] and [`export_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    /// Defaults to `false`.
    pub if_not_exists: bool,
    /// Prefix `CREATE SCHEMA` for objects outside the default schema.
    /// Defaults to `true`.
    pub export_schema: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            if_not_exists: false,
            export_schema: true,
        }
    }
}

/// Options for [`create_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateAllOptions {
    pub create: CreateOptions,
    /// Run everything atomically: `BEGIN`/`COMMIT`, or a savepoint when the
    /// client is already a transaction. Defaults to `true`.
    pub with_transaction: bool,
}

impl Default for CreateAllOptions {
    fn default() -> Self {
        Self {
            create: CreateOptions::default(),
            with_transaction: true,
        }
    }
}

/// A database object that can be created and dropped.
pub trait Creatable: Send + Sync {
    fn kind(&self) -> ObjectKind;

    fn schema(&self) -> &str;

    fn local_name(&self) -> &str;

    /// `schema.local_name`
    fn qualified_name(&self) -> &str;

    /// The `CREATE` statement.
    fn query_create(&self, if_not_exists: bool) -> OrmResult<String>;

    /// Statements run after `CREATE`, such as index creation.
    fn query_create_extra(&self) -> Vec<String> {
        Vec::new()
    }

    fn query_create_schema(&self, if_not_exists: bool) -> String {
        if if_not_exists {
            format!("CREATE SCHEMA IF NOT EXISTS {}", self.schema())
        } else {
            format!("CREATE SCHEMA {}", self.schema())
        }
    }

    fn query_drop(&self, if_exists: bool, cascade: bool) -> String {
        let mut sql = format!("DROP {}", self.kind().as_sql());
        if if_exists {
            sql.push_str(" IF EXISTS");
        }
        sql.push(' ');
        sql.push_str(self.qualified_name());
        if cascade {
            sql.push_str(" CASCADE");
        }
        sql
    }

    /// The table behind this object, when it is one.
    fn as_table(&self) -> Option<&Table> {
        None
    }

    /// `CREATE SCHEMA` statement terminated with `;`.
    fn export_schema(&self, if_not_exists: bool) -> String {
        format!("{};", self.query_create_schema(if_not_exists))
    }

    /// The DDL creating this object, terminated with `;`.
    fn export(&self, options: ExportOptions) -> OrmResult<String> {
        let mut output = String::new();
        if options.export_schema && self.schema() != DEFAULT_SCHEMA {
            output.push_str(&self.export_schema(options.if_not_exists));
            output.push_str("\n\n");
        }
        output.push_str(&self.query_create(options.if_not_exists)?);
        output.push(';');
        for extra in self.query_create_extra() {
            output.push('\n');
            output.push_str(&extra);
            output.push(';');
        }
        Ok(output)
    }

    /// Write [`export`](Creatable::export) output to `path`.
    fn export_to_file(&self, path: &Path, options: ExportOptions) -> OrmResult<()> {
        std::fs::write(path, self.export(options)?)?;
        Ok(())
    }

    fn create<C: GenericClient>(
        &self,
        conn: &C,
        options: &CreateOptions,
    ) -> impl std::future::Future<Output = OrmResult<()>> + Send
    where
        Self: Sized,
    {
        create_object(conn, self, *options)
    }

    fn create_schema<C: GenericClient>(
        &self,
        conn: &C,
        if_not_exists: bool,
    ) -> impl std::future::Future<Output = OrmResult<()>> + Send
    where
        Self: Sized,
    {
        async move {
            conn.execute(&self.query_create_schema(if_not_exists), &[])
                .await?;
            Ok(())
        }
    }

    fn drop<C: GenericClient>(
        &self,
        conn: &C,
        options: &DropOptions,
    ) -> impl std::future::Future<Output = OrmResult<()>> + Send
    where
        Self: Sized,
    {
        async move {
            tracing::info!(target: "pgschema.ddl", object = self.qualified_name(), "dropping");
            conn.execute(&self.query_drop(options.if_exists, options.cascade), &[])
                .await?;
            Ok(())
        }
    }

    fn exists<C: GenericClient>(
        &self,
        conn: &C,
    ) -> impl std::future::Future<Output = OrmResult<bool>> + Send
    where
        Self: Sized,
    {
        object_exists(conn, self)
    }
}

pub(crate) async fn object_exists<C: GenericClient>(
    conn: &C,
    object: &dyn Creatable,
) -> OrmResult<bool> {
    let params = [
        Value::from(object.schema()),
        Value::from(object.local_name()),
    ];
    let row = conn.query_opt(object.kind().exists_query(), &params).await?;
    Ok(row
        .and_then(|r| r.first_value().and_then(Value::as_bool))
        .unwrap_or(false))
}

async fn create_object<C: GenericClient>(
    conn: &C,
    object: &dyn Creatable,
    options: CreateOptions,
) -> OrmResult<()> {
    if options.create_schema {
        conn.execute(&object.query_create_schema(options.if_not_exists), &[])
            .await?;
    }

    if options.automatic_migrations {
        if let Some(table) = object.as_table() {
            if object_exists(conn, object).await? {
                return table.migrate_to_declared(conn).await;
            }
        }
    }

    // CREATE TYPE has no IF NOT EXISTS form; a failed CREATE would abort an open transaction.
    if object.kind() == ObjectKind::Type
        && options.if_not_exists
        && object_exists(conn, object).await?
    {
        tracing::debug!(target: "pgschema.ddl", object = object.qualified_name(), "type already exists");
        return Ok(());
    }

    tracing::info!(target: "pgschema.ddl", object = object.qualified_name(), kind = object.kind().as_sql(), "creating");
    conn.execute(&object.query_create(options.if_not_exists)?, &[])
        .await?;

    for extra in object.query_create_extra() {
        conn.execute(&extra, &[]).await?;
    }
    Ok(())
}

/// The unit a multi-statement operation runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Scope {
    Unwrapped,
    /// `BEGIN` ... `COMMIT`
    Transaction,
    /// `SAVEPOINT` ... `RELEASE SAVEPOINT` inside the caller's transaction.
    Savepoint(String),
}

/// Open a scope: a savepoint when `conn` is already a transaction,
/// otherwise `BEGIN`.
pub(crate) async fn begin_scope<C: GenericClient>(conn: &C, enabled: bool) -> OrmResult<Scope> {
    if !enabled {
        return Ok(Scope::Unwrapped);
    }
    if conn.in_transaction() {
        let name = format!(
            "pgschema_sp_{}",
            SAVEPOINT_COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        conn.execute(&format!("SAVEPOINT {name}"), &[]).await?;
        Ok(Scope::Savepoint(name))
    } else {
        conn.execute("BEGIN", &[]).await?;
        Ok(Scope::Transaction)
    }
}

/// Commit or roll back `scope`, passing `result` through.
pub(crate) async fn finish_scope<C: GenericClient, T>(
    conn: &C,
    scope: Scope,
    result: OrmResult<T>,
) -> OrmResult<T> {
    let (commit, rollback, label) = match scope {
        Scope::Unwrapped => return result,
        Scope::Transaction => ("COMMIT".to_string(), "ROLLBACK".to_string(), "rollback"),
        Scope::Savepoint(name) => (
            format!("RELEASE SAVEPOINT {name}"),
            format!("ROLLBACK TO SAVEPOINT {name}"),
            "savepoint rollback",
        ),
    };
    match result {
        Ok(value) => {
            conn.execute(&commit, &[]).await?;
            Ok(value)
        }
        Err(err) => match conn.execute(&rollback, &[]).await {
            Ok(_) => Err(err),
            Err(rollback_err) => Err(OrmError::Other(format!(
                "{err} ({label} failed: {rollback_err})"
            ))),
        },
    }
}

/// Distinct schemas of `objects`, in first-seen order.
fn distinct_schemas<'a>(objects: &[&'a dyn Creatable]) -> Vec<&'a dyn Creatable> {
    let mut seen: Vec<&str> = Vec::new();
    let mut out = Vec::new();
    for object in objects {
        if !seen.contains(&object.schema()) {
            seen.push(object.schema());
            out.push(*object);
        }
    }
    out
}

/// Create every object in order, creating each distinct schema once first.
pub async fn create_all<C: GenericClient>(
    conn: &C,
    objects: &[&dyn Creatable],
    options: CreateAllOptions,
) -> OrmResult<()> {
    let scope = begin_scope(conn, options.with_transaction).await?;

    let result: OrmResult<()> = async {
        if options.create.create_schema {
            for object in distinct_schemas(objects) {
                conn.execute(
                    &object.query_create_schema(options.create.if_not_exists),
                    &[],
                )
                .await?;
            }
        }
        let per_object = CreateOptions {
            create_schema: false,
            ..options.create
        };
        for object in objects {
            create_object(conn, *object, per_object).await?;
        }
        Ok(())
    }
    .await;

    finish_scope(conn, scope, result).await
}

/// Export every object, with each non-default schema exported once up front.
pub fn export_all(objects: &[&dyn Creatable], options: ExportOptions) -> OrmResult<String> {
    let mut output = String::new();
    if options.export_schema {
        for object in distinct_schemas(objects) {
            if object.schema() != DEFAULT_SCHEMA {
                output.push_str(&object.export_schema(options.if_not_exists));
                output.push_str("\n\n");
            }
        }
    }
    let per_object = ExportOptions {
        export_schema: false,
        ..options
    };
    for object in objects {
        output.push_str(&object.export(per_object)?);
        output.push_str("\n\n");
    }
    Ok(output)
}

#[cfg(test)]
mod tests;
