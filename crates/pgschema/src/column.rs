//! Column descriptors.

use crate::error::{OrmError, OrmResult};
use crate::types::SqlType;
use crate::value::Value;

/// A column default: a literal value or raw SQL.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnDefault {
    /// Rendered as a literal of the value's kind.
    Value(Value),
    /// Emitted verbatim, e.g. `now()`.
    Sql(String),
}

impl ColumnDefault {
    fn render(&self) -> String {
        match self {
            ColumnDefault::Value(v) => v.to_sql_literal(),
            ColumnDefault::Sql(sql) => sql.clone(),
        }
    }
}

/// Target of a foreign-key reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    /// Qualified table name.
    pub table: String,
    pub column: String,
    pub sql_type: SqlType,
}

/// A table column and its constraints.
///
/// Built with the chained setters and handed to a table builder, which binds
/// the field name, owning table and resolved type onto it.
///
/// ```ignore
/// let id = Column::new().primary_key();
/// let email = Column::new().not_null().unique();
/// let owner = Column::new().references(users.reference("id")?).cascade();
/// ```
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    owner: Option<String>,
    sql_type: Option<SqlType>,
    primary_key: bool,
    index: bool,
    nullable: bool,
    unique: bool,
    cascade: bool,
    default: Option<ColumnDefault>,
    references: Option<ColumnRef>,
}

impl Default for Column {
    fn default() -> Self {
        Self {
            name: String::new(),
            owner: None,
            sql_type: None,
            primary_key: false,
            index: false,
            nullable: true,
            unique: false,
            cascade: false,
            default: None,
            references: None,
        }
    }
}

impl Column {
    pub fn new() -> Self {
        Self::default()
    }

    /// A named, typed column not yet owned by any table.
    pub fn create(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type: Some(sql_type),
            ..Self::default()
        }
    }

    /// A column found in the database but not declared; only ever dropped.
    pub(crate) fn existing(owner: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            owner: Some(owner.to_string()),
            ..Self::default()
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn index(mut self) -> Self {
        self.index = true;
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn not_null(self) -> Self {
        self.nullable(false)
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Cascade deletes and updates of the referenced row.
    pub fn cascade(mut self) -> Self {
        self.cascade = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(ColumnDefault::Value(value.into()));
        self
    }

    pub fn default_sql(mut self, sql: impl Into<String>) -> Self {
        self.default = Some(ColumnDefault::Sql(sql.into()));
        self
    }

    pub fn references(mut self, target: ColumnRef) -> Self {
        self.references = Some(target);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Qualified name of the owning table, once bound.
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn sql_type(&self) -> Option<&SqlType> {
        self.sql_type.as_ref()
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn is_indexed(&self) -> bool {
        self.index
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn is_cascade(&self) -> bool {
        self.cascade
    }

    pub fn default_expr(&self) -> Option<&ColumnDefault> {
        self.default.as_ref()
    }

    pub fn reference(&self) -> Option<&ColumnRef> {
        self.references.as_ref()
    }

    /// Finalize name, owner and type.
    ///
    /// Fails with [`OrmError::TypeMismatch`] when the column references a
    /// column of another type, unless that column auto-increments.
    pub(crate) fn bind_to(
        &mut self,
        owner: &str,
        name: &str,
        sql_type: SqlType,
    ) -> OrmResult<()> {
        if let Some(target) = &self.references {
            if target.sql_type != sql_type && !target.sql_type.auto_increment() {
                return Err(OrmError::TypeMismatch {
                    column: format!("{owner}.{name}"),
                    expected: target.sql_type.name().to_string(),
                    found: sql_type.name().to_string(),
                });
            }
        }
        self.name = name.to_string();
        self.owner = Some(owner.to_string());
        self.sql_type = Some(sql_type);
        Ok(())
    }

    /// A reference to this column, for use as a foreign-key target.
    pub fn to_ref(&self) -> OrmResult<ColumnRef> {
        match (&self.owner, &self.sql_type) {
            (Some(owner), Some(sql_type)) => Ok(ColumnRef {
                table: owner.clone(),
                column: self.name.clone(),
                sql_type: sql_type.clone(),
            }),
            _ => Err(OrmError::invalid_argument(format!(
                "column {} is not bound to a table",
                self.name
            ))),
        }
    }

    /// The column definition as used in `CREATE TABLE` and `ADD COLUMN`.
    pub fn render_ddl(&self) -> OrmResult<String> {
        let sql_type = self
            .sql_type
            .as_ref()
            .ok_or_else(|| OrmError::Type(format!("column {} has no SQL type", self.name)))?;

        let mut ddl = format!("{} {}", self.name, sql_type.name());
        if !self.nullable {
            ddl.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default {
            ddl.push_str(&format!(" DEFAULT ({})", default.render()));
        }
        if let Some(target) = &self.references {
            ddl.push_str(&format!(" REFERENCES {}({})", target.table, target.column));
            if self.cascade {
                ddl.push_str(" ON DELETE CASCADE ON UPDATE CASCADE");
            }
        }
        Ok(ddl)
    }
}
