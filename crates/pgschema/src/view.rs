//! Views over a stored query.

use crate::creatable::{Creatable, DEFAULT_SCHEMA, ObjectKind};
use crate::error::{OrmError, OrmResult};
use crate::naming::normalise_name;
use crate::selectable::{Field, Selectable};
use crate::table::check_column_name;
use crate::types::{FieldType, SqlType, TypeRegistry};

/// An output column of a view and the expression selecting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewColumn {
    pub name: String,
    /// Defaults to the column name.
    pub select: String,
    pub sql_type: Option<SqlType>,
}

/// Declares a [`View`].
///
/// ```ignore
/// let totals = View::builder(&registry, "OrderTotals")
///     .field::<i32>("user_id")
///     .select::<i64>("total", "SUM(amount)")
///     .query("FROM public.orders GROUP BY user_id")
///     .build()?;
/// ```
#[derive(Debug)]
pub struct ViewBuilder<'r> {
    registry: &'r TypeRegistry,
    schema: String,
    name: String,
    columns: Vec<(String, Option<FieldType>, Option<String>)>,
    query: Option<String>,
}

impl<'r> ViewBuilder<'r> {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// A column selected by its own name.
    pub fn field<T: 'static>(self, name: &str) -> Self {
        self.push(name, Some(FieldType::of::<T>()), None)
    }

    pub fn field_as(self, name: &str, field_type: impl Into<FieldType>) -> Self {
        self.push(name, Some(field_type.into()), None)
    }

    /// A column selected by `expr`.
    pub fn select<T: 'static>(self, name: &str, expr: impl Into<String>) -> Self {
        self.push(name, Some(FieldType::of::<T>()), Some(expr.into()))
    }

    /// A column of unknown type selected by `expr`.
    pub fn select_untyped(self, name: &str, expr: impl Into<String>) -> Self {
        self.push(name, None, Some(expr.into()))
    }

    /// SQL following the column list, usually starting with `FROM`.
    pub fn query(mut self, body: impl Into<String>) -> Self {
        self.query = Some(body.into());
        self
    }

    fn push(mut self, name: &str, field_type: Option<FieldType>, select: Option<String>) -> Self {
        self.columns.push((name.to_string(), field_type, select));
        self
    }

    pub fn build(self) -> OrmResult<View> {
        let qualified_name = format!("{}.{}", self.schema, self.name);
        let query = self.query.ok_or_else(|| {
            OrmError::invalid_argument(format!("view {qualified_name} has no query"))
        })?;

        let mut columns: Vec<ViewColumn> = Vec::with_capacity(self.columns.len());
        for (name, field_type, select) in self.columns {
            if name.starts_with('_') {
                tracing::debug!(target: "pgschema.schema", view = %qualified_name, field = %name, "skipping private field");
                continue;
            }
            check_column_name(&name)?;
            if columns.iter().any(|c| c.name == name) {
                return Err(OrmError::invalid_name(format!(
                    "Column {name} is declared twice in {qualified_name}"
                )));
            }
            let sql_type = field_type
                .map(|t| self.registry.resolve(&t))
                .transpose()?;
            columns.push(ViewColumn {
                select: select.unwrap_or_else(|| name.clone()),
                name,
                sql_type,
            });
        }
        if columns.is_empty() {
            return Err(OrmError::invalid_argument(format!(
                "view {qualified_name} has no columns"
            )));
        }

        Ok(View {
            schema: self.schema,
            local_name: self.name,
            qualified_name,
            columns,
            query,
        })
    }
}

/// A database view.
#[derive(Debug, Clone)]
pub struct View {
    schema: String,
    local_name: String,
    qualified_name: String,
    columns: Vec<ViewColumn>,
    query: String,
}

impl View {
    pub fn builder<'r>(registry: &'r TypeRegistry, name: &str) -> ViewBuilder<'r> {
        ViewBuilder {
            registry,
            schema: DEFAULT_SCHEMA.to_string(),
            name: normalise_name(name),
            columns: Vec::new(),
            query: None,
        }
    }

    pub fn columns(&self) -> &[ViewColumn] {
        &self.columns
    }

    pub fn query(&self) -> &str {
        &self.query
    }
}

impl Selectable for View {
    fn name(&self) -> &str {
        &self.qualified_name
    }

    fn fields(&self) -> Vec<Field> {
        self.columns
            .iter()
            .map(|c| Field::new(&c.name, c.sql_type.clone()))
            .collect()
    }
}

impl Creatable for View {
    fn kind(&self) -> ObjectKind {
        ObjectKind::View
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

    /// `if_not_exists` becomes `OR REPLACE`.
    fn query_create(&self, if_not_exists: bool) -> OrmResult<String> {
        let names = self
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let selects = self
            .columns
            .iter()
            .map(|c| format!("{} AS {}", c.select, c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let replace = if if_not_exists { " OR REPLACE" } else { "" };
        Ok(format!(
            "CREATE{replace} VIEW {} ( {names} ) AS SELECT {selects} {}",
            self.qualified_name, self.query
        ))
    }
}
