//! Derived tables built by joining two selectables.

use crate::condition::{OnClauses, Operator};
use crate::error::{OrmError, OrmResult};
use crate::naming::generate_alias;
use crate::selectable::{Field, Selectable};
use crate::types::SqlType;

/// SQL join kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    FullOuter,
}

impl JoinKind {
    pub fn as_sql(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER",
            JoinKind::Left => "LEFT",
            JoinKind::Right => "RIGHT",
            JoinKind::FullOuter => "FULL OUTER",
        }
    }
}

/// A join output column and the alias of the source it is drawn from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinColumn {
    pub name: String,
    pub source_alias: String,
    pub sql_type: Option<SqlType>,
}

/// Two selectables joined on one or more column comparisons.
///
/// A `Join` is itself [`Selectable`], so it can be fetched from or joined
/// again. Nested joins keep their alias instead of being re-aliased.
#[derive(Debug, Clone)]
pub struct Join {
    alias: String,
    kind: JoinKind,
    body: String,
    columns: Vec<JoinColumn>,
}

fn fresh_alias(taken: &[&str]) -> String {
    loop {
        let alias = generate_alias();
        if !taken.contains(&alias.as_str()) {
            return alias;
        }
    }
}

fn source_alias(source: &dyn Selectable, taken: &[&str]) -> String {
    source
        .alias()
        .map(str::to_string)
        .unwrap_or_else(|| fresh_alias(taken))
}

fn from_target(source: &dyn Selectable, alias: &str) -> String {
    match source.alias() {
        Some(_) => source.name().to_string(),
        None => format!("{} AS {}", source.name(), alias),
    }
}

fn require_field(source: &dyn Selectable, fields: &[Field], name: &str) -> OrmResult<()> {
    if fields.iter().any(|f| f.name == name) {
        Ok(())
    } else {
        Err(OrmError::unknown_column(name, source.display_name()))
    }
}

impl Join {
    pub(crate) fn new(
        left: &dyn Selectable,
        right: &dyn Selectable,
        kind: JoinKind,
        on: OnClauses,
    ) -> OrmResult<Self> {
        if on.0.is_empty() {
            return Err(OrmError::invalid_argument("a join needs at least one ON clause"));
        }

        let left_fields = left.fields();
        let right_fields = right.fields();

        for clause in &on.0 {
            if clause.operator == Operator::In {
                return Err(OrmError::invalid_argument(
                    "the in operator cannot be used in a join condition",
                ));
            }
            require_field(left, &left_fields, &clause.left)?;
            require_field(right, &right_fields, &clause.right)?;
        }

        let left_alias = source_alias(left, &[]);
        let right_alias = source_alias(right, &[&left_alias]);
        let alias = fresh_alias(&[&left_alias, &right_alias]);

        let mut columns: Vec<JoinColumn> = left_fields
            .into_iter()
            .map(|f| JoinColumn {
                name: f.name,
                source_alias: left_alias.clone(),
                sql_type: f.sql_type,
            })
            .collect();
        for field in right_fields {
            if columns.iter().any(|c| c.name == field.name) {
                continue;
            }
            columns.push(JoinColumn {
                name: field.name,
                source_alias: right_alias.clone(),
                sql_type: field.sql_type,
            });
        }

        let select = columns
            .iter()
            .map(|c| format!("{}.{} AS {}", c.source_alias, c.name, c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let condition = on
            .0
            .iter()
            .map(|c| {
                format!(
                    "{}.{} {} {}.{}",
                    left_alias,
                    c.left,
                    c.operator.symbol(),
                    right_alias,
                    c.right
                )
            })
            .collect::<Vec<_>>()
            .join(" AND ");

        let body = format!(
            "( SELECT {select} FROM {} {} JOIN {} ON {condition} ) AS {alias}",
            from_target(left, &left_alias),
            kind.as_sql(),
            from_target(right, &right_alias),
        );

        Ok(Self {
            alias,
            kind,
            body,
            columns,
        })
    }

    pub fn kind(&self) -> JoinKind {
        self.kind
    }

    pub fn columns(&self) -> &[JoinColumn] {
        &self.columns
    }
}

impl Selectable for Join {
    fn name(&self) -> &str {
        &self.body
    }

    fn display_name(&self) -> &str {
        &self.alias
    }

    fn alias(&self) -> Option<&str> {
        Some(&self.alias)
    }

    fn fields(&self) -> Vec<Field> {
        self.columns
            .iter()
            .map(|c| Field::new(&c.name, c.sql_type.clone()))
            .collect()
    }
}
