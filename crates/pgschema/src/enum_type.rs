//! PostgreSQL enum types as creatable objects.

use crate::creatable::{Creatable, ObjectKind};
use crate::error::{OrmError, OrmResult};
use crate::types::{SqlEnum, SqlType, SqlTypeKind, TypeRegistry};

/// A `CREATE TYPE ... AS ENUM` object backing a [`SqlEnum`].
#[derive(Debug, Clone)]
pub struct EnumType {
    schema: String,
    local_name: String,
    sql_type: SqlType,
}

impl EnumType {
    /// The enum type derived for `E` in `registry`.
    pub fn of<E: SqlEnum>(registry: &TypeRegistry) -> Self {
        Self {
            schema: E::SCHEMA.to_string(),
            local_name: E::TYPE_NAME.to_string(),
            sql_type: registry.derive_from_enum::<E>(),
        }
    }

    /// Wrap an already derived enum type.
    pub fn from_sql_type(sql_type: SqlType) -> OrmResult<Self> {
        match sql_type.kind() {
            SqlTypeKind::Enum {
                schema, local_name, ..
            } => Ok(Self {
                schema: schema.clone(),
                local_name: local_name.clone(),
                sql_type: sql_type.clone(),
            }),
            _ => Err(OrmError::Type(format!("{sql_type} is not an enum type"))),
        }
    }

    pub fn sql_type(&self) -> &SqlType {
        &self.sql_type
    }

    pub fn labels(&self) -> &[String] {
        self.sql_type.labels()
    }
}

impl Creatable for EnumType {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Type
    }

    fn schema(&self) -> &str {
        &self.schema
    }

    fn local_name(&self) -> &str {
        &self.local_name
    }

    fn qualified_name(&self) -> &str {
        self.sql_type.name()
    }

    /// PostgreSQL has no `CREATE TYPE IF NOT EXISTS`; an existing type is
    /// looked up before creating instead.
    fn query_create(&self, _if_not_exists: bool) -> OrmResult<String> {
        let labels = self
            .labels()
            .iter()
            .map(|l| format!("'{}'", l.replace('\'', "''")))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!(
            "CREATE TYPE {} AS ENUM ( {labels} )",
            self.qualified_name()
        ))
    }
}
