//! SQL type descriptors and the registry mapping Rust types onto them.
//!
//! A [`TypeRegistry`] interns [`SqlType`]s by name, so every `INTEGER` handed
//! out by one registry is the same instance. It also records the default SQL
//! type for native Rust types and derives enum types from [`SqlEnum`]
//! implementations.

use crate::error::{OrmError, OrmResult};
use crate::value::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::IpAddr;
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

/// Names of the builtin SQL types the registry knows how to use.
pub mod builtin {
    pub const INTEGER: &str = "INTEGER";
    pub const SMALLINT: &str = "SMALLINT";
    pub const BIGINT: &str = "BIGINT";
    pub const SERIAL: &str = "SERIAL";
    pub const SMALLSERIAL: &str = "SMALLSERIAL";
    pub const BIGSERIAL: &str = "BIGSERIAL";
    pub const REAL: &str = "REAL";
    pub const FLOAT: &str = "FLOAT";
    pub const DOUBLE_PRECISION: &str = "DOUBLE PRECISION";
    pub const NUMERIC: &str = "NUMERIC";
    pub const MONEY: &str = "MONEY";
    pub const CHARACTER: &str = "CHARACTER";
    pub const VARCHAR: &str = "CHARACTER VARYING";
    pub const TEXT: &str = "TEXT";
    pub const BYTEA: &str = "BYTEA";
    pub const TIMESTAMP: &str = "TIMESTAMP";
    pub const TIMESTAMPTZ: &str = "TIMESTAMP WITH TIME ZONE";
    pub const DATE: &str = "DATE";
    pub const TIME: &str = "TIME";
    pub const INTERVAL: &str = "INTERVAL";
    pub const BOOLEAN: &str = "BOOLEAN";
    pub const CIDR: &str = "CIDR";
    pub const INET: &str = "INET";
    pub const MACADDR: &str = "MACADDR";
    pub const UUID: &str = "UUID";
    pub const JSON: &str = "JSON";
    pub const JSONB: &str = "JSONB";

    pub(crate) const AUTO_INCREMENT: [&str; 3] = [SERIAL, SMALLSERIAL, BIGSERIAL];
}

/// What kind of SQL type a [`SqlType`] names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlTypeKind {
    /// A type the server provides.
    Builtin,
    /// `ELEM[]`
    Array(SqlType),
    /// A user-declared `CREATE TYPE ... AS ENUM`.
    Enum {
        schema: String,
        local_name: String,
        labels: Vec<String>,
    },
}

#[derive(Debug)]
struct SqlTypeInner {
    name: String,
    kind: SqlTypeKind,
}

/// A named SQL type.
///
/// Cheap to clone; two `SqlType`s are equal when their names are.
#[derive(Clone)]
pub struct SqlType(Arc<SqlTypeInner>);

impl SqlType {
    fn new(name: impl Into<String>, kind: SqlTypeKind) -> Self {
        Self(Arc::new(SqlTypeInner {
            name: name.into(),
            kind,
        }))
    }

    /// The name as written in DDL (`INTEGER`, `TEXT[]`, `public.mood`).
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn kind(&self) -> &SqlTypeKind {
        &self.0.kind
    }

    pub fn is_array(&self) -> bool {
        matches!(self.0.kind, SqlTypeKind::Array(_))
    }

    /// Element type of an array type.
    pub fn element(&self) -> Option<&SqlType> {
        match &self.0.kind {
            SqlTypeKind::Array(element) => Some(element),
            _ => None,
        }
    }

    pub fn is_enum(&self) -> bool {
        matches!(self.0.kind, SqlTypeKind::Enum { .. })
    }

    /// Enum labels in declaration order; empty for non-enum types.
    pub fn labels(&self) -> &[String] {
        match &self.0.kind {
            SqlTypeKind::Enum { labels, .. } => labels,
            _ => &[],
        }
    }

    /// Whether the type is an auto-incrementing integer (`SERIAL` and friends).
    ///
    /// Foreign keys referencing such a column may use the plain integer type.
    pub fn auto_increment(&self) -> bool {
        builtin::AUTO_INCREMENT.contains(&self.name())
    }

    /// Whether two handles point at the same interned instance.
    pub fn ptr_eq(&self, other: &SqlType) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for SqlType {
    fn eq(&self, other: &Self) -> bool {
        self.0.name == other.0.name
    }
}

impl Eq for SqlType {}

impl Hash for SqlType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
    }
}

impl fmt::Debug for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SqlType({})", self.0.name)
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

/// A Rust enumeration stored as a PostgreSQL enum type.
///
/// Usually implemented through [`sql_enum!`](crate::sql_enum).
pub trait SqlEnum: Sized + Send + Sync + 'static {
    /// Type name, without schema.
    const TYPE_NAME: &'static str;
    /// Schema owning the type.
    const SCHEMA: &'static str = "public";

    /// All labels in declaration order.
    fn labels() -> &'static [&'static str];

    fn label(&self) -> &'static str;

    fn from_label(label: &str) -> Option<Self>;

    fn to_value(&self) -> Value {
        Value::Text(self.label().to_string())
    }

    fn from_value(value: &Value) -> OrmResult<Self> {
        let label = value
            .as_str()
            .ok_or_else(|| OrmError::Other(format!("expected {} label", Self::TYPE_NAME)))?;
        Self::from_label(label).ok_or_else(|| {
            OrmError::Other(format!("unknown {} label '{}'", Self::TYPE_NAME, label))
        })
    }
}

/// Declare a Rust enum mapped onto a PostgreSQL enum type.
///
/// ```ignore
/// sql_enum! {
///     pub enum Mood as "mood" {
///         Happy => "happy",
///         Sad => "sad",
///     }
/// }
/// ```
///
/// An optional `in "schema"` after the type name overrides the schema.
#[macro_export]
macro_rules! sql_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident as $sql_name:literal $(in $schema:literal)? {
            $($variant:ident => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant),+
        }

        impl $crate::SqlEnum for $name {
            const TYPE_NAME: &'static str = $sql_name;
            $(const SCHEMA: &'static str = $schema;)?

            fn labels() -> &'static [&'static str] {
                &[$($label),+]
            }

            fn label(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }

            fn from_label(label: &str) -> Option<Self> {
                match label {
                    $($label => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl From<$name> for $crate::Value {
            fn from(v: $name) -> Self {
                <$name as $crate::SqlEnum>::to_value(&v)
            }
        }

        impl $crate::FromValue for $name {
            fn from_value(value: $crate::Value) -> $crate::OrmResult<Self> {
                <$name as $crate::SqlEnum>::from_value(&value)
            }
        }
    };
}

/// The declared type of a schema field, resolved to a [`SqlType`] when the
/// schema is built.
#[derive(Debug, Clone)]
pub enum FieldType {
    /// A native Rust type looked up in the registry.
    Native { id: TypeId, name: &'static str },
    /// An explicit SQL type.
    Sql(SqlType),
    /// A SQL type referred to by name before it is otherwise known.
    Named(String),
    /// An enumeration; the registry derives its type on first use.
    Enum(fn(&TypeRegistry) -> SqlType),
    /// An array of the inner type. Lists cannot nest.
    List(Box<FieldType>),
}

impl FieldType {
    pub fn of<T: 'static>() -> Self {
        FieldType::Native {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn sql(sql_type: SqlType) -> Self {
        FieldType::Sql(sql_type)
    }

    pub fn named(name: impl Into<String>) -> Self {
        FieldType::Named(name.into())
    }

    pub fn enumeration<E: SqlEnum>() -> Self {
        FieldType::Enum(TypeRegistry::derive_from_enum::<E>)
    }

    pub fn list(inner: FieldType) -> Self {
        FieldType::List(Box::new(inner))
    }

    pub fn list_of<T: 'static>() -> Self {
        Self::list(Self::of::<T>())
    }
}

impl From<SqlType> for FieldType {
    fn from(sql_type: SqlType) -> Self {
        FieldType::Sql(sql_type)
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    by_name: HashMap<String, SqlType>,
    defaults: HashMap<TypeId, SqlType>,
    list_defaults: HashMap<TypeId, SqlType>,
    enums: HashMap<TypeId, SqlType>,
}

/// Interns SQL types and maps native types onto them.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    inner: RwLock<RegistryInner>,
}

impl TypeRegistry {
    /// An empty registry; nothing resolves until registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the standard native type mappings.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register_default::<i16>(&registry.sql_type(builtin::SMALLINT));
        registry.register_default::<i32>(&registry.sql_type(builtin::INTEGER));
        registry.register_default::<i64>(&registry.sql_type(builtin::BIGINT));
        registry.register_default::<f32>(&registry.sql_type(builtin::REAL));
        registry.register_default::<f64>(&registry.sql_type(builtin::FLOAT));
        registry.register_default::<Decimal>(&registry.sql_type(builtin::NUMERIC));
        registry.register_default::<String>(&registry.sql_type(builtin::TEXT));
        registry.register_default::<&'static str>(&registry.sql_type(builtin::TEXT));
        registry.register_default::<Vec<u8>>(&registry.sql_type(builtin::BYTEA));
        registry.register_default::<NaiveDateTime>(&registry.sql_type(builtin::TIMESTAMP));
        registry.register_default::<DateTime<Utc>>(&registry.sql_type(builtin::TIMESTAMPTZ));
        registry.register_default::<NaiveDate>(&registry.sql_type(builtin::DATE));
        registry.register_default::<NaiveTime>(&registry.sql_type(builtin::TIME));
        registry.register_default::<bool>(&registry.sql_type(builtin::BOOLEAN));
        registry.register_default::<IpAddr>(&registry.sql_type(builtin::INET));
        registry.register_default::<Uuid>(&registry.sql_type(builtin::UUID));
        registry.register_default::<serde_json::Value>(&registry.sql_type(builtin::JSONB));
        registry
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// The interned type called `name`, created on first request.
    ///
    /// A trailing `[]` yields the array of the interned element type.
    pub fn sql_type(&self, name: &str) -> SqlType {
        if let Some(existing) = self.read().by_name.get(name) {
            return existing.clone();
        }
        if let Some(element) = name.strip_suffix("[]") {
            let element = self.sql_type(element);
            return self.array_of(&element);
        }
        self.intern(name, SqlTypeKind::Builtin)
    }

    fn intern(&self, name: &str, kind: SqlTypeKind) -> SqlType {
        self.write()
            .by_name
            .entry(name.to_string())
            .or_insert_with(|| SqlType::new(name, kind))
            .clone()
    }

    /// The interned `ELEM[]` type.
    pub fn array_of(&self, element: &SqlType) -> SqlType {
        let name = format!("{}[]", element.name());
        self.intern(&name, SqlTypeKind::Array(element.clone()))
    }

    /// Record `sql_type` as the default for `T`.
    ///
    /// Also registers the list variant: `Vec<T>` and list-of-`T` fields map to
    /// `sql_type[]`.
    pub fn register_default<T: 'static>(&self, sql_type: &SqlType) {
        let array = self.array_of(sql_type);
        let mut inner = self.write();
        inner.defaults.insert(TypeId::of::<T>(), sql_type.clone());
        inner.defaults.insert(TypeId::of::<Vec<T>>(), array.clone());
        inner.list_defaults.insert(TypeId::of::<T>(), array);
    }

    /// The default SQL type of `T`.
    pub fn lookup<T: 'static>(&self) -> OrmResult<SqlType> {
        self.lookup_id(TypeId::of::<T>(), type_name::<T>())
    }

    /// The default SQL type of a list of `T`.
    pub fn lookup_list<T: 'static>(&self) -> OrmResult<SqlType> {
        self.lookup_list_id(TypeId::of::<T>(), type_name::<T>())
    }

    fn lookup_id(&self, id: TypeId, name: &str) -> OrmResult<SqlType> {
        self.read()
            .defaults
            .get(&id)
            .cloned()
            .ok_or_else(|| OrmError::UnknownType(name.to_string()))
    }

    fn lookup_list_id(&self, id: TypeId, name: &str) -> OrmResult<SqlType> {
        self.read()
            .list_defaults
            .get(&id)
            .cloned()
            .ok_or_else(|| OrmError::UnknownType(format!("list of {name}")))
    }

    /// The enum type for `E`, created once and memoized.
    pub fn derive_from_enum<E: SqlEnum>(&self) -> SqlType {
        let id = TypeId::of::<E>();
        if let Some(existing) = self.read().enums.get(&id) {
            return existing.clone();
        }

        let name = format!("{}.{}", E::SCHEMA, E::TYPE_NAME);
        let sql_type = self.intern(
            &name,
            SqlTypeKind::Enum {
                schema: E::SCHEMA.to_string(),
                local_name: E::TYPE_NAME.to_string(),
                labels: E::labels().iter().map(|l| l.to_string()).collect(),
            },
        );
        self.register_default::<E>(&sql_type);
        self.write()
            .enums
            .entry(id)
            .or_insert_with(|| sql_type.clone())
            .clone()
    }

    /// Resolve a declared field type.
    pub fn resolve(&self, field_type: &FieldType) -> OrmResult<SqlType> {
        match field_type {
            FieldType::Native { id, name } => self.lookup_id(*id, name),
            FieldType::Sql(sql_type) => Ok(sql_type.clone()),
            FieldType::Named(name) => Ok(self.sql_type(name)),
            FieldType::Enum(derive) => Ok(derive(self)),
            FieldType::List(inner) => match inner.as_ref() {
                FieldType::List(_) => Err(OrmError::Type(
                    "nested list types are not supported".to_string(),
                )),
                FieldType::Native { id, name } => self.lookup_list_id(*id, name),
                other => {
                    let element = self.resolve(other)?;
                    Ok(self.array_of(&element))
                }
            },
        }
    }
}
