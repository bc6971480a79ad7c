//! Application-level configuration and the [`Catalog`] that owns the type
//! registry.

use crate::cache::CachedTable;
use crate::creatable::DEFAULT_SCHEMA;
use crate::enum_type::EnumType;
use crate::error::{OrmError, OrmResult};
use crate::table::{Table, TableBuilder};
use crate::types::{SqlEnum, TypeRegistry};
use crate::view::{View, ViewBuilder};
use std::env;

const DEFAULT_POOL_SIZE: usize = 16;

/// Configuration for a [`Catalog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    /// Schema for objects that do not name one.
    pub default_schema: String,
    /// Connection string used by [`Catalog::create_pool`].
    pub database_url: Option<String>,
    /// Maximum pooled connections.
    pub pool_size: usize,
    /// Row bound for caches made by [`Catalog::cached`]; `None` is unbounded.
    pub cache_size: Option<usize>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            default_schema: DEFAULT_SCHEMA.to_string(),
            database_url: None,
            pool_size: DEFAULT_POOL_SIZE,
            cache_size: None,
        }
    }
}

impl CatalogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `DATABASE_URL`, `PGSCHEMA_DEFAULT_SCHEMA` and `PGSCHEMA_POOL_SIZE`.
    pub fn from_env() -> OrmResult<Self> {
        let mut config = Self::default();
        if let Ok(url) = env::var("DATABASE_URL") {
            config.database_url = Some(url);
        }
        if let Ok(schema) = env::var("PGSCHEMA_DEFAULT_SCHEMA") {
            config.default_schema = schema;
        }
        if let Ok(size) = env::var("PGSCHEMA_POOL_SIZE") {
            config.pool_size = parse_pool_size(&size)?;
        }
        Ok(config)
    }

    pub fn default_schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = schema.into();
        self
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    pub fn cache_size(mut self, size: usize) -> Self {
        self.cache_size = Some(size);
        self
    }
}

fn parse_pool_size(raw: &str) -> OrmResult<usize> {
    match raw.trim().parse::<usize>() {
        Ok(0) | Err(_) => Err(OrmError::invalid_argument(format!(
            "PGSCHEMA_POOL_SIZE must be a positive integer, got '{raw}'"
        ))),
        Ok(size) => Ok(size),
    }
}

/// Entry point for declaring schema objects.
///
/// Holds the [`TypeRegistry`] every table, view and enum type is resolved
/// against, plus defaults applied to new declarations.
///
/// ```ignore
/// let catalog = Catalog::new(CatalogConfig::from_env()?);
/// let users = catalog
///     .table("Users")
///     .column::<i32>("id", Column::new().primary_key())
///     .field::<String>("name")
///     .build()?;
/// let pool = catalog.create_pool()?;
/// ```
#[derive(Debug)]
pub struct Catalog {
    registry: TypeRegistry,
    config: CatalogConfig,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(CatalogConfig::default())
    }
}

impl Catalog {
    /// A catalog with the standard native type mappings.
    pub fn new(config: CatalogConfig) -> Self {
        Self {
            registry: TypeRegistry::with_defaults(),
            config,
        }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn table(&self, name: &str) -> TableBuilder<'_> {
        Table::builder(&self.registry, name).schema(self.config.default_schema.as_str())
    }

    pub fn view(&self, name: &str) -> ViewBuilder<'_> {
        View::builder(&self.registry, name).schema(self.config.default_schema.as_str())
    }

    pub fn enum_type<E: SqlEnum>(&self) -> EnumType {
        EnumType::of::<E>(&self.registry)
    }

    /// Wrap `table` in a cache bounded by [`CatalogConfig::cache_size`].
    pub fn cached(&self, table: Table) -> OrmResult<CachedTable> {
        CachedTable::new(table, self.config.cache_size)
    }

    /// A pool for [`CatalogConfig::database_url`].
    #[cfg(feature = "pool")]
    pub fn create_pool(&self) -> OrmResult<deadpool_postgres::Pool> {
        let url = self
            .config
            .database_url
            .as_deref()
            .ok_or_else(|| OrmError::Connection("DATABASE_URL is not set".into()))?;
        crate::pool::create_pool_with_config(url, self.config.pool_size)
    }
}
