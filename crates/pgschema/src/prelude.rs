//! Convenient imports for typical `pgschema` usage.
//!
//! ```ignore
//! use pgschema::prelude::*;
//! ```

pub use crate::{
    CachedTable, Catalog, CatalogConfig, Column, CreateOptions, Creatable, Direction, DropOptions,
    FetchOptions, FieldType, GenericClient, InsertOptions, Insertable, OrmError, OrmResult,
    Record, Selectable, SqlEnum, Table, Value, View, record, sql_enum,
};

#[cfg(feature = "pool")]
pub use crate::{create_pool, create_pool_with_config};
