//! # pgschema
//!
//! Declare PostgreSQL tables, views and enum types in Rust, then create,
//! migrate and query them through keyword filters.
//!
//! ## Features
//!
//! - **Explicit declarations**: tables are built field by field against a
//!   [`TypeRegistry`] mapping Rust types to SQL types
//! - **DDL**: `CREATE`/`DROP` for tables, views and enum types, column
//!   migrations, and schema export as SQL text
//! - **Keyword filters**: `record! { "age__ge" => 18, "or_name" => "ada" }`
//!   becomes a parameterized WHERE clause
//! - **Joins**: any two selectables join into a derived table that can be
//!   fetched from or joined again
//! - **Row cache**: [`CachedTable`] answers primary-key lookups from memory
//! - **Transaction-friendly**: pass a transaction anywhere a [`GenericClient`]
//!   is expected
//!
//! ## Example
//!
//! ```ignore
//! use pgschema::prelude::*;
//!
//! let catalog = Catalog::new(CatalogConfig::from_env()?);
//! let users = catalog
//!     .table("Users")
//!     .column::<i32>("id", Column::new().primary_key())
//!     .column::<String>("email", Column::new().not_null().unique())
//!     .build()?;
//!
//! let pool = catalog.create_pool()?;
//! let client = pool.get().await?;
//! users.create(&client, &CreateOptions::default()).await?;
//!
//! users
//!     .insert(&client, &record! { "id" => 1, "email" => "ada@example.com" }, &InsertOptions::default())
//!     .await?;
//! let ada = users.fetch_row(&client, &record! { "id" => 1 }).await?;
//! ```

pub mod cache;
pub mod client;
pub mod column;
pub mod condition;
pub mod config;
pub mod creatable;
pub mod enum_type;
pub mod error;
pub mod insertable;
pub mod join;
pub mod naming;
pub mod prelude;
pub mod record;
pub mod selectable;
pub mod table;
pub mod types;
pub mod value;
pub mod view;

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(test)]
mod test_support;

pub use cache::CachedTable;
pub use client::GenericClient;
pub use column::{Column, ColumnDefault, ColumnRef};
pub use condition::{OnClause, OnClauses, Operator};
pub use config::{Catalog, CatalogConfig};
pub use creatable::{
    CreateAllOptions, CreateOptions, Creatable, DEFAULT_SCHEMA, DropOptions, ExportOptions,
    ObjectKind, create_all, export_all,
};
pub use enum_type::EnumType;
pub use error::{OrmError, OrmResult};
pub use insertable::{ConflictUpdate, InsertOptions, InsertRows, Insertable, Returning};
pub use join::{Join, JoinColumn, JoinKind};
pub use naming::{generate_alias, normalise_name};
pub use record::Record;
pub use selectable::{Direction, FetchOptions, Field, OrderBy, Selectable, WhereClause};
pub use table::{MigrateToOptions, Table, TableBuilder};
pub use types::{FieldType, SqlEnum, SqlType, SqlTypeKind, TypeRegistry};
pub use value::{FromValue, Value};
pub use view::{View, ViewBuilder, ViewColumn};

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_with_config};
