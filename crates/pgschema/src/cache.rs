//! Read-through row cache keyed by primary key.
//!
//! A [`CachedTable`] assumes it is the only writer of its table. Rows are
//! stored whenever a query returns them and purged when they are deleted;
//! changes made behind its back are not detected.

use crate::client::GenericClient;
use crate::column::Column;
use crate::creatable::{Creatable, ObjectKind};
use crate::error::{OrmError, OrmResult};
use crate::insertable::{InsertOptions, InsertRows, Insertable, Returning};
use crate::record::Record;
use crate::selectable::{FetchOptions, Field, Selectable};
use crate::table::Table;
use crate::value::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct RowCache {
    capacity: Option<usize>,
    map: HashMap<Vec<Value>, Record>,
    order: VecDeque<Vec<Value>>,
}

impl RowCache {
    fn new(capacity: Option<usize>) -> Self {
        Self {
            capacity,
            map: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&self, key: &[Value]) -> Option<Record> {
        self.map.get(key).cloned()
    }

    /// Insert or overwrite; an overwritten key keeps its age.
    /// Returns how many entries were evicted.
    fn insert(&mut self, key: Vec<Value>, record: Record) -> usize {
        if let Some(existing) = self.map.get_mut(&key) {
            *existing = record;
            return 0;
        }
        self.map.insert(key.clone(), record);
        self.order.push_back(key);
        self.evict_if_needed()
    }

    fn remove(&mut self, key: &[Value]) -> bool {
        if self.map.remove(key).is_none() {
            return false;
        }
        if let Some(pos) = self.order.iter().position(|k| k.as_slice() == key) {
            let _ = self.order.remove(pos);
        }
        true
    }

    fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }

    fn evict_if_needed(&mut self) -> usize {
        let Some(capacity) = self.capacity else {
            return 0;
        };
        let mut evicted = 0;
        while self.map.len() > capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            let _ = self.map.remove(&oldest);
            evicted += 1;
        }
        evicted
    }
}

/// A [`Table`] whose primary-key lookups are answered from memory.
///
/// Every operation touching the cache holds a per-table async lock for its
/// whole duration, so concurrent tasks observe cache updates in order.
///
/// ```ignore
/// let users = CachedTable::new(users, Some(1024))?;
/// let row = users.fetch_row(&client, &record! { "id" => 1 }).await?; // query
/// let row = users.fetch_row(&client, &record! { "id" => 1 }).await?; // cache hit
/// ```
#[derive(Debug)]
pub struct CachedTable {
    table: Table,
    lock: tokio::sync::Mutex<()>,
    entries: Mutex<RowCache>,
}

impl CachedTable {
    /// Wrap `table`; `max_size` bounds the number of cached rows.
    pub fn new(table: Table, max_size: Option<usize>) -> OrmResult<Self> {
        if table.primary_keys().is_empty() {
            return Err(OrmError::invalid_argument(format!(
                "cannot cache {}: it has no primary key",
                table.qualified_name()
            )));
        }
        Ok(Self {
            table,
            lock: tokio::sync::Mutex::new(()),
            entries: Mutex::new(RowCache::new(max_size)),
        })
    }

    /// The uncached table.
    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn column(&self, name: &str) -> Option<Column> {
        self.table.column(name)
    }

    fn entries(&self) -> MutexGuard<'_, RowCache> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn key_of(&self, record: &Record) -> Option<Vec<Value>> {
        let keys = self.table.primary_keys();
        let names: Vec<&str> = keys.iter().map(String::as_str).collect();
        record.project(&names)
    }

    /// Key values when `filters` selects exactly one primary key.
    fn exact_key(&self, filters: &Record) -> Option<Vec<Value>> {
        let keys = self.table.primary_keys();
        if filters.len() != keys.len() {
            return None;
        }
        keys.iter()
            .map(|k| {
                filters
                    .get(k)
                    .or_else(|| filters.get(&format!("{k}__eq")))
                    .filter(|v| !v.is_null())
                    .cloned()
            })
            .collect()
    }

    fn lookup(&self, key: &[Value]) -> Option<Record> {
        let hit = self.entries().get(key);
        tracing::trace!(
            target: "pgschema.cache",
            table = %self.table.qualified_name(),
            hit = hit.is_some(),
            "lookup"
        );
        hit
    }

    fn store(&self, rows: &[Record]) {
        let mut entries = self.entries();
        for row in rows {
            let Some(key) = self.key_of(row) else {
                continue;
            };
            let evicted = entries.insert(key, row.clone());
            if evicted > 0 {
                tracing::trace!(target: "pgschema.cache", table = %self.table.qualified_name(), evicted, "evicted");
            }
        }
    }

    fn purge(&self, rows: &[Record]) {
        let mut entries = self.entries();
        for row in rows {
            if let Some(key) = self.key_of(row) {
                entries.remove(&key);
            }
        }
    }

    /// The cached row for the primary-key values in `key`, if any.
    pub fn get_cached(&self, key: &Record) -> Option<Record> {
        let key = self.key_of(key)?;
        self.entries().get(&key)
    }

    pub fn clear_cache(&self) {
        self.entries().clear();
    }

    /// Number of cached rows.
    pub fn cached_len(&self) -> usize {
        self.entries().map.len()
    }
}

impl Selectable for CachedTable {
    fn name(&self) -> &str {
        self.table.name()
    }

    fn display_name(&self) -> &str {
        self.table.display_name()
    }

    fn fields(&self) -> Vec<Field> {
        self.table.fields()
    }

    fn fetch<C: GenericClient>(
        &self,
        conn: &C,
        filters: &Record,
        options: &FetchOptions,
    ) -> impl std::future::Future<Output = OrmResult<Vec<Record>>> + Send
    where
        Self: Sized,
    {
        async move {
            let _guard = self.lock.lock().await;
            let rows = self.table.fetch(conn, filters, options).await?;
            self.store(&rows);
            Ok(rows)
        }
    }

    fn fetch_where<C: GenericClient>(
        &self,
        conn: &C,
        where_clause: &str,
        values: &[Value],
        options: &FetchOptions,
    ) -> impl std::future::Future<Output = OrmResult<Vec<Record>>> + Send
    where
        Self: Sized,
    {
        async move {
            let _guard = self.lock.lock().await;
            let rows = self
                .table
                .fetch_where(conn, where_clause, values, options)
                .await?;
            self.store(&rows);
            Ok(rows)
        }
    }

    /// Answered from the cache when `filters` is an exact primary-key match.
    fn fetch_row<C: GenericClient>(
        &self,
        conn: &C,
        filters: &Record,
    ) -> impl std::future::Future<Output = OrmResult<Option<Record>>> + Send
    where
        Self: Sized,
    {
        async move {
            let _guard = self.lock.lock().await;
            if let Some(key) = self.exact_key(filters) {
                let hit = self.lookup(&key);
                if hit.is_some() {
                    return Ok(hit);
                }
            }
            let row = self.table.fetch_row(conn, filters).await?;
            if let Some(row) = &row {
                self.store(std::slice::from_ref(row));
            }
            Ok(row)
        }
    }

    fn fetch_row_where<C: GenericClient>(
        &self,
        conn: &C,
        where_clause: &str,
        values: &[Value],
    ) -> impl std::future::Future<Output = OrmResult<Option<Record>>> + Send
    where
        Self: Sized,
    {
        async move {
            let _guard = self.lock.lock().await;
            let row = self.table.fetch_row_where(conn, where_clause, values).await?;
            if let Some(row) = &row {
                self.store(std::slice::from_ref(row));
            }
            Ok(row)
        }
    }
}

impl Insertable for CachedTable {
    fn primary_keys(&self) -> Vec<String> {
        self.table.primary_keys()
    }

    /// Always returns the full inserted row.
    fn insert<C: GenericClient>(
        &self,
        conn: &C,
        values: &Record,
        options: &InsertOptions,
    ) -> impl std::future::Future<Output = OrmResult<Option<Record>>> + Send
    where
        Self: Sized,
    {
        async move {
            let options = InsertOptions {
                returning: Some(Returning::All),
                ..options.clone()
            };
            let _guard = self.lock.lock().await;
            let row = self.table.insert(conn, values, &options).await?;
            if let Some(row) = &row {
                self.store(std::slice::from_ref(row));
            }
            Ok(row)
        }
    }

    /// Bulk inserts bypass `RETURNING`, so they cannot keep the cache current.
    fn insert_many<C: GenericClient>(
        &self,
        _conn: &C,
        _rows: InsertRows,
        _options: &InsertOptions,
    ) -> impl std::future::Future<Output = OrmResult<u64>> + Send
    where
        Self: Sized,
    {
        async move {
            Err(OrmError::not_supported(
                "insert_many is not supported on cached tables",
            ))
        }
    }

    fn update_where<C: GenericClient>(
        &self,
        conn: &C,
        where_clause: &str,
        where_values: &[Value],
        set: &Record,
    ) -> impl std::future::Future<Output = OrmResult<u64>> + Send
    where
        Self: Sized,
    {
        async move {
            let rows = self
                .update_where_returning(conn, where_clause, where_values, set)
                .await?;
            Ok(rows.len() as u64)
        }
    }

    fn update_where_returning<C: GenericClient>(
        &self,
        conn: &C,
        where_clause: &str,
        where_values: &[Value],
        set: &Record,
    ) -> impl std::future::Future<Output = OrmResult<Vec<Record>>> + Send
    where
        Self: Sized,
    {
        async move {
            let _guard = self.lock.lock().await;
            let rows = self
                .table
                .update_where_returning(conn, where_clause, where_values, set)
                .await?;
            // RETURNING only yields new keys; entries under the old ones are unknown.
            let keys = self.table.primary_keys();
            if set.keys().any(|k| keys.iter().any(|pk| pk == k)) {
                tracing::trace!(target: "pgschema.cache", table = %self.table.qualified_name(), "primary key updated; clearing");
                self.entries().clear();
            }
            self.store(&rows);
            Ok(rows)
        }
    }

    fn delete_where<C: GenericClient>(
        &self,
        conn: &C,
        where_clause: &str,
        values: &[Value],
    ) -> impl std::future::Future<Output = OrmResult<u64>> + Send
    where
        Self: Sized,
    {
        async move {
            let rows = self.delete_where_returning(conn, where_clause, values).await?;
            Ok(rows.len() as u64)
        }
    }

    fn delete_where_returning<C: GenericClient>(
        &self,
        conn: &C,
        where_clause: &str,
        values: &[Value],
    ) -> impl std::future::Future<Output = OrmResult<Vec<Record>>> + Send
    where
        Self: Sized,
    {
        async move {
            let _guard = self.lock.lock().await;
            let rows = self
                .table
                .delete_where_returning(conn, where_clause, values)
                .await?;
            self.purge(&rows);
            Ok(rows)
        }
    }
}

impl Creatable for CachedTable {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Table
    }

    fn schema(&self) -> &str {
        self.table.schema()
    }

    fn local_name(&self) -> &str {
        self.table.local_name()
    }

    fn qualified_name(&self) -> &str {
        self.table.qualified_name()
    }

    fn query_create(&self, if_not_exists: bool) -> OrmResult<String> {
        self.table.query_create(if_not_exists)
    }

    fn query_create_extra(&self) -> Vec<String> {
        self.table.query_create_extra()
    }

    fn as_table(&self) -> Option<&Table> {
        Some(&self.table)
    }
}
