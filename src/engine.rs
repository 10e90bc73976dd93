//! Engine Module
//!
//! The document engine that coordinates all components.
//!
//! ## Responsibilities
//! - Database and collection directory lifecycle
//! - Schema validation on create, insert and update
//! - Instance CRUD over the record store through pooled file handles
//! - Keep the instance cache coherent with writes

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::cache::{CacheStats, InstanceCache};
use crate::config::Config;
use crate::error::{Result, SydbError};
use crate::pool::{FilePool, FilePoolStats, PoolKey, PooledFile};
use crate::protocol::Command;
use crate::query::Query;
use crate::schema::{FieldDescriptor, Schema, SYSTEM_FIELDS};
use crate::storage::{unix_timestamp, CompactReport, RecordStore, VerifyReport};
use crate::validation::{
    is_valid_name, validate_collection_name, validate_database_name, validate_instance_id,
};

/// Snapshot of engine resource counters
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub cache: CacheStats,
    pub files: FilePoolStats,
}

/// The main document engine
///
/// ## Concurrency Model
///
/// - Each collection has a reader/writer lock: scans share it, writes
///   (insert/update/delete/compact/drop) take it exclusively
/// - Data files are borrowed from the `FilePool` for the duration of one
///   operation and always returned
/// - The cache has its own internal lock and is updated while the
///   collection write lock is held
/// - Lock entries outlive their collection: a re-created collection reuses
///   the same lock, and every operation re-checks existence once it holds it
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Reusable open data files
    files: FilePool,

    /// Decoded instances by `db/collection/id`
    cache: InstanceCache,

    /// Per-collection reader/writer locks
    locks: Mutex<HashMap<PoolKey, Arc<RwLock<()>>>>,
}

impl Engine {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const SCHEMA_FILENAME: &'static str = "schema.txt";
    const DATA_FILENAME: &'static str = "data.sydb";
    const COMPACT_SUFFIX: &'static str = "compact";

    /// Open an engine rooted at `config.base_dir`, creating it if missing
    pub fn open(config: Config) -> Result<Self> {
        fs::create_dir_all(&config.base_dir)?;
        tracing::info!("Engine opened at {}", config.base_dir.display());

        Ok(Self {
            files: FilePool::new(config.file_pool_size),
            cache: InstanceCache::new(config.cache_capacity),
            locks: Mutex::new(HashMap::new()),
            config,
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified base directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let mut config = Config::default();
        config.base_dir = path.to_path_buf();
        Self::open(config)
    }

    // =========================================================================
    // Databases
    // =========================================================================

    pub fn create_database(&self, name: &str) -> Result<()> {
        validate_database_name(name)?;
        let path = self.database_path(name);
        if path.exists() {
            return Err(SydbError::AlreadyExists(format!(
                "database '{}' already exists",
                name
            )));
        }

        self.create_dir_with_retry(&path)
            .map_err(|e| match e {
                SydbError::AlreadyExists(_) => {
                    SydbError::AlreadyExists(format!("database '{}' already exists", name))
                }
                other => other,
            })?;

        tracing::info!("Created database {}", name);
        Ok(())
    }

    pub fn delete_database(&self, name: &str) -> Result<()> {
        self.require_database(name)?;

        let locks: Vec<_> = list_subdirectories(&self.database_path(name))?
            .iter()
            .map(|collection| self.collection_lock(&PoolKey::new(name, collection.as_str())))
            .collect();
        let _guards: Vec<_> = locks.iter().map(|lock| lock.write()).collect();
        self.require_database(name)?;

        self.files.invalidate(name, None);
        self.cache.invalidate_prefix(&format!("{}/", name));
        fs::remove_dir_all(self.database_path(name))?;

        tracing::info!("Deleted database {}", name);
        Ok(())
    }

    pub fn list_databases(&self) -> Result<Vec<String>> {
        list_subdirectories(&self.config.base_dir)
    }

    pub fn database_exists(&self, name: &str) -> bool {
        is_valid_name(name) && self.database_path(name).is_dir()
    }

    // =========================================================================
    // Collections
    // =========================================================================

    /// Create a collection: schema descriptor plus an initialized data file
    pub fn create_collection(
        &self,
        database: &str,
        name: &str,
        fields: Vec<FieldDescriptor>,
    ) -> Result<()> {
        validate_collection_name(name)?;
        let schema = Schema::new(fields)?;
        self.require_database(database)?;

        let key = PoolKey::new(database, name);
        let lock = self.collection_lock(&key);
        let _guard = lock.write();

        let path = self.collection_path(database, name);
        if path.exists() {
            return Err(SydbError::AlreadyExists(format!(
                "collection '{}/{}' already exists",
                database, name
            )));
        }
        self.create_dir_with_retry(&path)?;

        let populate = || -> Result<()> {
            fs::write(path.join(Self::SCHEMA_FILENAME), schema.to_descriptor())?;
            let mut file = File::options()
                .read(true)
                .write(true)
                .create_new(true)
                .open(path.join(Self::DATA_FILENAME))?;
            RecordStore::new(&mut file).initialize(schema.checksum())?;
            file.sync_all()?;
            Ok(())
        };

        if let Err(e) = populate() {
            tracing::warn!("Rolling back collection {}/{}: {}", database, name, e);
            let _ = fs::remove_dir_all(&path);
            return Err(e);
        }

        tracing::info!(
            "Created collection {}/{} with {} fields",
            database,
            name,
            schema.fields.len()
        );
        Ok(())
    }

    pub fn delete_collection(&self, database: &str, name: &str) -> Result<()> {
        self.require_collection(database, name)?;
        let key = PoolKey::new(database, name);
        let lock = self.collection_lock(&key);
        let _guard = lock.write();
        self.require_collection(database, name)?;

        self.files.invalidate(database, Some(name));
        self.cache
            .invalidate_prefix(&format!("{}/{}/", database, name));
        fs::remove_dir_all(self.collection_path(database, name))?;

        tracing::info!("Deleted collection {}/{}", database, name);
        Ok(())
    }

    pub fn list_collections(&self, database: &str) -> Result<Vec<String>> {
        self.require_database(database)?;
        list_subdirectories(&self.database_path(database))
    }

    pub fn collection_exists(&self, database: &str, name: &str) -> bool {
        is_valid_name(database)
            && is_valid_name(name)
            && self.collection_path(database, name).is_dir()
    }

    pub fn schema(&self, database: &str, collection: &str) -> Result<Schema> {
        self.require_collection(database, collection)?;
        let text = fs::read_to_string(
            self.collection_path(database, collection)
                .join(Self::SCHEMA_FILENAME),
        )?;
        Schema::from_descriptor(&text)
    }

    // =========================================================================
    // Instances
    // =========================================================================

    /// Insert a request body as a new instance, returning its generated id.
    ///
    /// A body that is not a JSON object is wrapped rather than rejected.
    pub fn insert_instance(&self, database: &str, collection: &str, body: &str) -> Result<String> {
        self.insert_fields(database, collection, parse_body(body))
    }

    /// Insert caller fields; `_id` and `_created_at` are generated and placed first
    pub fn insert_fields(
        &self,
        database: &str,
        collection: &str,
        fields: Map<String, Value>,
    ) -> Result<String> {
        self.require_collection(database, collection)?;
        let key = PoolKey::new(database, collection);
        let lock = self.collection_lock(&key);
        let _guard = lock.write();

        let schema = self.schema(database, collection)?;
        schema.validate_document(&fields)?;

        let id = Uuid::new_v4().to_string();
        let mut document = Map::with_capacity(fields.len() + SYSTEM_FIELDS.len());
        document.insert("_id".to_string(), Value::String(id.clone()));
        document.insert("_created_at".to_string(), json!(unix_timestamp()));
        for (name, value) in fields {
            if !SYSTEM_FIELDS.contains(&name.as_str()) {
                document.insert(name, value);
            }
        }
        let document = Value::Object(document);
        let payload = serde_json::to_vec(&document)?;

        self.with_data_file(&key, |mut store| {
            let mut header = store.read_header()?;
            store.append(&mut header, &id, &payload)
        })?;

        self.cache
            .put(InstanceCache::key(database, collection, &id), document);
        tracing::debug!("Inserted {} into {}/{}", id, database, collection);
        Ok(id)
    }

    /// Every live instance, in insertion order
    pub fn list_instances(&self, database: &str, collection: &str) -> Result<Vec<Value>> {
        self.find_instances(database, collection, "")
    }

    /// Instances matching a `field:value,...` query; `""` matches all
    pub fn find_instances(
        &self,
        database: &str,
        collection: &str,
        query: &str,
    ) -> Result<Vec<Value>> {
        self.require_collection(database, collection)?;
        let query = Query::parse(query)?;

        let key = PoolKey::new(database, collection);
        let lock = self.collection_lock(&key);
        let _guard = lock.read();
        self.require_collection(database, collection)?;

        let matches = self.with_data_file(&key, |mut store| {
            let header = store.read_header()?;
            let mut matches = Vec::new();
            for document in store.documents(&header) {
                let document = document?;
                if query.matches(&document) {
                    matches.push(document);
                }
            }
            Ok(matches)
        })?;

        tracing::debug!(
            "Query on {}/{} matched {} instances",
            database,
            collection,
            matches.len()
        );
        Ok(matches)
    }

    /// Fetch one instance by id, served from the cache when possible
    pub fn get_instance(&self, database: &str, collection: &str, id: &str) -> Result<Value> {
        self.require_collection(database, collection)?;
        validate_instance_id(id)?;

        let cache_key = InstanceCache::key(database, collection, id);
        if let Some(document) = self.cache.get(&cache_key) {
            return Ok(document);
        }

        let key = PoolKey::new(database, collection);
        let lock = self.collection_lock(&key);
        let _guard = lock.read();
        self.require_collection(database, collection)?;

        let record = self.with_data_file(&key, |mut store| {
            let header = store.read_header()?;
            store.locate(&header, id)
        })?;
        let document = record
            .ok_or_else(|| instance_not_found(database, collection, id))?
            .document()?;

        self.cache.put(cache_key, document.clone());
        Ok(document)
    }

    /// Merge caller fields into an existing instance.
    ///
    /// Rewrites in place when the new payload fits the old slot, otherwise
    /// tombstones the old record and appends a replacement with the same id.
    pub fn update_instance(
        &self,
        database: &str,
        collection: &str,
        id: &str,
        body: &str,
    ) -> Result<Value> {
        validate_instance_id(id)?;
        self.require_collection(database, collection)?;
        let updates = parse_body(body);

        let key = PoolKey::new(database, collection);
        let lock = self.collection_lock(&key);
        let _guard = lock.write();
        let schema = self.schema(database, collection)?;

        let (document, in_place) = self.with_data_file(&key, |mut store| {
            let mut header = store.read_header()?;
            let record = store
                .locate(&header, id)?
                .ok_or_else(|| instance_not_found(database, collection, id))?;

            let mut merged = match record.document()? {
                Value::Object(map) => map,
                _ => {
                    return Err(SydbError::CorruptFile(format!(
                        "instance '{}' is not a JSON object",
                        id
                    )))
                }
            };
            for (name, value) in updates {
                if !SYSTEM_FIELDS.contains(&name.as_str()) {
                    merged.insert(name, value);
                }
            }
            schema.validate_document(&merged)?;

            let document = Value::Object(merged);
            let payload = serde_json::to_vec(&document)?;
            let in_place = store.replace(&mut header, &record, &payload)?;
            Ok((document, in_place))
        })?;

        self.cache
            .put(InstanceCache::key(database, collection, id), document.clone());
        tracing::debug!(
            "Updated {} in {}/{} ({})",
            id,
            database,
            collection,
            if in_place { "in place" } else { "relocated" }
        );
        Ok(document)
    }

    /// Tombstone the instance with `id`
    pub fn delete_instance(&self, database: &str, collection: &str, id: &str) -> Result<()> {
        self.require_collection(database, collection)?;
        validate_instance_id(id)?;

        let key = PoolKey::new(database, collection);
        let lock = self.collection_lock(&key);
        let _guard = lock.write();
        self.require_collection(database, collection)?;

        self.with_data_file(&key, |mut store| {
            let header = store.read_header()?;
            let record = store
                .locate(&header, id)?
                .ok_or_else(|| instance_not_found(database, collection, id))?;
            store.mark_deleted(&record)
        })?;

        self.cache
            .remove(&InstanceCache::key(database, collection, id));
        tracing::debug!("Deleted {} from {}/{}", id, database, collection);
        Ok(())
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Recompute every record checksum in a collection
    pub fn verify_collection(&self, database: &str, collection: &str) -> Result<VerifyReport> {
        self.require_collection(database, collection)?;
        let key = PoolKey::new(database, collection);
        let lock = self.collection_lock(&key);
        let _guard = lock.read();
        self.require_collection(database, collection)?;

        let report = self.with_data_file(&key, |mut store| {
            let header = store.read_header()?;
            store.verify(&header)
        })?;

        if report.corrupt > 0 {
            tracing::error!(
                "{}/{}: {} of {} records failed checksum verification",
                database,
                collection,
                report.corrupt,
                report.records
            );
        }
        Ok(report)
    }

    /// Rewrite a collection's data file without tombstoned records
    pub fn compact_collection(&self, database: &str, collection: &str) -> Result<CompactReport> {
        self.require_collection(database, collection)?;
        let key = PoolKey::new(database, collection);
        let lock = self.collection_lock(&key);
        let _guard = lock.write();
        self.require_collection(database, collection)?;

        let dir = self.collection_path(database, collection);
        let data_path = dir.join(Self::DATA_FILENAME);
        let temp_path = dir.join(format!("{}.{}", Self::DATA_FILENAME, Self::COMPACT_SUFFIX));

        let report = self.with_data_file(&key, |mut store| {
            let header = store.read_header()?;
            let mut target = File::options()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)?;
            let report = store.compact_into(&header, &mut target)?;
            target.sync_all()?;
            Ok(report)
        });
        let report = match report {
            Ok(report) => report,
            Err(e) => {
                let _ = fs::remove_file(&temp_path);
                return Err(e);
            }
        };

        self.files.invalidate(database, Some(collection));
        fs::rename(&temp_path, &data_path)?;

        tracing::info!(
            "Compacted {}/{}: {} -> {} records, {} -> {} bytes",
            database,
            collection,
            report.records_before,
            report.records_after,
            report.bytes_before,
            report.bytes_after
        );
        Ok(report)
    }

    /// Run an administrative command, returning its JSON result
    pub fn execute(&self, command: Command) -> Result<Value> {
        match command {
            Command::ListDatabases => Ok(json!({ "databases": self.list_databases()? })),
            Command::ListCollections { database } => {
                Ok(json!({ "collections": self.list_collections(&database)? }))
            }
            Command::ListInstances {
                database,
                collection,
            } => {
                let instances = self.list_instances(&database, &collection)?;
                Ok(json!({ "count": instances.len(), "instances": instances }))
            }
            Command::CreateDatabase { database } => {
                self.create_database(&database)?;
                Ok(json!({ "message": format!("database '{}' created", database) }))
            }
            Command::CreateCollection {
                database,
                collection,
                fields,
            } => {
                self.create_collection(&database, &collection, fields)?;
                Ok(json!({
                    "message": format!("collection '{}/{}' created", database, collection)
                }))
            }
            Command::InsertInstance {
                database,
                collection,
                document,
            } => {
                let id = self.insert_instance(&database, &collection, &document)?;
                Ok(json!({ "id": id }))
            }
            Command::FindInstances {
                database,
                collection,
                query,
            } => {
                let instances = self.find_instances(&database, &collection, &query)?;
                Ok(json!({ "count": instances.len(), "instances": instances }))
            }
            Command::Schema {
                database,
                collection,
            } => Ok(json!({ "schema": self.schema(&database, &collection)? })),
            Command::UpdateInstance {
                database,
                collection,
                id,
                document,
            } => {
                let instance = self.update_instance(&database, &collection, &id, &document)?;
                Ok(json!({ "instance": instance }))
            }
            Command::DeleteDatabase { database } => {
                self.delete_database(&database)?;
                Ok(json!({ "message": format!("database '{}' deleted", database) }))
            }
            Command::DeleteCollection {
                database,
                collection,
            } => {
                self.delete_collection(&database, &collection)?;
                Ok(json!({
                    "message": format!("collection '{}/{}' deleted", database, collection)
                }))
            }
            Command::DeleteInstance {
                database,
                collection,
                id,
            } => {
                self.delete_instance(&database, &collection, &id)?;
                Ok(json!({ "message": format!("instance '{}' deleted", id) }))
            }
            Command::Verify {
                database,
                collection,
            } => Ok(json!({ "report": self.verify_collection(&database, &collection)? })),
            Command::Compact {
                database,
                collection,
            } => Ok(json!({ "report": self.compact_collection(&database, &collection)? })),
            Command::Stats => Ok(serde_json::to_value(self.stats())?),
        }
    }

    /// Close pooled files
    pub fn close(&self) {
        self.files.close_all();
        tracing::info!("Engine closed");
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn base_dir(&self) -> &Path {
        &self.config.base_dir
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &InstanceCache {
        &self.cache
    }

    pub fn files(&self) -> &FilePool {
        &self.files
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            cache: self.cache.stats(),
            files: self.files.stats(),
        }
    }

    pub fn database_path(&self, database: &str) -> PathBuf {
        self.config.base_dir.join(database)
    }

    pub fn collection_path(&self, database: &str, collection: &str) -> PathBuf {
        self.database_path(database).join(collection)
    }

    pub fn data_file_path(&self, database: &str, collection: &str) -> PathBuf {
        self.collection_path(database, collection)
            .join(Self::DATA_FILENAME)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn require_database(&self, database: &str) -> Result<()> {
        validate_database_name(database)?;
        if self.database_path(database).is_dir() {
            Ok(())
        } else {
            Err(SydbError::NotFound(format!(
                "database '{}' does not exist",
                database
            )))
        }
    }

    fn require_collection(&self, database: &str, collection: &str) -> Result<()> {
        self.require_database(database)?;
        validate_collection_name(collection)?;
        if self.collection_path(database, collection).is_dir() {
            Ok(())
        } else {
            Err(SydbError::NotFound(format!(
                "collection '{}/{}' does not exist",
                database, collection
            )))
        }
    }

    fn collection_lock(&self, key: &PoolKey) -> Arc<RwLock<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(key.clone()).or_default())
    }

    /// Borrow the collection's data file for one operation, always returning it
    fn with_data_file<T, F>(&self, key: &PoolKey, op: F) -> Result<T>
    where
        F: FnOnce(RecordStore<'_, PooledFile>) -> Result<T>,
    {
        let path = self.data_file_path(&key.database, &key.collection);
        let mut handle = self.files.acquire(key, &path)?;
        let result = op(RecordStore::new(&mut handle));
        self.files.release(handle);
        result
    }

    /// `create_dir` with bounded retries on transient failures
    fn create_dir_with_retry(&self, path: &Path) -> Result<()> {
        let attempts = self.config.create_retries.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match fs::create_dir(path) {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    return Err(SydbError::AlreadyExists(format!(
                        "{} already exists",
                        path.display()
                    )));
                }
                Err(e) if attempt < attempts && is_transient(&e) => {
                    tracing::warn!(
                        "Creating {} failed (attempt {}/{}): {}",
                        path.display(),
                        attempt,
                        attempts,
                        e
                    );
                    thread::sleep(self.config.retry_backoff() * attempt);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Best-effort conversion of a request body into caller fields
fn parse_body(body: &str) -> Map<String, Value> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Map::new();
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
        Err(_) => {
            let mut map = Map::new();
            map.insert("data".to_string(), Value::String(trimmed.to_string()));
            map
        }
    }
}

fn is_transient(error: &std::io::Error) -> bool {
    !matches!(
        error.kind(),
        ErrorKind::PermissionDenied | ErrorKind::InvalidInput | ErrorKind::AlreadyExists
    )
}

fn instance_not_found(database: &str, collection: &str, id: &str) -> SydbError {
    SydbError::NotFound(format!(
        "instance '{}' not found in {}/{}",
        id, database, collection
    ))
}

/// Sorted names of valid subdirectories
fn list_subdirectories(path: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if is_valid_name(name) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}
