//! Per-type memo table.
//!
//! A `MemoTable` is the side-table a host type uses instead of hidden fields:
//! it maps every live instance (by `ReceiverId`) to its own `MemoStore`, owns
//! the single static-scope store, and remembers which operations the type
//! declared memoized in each scope.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use metrics::counter;
use tracing::{debug, info};

use super::config::MemoConfig;
use super::error::MemoError;
use super::keys::CallKey;
use super::lock::mutex_lock;
use super::scope::{OperationId, ReceiverId, ReceiverKey, Scope};
use super::store::{CachedValue, MemoStore};

const SOURCE: &str = "memo::table";
const METRIC_RESET_TOTAL: &str = "memento_reset_total";

/// Declares which operations of a type exist and which of them are memoized.
///
/// ```
/// use memento::memo::{MemoTable, Scope};
///
/// let table = MemoTable::builder("Report")
///     .define(Scope::Instance, ["total", "render"])
///     .define(Scope::Static, ["total"])
///     .memoize(Scope::Instance, ["total"])
///     .memoize(Scope::Static, ["total"])
///     .build()
///     .expect("valid declarations");
///
/// assert!(table.is_memoized(Scope::Instance, "total"));
/// assert!(!table.is_memoized(Scope::Instance, "render"));
/// ```
pub struct MemoTableBuilder {
    type_name: String,
    config: MemoConfig,
    defined: HashSet<OperationId>,
    declarations: Vec<(Scope, Vec<String>)>,
}

impl MemoTableBuilder {
    /// Register operations the host type defines in `scope`.
    pub fn define<I, S>(mut self, scope: Scope, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.defined.extend(
            names
                .into_iter()
                .map(|name| OperationId::new(scope, name.as_ref())),
        );
        self
    }

    /// Mark defined operations of `scope` for memoization.
    pub fn memoize<I, S>(mut self, scope: Scope, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .map(|name| name.as_ref().to_string())
            .collect();
        self.declarations.push((scope, names));
        self
    }

    pub fn config(mut self, config: MemoConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate the declarations and build the table.
    pub fn build(self) -> Result<Arc<MemoTable>, MemoError> {
        let mut memoized = HashSet::new();

        for (scope, names) in &self.declarations {
            if names.is_empty() {
                return Err(MemoError::empty_declaration(&self.type_name, *scope));
            }
            for name in names {
                let op = OperationId::new(*scope, name.as_str());
                if !self.defined.contains(&op) {
                    return Err(MemoError::unknown_operation(&self.type_name, *scope, name));
                }
                if !memoized.insert(op) {
                    return Err(MemoError::already_memoized(&self.type_name, *scope, name));
                }
            }
        }

        info!(
            type_name = %self.type_name,
            memoized = memoized.len(),
            enabled = self.config.enabled,
            "Memo table built"
        );

        Ok(Arc::new(MemoTable {
            type_name: self.type_name,
            config: self.config,
            memoized,
            wrapped: Mutex::new(HashSet::new()),
            static_store: Arc::new(MemoStore::new()),
            instances: DashMap::new(),
        }))
    }
}

/// Snapshot of a table's cache occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoStats {
    /// Instances that currently own a partition.
    pub instance_partitions: usize,
    pub instance_entries: usize,
    pub static_entries: usize,
}

/// Cache side-table of one host type.
pub struct MemoTable {
    type_name: String,
    config: MemoConfig,
    memoized: HashSet<OperationId>,
    wrapped: Mutex<HashSet<OperationId>>,
    static_store: Arc<MemoStore>,
    instances: DashMap<ReceiverId, Arc<MemoStore>>,
}

impl MemoTable {
    pub fn builder(type_name: impl Into<String>) -> MemoTableBuilder {
        MemoTableBuilder {
            type_name: type_name.into(),
            config: MemoConfig::default(),
            defined: HashSet::new(),
            declarations: Vec::new(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn config(&self) -> &MemoConfig {
        &self.config
    }

    pub fn is_memoized(&self, scope: Scope, name: &str) -> bool {
        self.memoized.contains(&OperationId::new(scope, name))
    }

    /// Create the receiver handle a new host instance embeds.
    pub fn receiver(self: &Arc<Self>) -> Receiver {
        Receiver {
            id: ReceiverId::new(),
            table: Arc::clone(self),
        }
    }

    // ========================================================================
    // Receiver-level store access
    // ========================================================================

    /// Look up a cached value. A receiver without a partition simply misses.
    pub fn get(
        &self,
        receiver: ReceiverKey,
        op: &OperationId,
        key: &CallKey,
    ) -> Option<CachedValue> {
        self.partition(receiver).and_then(|store| store.get(op, key))
    }

    pub fn put(&self, receiver: ReceiverKey, op: OperationId, key: CallKey, value: CachedValue) {
        self.partition_or_create(receiver).put(op, key, value);
    }

    /// Remove every entry owned by `receiver`.
    pub fn clear_all(&self, receiver: ReceiverKey) -> usize {
        let removed = self
            .partition(receiver)
            .map_or(0, |store| store.clear_all());
        self.record_reset(receiver, "all", removed);
        removed
    }

    /// Remove the entries of one operation owned by `receiver`.
    pub fn clear_operation(&self, receiver: ReceiverKey, op: &OperationId) -> usize {
        let removed = self
            .partition(receiver)
            .map_or(0, |store| store.clear_operation(op));
        self.record_reset(receiver, "operation", removed);
        removed
    }

    pub(crate) fn clear_key(&self, receiver: ReceiverKey, op: &OperationId, key: &CallKey) -> bool {
        let removed = self
            .partition(receiver)
            .is_some_and(|store| store.clear_key(op, key));
        self.record_reset(receiver, "key", usize::from(removed));
        removed
    }

    pub(crate) fn partition(&self, receiver: ReceiverKey) -> Option<Arc<MemoStore>> {
        match receiver {
            ReceiverKey::Static => Some(Arc::clone(&self.static_store)),
            ReceiverKey::Instance(id) => self
                .instances
                .get(&id)
                .map(|entry| Arc::clone(entry.value())),
        }
    }

    pub(crate) fn partition_or_create(&self, receiver: ReceiverKey) -> Arc<MemoStore> {
        match receiver {
            ReceiverKey::Static => Arc::clone(&self.static_store),
            ReceiverKey::Instance(id) => Arc::clone(self.instances.entry(id).or_default().value()),
        }
    }

    // ========================================================================
    // Static-scope reset facade
    // ========================================================================

    /// Discard every cached result of the type's static operations.
    pub fn reset_static(&self) {
        self.clear_all(ReceiverKey::Static);
    }

    /// Discard the cached results of one static operation.
    pub fn reset_static_operation(&self, name: &str) -> Result<(), MemoError> {
        let op = OperationId::static_scope(name);
        self.require_memoized(&op)?;
        self.clear_operation(ReceiverKey::Static, &op);
        Ok(())
    }

    pub fn stats(&self) -> MemoStats {
        let (instance_partitions, instance_entries) = self
            .instances
            .iter()
            .fold((0, 0), |(partitions, entries), store| {
                (partitions + 1, entries + store.value().len())
            });

        MemoStats {
            instance_partitions,
            instance_entries,
            static_entries: self.static_store.len(),
        }
    }

    // ========================================================================
    // Declaration checks
    // ========================================================================

    pub(crate) fn require_memoized(&self, op: &OperationId) -> Result<(), MemoError> {
        if self.memoized.contains(op) {
            Ok(())
        } else {
            Err(MemoError::not_memoized(&self.type_name, op.scope(), op.name()))
        }
    }

    /// Reserve `op` for a single decorator.
    pub(crate) fn claim(&self, op: &OperationId) -> Result<(), MemoError> {
        self.require_memoized(op)?;
        if mutex_lock(&self.wrapped, SOURCE, "claim").insert(op.clone()) {
            Ok(())
        } else {
            Err(MemoError::already_wrapped(&self.type_name, op.scope(), op.name()))
        }
    }

    fn release(&self, id: ReceiverId) {
        if let Some((_, store)) = self.instances.remove(&id) {
            debug!(
                type_name = %self.type_name,
                receiver = %id,
                dropped = store.len(),
                "Memo partition released"
            );
        }
    }

    fn record_reset(&self, receiver: ReceiverKey, kind: &'static str, removed: usize) {
        info!(
            type_name = %self.type_name,
            receiver = %receiver,
            kind,
            removed,
            "Memo cache reset"
        );

        if self.config.record_metrics {
            let scope = match receiver {
                ReceiverKey::Static => Scope::Static,
                ReceiverKey::Instance(_) => Scope::Instance,
            };
            counter!(METRIC_RESET_TOTAL, "scope" => scope.as_str(), "kind" => kind).increment(1);
        }
    }
}

impl fmt::Debug for MemoTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoTable")
            .field("type_name", &self.type_name)
            .field("config", &self.config)
            .field("memoized", &self.memoized.len())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Handle a host instance embeds to own a cache partition.
///
/// Dropping the handle releases the partition. Cloning it yields a fresh,
/// empty partition: copies of a host never share cached results.
pub struct Receiver {
    id: ReceiverId,
    table: Arc<MemoTable>,
}

impl Receiver {
    pub fn id(&self) -> ReceiverId {
        self.id
    }

    pub fn table(&self) -> &Arc<MemoTable> {
        &self.table
    }

    pub(crate) fn key(&self) -> ReceiverKey {
        ReceiverKey::Instance(self.id)
    }

    /// Discard every cached result of this instance.
    pub fn reset(&self) {
        self.table.clear_all(self.key());
    }

    /// Discard the cached results of one instance operation.
    pub fn reset_operation(&self, name: &str) -> Result<(), MemoError> {
        let op = OperationId::instance(name);
        self.table.require_memoized(&op)?;
        self.table.clear_operation(self.key(), &op);
        Ok(())
    }

    /// Number of results this instance currently caches.
    pub fn entry_count(&self) -> usize {
        self.table
            .partition(self.key())
            .map_or(0, |store| store.len())
    }
}

impl Clone for Receiver {
    fn clone(&self) -> Self {
        self.table.receiver()
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        self.table.release(self.id);
    }
}

impl fmt::Debug for Receiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("id", &self.id)
            .field("type_name", &self.table.type_name)
            .finish()
    }
}

/// Implemented by host types whose instance operations are memoized.
pub trait MemoHost {
    fn memo_receiver(&self) -> &Receiver;
}

impl MemoHost for Receiver {
    fn memo_receiver(&self) -> &Receiver {
        self
    }
}
