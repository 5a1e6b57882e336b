//! Per-receiver cache partition.
//!
//! A `MemoStore` holds every cached result owned by one receiver, grouped by
//! operation. Values are type-erased; the decorator that owns an operation
//! downcasts on the way out.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::keys::CallKey;
use super::lock::{rw_read, rw_write};
use super::scope::OperationId;

const SOURCE: &str = "memo::store";

/// A cached result.
pub type CachedValue = Arc<dyn Any + Send + Sync>;

/// Reading of a partition's reset clock. Every reset advances it.
pub type Generation = u64;

/// Result of a conditional write after a miss.
pub(crate) enum Settled {
    /// The value is now the cached entry.
    Stored,
    /// Another caller stored a value for the same key first.
    Raced(CachedValue),
    /// A reset covering this key happened while the body ran; nothing was written.
    Stale,
}

/// Clock readings of the most recent reset at each granularity.
///
/// A write observed at generation `g` is stale only if a reset covering its
/// key was stamped after `g`. Coarser stamps make finer ones redundant, so a
/// full reset drops every operation and key stamp.
#[derive(Default)]
struct ResetStamps {
    all: Generation,
    operations: HashMap<OperationId, Generation>,
    keys: HashMap<OperationId, HashMap<CallKey, Generation>>,
}

impl ResetStamps {
    fn covers(&self, op: &OperationId, key: &CallKey, observed: Generation) -> bool {
        self.all > observed
            || self.operations.get(op).is_some_and(|at| *at > observed)
            || self
                .keys
                .get(op)
                .and_then(|keys| keys.get(key))
                .is_some_and(|at| *at > observed)
    }
}

#[derive(Default)]
struct Partition {
    clock: Generation,
    resets: ResetStamps,
    operations: HashMap<OperationId, HashMap<CallKey, CachedValue>>,
}

impl Partition {
    fn tick(&mut self) -> Generation {
        self.clock += 1;
        self.clock
    }
}

/// Cache entries owned by one receiver.
#[derive(Default)]
pub struct MemoStore {
    inner: RwLock<Partition>,
}

impl MemoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, op: &OperationId, key: &CallKey) -> Option<CachedValue> {
        rw_read(&self.inner, SOURCE, "get")
            .operations
            .get(op)
            .and_then(|entries| entries.get(key))
            .cloned()
    }

    /// Insert or overwrite one entry.
    pub fn put(&self, op: OperationId, key: CallKey, value: CachedValue) {
        rw_write(&self.inner, SOURCE, "put")
            .operations
            .entry(op)
            .or_default()
            .insert(key, value);
    }

    pub fn generation(&self) -> Generation {
        rw_read(&self.inner, SOURCE, "generation").clock
    }

    /// Store `value` unless a reset covering `key` happened since `observed`
    /// or another writer already filled the slot.
    pub(crate) fn settle(
        &self,
        op: &OperationId,
        key: CallKey,
        value: CachedValue,
        observed: Generation,
    ) -> Settled {
        let mut partition = rw_write(&self.inner, SOURCE, "settle");
        if partition.resets.covers(op, &key, observed) {
            return Settled::Stale;
        }

        let entries = partition.operations.entry(op.clone()).or_default();
        if let Some(existing) = entries.get(&key) {
            return Settled::Raced(Arc::clone(existing));
        }
        entries.insert(key, value);
        Settled::Stored
    }

    /// Like `settle`, but replaces whatever the slot holds.
    pub(crate) fn replace(
        &self,
        op: &OperationId,
        key: CallKey,
        value: CachedValue,
        observed: Generation,
    ) -> Settled {
        let mut partition = rw_write(&self.inner, SOURCE, "replace");
        if partition.resets.covers(op, &key, observed) {
            return Settled::Stale;
        }

        partition
            .operations
            .entry(op.clone())
            .or_default()
            .insert(key, value);
        Settled::Stored
    }

    /// Remove every entry. Returns the number of entries removed.
    pub fn clear_all(&self) -> usize {
        let mut partition = rw_write(&self.inner, SOURCE, "clear_all");
        let at = partition.tick();
        partition.resets = ResetStamps {
            all: at,
            ..ResetStamps::default()
        };
        let removed = partition.operations.values().map(HashMap::len).sum();
        partition.operations.clear();
        removed
    }

    /// Remove every entry of one operation. Returns the number removed.
    pub fn clear_operation(&self, op: &OperationId) -> usize {
        let mut partition = rw_write(&self.inner, SOURCE, "clear_operation");
        let at = partition.tick();
        partition.resets.operations.insert(op.clone(), at);
        partition.resets.keys.remove(op);
        partition
            .operations
            .remove(op)
            .map_or(0, |entries| entries.len())
    }

    /// Remove one entry. Returns whether it was present.
    pub fn clear_key(&self, op: &OperationId, key: &CallKey) -> bool {
        let mut partition = rw_write(&self.inner, SOURCE, "clear_key");
        let at = partition.tick();
        partition
            .resets
            .keys
            .entry(op.clone())
            .or_default()
            .insert(key.clone(), at);
        let Some(entries) = partition.operations.get_mut(op) else {
            return false;
        };
        let removed = entries.remove(key).is_some();
        if entries.is_empty() {
            partition.operations.remove(op);
        }
        removed
    }

    /// Total number of cached entries.
    pub fn len(&self) -> usize {
        rw_read(&self.inner, SOURCE, "len")
            .operations
            .values()
            .map(HashMap::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of cached entries for one operation.
    pub fn operation_len(&self, op: &OperationId) -> usize {
        rw_read(&self.inner, SOURCE, "operation_len")
            .operations
            .get(op)
            .map_or(0, HashMap::len)
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;
    use crate::memo::args::CallArgs;

    fn value<T: Any + Send + Sync>(v: T) -> CachedValue {
        Arc::new(v)
    }

    fn read<T: Any + Clone>(cached: Option<CachedValue>) -> Option<T> {
        cached.and_then(|v| v.downcast_ref::<T>().cloned())
    }

    #[test]
    fn get_misses_on_empty_store() {
        let store = MemoStore::new();
        let op = OperationId::instance("no_args");
        assert!(store.get(&op, &CallKey::Unit).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn put_then_get_roundtrip() {
        let store = MemoStore::new();
        let op = OperationId::instance("with_one_positional_arg");
        let key = CallArgs::new().arg(1).into_key();

        store.put(op.clone(), key.clone(), value("a=1".to_string()));
        assert_eq!(read::<String>(store.get(&op, &key)), Some("a=1".to_string()));

        store.put(op.clone(), key.clone(), value("a=1 again".to_string()));
        assert_eq!(
            read::<String>(store.get(&op, &key)),
            Some("a=1 again".to_string())
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn same_name_different_scope_does_not_collide() {
        let store = MemoStore::new();
        let instance = OperationId::instance("no_args");
        let class = OperationId::static_scope("no_args");

        store.put(instance.clone(), CallKey::Unit, value(1u32));
        assert!(store.get(&class, &CallKey::Unit).is_none());
        assert_eq!(store.operation_len(&instance), 1);
        assert_eq!(store.operation_len(&class), 0);
    }

    #[test]
    fn clear_operation_leaves_other_operations() {
        let store = MemoStore::new();
        let a = OperationId::instance("a");
        let b = OperationId::instance("b");
        store.put(a.clone(), CallKey::Unit, value(1));
        store.put(a.clone(), CallArgs::new().arg(2).into_key(), value(2));
        store.put(b.clone(), CallKey::Unit, value(3));

        assert_eq!(store.clear_operation(&a), 2);
        assert!(store.get(&a, &CallKey::Unit).is_none());
        assert_eq!(read::<i32>(store.get(&b, &CallKey::Unit)), Some(3));
    }

    #[test]
    fn clear_all_is_idempotent() {
        let store = MemoStore::new();
        let op = OperationId::instance("a");
        store.put(op.clone(), CallKey::Unit, value(()));

        assert_eq!(store.clear_all(), 1);
        assert_eq!(store.clear_all(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn clear_key_removes_only_that_entry() {
        let store = MemoStore::new();
        let op = OperationId::instance("a");
        let one = CallArgs::new().arg(1).into_key();
        let two = CallArgs::new().arg(2).into_key();
        store.put(op.clone(), one.clone(), value(1));
        store.put(op.clone(), two.clone(), value(2));

        assert!(store.clear_key(&op, &one));
        assert!(!store.clear_key(&op, &one));
        assert!(store.get(&op, &two).is_some());
    }

    #[test]
    fn settle_rejects_writes_from_before_a_reset() {
        let store = MemoStore::new();
        let op = OperationId::instance("a");
        let observed = store.generation();

        store.clear_all();

        assert!(matches!(
            store.settle(&op, CallKey::Unit, value(1), observed),
            Settled::Stale
        ));
        assert!(store.get(&op, &CallKey::Unit).is_none());
    }

    #[test]
    fn scoped_resets_only_invalidate_what_they_cover() {
        let store = MemoStore::new();
        let a = OperationId::static_scope("a");
        let b = OperationId::static_scope("b");
        let one = CallArgs::new().arg(1).into_key();
        let two = CallArgs::new().arg(2).into_key();
        let observed = store.generation();

        store.clear_key(&a, &one);
        store.clear_operation(&b);

        assert!(matches!(
            store.settle(&a, one.clone(), value(1), observed),
            Settled::Stale
        ));
        assert!(matches!(
            store.settle(&a, two.clone(), value(2), observed),
            Settled::Stored
        ));
        assert!(matches!(
            store.settle(&b, CallKey::Unit, value(3), observed),
            Settled::Stale
        ));

        let after = store.generation();
        assert!(matches!(
            store.settle(&a, one, value(4), after),
            Settled::Stored
        ));
        assert!(matches!(
            store.settle(&b, CallKey::Unit, value(5), after),
            Settled::Stored
        ));
    }

    #[test]
    fn full_reset_supersedes_scoped_stamps() {
        let store = MemoStore::new();
        let a = OperationId::instance("a");
        store.clear_key(&a, &CallKey::Unit);
        store.clear_operation(&a);

        store.clear_all();
        let observed = store.generation();

        assert!(matches!(
            store.settle(&a, CallKey::Unit, value(1), observed),
            Settled::Stored
        ));
        assert!(store.inner.read().expect("unpoisoned").resets.keys.is_empty());
    }

    #[test]
    fn replace_overwrites_an_existing_entry() {
        let store = MemoStore::new();
        let op = OperationId::instance("a");
        store.put(op.clone(), CallKey::Unit, value("wrong".to_string()));

        let observed = store.generation();
        assert!(matches!(
            store.replace(&op, CallKey::Unit, value(7u8), observed),
            Settled::Stored
        ));
        assert_eq!(read::<u8>(store.get(&op, &CallKey::Unit)), Some(7));
    }

    #[test]
    fn settle_keeps_the_first_writer() {
        let store = MemoStore::new();
        let op = OperationId::instance("a");
        let observed = store.generation();

        assert!(matches!(
            store.settle(&op, CallKey::Unit, value(1), observed),
            Settled::Stored
        ));
        match store.settle(&op, CallKey::Unit, value(2), observed) {
            Settled::Raced(winner) => assert_eq!(winner.downcast_ref::<i32>(), Some(&1)),
            _ => panic!("second writer should observe the first value"),
        }
    }

    #[test]
    fn store_recovers_from_poisoned_lock() {
        let store = MemoStore::new();
        let op = OperationId::instance("a");

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store.inner.write().expect("lock should be acquired");
            panic!("poison store lock");
        }));

        store.put(op.clone(), CallKey::Unit, value(1));
        assert!(store.get(&op, &CallKey::Unit).is_some());
    }
}
