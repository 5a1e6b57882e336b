//! Memoizing decorators.
//!
//! `InstanceMethod` and `StaticMethod` hold the original body of an operation
//! and expose the same call shape. A call builds the key, consults the
//! receiver's partition, and only runs the body on a miss.
//!
//! No lock is held while a body runs: a body may call its own decorator again
//! (with the same or another key) without blocking the cache.

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};

use super::args::IntoCallArgs;
use super::error::MemoError;
use super::scope::{OperationId, ReceiverKey};
use super::store::{CachedValue, Settled};
use super::table::{MemoHost, MemoTable};

const METRIC_HIT_TOTAL: &str = "memento_hit_total";
const METRIC_MISS_TOTAL: &str = "memento_miss_total";
const METRIC_FAILURE_TOTAL: &str = "memento_failure_total";
const METRIC_STALE_WRITE_TOTAL: &str = "memento_stale_write_total";

type InstanceBody<H, A, V, E> = Box<dyn Fn(&H, &A) -> Result<V, E> + Send + Sync>;
type StaticBody<A, V, E> = Box<dyn Fn(&A) -> Result<V, E> + Send + Sync>;

fn record(table: &MemoTable, metric: &'static str, op: &OperationId) {
    if table.config().record_metrics {
        counter!(
            metric,
            "scope" => op.scope().as_str(),
            "operation" => op.name().to_string()
        )
        .increment(1);
    }
}

/// Check → run → store, shared by both decorators.
fn intercept<A, V, E>(
    table: &MemoTable,
    receiver: ReceiverKey,
    op: &OperationId,
    args: &A,
    run: impl FnOnce() -> Result<V, E>,
) -> Result<V, E>
where
    A: IntoCallArgs,
    V: Clone + Send + Sync + 'static,
{
    if !table.config().enabled {
        return run();
    }

    let call = args.to_call_args();
    let (arity, block) = (call.positional().len(), call.has_block());
    let key = call.into_key();
    let store = table.partition_or_create(receiver);

    let mut mistyped = false;
    if let Some(hit) = store.get(op, &key) {
        if let Some(value) = hit.downcast_ref::<V>() {
            debug!(operation = %op, receiver = %receiver, outcome = "hit", "memo lookup");
            record(table, METRIC_HIT_TOTAL, op);
            return Ok(value.clone());
        }
        warn!(
            operation = %op,
            receiver = %receiver,
            "Cached value has an unexpected type, recomputing"
        );
        mistyped = true;
    }

    debug!(
        operation = %op,
        receiver = %receiver,
        arity,
        block,
        outcome = "miss",
        "memo lookup"
    );
    record(table, METRIC_MISS_TOTAL, op);

    let observed = store.generation();
    let value = match run() {
        Ok(value) => value,
        Err(err) => {
            debug!(operation = %op, receiver = %receiver, outcome = "failure", "memo body failed");
            record(table, METRIC_FAILURE_TOTAL, op);
            return Err(err);
        }
    };

    let cached: CachedValue = Arc::new(value.clone());
    let settled = if mistyped {
        store.replace(op, key, cached, observed)
    } else {
        store.settle(op, key, cached, observed)
    };
    match settled {
        Settled::Stored => Ok(value),
        Settled::Raced(winner) => Ok(winner.downcast_ref::<V>().cloned().unwrap_or(value)),
        Settled::Stale => {
            debug!(
                operation = %op,
                receiver = %receiver,
                outcome = "stale",
                "Reset during computation, result not cached"
            );
            record(table, METRIC_STALE_WRITE_TOTAL, op);
            Ok(value)
        }
    }
}

// ============================================================================
// Instance scope
// ============================================================================

/// Memoizing decorator for an instance operation.
///
/// Each host instance caches separately, through the `Receiver` it exposes via
/// `MemoHost`.
pub struct InstanceMethod<H, A, V, E = Infallible> {
    table: Arc<MemoTable>,
    id: OperationId,
    body: InstanceBody<H, A, V, E>,
}

impl<H, A, V> InstanceMethod<H, A, V, Infallible>
where
    H: MemoHost,
    A: IntoCallArgs,
    V: Clone + Send + Sync + 'static,
{
    /// Wrap an infallible body.
    pub fn new<F>(table: &Arc<MemoTable>, name: &str, body: F) -> Result<Self, MemoError>
    where
        F: Fn(&H, &A) -> V + Send + Sync + 'static,
    {
        Self::fallible(table, name, move |host, args| Ok(body(host, args)))
    }

    pub fn call(&self, host: &H, args: A) -> V {
        match self.try_call(host, args) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }
}

impl<H, A, V, E> InstanceMethod<H, A, V, E>
where
    H: MemoHost,
    A: IntoCallArgs,
    V: Clone + Send + Sync + 'static,
{
    /// Wrap a body whose failures propagate to the caller and are never cached.
    pub fn fallible<F>(table: &Arc<MemoTable>, name: &str, body: F) -> Result<Self, MemoError>
    where
        F: Fn(&H, &A) -> Result<V, E> + Send + Sync + 'static,
    {
        let id = OperationId::instance(name);
        table.claim(&id)?;
        Ok(Self {
            table: Arc::clone(table),
            id,
            body: Box::new(body),
        })
    }

    pub fn id(&self) -> &OperationId {
        &self.id
    }

    pub fn try_call(&self, host: &H, args: A) -> Result<V, E> {
        let Some(receiver) = self.receiver_of(host) else {
            return (self.body)(host, &args);
        };
        intercept(&self.table, receiver, &self.id, &args, || (self.body)(host, &args))
    }

    /// Store `value` for `args` without running the body. Does nothing while
    /// memoization is disabled.
    pub fn preset(&self, host: &H, args: A, value: V) {
        if !self.table.config().enabled {
            return;
        }
        if let Some(receiver) = self.receiver_of(host) {
            let key = args.to_call_args().into_key();
            self.table.put(receiver, self.id.clone(), key, Arc::new(value));
        }
    }

    /// Forget the result cached for `args`. Returns whether one was cached.
    pub fn reset(&self, host: &H, args: A) -> bool {
        self.receiver_of(host).is_some_and(|receiver| {
            let key = args.to_call_args().into_key();
            self.table.clear_key(receiver, &self.id, &key)
        })
    }

    /// Forget every result of this operation cached by `host`.
    pub fn reset_all(&self, host: &H) -> usize {
        self.receiver_of(host)
            .map_or(0, |receiver| self.table.clear_operation(receiver, &self.id))
    }

    pub fn is_cached(&self, host: &H, args: A) -> bool {
        self.receiver_of(host).is_some_and(|receiver| {
            let key = args.to_call_args().into_key();
            self.table.get(receiver, &self.id, &key).is_some()
        })
    }

    /// Number of results of this operation cached by `host`.
    pub fn cached_len(&self, host: &H) -> usize {
        self.receiver_of(host)
            .and_then(|receiver| self.table.partition(receiver))
            .map_or(0, |store| store.operation_len(&self.id))
    }

    fn receiver_of(&self, host: &H) -> Option<ReceiverKey> {
        let receiver = host.memo_receiver();
        if Arc::ptr_eq(receiver.table(), &self.table) {
            Some(receiver.key())
        } else {
            warn!(
                operation = %self.id,
                expected = %self.table.type_name(),
                found = %receiver.table().type_name(),
                "Receiver belongs to another memo table, bypassing cache"
            );
            None
        }
    }
}

impl<H, A, V, E> fmt::Debug for InstanceMethod<H, A, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceMethod")
            .field("type_name", &self.table.type_name())
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Static scope
// ============================================================================

/// Memoizing decorator for a static (type-level) operation.
///
/// All calls share the type's single static partition.
pub struct StaticMethod<A, V, E = Infallible> {
    table: Arc<MemoTable>,
    id: OperationId,
    body: StaticBody<A, V, E>,
}

impl<A, V> StaticMethod<A, V, Infallible>
where
    A: IntoCallArgs,
    V: Clone + Send + Sync + 'static,
{
    pub fn new<F>(table: &Arc<MemoTable>, name: &str, body: F) -> Result<Self, MemoError>
    where
        F: Fn(&A) -> V + Send + Sync + 'static,
    {
        Self::fallible(table, name, move |args| Ok(body(args)))
    }

    pub fn call(&self, args: A) -> V {
        match self.try_call(args) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }
}

impl<A, V, E> StaticMethod<A, V, E>
where
    A: IntoCallArgs,
    V: Clone + Send + Sync + 'static,
{
    pub fn fallible<F>(table: &Arc<MemoTable>, name: &str, body: F) -> Result<Self, MemoError>
    where
        F: Fn(&A) -> Result<V, E> + Send + Sync + 'static,
    {
        let id = OperationId::static_scope(name);
        table.claim(&id)?;
        Ok(Self {
            table: Arc::clone(table),
            id,
            body: Box::new(body),
        })
    }

    pub fn id(&self) -> &OperationId {
        &self.id
    }

    pub fn try_call(&self, args: A) -> Result<V, E> {
        intercept(&self.table, ReceiverKey::Static, &self.id, &args, || {
            (self.body)(&args)
        })
    }

    pub fn preset(&self, args: A, value: V) {
        if !self.table.config().enabled {
            return;
        }
        let key = args.to_call_args().into_key();
        self.table
            .put(ReceiverKey::Static, self.id.clone(), key, Arc::new(value));
    }

    pub fn reset(&self, args: A) -> bool {
        let key = args.to_call_args().into_key();
        self.table.clear_key(ReceiverKey::Static, &self.id, &key)
    }

    pub fn reset_all(&self) -> usize {
        self.table.clear_operation(ReceiverKey::Static, &self.id)
    }

    pub fn is_cached(&self, args: A) -> bool {
        let key = args.to_call_args().into_key();
        self.table.get(ReceiverKey::Static, &self.id, &key).is_some()
    }

    pub fn cached_len(&self) -> usize {
        self.table
            .partition(ReceiverKey::Static)
            .map_or(0, |store| store.operation_len(&self.id))
    }
}

impl<A, V, E> fmt::Debug for StaticMethod<A, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticMethod")
            .field("type_name", &self.table.type_name())
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
