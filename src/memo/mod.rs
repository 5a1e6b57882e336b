//! Memento memoization engine
//!
//! Caches the results of a host type's operations per receiver:
//!
//! - **Instance scope**: every instance owns a private partition, released
//!   when the instance (its `Receiver`) is dropped.
//! - **Static scope**: the type owns one shared partition.
//!
//! An instance operation and a static operation may share a name; their
//! identities carry the scope, so they never share entries.
//!
//! ## Configuration
//!
//! ```toml
//! [memo]
//! enabled = true
//! record_metrics = true
//! ```

mod args;
mod config;
mod error;
mod keys;
mod lock;
mod method;
mod scope;
mod store;
mod table;

pub use args::{Arg, CallArgs, IntoCallArgs};
pub use config::MemoConfig;
pub use error::MemoError;
pub use keys::{CallKey, build_key, hash_value};
pub use method::{InstanceMethod, StaticMethod};
pub use scope::{OperationId, ReceiverId, ReceiverKey, Scope};
pub use store::{CachedValue, Generation, MemoStore};
pub use table::{MemoHost, MemoStats, MemoTable, MemoTableBuilder, Receiver};
