//! Memento: transparent memoization of a type's instance and static operations.
//!
//! A host type declares its operations in a [`memo::MemoTable`], wraps the
//! memoized ones in [`memo::InstanceMethod`] / [`memo::StaticMethod`]
//! decorators, and embeds a [`memo::Receiver`] in every instance.
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! use memento::memo::{InstanceMethod, MemoHost, MemoTable, Receiver, Scope};
//!
//! struct Greeter {
//!     memo: Receiver,
//!     runs: AtomicUsize,
//! }
//!
//! impl MemoHost for Greeter {
//!     fn memo_receiver(&self) -> &Receiver {
//!         &self.memo
//!     }
//! }
//!
//! let table = MemoTable::builder("Greeter")
//!     .define(Scope::Instance, ["greet"])
//!     .memoize(Scope::Instance, ["greet"])
//!     .build()?;
//!
//! let greet = InstanceMethod::new(&table, "greet", |host: &Greeter, (name,): &(String,)| {
//!     host.runs.fetch_add(1, Ordering::SeqCst);
//!     format!("hello, {name}")
//! })?;
//!
//! let greeter = Greeter {
//!     memo: table.receiver(),
//!     runs: AtomicUsize::new(0),
//! };
//! assert_eq!(greet.call(&greeter, ("ada".to_string(),)), "hello, ada");
//! assert_eq!(greet.call(&greeter, ("ada".to_string(),)), "hello, ada");
//! assert_eq!(greeter.runs.load(Ordering::SeqCst), 1);
//!
//! greeter.memo.reset();
//! greet.call(&greeter, ("ada".to_string(),));
//! assert_eq!(greeter.runs.load(Ordering::SeqCst), 2);
//! # Ok::<(), memento::memo::MemoError>(())
//! ```

pub mod config;
pub mod infra;
pub mod memo;
