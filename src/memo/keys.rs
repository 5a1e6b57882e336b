//! Cache key definitions.
//!
//! Derives a `CallKey` from the shape of a call. Keys are plain values: equal
//! arguments always produce equal keys, and any differing argument produces a
//! different key.

use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use super::args::Arg;

/// Key of one cached result within an operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CallKey {
    /// Sentinel shared by every zero-argument call.
    Unit,
    /// Exactly one positional argument.
    Single(Arg),
    /// Two or more positional arguments, in call order.
    Positional(Vec<Arg>),
    /// Keyword arguments only.
    Keywords(BTreeMap<String, Arg>),
    /// Positional and keyword arguments together.
    Mixed {
        positional: Vec<Arg>,
        keywords: BTreeMap<String, Arg>,
    },
    /// A call that also carried a block. Only presence is recorded.
    WithBlock(Box<CallKey>),
}

impl CallKey {
    pub fn is_unit(&self) -> bool {
        matches!(self, CallKey::Unit)
    }
}

/// Build the cache key for one call.
pub fn build_key(
    mut positional: Vec<Arg>,
    keywords: BTreeMap<String, Arg>,
    has_block: bool,
) -> CallKey {
    let key = match (positional.len(), keywords.is_empty()) {
        (0, true) => CallKey::Unit,
        (1, true) => match positional.pop() {
            Some(arg) => CallKey::Single(arg),
            None => CallKey::Unit,
        },
        (_, true) => CallKey::Positional(positional),
        (0, false) => CallKey::Keywords(keywords),
        (_, false) => CallKey::Mixed {
            positional,
            keywords,
        },
    };

    if has_block {
        CallKey::WithBlock(Box::new(key))
    } else {
        key
    }
}

// ============================================================================
// Hash Utilities
// ============================================================================

/// Compute a hash for any hashable value.
pub fn hash_value<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memo::args::CallArgs;

    #[test]
    fn zero_args_collapse_to_sentinel() {
        assert_eq!(CallArgs::none().into_key(), CallKey::Unit);
        assert!(CallArgs::new().into_key().is_unit());
    }

    #[test]
    fn single_positional_is_keyed_by_value() {
        let key = CallArgs::new().arg(1).into_key();
        assert_eq!(key, CallKey::Single(Arg::Int(1)));
        assert_eq!(key, CallArgs::new().arg(1u64).into_key());
        assert_ne!(key, CallArgs::new().arg(2).into_key());
    }

    #[test]
    fn positional_order_matters() {
        let ab = CallArgs::new().arg(1).arg(2).into_key();
        let ba = CallArgs::new().arg(2).arg(1).into_key();
        assert_ne!(ab, ba);
        assert_eq!(ab, CallArgs::new().arg(1).arg(2).into_key());
    }

    #[test]
    fn keyword_order_does_not_matter() {
        let first = CallArgs::new().kwarg("a", 1).kwarg("b", 2).into_key();
        let second = CallArgs::new().kwarg("b", 2).kwarg("a", 1).into_key();
        assert_eq!(first, second);
        assert_eq!(hash_value(&first), hash_value(&second));
    }

    #[test]
    fn mixed_keys_keep_both_components() {
        let key = CallArgs::new().arg("x").kwarg("flag", true).into_key();
        assert!(matches!(key, CallKey::Mixed { .. }));
        assert_ne!(key, CallArgs::new().arg("x").kwarg("flag", false).into_key());
        assert_ne!(key, CallArgs::new().arg("x").into_key());
    }

    #[test]
    fn block_presence_is_part_of_the_key() {
        let plain = CallArgs::new().arg(1).into_key();
        let with_block = CallArgs::new().arg(1).with_block().into_key();
        assert_ne!(plain, with_block);
        assert_eq!(with_block, CallArgs::new().arg(1).with_block().into_key());
        assert_eq!(
            CallArgs::new().with_block().into_key(),
            CallKey::WithBlock(Box::new(CallKey::Unit))
        );
    }

    #[test]
    fn structurally_equal_collections_share_a_key() {
        let list = || Arg::List(vec![Arg::from("a"), Arg::from(2)]);
        assert_eq!(
            hash_value(&CallArgs::new().arg(list()).into_key()),
            hash_value(&CallArgs::new().arg(list()).into_key())
        );
    }
}
