//! Argument model for memoized calls.
//!
//! `Arg` is a structurally comparable value: two arguments are equal when their
//! contents are equal, regardless of where they came from. `CallArgs` records the
//! full shape of one call (positional, keyword, block presence).

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use super::keys::{CallKey, build_key};

/// A single argument value as seen by the key builder.
#[derive(Debug, Clone)]
pub enum Arg {
    Nil,
    Bool(bool),
    /// Every integer width collapses here so `1u8` and `1i64` compare equal.
    Int(i128),
    /// Compared by bit pattern: `0.0 != -0.0`, `NaN == NaN`.
    Float(f64),
    Char(char),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Arg>),
    Map(BTreeMap<String, Arg>),
}

impl Arg {
    pub fn as_int(&self) -> Option<i128> {
        match self {
            Arg::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Str(value) => Some(value.as_str()),
            _ => None,
        }
    }

    fn discriminant(&self) -> u8 {
        match self {
            Arg::Nil => 0,
            Arg::Bool(_) => 1,
            Arg::Int(_) => 2,
            Arg::Float(_) => 3,
            Arg::Char(_) => 4,
            Arg::Str(_) => 5,
            Arg::Bytes(_) => 6,
            Arg::List(_) => 7,
            Arg::Map(_) => 8,
        }
    }
}

impl PartialEq for Arg {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Arg::Nil, Arg::Nil) => true,
            (Arg::Bool(a), Arg::Bool(b)) => a == b,
            (Arg::Int(a), Arg::Int(b)) => a == b,
            (Arg::Float(a), Arg::Float(b)) => a.to_bits() == b.to_bits(),
            (Arg::Char(a), Arg::Char(b)) => a == b,
            (Arg::Str(a), Arg::Str(b)) => a == b,
            (Arg::Bytes(a), Arg::Bytes(b)) => a == b,
            (Arg::List(a), Arg::List(b)) => a == b,
            (Arg::Map(a), Arg::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Arg {}

impl Hash for Arg {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.discriminant().hash(state);
        match self {
            Arg::Nil => {}
            Arg::Bool(value) => value.hash(state),
            Arg::Int(value) => value.hash(state),
            Arg::Float(value) => value.to_bits().hash(state),
            Arg::Char(value) => value.hash(state),
            Arg::Str(value) => value.hash(state),
            Arg::Bytes(value) => value.hash(state),
            Arg::List(values) => values.hash(state),
            Arg::Map(values) => values.hash(state),
        }
    }
}

macro_rules! arg_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Arg::Int(i128::from(value))
                }
            }
        )*
    };
}

arg_from_int!(i8, i16, i32, i64, i128, u8, u16, u32, u64);

impl From<isize> for Arg {
    fn from(value: isize) -> Self {
        // isize is at most 64 bits on every supported target.
        Arg::Int(value as i128)
    }
}

impl From<usize> for Arg {
    fn from(value: usize) -> Self {
        Arg::Int(value as i128)
    }
}

impl From<f32> for Arg {
    fn from(value: f32) -> Self {
        Arg::Float(f64::from(value))
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Arg::Float(value)
    }
}

impl From<bool> for Arg {
    fn from(value: bool) -> Self {
        Arg::Bool(value)
    }
}

impl From<char> for Arg {
    fn from(value: char) -> Self {
        Arg::Char(value)
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Str(value.to_string())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Str(value)
    }
}

impl From<&String> for Arg {
    fn from(value: &String) -> Self {
        Arg::Str(value.clone())
    }
}

impl From<Vec<u8>> for Arg {
    fn from(value: Vec<u8>) -> Self {
        Arg::Bytes(value)
    }
}

impl From<&[u8]> for Arg {
    fn from(value: &[u8]) -> Self {
        Arg::Bytes(value.to_vec())
    }
}

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Self {
        value.map_or(Arg::Nil, Into::into)
    }
}

impl From<Vec<Arg>> for Arg {
    fn from(value: Vec<Arg>) -> Self {
        Arg::List(value)
    }
}

impl From<BTreeMap<String, Arg>> for Arg {
    fn from(value: BTreeMap<String, Arg>) -> Self {
        Arg::Map(value)
    }
}

impl From<()> for Arg {
    fn from(_: ()) -> Self {
        Arg::Nil
    }
}

/// The full shape of one call: positional values, keyword values and whether a
/// block (trailing closure) was supplied.
///
/// Bodies that take `CallArgs` read their inputs back through the accessors:
///
/// ```
/// use memento::memo::{Arg, CallArgs, MemoTable, Scope, StaticMethod};
///
/// let table = MemoTable::builder("Formatter")
///     .define(Scope::Static, ["render"])
///     .memoize(Scope::Static, ["render"])
///     .build()?;
/// let render = StaticMethod::new(&table, "render", |args: &CallArgs| {
///     let width = args.get(0).and_then(Arg::as_int).unwrap_or(0);
///     let label = args.keyword("label").and_then(Arg::as_str).unwrap_or("-");
///     format!("{label}:{width}:{}", args.has_block())
/// })?;
///
/// let call = CallArgs::new().arg(8).kwarg("label", "total").with_block();
/// assert_eq!(call.positional().len(), 1);
/// assert_eq!(render.call(call), "total:8:true");
/// # Ok::<(), memento::memo::MemoError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallArgs {
    positional: Vec<Arg>,
    keywords: BTreeMap<String, Arg>,
    block: bool,
}

impl CallArgs {
    /// A call with no arguments at all.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Arg>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a keyword argument. Re-setting a name replaces the earlier value.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Arg>) -> Self {
        self.keywords.insert(name.into(), value.into());
        self
    }

    /// Mark the call as carrying a block.
    pub fn with_block(mut self) -> Self {
        self.block = true;
        self
    }

    pub fn positional(&self) -> &[Arg] {
        &self.positional
    }

    pub fn get(&self, index: usize) -> Option<&Arg> {
        self.positional.get(index)
    }

    pub fn keywords(&self) -> &BTreeMap<String, Arg> {
        &self.keywords
    }

    pub fn keyword(&self, name: &str) -> Option<&Arg> {
        self.keywords.get(name)
    }

    pub fn has_block(&self) -> bool {
        self.block
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keywords.is_empty() && !self.block
    }

    /// Consume the call shape and derive its cache key.
    pub fn into_key(self) -> CallKey {
        build_key(self.positional, self.keywords, self.block)
    }
}

/// Conversion from a decorator's typed argument value into a call shape.
///
/// Implemented for `()`, tuples of up to six `Into<Arg>` values and `CallArgs`
/// itself (the escape hatch for keyword and block calls).
pub trait IntoCallArgs {
    fn to_call_args(&self) -> CallArgs;
}

impl IntoCallArgs for () {
    fn to_call_args(&self) -> CallArgs {
        CallArgs::none()
    }
}

impl IntoCallArgs for CallArgs {
    fn to_call_args(&self) -> CallArgs {
        self.clone()
    }
}

macro_rules! tuple_into_call_args {
    ($($name:ident),+) => {
        impl<$($name),+> IntoCallArgs for ($($name,)+)
        where
            $($name: Clone + Into<Arg>,)+
        {
            #[allow(non_snake_case)]
            fn to_call_args(&self) -> CallArgs {
                let ($($name,)+) = self;
                CallArgs::new()$(.arg($name.clone()))+
            }
        }
    };
}

tuple_into_call_args!(A);
tuple_into_call_args!(A, B);
tuple_into_call_args!(A, B, C);
tuple_into_call_args!(A, B, C, D);
tuple_into_call_args!(A, B, C, D, E);
tuple_into_call_args!(A, B, C, D, E, F);
