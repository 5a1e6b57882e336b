//! Operation and receiver identity.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

/// Binding context of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Bound to each instance; every instance owns its own cache.
    Instance,
    /// Bound to the type itself; one cache shared by the whole type.
    Static,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Instance => "instance",
            Scope::Static => "static",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable identity of a memoized operation.
///
/// Two identities with the same name but different scopes are never equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationId {
    scope: Scope,
    name: Arc<str>,
}

impl OperationId {
    pub fn new(scope: Scope, name: impl Into<Arc<str>>) -> Self {
        Self {
            scope,
            name: name.into(),
        }
    }

    pub fn instance(name: impl Into<Arc<str>>) -> Self {
        Self::new(Scope::Instance, name)
    }

    pub fn static_scope(name: impl Into<Arc<str>>) -> Self {
        Self::new(Scope::Static, name)
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope {
            Scope::Instance => write!(f, "instance#{}", self.name),
            Scope::Static => write!(f, "static.{}", self.name),
        }
    }
}

/// Identity of one instance receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReceiverId(Uuid);

impl ReceiverId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ReceiverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Selects a partition in a `MemoTable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReceiverKey {
    /// The type's own singleton receiver.
    Static,
    Instance(ReceiverId),
}

impl fmt::Display for ReceiverKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiverKey::Static => f.write_str("static"),
            ReceiverKey::Instance(id) => id.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_in_different_scopes_is_distinct() {
        let instance = OperationId::instance("no_args");
        let class = OperationId::static_scope("no_args");
        assert_eq!(instance.name(), class.name());
        assert_ne!(instance, class);
    }

    #[test]
    fn display_marks_scope() {
        assert_eq!(
            OperationId::instance("with_positional_args").to_string(),
            "instance#with_positional_args"
        );
        assert_eq!(OperationId::static_scope("no_args").to_string(), "static.no_args");
    }

    #[test]
    fn receiver_ids_are_unique() {
        assert_ne!(ReceiverId::new(), ReceiverId::new());
    }
}
