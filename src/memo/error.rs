use thiserror::Error;

use super::scope::Scope;

/// Setup-time misuse of the memoization facility.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoError {
    #[error("`{type_name}` defines no {scope} operation named `{operation}`")]
    UnknownOperation {
        type_name: String,
        scope: Scope,
        operation: String,
    },
    #[error("{scope} operation `{operation}` of `{type_name}` is already memoized")]
    AlreadyMemoized {
        type_name: String,
        scope: Scope,
        operation: String,
    },
    #[error("memoize was called for `{type_name}` without naming a {scope} operation")]
    EmptyDeclaration { type_name: String, scope: Scope },
    #[error("{scope} operation `{operation}` of `{type_name}` is not memoized")]
    NotMemoized {
        type_name: String,
        scope: Scope,
        operation: String,
    },
    #[error("{scope} operation `{operation}` of `{type_name}` already has a memoizing wrapper")]
    AlreadyWrapped {
        type_name: String,
        scope: Scope,
        operation: String,
    },
}

impl MemoError {
    pub fn unknown_operation(type_name: &str, scope: Scope, operation: &str) -> Self {
        Self::UnknownOperation {
            type_name: type_name.to_string(),
            scope,
            operation: operation.to_string(),
        }
    }

    pub fn already_memoized(type_name: &str, scope: Scope, operation: &str) -> Self {
        Self::AlreadyMemoized {
            type_name: type_name.to_string(),
            scope,
            operation: operation.to_string(),
        }
    }

    pub fn empty_declaration(type_name: &str, scope: Scope) -> Self {
        Self::EmptyDeclaration {
            type_name: type_name.to_string(),
            scope,
        }
    }

    pub fn not_memoized(type_name: &str, scope: Scope, operation: &str) -> Self {
        Self::NotMemoized {
            type_name: type_name.to_string(),
            scope,
            operation: operation.to_string(),
        }
    }

    pub fn already_wrapped(type_name: &str, scope: Scope, operation: &str) -> Self {
        Self::AlreadyWrapped {
            type_name: type_name.to_string(),
            scope,
            operation: operation.to_string(),
        }
    }
}
