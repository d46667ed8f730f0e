//! Error classification for store operations
//!
//! Every failure leaving the store is a [`CrudError`]. Its [`ErrorKind`] is a
//! closed set, and the caller/server class is fixed by the kind when the
//! error is built. Transports pick status codes from
//! [`CrudError::is_server_error`] and, where they need finer detail, from
//! [`CrudError::kind`].

use projects_domain::BackendError;
use std::fmt;
use thiserror::Error;

/// Store operation an error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// List every project
    List,
    /// Read one project
    Read,
    /// Create a project
    Create,
    /// Update a project
    Update,
    /// Delete a project
    Delete,
    /// Compare index and hashes
    Audit,
    /// Repair index/hash drift
    Reconcile,
}

impl Operation {
    /// Upper-case label used in messages and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::List => "LIST",
            Operation::Read => "READ",
            Operation::Create => "CREATE",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
            Operation::Audit => "AUDIT",
            Operation::Reconcile => "RECONCILE",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who a failure is attributable to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request or its input (4xx)
    Caller,
    /// The backend or the server (5xx)
    Server,
}

/// What went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No structure exists for the requested project
    NotFound,
    /// Input rejected before reaching the backend
    Validation,
    /// The backend could not be reached
    Connectivity,
    /// The backend answered with an error
    UnknownStore,
}

impl ErrorKind {
    /// Caller/server class of this kind
    pub fn class(&self) -> ErrorClass {
        match self {
            ErrorKind::NotFound | ErrorKind::Validation => ErrorClass::Caller,
            ErrorKind::Connectivity | ErrorKind::UnknownStore => ErrorClass::Server,
        }
    }
}

/// Classified failure of a store operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{operation}] {message} (context: {context})")]
pub struct CrudError {
    kind: ErrorKind,
    class: ErrorClass,
    operation: Operation,
    message: String,
    context: String,
}

impl CrudError {
    /// Build an error; the class follows from `kind`
    pub fn new(
        kind: ErrorKind,
        operation: Operation,
        message: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            class: kind.class(),
            operation,
            message: message.into(),
            context: context.into(),
        }
    }

    /// The project `name` has no backing structure
    pub fn not_found(name: &str, key: &str) -> Self {
        Self::new(
            ErrorKind::NotFound,
            Operation::Read,
            format!("Project with name `{}` does not exist", name),
            key,
        )
    }

    /// Input rejected before any backend call
    pub fn validation(operation: Operation, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, operation, message, "request")
    }

    /// Wrap a backend failure; `context` names the key or set involved
    pub fn backend(err: BackendError, operation: Operation, context: impl Into<String>) -> Self {
        let kind = match err {
            BackendError::Connection(_) => ErrorKind::Connectivity,
            BackendError::Protocol(_) => ErrorKind::UnknownStore,
        };
        Self::new(kind, operation, err.to_string(), context)
    }

    /// What went wrong
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Caller or server
    pub fn class(&self) -> ErrorClass {
        self.class
    }

    /// True when the backend or server is at fault
    pub fn is_server_error(&self) -> bool {
        self.class == ErrorClass::Server
    }

    /// Operation that failed
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Human-readable message, suitable for a client
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Key or set the failure concerns
    pub fn context(&self) -> &str {
        &self.context
    }
}
