//! Errors produced by the in-memory store.

/// An error returned by [`InMemoryStore`](super::InMemoryStore).
///
/// Messages follow the wording a Redis server uses for the same failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The key holds a value of another type.
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    /// The value is not an integer, or incrementing it would overflow.
    #[error("ERR value is not an integer or out of range")]
    NotInteger,

    /// The client was closed.
    #[error("redis: client is closed")]
    Closed,

    /// No script handler is registered under this name.
    #[error("NOSCRIPT No matching script: {0}")]
    UnknownScript(String),

    /// A failure injected by a test.
    #[error("{0}")]
    Injected(String),
}

impl StoreError {
    /// Creates an injected failure with the given message.
    pub fn injected(message: impl Into<String>) -> Self {
        Self::Injected(message.into())
    }
}
