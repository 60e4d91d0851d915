//! Error handling utilities shared across the crate.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Convenient result type used throughout the crate.
pub type Result<T, E = ChatprepError> = std::result::Result<T, E>;

/// Kind of named entity that a lookup failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// A corpus registered in a [`crate::Session`].
    Corpus,
    /// A trained tokenizer registered in a [`crate::Session`].
    Tokenizer,
    /// A message addressed by chat id and line index.
    Message,
    /// A sender name or id.
    Sender,
    /// The sender table of a corpus that was never encoded.
    SenderTable,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityKind::Corpus => "corpus",
            EntityKind::Tokenizer => "tokenizer",
            EntityKind::Message => "message",
            EntityKind::Sender => "sender",
            EntityKind::SenderTable => "sender table",
        };
        f.write_str(label)
    }
}

/// Domain-specific error describing failures while building or transforming a chat corpus.
#[derive(Debug, Error)]
pub enum ChatprepError {
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Filesystem IO error with optional context path.
    #[error("io error while processing {path:?}: {source}")]
    Io {
        /// Underlying IO error returned by the standard library.
        source: std::io::Error,
        /// Target path associated with the IO failure if available.
        path: Option<PathBuf>,
    },
    /// An operation that needs at least one message ran on an empty corpus.
    #[error("cannot {operation} an empty corpus")]
    EmptyCorpus {
        /// Short description of the rejected operation.
        operation: &'static str,
    },
    /// A named entity could not be resolved.
    #[error("{kind} not found: {key}")]
    NotFound {
        /// What was being looked up.
        kind: EntityKind,
        /// The key that failed to resolve.
        key: String,
    },
    /// Sender names were already replaced by ids.
    #[error("senders are already encoded; the corpus cannot be re-encoded or extended")]
    SendersEncoded,
    /// Shifting timestamps by `delta` hours would leave the `i64` range.
    #[error("time shift of {delta} hours overflows the time base")]
    TimeOverflow {
        /// The rejected shift.
        delta: i64,
    },
    /// Error bubbled up from the `tokenizers` crate.
    #[error("huggingface tokenizers error: {0}")]
    Tokenizers(String),
    /// Catch-all variant for invariants that should not occur.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<tokenizers::Error> for ChatprepError {
    fn from(err: tokenizers::Error) -> Self {
        Self::Tokenizers(err.to_string())
    }
}

impl From<rayon::ThreadPoolBuildError> for ChatprepError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Self::Internal(format!("unable to build worker pool: {err}"))
    }
}

impl ChatprepError {
    /// Helper constructor that attaches an optional path when wrapping IO errors.
    pub fn io(source: std::io::Error, path: Option<PathBuf>) -> Self {
        Self::Io { source, path }
    }

    /// Helper constructor for [`ChatprepError::NotFound`].
    pub fn not_found(kind: EntityKind, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            key: key.into(),
        }
    }

    /// Helper constructor for [`ChatprepError::EmptyCorpus`].
    pub fn empty_corpus(operation: &'static str) -> Self {
        Self::EmptyCorpus { operation }
    }
}
