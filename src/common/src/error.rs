//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Generic error types.
///
/// This enumerate type includes common error causes. Unlike graphics backends
/// where API contract violations are escalated to `panic!`, misordered calls
/// on command buffers and queues are reported as `FailedPrecondition` so the
/// caller can recover from them.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, thiserror::Error)]
pub enum ErrorKind {
    /// An argument failed validation (e.g., a malformed submission batch).
    #[error("invalid argument")]
    InvalidArgument,

    /// The object is not in a state where the operation is permitted. Examples
    /// include recording into a finalized command buffer and replaying a
    /// one-shot command buffer twice.
    #[error("failed precondition")]
    FailedPrecondition,

    /// Ran out of host memory, or the arena block pool reached its limit.
    #[error("resource exhausted")]
    ResourceExhausted,

    /// A deadline elapsed before the awaited condition was met. This is not a
    /// failure of the awaited work; the operation can be retried.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The operation was skipped because some work it depends on failed.
    #[error("aborted")]
    Aborted,

    /// The executor is shutting down.
    #[error("unavailable")]
    Unavailable,

    /// Any error that is not part of this list.
    #[error("internal error")]
    Internal,
}

/// The generic error type used throughout the task runtime.
///
/// `Error` is cheap to clone so that a failure retained by a scope can be
/// handed to every thread observing it.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    error: Option<Arc<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, error: None }
    }

    pub fn with_detail<E>(kind: ErrorKind, error: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Self {
            kind,
            error: Some(Arc::from(error.into())),
        }
    }

    pub fn get_ref(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.error.as_ref().map(|e| &**e)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns `true` if this error represents an elapsed timeout rather than
    /// a failure.
    pub fn is_deadline_exceeded(&self) -> bool {
        self.kind == ErrorKind::DeadlineExceeded
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref error) = self.error {
            write!(fmt, "{}: {}", self.kind, error)
        } else {
            write!(fmt, "{}", self.kind)
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self.error {
            Some(ref error) => Some(&**error),
            None => None,
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind)
    }
}

pub type Result<T> = ::std::result::Result<T, Error>;
