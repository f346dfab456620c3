//! Shared error vocabulary for the serial core.
//!
//! Every fallible operation in this crate returns one of these kinds.
//! `Busy` and `NoMemory` always surface to the immediate caller and are
//! never retried internally; retry policy belongs above this layer.

/// Operation error kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// A transmission is already in flight on this line.
    Busy,
    /// Heap allocation failed while building a buffer or frame.
    NoMemory,
    /// Malformed configuration input (e.g. a baud rate of zero).
    WrongArgument,
    /// Reserved: not raised by this core, part of the vocabulary shared
    /// with collaborators.
    Timeout,
    /// Unrecoverable logic error; details latched in [`crate::fault`].
    Internal,
}

impl Error {
    /// Short code string for terse line-oriented output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Busy => "E-BUSY",
            Self::NoMemory => "E-NOMEM",
            Self::WrongArgument => "E-ARG",
            Self::Timeout => "E-TIMEOUT",
            Self::Internal => "E-INTERNAL",
        }
    }

    /// Human-readable description.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Busy => "transmission already in progress",
            Self::NoMemory => "out of memory",
            Self::WrongArgument => "invalid argument",
            Self::Timeout => "operation timed out",
            Self::Internal => "internal fault",
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

/// Crate-wide result alias.
pub type Result<T> = core::result::Result<T, Error>;
