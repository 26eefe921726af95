//! Error types for mirror driver operations.
//!
//! Every error is fatal to the session that raised it: the driver never
//! retries, and a failed exchange leaves the peer's counter in an unknown
//! state, so the session is closed before the error is surfaced.

use mirrorfd_proto::CodecError;

/// Alias for `Result<T, mirrorfd::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by mirror driver operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A message failed to encode or decode (short buffer, wrong magic or
    /// version, unknown op).
    #[error(transparent)]
    Malformed(#[from] CodecError),

    /// A reply carried a session token other than this session's.
    #[error("protocol desync: reply session token {found:#010x}, expected {expected:#010x}")]
    Desync {
        /// Token fixed at OPEN for this session.
        expected: u32,
        /// Token the reply carried.
        found: u32,
    },

    /// A reply echoed an exchange count other than the request's.
    #[error("reply out of sequence: xmit count {found}, expected {expected}")]
    Sequence {
        /// Count stamped on the request.
        expected: u32,
        /// Count the reply echoed.
        found: u32,
    },

    /// The remote writer explicitly reported a failure.
    #[error("remote writer: {0}")]
    Remote(String),

    /// A socket connect, read, or write failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The operation is not supported by this write-only driver.
    #[error("{0} is not supported by the mirror driver")]
    Unsupported(&'static str),

    /// The session has been closed, by `close` or by an earlier fatal error.
    #[error("session is not open")]
    NotOpen,

    /// The file path is unusable (empty, or too long for the wire slot).
    #[error("invalid file path: {0}")]
    InvalidPath(&'static str),

    /// The maximum address is unusable (zero).
    #[error("invalid maximum address {0:#x}")]
    InvalidMaxAddr(u64),
}
