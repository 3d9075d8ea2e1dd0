//! Shared error taxonomy for the storage-plane core.
//!
//! Every crate in the workspace returns [`DistfsError`] so that a single
//! numeric code travels unchanged from wherever a failure originates down
//! to the framed `ERROR` reply a client receives. [`DistfsError::InvalidMessage`]
//! covers wire-decode failures that do not map onto any other kind.

use std::fmt;

use thiserror::Error;

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, DistfsError>;

/// The stable error taxonomy shared by every storage-node component.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DistfsError {
    /// A caller-supplied argument was structurally invalid.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),
    /// An allocation could not be satisfied.
    #[error("out of memory")]
    OutOfMemory,
    /// The requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The entity already exists and the operation requires it not to.
    #[error("already exists: {0}")]
    AlreadyExists(String),
    /// The caller lacks permission for the requested operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// A network operation failed (connection reset, broken pipe, ...).
    #[error("network failure: {0}")]
    NetworkFailure(String),
    /// The target node could not be reached or is not a ring member.
    #[error("node unavailable: {0}")]
    NodeUnavailable(String),
    /// Data read back did not match its recorded checksum.
    #[error("consistency violation: {0}")]
    ConsistencyViolation(String),
    /// The allocator has no free blocks remaining.
    #[error("storage full")]
    StorageFull,
    /// An operation exceeded its configured deadline.
    #[error("timeout: {0}")]
    Timeout(String),
    /// A component that may only be initialized once was initialized again.
    #[error("already initialized: {0}")]
    AlreadyInitialized(String),
    /// An unrecoverable OS-level failure (syscall error, corrupted state).
    #[error("system error: {0}")]
    SystemError(String),
    /// A file required for operation could not be opened.
    #[error("file open failed: {0}")]
    FileOpenFailed(String),
    /// The requested operation or message type is not implemented.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
    /// A decoded wire message failed structural or checksum validation.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
    /// Catch-all for failures that do not fit another kind.
    #[error("unknown error: {0}")]
    Unknown(String),
}

impl DistfsError {
    /// Returns the stable numeric code carried in a framed `ERROR` payload.
    #[must_use]
    pub const fn code(&self) -> u32 {
        match self {
            Self::InvalidParam(_) => 1,
            Self::OutOfMemory => 2,
            Self::NotFound(_) => 3,
            Self::AlreadyExists(_) => 4,
            Self::PermissionDenied(_) => 5,
            Self::NetworkFailure(_) => 6,
            Self::NodeUnavailable(_) => 7,
            Self::ConsistencyViolation(_) => 8,
            Self::StorageFull => 9,
            Self::Timeout(_) => 10,
            Self::AlreadyInitialized(_) => 11,
            Self::SystemError(_) => 12,
            Self::FileOpenFailed(_) => 13,
            Self::UnsupportedOperation(_) => 14,
            Self::InvalidMessage(_) => 15,
            Self::Unknown(_) => 16,
        }
    }

    /// Reconstructs an error from a numeric code carried on the wire, for
    /// clients that only ever see the 4-byte `ERROR` payload and need a
    /// human string to report. The detail text is synthetic since the
    /// original message is not transmitted.
    #[must_use]
    pub fn from_code(code: u32) -> Self {
        let detail = || "remote error".to_owned();
        match code {
            1 => Self::InvalidParam(detail()),
            2 => Self::OutOfMemory,
            3 => Self::NotFound(detail()),
            4 => Self::AlreadyExists(detail()),
            5 => Self::PermissionDenied(detail()),
            6 => Self::NetworkFailure(detail()),
            7 => Self::NodeUnavailable(detail()),
            8 => Self::ConsistencyViolation(detail()),
            9 => Self::StorageFull,
            10 => Self::Timeout(detail()),
            11 => Self::AlreadyInitialized(detail()),
            12 => Self::SystemError(detail()),
            13 => Self::FileOpenFailed(detail()),
            14 => Self::UnsupportedOperation(detail()),
            15 => Self::InvalidMessage(detail()),
            _ => Self::Unknown(detail()),
        }
    }
}

impl From<std::io::Error> for DistfsError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::NotFound => Self::NotFound(err.to_string()),
            ErrorKind::PermissionDenied => Self::PermissionDenied(err.to_string()),
            ErrorKind::AlreadyExists => Self::AlreadyExists(err.to_string()),
            ErrorKind::TimedOut => Self::Timeout(err.to_string()),
            _ => Self::SystemError(err.to_string()),
        }
    }
}

/// A textual lookup table for clients that only carry a numeric code and
/// want to render it as a human-readable error kind.
#[must_use]
pub fn code_to_str(code: u32) -> &'static str {
    match code {
        1 => "InvalidParam",
        2 => "OutOfMemory",
        3 => "NotFound",
        4 => "AlreadyExists",
        5 => "PermissionDenied",
        6 => "NetworkFailure",
        7 => "NodeUnavailable",
        8 => "ConsistencyViolation",
        9 => "StorageFull",
        10 => "Timeout",
        11 => "AlreadyInitialized",
        12 => "SystemError",
        13 => "FileOpenFailed",
        14 => "UnsupportedOperation",
        15 => "InvalidMessage",
        16 => "Unknown",
        _ => "Unrecognized",
    }
}

impl fmt::Display for DistfsErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", code_to_str(self.0), self.0)
    }
}

/// Newtype wrapper around a raw numeric error code, used when rendering
/// a code pulled straight off the wire without reconstructing a full
/// [`DistfsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistfsErrorCode(pub u32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_round_trips_for_unit_variants() {
        assert_eq!(DistfsError::from_code(9).code(), 9);
        assert_eq!(DistfsError::from_code(2).code(), 2);
    }

    #[test]
    fn unknown_code_maps_to_unknown_variant() {
        let err = DistfsError::from_code(9999);
        assert!(matches!(err, DistfsError::Unknown(_)));
    }

    #[test]
    fn code_to_str_covers_every_kind() {
        for code in 1..=16 {
            assert_ne!(code_to_str(code), "Unrecognized");
        }
    }

    #[test]
    fn io_not_found_maps_to_not_found() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: DistfsError = io_err.into();
        assert!(matches!(err, DistfsError::NotFound(_)));
    }
}
