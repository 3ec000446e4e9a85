//! Error types for drivelease.
//!
//! Uses thiserror for derive macros. Every variant maps to one exit code and
//! to one recovery tag, so a failure keeps its category all the way from the
//! component that detected it to the process status.

use crate::exit_codes;
use thiserror::Error;

/// Tags at or above this value mark a deliberate transfer to the recovery
/// point; tags below it are signal numbers.
pub const PROTOCOL_TAG_BASE: i32 = 1000;

/// Main error type for drivelease operations.
#[derive(Error, Debug)]
pub enum LeaseError {
    /// Bad handle, bad attribute, or otherwise invalid input.
    #[error("{0}")]
    UserError(String),

    /// Configuration file could not be read or is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The broker rejected a request outright.
    #[error("broker error: {0}")]
    Broker(String),

    /// The broker did not answer within the bound.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The allocation reply carried a request id other than ours.
    #[error("allocation reply mismatch: expected request {expected}, got {got}")]
    Mismatch { expected: i64, got: i64 },

    /// The volume was mounted on a drive other than the leased one.
    #[error("mount landed on {got_host}.{got_device} instead of {host}.{device}")]
    IdentityMismatch {
        host: String,
        device: String,
        got_host: String,
        got_device: String,
    },

    /// The broker answered the mount request with a failure status.
    #[error("mount failed with status {status}: {message}")]
    MountFailed { status: i32, message: String },

    /// The drive never reported ready after the mount.
    #[error("device {0} never became ready")]
    ReadinessTimeout(String),

    /// A device control operation failed.
    #[error("device error: {0}")]
    Device(String),

    /// A termination signal arrived.
    #[error("interrupted by signal {0}")]
    Interrupted(i32),

    /// A failed allocate that went through the recovery point, which settled
    /// the exit code.
    #[error("{cause}")]
    Aborted {
        exit_code: i32,
        cause: Box<LeaseError>,
    },

    /// Filesystem failure on our own state files.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl LeaseError {
    /// Wrap an io error with a short description of what was attempted.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        LeaseError::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LeaseError::Timeout(_) | LeaseError::ReadinessTimeout(_) => exit_codes::TIMEOUT,
            LeaseError::Interrupted(_) => exit_codes::INTERRUPTED,
            LeaseError::Aborted { exit_code, .. } => *exit_code,
            LeaseError::UserError(_)
            | LeaseError::Config(_)
            | LeaseError::Broker(_)
            | LeaseError::Mismatch { .. }
            | LeaseError::IdentityMismatch { .. }
            | LeaseError::MountFailed { .. }
            | LeaseError::Device(_)
            | LeaseError::Io { .. } => exit_codes::FAILURE,
        }
    }

    /// The tag this failure transfers to the recovery point with.
    pub fn recovery_tag(&self) -> i32 {
        match self {
            LeaseError::Interrupted(signal) => *signal,
            other => PROTOCOL_TAG_BASE + other.exit_code(),
        }
    }
}

/// Result type alias for drivelease operations.
pub type Result<T> = std::result::Result<T, LeaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_exit_with_timeout_code() {
        assert_eq!(
            LeaseError::Timeout("alloc".to_string()).exit_code(),
            exit_codes::TIMEOUT
        );
        assert_eq!(
            LeaseError::ReadinessTimeout("h.d".to_string()).exit_code(),
            exit_codes::TIMEOUT
        );
    }

    #[test]
    fn protocol_failures_exit_with_failure_code() {
        let err = LeaseError::MountFailed {
            status: 7,
            message: "no such volume".to_string(),
        };
        assert_eq!(err.exit_code(), exit_codes::FAILURE);
        assert_eq!(
            LeaseError::Mismatch {
                expected: 1,
                got: 2
            }
            .exit_code(),
            exit_codes::FAILURE
        );
    }

    #[test]
    fn interrupted_tag_is_the_signal_number() {
        let err = LeaseError::Interrupted(15);
        assert_eq!(err.recovery_tag(), 15);
        assert_eq!(err.exit_code(), exit_codes::INTERRUPTED);
    }

    #[test]
    fn protocol_tag_carries_exit_code() {
        let err = LeaseError::ReadinessTimeout("robot1.drv3".to_string());
        assert_eq!(err.recovery_tag(), PROTOCOL_TAG_BASE + exit_codes::TIMEOUT);

        let err = LeaseError::Broker("rejected".to_string());
        assert_eq!(err.recovery_tag(), PROTOCOL_TAG_BASE + exit_codes::FAILURE);
    }

    #[test]
    fn aborted_keeps_cause_message_and_recovered_code() {
        let err = LeaseError::Aborted {
            exit_code: exit_codes::FAILURE,
            cause: Box::new(LeaseError::Interrupted(15)),
        };
        assert_eq!(err.exit_code(), exit_codes::FAILURE);
        assert_eq!(err.to_string(), "interrupted by signal 15");
    }

    #[test]
    fn error_messages_are_descriptive() {
        let err = LeaseError::IdentityMismatch {
            host: "robot1".to_string(),
            device: "drv3".to_string(),
            got_host: "robot1".to_string(),
            got_device: "drv4".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "mount landed on robot1.drv4 instead of robot1.drv3"
        );
    }
}
