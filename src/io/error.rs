//! Error types for solver construction and execution

use std::fmt;
use std::path::PathBuf;

/// Main error type for all solver operations
///
/// Timeouts and exhausted searches are normal terminal states and are
/// reported through run summaries, never through this type.
#[derive(Debug)]
pub enum SolverError {
    /// Configuration validation failed before the run started
    InvalidParameter {
        /// Name of the invalid parameter
        parameter: &'static str,
        /// Provided value that failed validation
        value: String,
        /// Explanation of why the value is invalid
        reason: String,
    },

    /// Container or placement geometry is structurally invalid
    ///
    /// Placements that merely fall outside the container are dropped
    /// silently at compile time; this variant covers malformed input such
    /// as duplicate container cells or overlapping pre-placed pieces.
    InvalidGeometry {
        /// Description of what is wrong with the geometry
        reason: String,
    },

    /// A memory budget would be exceeded
    ///
    /// Raised at construction time; the solver never silently truncates
    /// candidate tables or the transposition table.
    CapacityExceeded {
        /// Name of the bounded resource
        resource: &'static str,
        /// Requested size
        requested: usize,
        /// Maximum permitted size
        limit: usize,
    },

    /// A worker session could not be constructed
    ///
    /// Aborts the whole pool start. Mid-run worker failures are reported
    /// through the terminal summary instead.
    WorkerInit {
        /// Index of the failed worker
        worker: usize,
        /// Description of the failure
        reason: String,
    },

    /// A snapshot could not be restored
    Snapshot {
        /// Description of the mismatch
        reason: String,
    },

    /// A puzzle description file could not be parsed
    Parse {
        /// Path to the offending file
        path: PathBuf,
        /// Underlying parse failure
        reason: String,
    },

    /// General file system operation failure
    FileSystem {
        /// Path involved in the operation
        path: PathBuf,
        /// Description of the operation that failed
        operation: &'static str,
        /// Underlying I/O error
        source: std::io::Error,
    },
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParameter {
                parameter,
                value,
                reason,
            } => {
                write!(f, "Invalid parameter '{parameter}' = '{value}': {reason}")
            }
            Self::InvalidGeometry { reason } => {
                write!(f, "Invalid geometry: {reason}")
            }
            Self::CapacityExceeded {
                resource,
                requested,
                limit,
            } => {
                write!(
                    f,
                    "Capacity exceeded for {resource}: requested {requested}, limit {limit}"
                )
            }
            Self::WorkerInit { worker, reason } => {
                write!(f, "Worker {worker} failed to initialize: {reason}")
            }
            Self::Snapshot { reason } => {
                write!(f, "Snapshot cannot be restored: {reason}")
            }
            Self::Parse { path, reason } => {
                write!(f, "Failed to parse puzzle '{}': {reason}", path.display())
            }
            Self::FileSystem {
                path,
                operation,
                source,
            } => {
                write!(
                    f,
                    "File system error during {operation} on '{}': {source}",
                    path.display()
                )
            }
        }
    }
}

impl std::error::Error for SolverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::FileSystem { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Convenience type alias for solver results
pub type Result<T> = std::result::Result<T, SolverError>;

/// Create an invalid parameter error
pub fn invalid_parameter(
    parameter: &'static str,
    value: &impl ToString,
    reason: &impl ToString,
) -> SolverError {
    SolverError::InvalidParameter {
        parameter,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Create an invalid geometry error
pub fn invalid_geometry(reason: &impl ToString) -> SolverError {
    SolverError::InvalidGeometry {
        reason: reason.to_string(),
    }
}

/// Create a capacity exceeded error
pub const fn capacity_exceeded(
    resource: &'static str,
    requested: usize,
    limit: usize,
) -> SolverError {
    SolverError::CapacityExceeded {
        resource,
        requested,
        limit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_formats_parameter_errors() {
        let err = invalid_parameter("batch_size", &0, &"must be at least 1");
        assert_eq!(
            err.to_string(),
            "Invalid parameter 'batch_size' = '0': must be at least 1"
        );
    }

    #[test]
    fn test_capacity_error_carries_sizes() {
        let err = capacity_exceeded("transposition table", 1 << 30, 1 << 26);
        match err {
            SolverError::CapacityExceeded {
                requested, limit, ..
            } => {
                assert!(requested > limit);
            }
            _ => unreachable!("Expected CapacityExceeded error type"),
        }
    }
}
