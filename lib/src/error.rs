//! Error taxonomy of the physics core.

use std::{error::Error, fmt};

#[derive(Clone, Debug, PartialEq)]
pub enum PhysicsError {
    /// Attempted to invert a matrix whose determinant is (numerically) zero.
    SingularMatrix { determinant: f64 },
    /// Attempted to normalise a vector of zero or non-finite length.
    ZeroLengthVector,
    /// The migration target has no free body slot.
    DestinationFull { system: String, capacity: usize },
    /// A hierarchical path, name or id did not resolve.
    NotFound { path: String },
    /// A configuration record is missing data or is physically meaningless.
    InvalidConfiguration { record: String, reason: String },
    /// A handle refers to a slot that has since been vacated or reused.
    InvalidHandle { what: &'static str, index: usize },
    /// A stage separation was requested while none is possible.
    DetachUnavailable { spacecraft: String },
    /// A step length that is negative, infinite or NaN.
    InvalidTimeStep { dt: f64 },
}

impl PhysicsError {
    pub(crate) fn invalid_config(record: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            record: record.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }
}

impl fmt::Display for PhysicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SingularMatrix { determinant } => {
                write!(f, "matrix is singular (determinant = {determinant:e})")
            }
            Self::ZeroLengthVector => write!(f, "cannot normalise a zero-length vector"),
            Self::DestinationFull { system, capacity } => write!(
                f,
                "no space in destination system {system:?} (capacity {capacity}), cannot migrate object"
            ),
            Self::NotFound { path } => write!(f, "{path:?} not found"),
            Self::InvalidConfiguration { record, reason } => {
                write!(f, "invalid configuration for {record:?}: {reason}")
            }
            Self::InvalidHandle { what, index } => {
                write!(f, "stale or invalid {what} handle (index {index})")
            }
            Self::DetachUnavailable { spacecraft } => {
                write!(f, "no stage can be detached from {spacecraft:?} right now")
            }
            Self::InvalidTimeStep { dt } => write!(f, "invalid time step {dt} s"),
        }
    }
}

impl Error for PhysicsError {}

pub type Result<T, E = PhysicsError> = std::result::Result<T, E>;
