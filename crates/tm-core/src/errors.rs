//! Error types for the integrator workspace.
//!
//! Every failure maps onto one of three categories:
//! - **Configuration**: inconsistent dimensions or invalid scalars, detected before
//!   any allocation or before a step touches state
//! - **Resource**: allocation, device, module or random-source creation failure
//! - **Compute**: failure inside a per-step stage or linear-algebra call
//!
//! A compute error leaves the integrator in an undefined state. Steps are not
//! transactional and nothing is rolled back; callers must rebuild the instance.

use thiserror::Error;

/// Unified error type for all integrator operations.
#[derive(Error, Debug)]
pub enum TmError {
    /// Invalid configuration values (scalars out of range, empty sizes)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A buffer or coefficient vector has the wrong length
    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    /// Lifecycle violation, e.g. stepping before positions were set
    #[error("Integrator not ready: {0}")]
    NotReady(String),

    /// Allocation / device / random-source acquisition failure
    #[error("Resource error in {context}: {message}")]
    ResourceError { context: String, message: String },

    /// Failure inside a per-step stage
    #[error("Compute error in {stage}: {message}")]
    ComputeError { stage: String, message: String },

    /// I/O errors (config files, request files)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Config or message (de)serialization failure
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Coarse classification of a [`TmError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Resource,
    Compute,
}

impl TmError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        TmError::ConfigError(message.into())
    }

    /// Creates a dimension mismatch error.
    pub fn dimension(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        TmError::DimensionMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }

    /// Creates a lifecycle error.
    pub fn not_ready(message: impl Into<String>) -> Self {
        TmError::NotReady(message.into())
    }

    /// Creates a resource error with context.
    pub fn resource(context: impl Into<String>, message: impl Into<String>) -> Self {
        TmError::ResourceError {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Creates a compute error for the named stage.
    pub fn compute(stage: impl Into<String>, message: impl Into<String>) -> Self {
        TmError::ComputeError {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Returns the category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TmError::ConfigError(_)
            | TmError::DimensionMismatch { .. }
            | TmError::NotReady(_)
            | TmError::IoError(_)
            | TmError::SerializationError(_) => ErrorKind::Configuration,
            TmError::ResourceError { .. } => ErrorKind::Resource,
            TmError::ComputeError { .. } => ErrorKind::Compute,
        }
    }

    /// True when the instance that produced this error must be rebuilt.
    ///
    /// Configuration errors raised by input validation are detected before any
    /// state is mutated, so the integrator stays usable.
    pub fn poisons_instance(&self) -> bool {
        matches!(self.kind(), ErrorKind::Compute)
    }
}

/// Result alias used throughout the workspace.
pub type TmResult<T> = Result<T, TmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_display() {
        let err = TmError::dimension("coefficient b", 4, 3);
        assert_eq!(
            err.to_string(),
            "Dimension mismatch for coefficient b: expected 4, got 3"
        );
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(TmError::config("x").kind(), ErrorKind::Configuration);
        assert_eq!(TmError::not_ready("x").kind(), ErrorKind::Configuration);
        assert_eq!(TmError::resource("alloc", "oom").kind(), ErrorKind::Resource);
        assert_eq!(TmError::compute("gemm", "nan").kind(), ErrorKind::Compute);
    }

    #[test]
    fn test_only_compute_poisons() {
        assert!(TmError::compute("window", "launch failed").poisons_instance());
        assert!(!TmError::dimension("grad", 3, 2).poisons_instance());
        assert!(!TmError::resource("device", "none").poisons_instance());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.toml");
        let err: TmError = io.into();
        assert!(err.to_string().contains("missing.toml"));
    }
}
