//! Error handling for RoiAlign
//!
//! Shape and buffer preconditions are checked up front; a failed check
//! means nothing was written to the output.

use thiserror::Error;

/// Result type alias for RoiAlign operations
pub type Result<T> = std::result::Result<T, RoiAlignError>;

/// Main error type for RoiAlign operations
#[derive(Error, Debug)]
pub enum RoiAlignError {
    // Shape Errors
    #[error("Invalid rank for {tensor} tensor: expected {expected}, got {actual}")]
    InvalidRank {
        tensor: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid ROI record length {length} (expected 4 or 5)")]
    InvalidRoiInfoLength { length: u32 },

    #[error("Axis {axis} is out of range for rank {rank}")]
    AxisOutOfRange { axis: usize, rank: usize },

    #[error("Dimension {axis} of the {tensor} tensor must be non-zero")]
    EmptyDimension { tensor: &'static str, axis: usize },

    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: String,
        expected: u32,
        actual: u32,
    },

    #[error("Buffer size mismatch for {tensor} tensor: expected {expected} elements, got {actual}")]
    BufferSizeMismatch {
        tensor: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Element count of shape {shape} overflows usize")]
    ShapeOverflow { shape: String },

    #[error("Invalid shape '{input}': {reason}")]
    InvalidShape { input: String, reason: String },

    // ROI Errors
    #[error("ROI {roi} has batch index {batch_index} outside 0..{num_batches}")]
    BatchIndexOutOfRange {
        roi: usize,
        batch_index: f32,
        num_batches: u32,
    },

    // Parameter Errors
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    // Fixture Errors
    #[error("Fixture '{name}' has no expected output")]
    MissingExpected { name: String },

    #[error("Fixture '{name}' mismatch: max abs diff {max_abs_diff:e} exceeds tolerance {tolerance:e}")]
    FixtureMismatch {
        name: String,
        max_abs_diff: f32,
        tolerance: f32,
    },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RoiAlignError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            RoiAlignError::InvalidRank { .. } => "INVALID_RANK",
            RoiAlignError::InvalidRoiInfoLength { .. } => "INVALID_ROI_INFO_LENGTH",
            RoiAlignError::AxisOutOfRange { .. } => "AXIS_OUT_OF_RANGE",
            RoiAlignError::EmptyDimension { .. } => "EMPTY_DIMENSION",
            RoiAlignError::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            RoiAlignError::BufferSizeMismatch { .. } => "BUFFER_SIZE_MISMATCH",
            RoiAlignError::ShapeOverflow { .. } => "SHAPE_OVERFLOW",
            RoiAlignError::InvalidShape { .. } => "INVALID_SHAPE",
            RoiAlignError::BatchIndexOutOfRange { .. } => "BATCH_INDEX_OUT_OF_RANGE",
            RoiAlignError::InvalidParameter { .. } => "INVALID_PARAMETER",
            RoiAlignError::MissingExpected { .. } => "MISSING_EXPECTED",
            RoiAlignError::FixtureMismatch { .. } => "FIXTURE_MISMATCH",
            RoiAlignError::Io(_) => "IO_ERROR",
            RoiAlignError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is a violated kernel precondition
    ///
    /// These are raised before any output element is written.
    pub fn is_precondition_violation(&self) -> bool {
        matches!(
            self,
            RoiAlignError::InvalidRank { .. }
                | RoiAlignError::InvalidRoiInfoLength { .. }
                | RoiAlignError::AxisOutOfRange { .. }
                | RoiAlignError::EmptyDimension { .. }
                | RoiAlignError::DimensionMismatch { .. }
                | RoiAlignError::BufferSizeMismatch { .. }
                | RoiAlignError::ShapeOverflow { .. }
                | RoiAlignError::BatchIndexOutOfRange { .. }
                | RoiAlignError::InvalidParameter { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = RoiAlignError::InvalidRoiInfoLength { length: 3 };
        assert_eq!(err.error_code(), "INVALID_ROI_INFO_LENGTH");
        assert!(err.is_precondition_violation());

        let err = RoiAlignError::ShapeOverflow {
            shape: "[65536, 65536, 65536, 65536]".to_string(),
        };
        assert_eq!(err.error_code(), "SHAPE_OVERFLOW");
        assert!(err.is_precondition_violation());
    }

    #[test]
    fn test_fixture_errors_are_not_preconditions() {
        let err = RoiAlignError::FixtureMismatch {
            name: "quadrants".to_string(),
            max_abs_diff: 0.5,
            tolerance: 1e-5,
        };
        assert_eq!(err.error_code(), "FIXTURE_MISMATCH");
        assert!(!err.is_precondition_violation());
    }

    #[test]
    fn test_error_display() {
        let err = RoiAlignError::BatchIndexOutOfRange {
            roi: 2,
            batch_index: 3.0,
            num_batches: 2,
        };
        assert_eq!(err.to_string(), "ROI 2 has batch index 3 outside 0..2");
    }
}
