//! Shape Descriptor
//!
//! Dimension sizes of a tensor, with per-axis lookup.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RoiAlignError};

/// Dimension sizes of a dense row-major tensor
///
/// Serialized as a plain JSON array, e.g. `[1, 4, 4, 1]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Shape {
    dimensions: Vec<u32>,
}

impl Shape {
    /// Create a shape from its dimension sizes
    pub fn new(dimensions: Vec<u32>) -> Self {
        Self { dimensions }
    }

    /// Number of dimensions
    pub fn rank(&self) -> usize {
        self.dimensions.len()
    }

    /// All dimension sizes, outermost first
    pub fn dimensions(&self) -> &[u32] {
        &self.dimensions
    }

    /// Size of one dimension
    ///
    /// # Arguments
    /// * `axis` - Zero-based axis index
    ///
    /// # Returns
    /// The dimension size, or `AxisOutOfRange` if `axis >= rank`
    pub fn size_of_dimension(&self, axis: usize) -> Result<u32> {
        self.dimensions
            .get(axis)
            .copied()
            .ok_or(RoiAlignError::AxisOutOfRange {
                axis,
                rank: self.rank(),
            })
    }

    /// Total number of elements described by this shape
    ///
    /// A rank-0 shape describes a single scalar. The product of the non-zero
    /// dimensions must fit in `usize`, even when another dimension is zero,
    /// so that any partial product taken from the shape is also addressable.
    ///
    /// # Returns
    /// The element count, or `ShapeOverflow` if it cannot be represented
    pub fn num_elements(&self) -> Result<usize> {
        let extent = self
            .dimensions
            .iter()
            .filter(|&&d| d != 0)
            .try_fold(1_usize, |acc, &d| acc.checked_mul(d as usize))
            .ok_or_else(|| RoiAlignError::ShapeOverflow {
                shape: self.to_string(),
            })?;

        if self.dimensions.contains(&0) {
            Ok(0)
        } else {
            Ok(extent)
        }
    }

    /// Fail with `InvalidRank` unless the shape has exactly `expected` dimensions
    pub(crate) fn expect_rank(&self, tensor: &'static str, expected: usize) -> Result<()> {
        if self.rank() != expected {
            return Err(RoiAlignError::InvalidRank {
                tensor,
                expected,
                actual: self.rank(),
            });
        }
        Ok(())
    }
}

impl From<Vec<u32>> for Shape {
    fn from(dimensions: Vec<u32>) -> Self {
        Self::new(dimensions)
    }
}

impl From<&[u32]> for Shape {
    fn from(dimensions: &[u32]) -> Self {
        Self::new(dimensions.to_vec())
    }
}

impl<const N: usize> From<[u32; N]> for Shape {
    fn from(dimensions: [u32; N]) -> Self {
        Self::new(dimensions.to_vec())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dimensions.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

/// Parses comma-separated sizes such as `1,4,4,1`
impl FromStr for Shape {
    type Err = RoiAlignError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_start_matches('[').trim_end_matches(']');
        if trimmed.trim().is_empty() {
            return Ok(Shape::default());
        }

        let dimensions = trimmed
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<u32>()
                    .map_err(|e| RoiAlignError::InvalidShape {
                        input: s.to_string(),
                        reason: format!("'{}': {}", part.trim(), e),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Shape::new(dimensions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_of_dimension() {
        let shape = Shape::from([2, 4, 6, 3]);
        assert_eq!(shape.rank(), 4);
        assert_eq!(shape.size_of_dimension(0).unwrap(), 2);
        assert_eq!(shape.size_of_dimension(3).unwrap(), 3);
        assert!(matches!(
            shape.size_of_dimension(4),
            Err(RoiAlignError::AxisOutOfRange { axis: 4, rank: 4 })
        ));
    }

    #[test]
    fn test_num_elements() {
        assert_eq!(Shape::from([2, 4, 6, 3]).num_elements().unwrap(), 144);
        assert_eq!(Shape::from([0, 4]).num_elements().unwrap(), 0);
        assert_eq!(Shape::default().num_elements().unwrap(), 1);
    }

    #[test]
    fn test_num_elements_overflow() {
        let err = Shape::from([65536, 65536, 65536, 65536])
            .num_elements()
            .unwrap_err();
        assert_eq!(err.error_code(), "SHAPE_OVERFLOW");
        assert!(err.to_string().contains("[65536, 65536, 65536, 65536]"));

        // A zero dimension does not hide an unaddressable extent
        let err = Shape::from([0, u32::MAX, u32::MAX, u32::MAX])
            .num_elements()
            .unwrap_err();
        assert_eq!(err.error_code(), "SHAPE_OVERFLOW");
    }

    #[test]
    fn test_parse() {
        let shape: Shape = "1, 4,4,1".parse().unwrap();
        assert_eq!(shape.dimensions(), &[1, 4, 4, 1]);

        let bracketed: Shape = "[2,5]".parse().unwrap();
        assert_eq!(bracketed.dimensions(), &[2, 5]);

        let err = "1,x,4".parse::<Shape>().unwrap_err();
        assert_eq!(err.error_code(), "INVALID_SHAPE");
    }

    #[test]
    fn test_display() {
        assert_eq!(Shape::from([1, 2, 2, 3]).to_string(), "[1, 2, 2, 3]");
    }

    #[test]
    fn test_serde_transparent() {
        let shape = Shape::from([3, 5]);
        let json = serde_json::to_string(&shape).unwrap();
        assert_eq!(json, "[3,5]");
        let restored: Shape = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, shape);
    }

    #[test]
    fn test_expect_rank() {
        let shape = Shape::from([3, 5]);
        assert!(shape.expect_rank("roi", 2).is_ok());
        let err = shape.expect_rank("input", 4).unwrap_err();
        assert!(matches!(
            err,
            RoiAlignError::InvalidRank {
                tensor: "input",
                expected: 4,
                actual: 2
            }
        ));
    }
}
