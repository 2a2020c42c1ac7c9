//! Tensor Buffer
//!
//! Owned, dense `f32` tensor paired with its shape.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RoiAlignError};
use crate::tensor::Shape;

/// Owned row-major `f32` tensor
///
/// The data length always equals the shape's element count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTensor", into = "RawTensor")]
pub struct Tensor {
    shape: Shape,
    data: Vec<f32>,
}

#[derive(Serialize, Deserialize)]
struct RawTensor {
    shape: Shape,
    data: Vec<f32>,
}

impl TryFrom<RawTensor> for Tensor {
    type Error = RoiAlignError;

    fn try_from(raw: RawTensor) -> Result<Self> {
        Tensor::new(raw.shape, raw.data)
    }
}

impl From<Tensor> for RawTensor {
    fn from(tensor: Tensor) -> Self {
        RawTensor {
            shape: tensor.shape,
            data: tensor.data,
        }
    }
}

impl Tensor {
    /// Create a tensor from a shape and matching data
    ///
    /// # Returns
    /// `BufferSizeMismatch` if `data.len()` differs from the shape's element
    /// count, `ShapeOverflow` if that count does not fit in `usize`
    pub fn new(shape: impl Into<Shape>, data: Vec<f32>) -> Result<Self> {
        let shape = shape.into();
        let expected = shape.num_elements()?;
        if data.len() != expected {
            return Err(RoiAlignError::BufferSizeMismatch {
                tensor: "tensor",
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// Create a zero-filled tensor
    pub fn zeros(shape: impl Into<Shape>) -> Result<Self> {
        let shape = shape.into();
        let data = vec![0.0; shape.num_elements()?];
        Ok(Self { shape, data })
    }

    /// Create a tensor whose elements are computed from their flat index
    pub fn from_fn(shape: impl Into<Shape>, f: impl FnMut(usize) -> f32) -> Result<Self> {
        let shape = shape.into();
        let data = (0..shape.num_elements()?).map(f).collect();
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Smallest and largest element, or `None` for an empty tensor
    pub fn value_range(&self) -> Option<(f32, f32)> {
        if self.data.is_empty() {
            return None;
        }
        let min = self.data.iter().copied().fold(f32::INFINITY, f32::min);
        let max = self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        Some((min, max))
    }

    /// Check that every element is finite (no NaN/Inf)
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }

    /// Largest absolute element-wise difference to another tensor
    ///
    /// A NaN difference (from a NaN on either side, or opposing infinities)
    /// makes the result NaN.
    ///
    /// # Returns
    /// `None` if the shapes differ
    pub fn max_abs_diff(&self, other: &Tensor) -> Option<f32> {
        if self.shape != other.shape {
            return None;
        }
        Some(
            self.data
                .iter()
                .zip(other.data.iter())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0_f32, |max, diff| {
                    if max.is_nan() || diff.is_nan() {
                        f32::NAN
                    } else {
                        max.max(diff)
                    }
                }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checks_length() {
        assert!(Tensor::new([2, 2], vec![1.0, 2.0, 3.0, 4.0]).is_ok());

        let err = Tensor::new([2, 2], vec![1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(
            err,
            RoiAlignError::BufferSizeMismatch {
                expected: 4,
                actual: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_zeros_and_from_fn() {
        let zeros = Tensor::zeros([1, 3, 3, 2]).unwrap();
        assert_eq!(zeros.len(), 18);
        assert!(zeros.data().iter().all(|&v| v == 0.0));

        let ramp = Tensor::from_fn([4], |i| i as f32 * 0.5).unwrap();
        assert_eq!(ramp.data(), &[0.0, 0.5, 1.0, 1.5]);
    }

    #[test]
    fn test_value_range() {
        let t = Tensor::new([3], vec![2.0, -1.0, 7.5]).unwrap();
        assert_eq!(t.value_range(), Some((-1.0, 7.5)));
        assert_eq!(Tensor::zeros([0]).unwrap().value_range(), None);
    }

    #[test]
    fn test_max_abs_diff() {
        let a = Tensor::new([2], vec![1.0, 2.0]).unwrap();
        let b = Tensor::new([2], vec![1.5, 1.0]).unwrap();
        assert_eq!(a.max_abs_diff(&b), Some(1.0));

        let c = Tensor::new([1, 2], vec![1.0, 2.0]).unwrap();
        assert_eq!(a.max_abs_diff(&c), None);
    }

    #[test]
    fn test_max_abs_diff_propagates_nan() {
        let a = Tensor::new([3], vec![f32::NAN, 0.0, 4.0]).unwrap();
        let b = Tensor::new([3], vec![0.0, 0.0, 1.0]).unwrap();
        assert!(a.max_abs_diff(&b).unwrap().is_nan());
        assert!(b.max_abs_diff(&a).unwrap().is_nan());

        let inf = Tensor::new([1], vec![f32::INFINITY]).unwrap();
        let neg_inf = Tensor::new([1], vec![f32::NEG_INFINITY]).unwrap();
        assert!(inf.max_abs_diff(&inf).unwrap().is_nan());
        assert_eq!(inf.max_abs_diff(&neg_inf), Some(f32::INFINITY));
    }

    #[test]
    fn test_deserialize_rejects_bad_length() {
        let ok: Tensor = serde_json::from_str(r#"{"shape":[2],"data":[1.0,2.0]}"#).unwrap();
        assert_eq!(ok.data(), &[1.0, 2.0]);

        let bad = serde_json::from_str::<Tensor>(r#"{"shape":[3],"data":[1.0,2.0]}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_unaddressable_shape_is_rejected() {
        let huge = [65536, 65536, 65536, 65536];
        let err = Tensor::new(huge, vec![]).unwrap_err();
        assert_eq!(err.error_code(), "SHAPE_OVERFLOW");
        assert!(Tensor::zeros(huge).is_err());
        assert!(Tensor::from_fn(huge, |_| 0.0).is_err());

        let json = r#"{"shape":[65536,65536,65536,65536],"data":[]}"#;
        let err = serde_json::from_str::<Tensor>(json).unwrap_err();
        assert!(err.to_string().contains("overflows"));
    }
}
