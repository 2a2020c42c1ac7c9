//! ROI Align Operation
//!
//! Binds the pooling parameters to the kernel: validates them, infers the
//! output shape and runs the kernel on owned tensors.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{Result, RoiAlignError};
use crate::ops::roi_align::{roi_align, ROI_BATCHED_LEN, ROI_BOX_LEN};
use crate::tensor::{Shape, Tensor};

// ============================================================================
// Parameters
// ============================================================================

/// Pooling parameters of a ROI Align operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiAlignParams {
    /// Rows of the pooled grid per ROI
    pub output_height: u32,
    /// Columns of the pooled grid per ROI
    pub output_width: u32,
    /// Multiplier from ROI coordinates to feature-map pixels
    pub spatial_scale: f32,
    /// Samples per bin per axis; zero or negative means adaptive
    #[serde(default)]
    pub sampling_ratio: i32,
}

impl RoiAlignParams {
    /// Parameters with unit scale and adaptive sampling
    pub fn new(output_height: u32, output_width: u32) -> Self {
        Self {
            output_height,
            output_width,
            spatial_scale: 1.0,
            sampling_ratio: 0,
        }
    }

    pub fn with_spatial_scale(mut self, spatial_scale: f32) -> Self {
        self.spatial_scale = spatial_scale;
        self
    }

    pub fn with_sampling_ratio(mut self, sampling_ratio: i32) -> Self {
        self.sampling_ratio = sampling_ratio;
        self
    }

    /// Check parameter ranges
    pub fn validate(&self) -> Result<()> {
        if self.output_height == 0 {
            return Err(invalid_param("output_height", "must be greater than zero"));
        }
        if self.output_width == 0 {
            return Err(invalid_param("output_width", "must be greater than zero"));
        }
        if !self.spatial_scale.is_finite() || self.spatial_scale <= 0.0 {
            return Err(invalid_param(
                "spatial_scale",
                &format!("must be finite and positive, got {}", self.spatial_scale),
            ));
        }
        Ok(())
    }

    /// Whether the sampling ratio is derived per ROI
    pub fn is_adaptive(&self) -> bool {
        self.sampling_ratio <= 0
    }
}

fn invalid_param(name: &str, reason: &str) -> RoiAlignError {
    RoiAlignError::InvalidParameter {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

// ============================================================================
// Operation
// ============================================================================

/// ROI Align with validated parameters
///
/// # Example
/// ```ignore
/// use roialign::{RoiAlign, RoiAlignParams, Tensor};
///
/// let op = RoiAlign::new(RoiAlignParams::new(2, 2).with_sampling_ratio(2))?;
/// let input = Tensor::from_fn([1, 4, 4, 1], |i| i as f32)?;
/// let rois = Tensor::new([1, 4], vec![0.0, 0.0, 4.0, 4.0])?;
/// let pooled = op.execute(&input, &rois)?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RoiAlign {
    params: RoiAlignParams,
}

impl RoiAlign {
    /// Create an operation, rejecting out-of-range parameters
    pub fn new(params: RoiAlignParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &RoiAlignParams {
        &self.params
    }

    /// Validate input shapes and infer the output shape
    ///
    /// # Arguments
    /// * `input_shape` - Feature map shape `[batches, height, width, depth]`
    /// * `roi_shape` - ROI shape `[num_rois, 4 | 5]`
    ///
    /// # Returns
    /// Output shape `[num_rois, output_height, output_width, depth]`
    pub fn prepare(&self, input_shape: &Shape, roi_shape: &Shape) -> Result<Shape> {
        input_shape.expect_rank("input", 4)?;
        roi_shape.expect_rank("roi", 2)?;

        let roi_info_length = roi_shape.size_of_dimension(1)?;
        if roi_info_length != ROI_BOX_LEN && roi_info_length != ROI_BATCHED_LEN {
            return Err(RoiAlignError::InvalidRoiInfoLength {
                length: roi_info_length,
            });
        }

        for axis in [0, 1, 2] {
            if input_shape.size_of_dimension(axis)? == 0 {
                return Err(RoiAlignError::EmptyDimension {
                    tensor: "input",
                    axis,
                });
            }
        }

        let output_shape = Shape::new(vec![
            roi_shape.size_of_dimension(0)?,
            self.params.output_height,
            self.params.output_width,
            input_shape.size_of_dimension(3)?,
        ]);
        input_shape.num_elements()?;
        output_shape.num_elements()?;
        Ok(output_shape)
    }

    /// Run the kernel and return the pooled tensor
    pub fn execute(&self, input: &Tensor, rois: &Tensor) -> Result<Tensor> {
        let output_shape = self.prepare(input.shape(), rois.shape())?;
        debug!(
            input = %input.shape(),
            rois = %rois.shape(),
            output = %output_shape,
            "executing roi_align"
        );

        let mut output = Tensor::zeros(output_shape)?;
        let output_shape = output.shape().clone();
        roi_align(
            input.data(),
            input.shape(),
            rois.data(),
            rois.shape(),
            self.params.spatial_scale,
            self.params.sampling_ratio,
            output.data_mut(),
            &output_shape,
        )?;
        Ok(output)
    }

    /// Serialize parameters to JSON
    pub fn to_json(&self) -> Result<Value> {
        serde_json::to_value(&self.params).map_err(RoiAlignError::Serialization)
    }

    /// Replace parameters from JSON; on error the current parameters are kept
    pub fn from_json(&mut self, json: &Value) -> Result<()> {
        let params: RoiAlignParams = serde_json::from_value(json.clone())?;
        params.validate()?;
        self.params = params;
        Ok(())
    }

    /// Get all parameters as JSON
    pub fn get_params(&self) -> Value {
        json!({
            "output_height": self.params.output_height,
            "output_width": self.params.output_width,
            "spatial_scale": self.params.spatial_scale,
            "sampling_ratio": self.params.sampling_ratio,
            "adaptive": self.params.is_adaptive()
        })
    }

    /// Set a single parameter by name
    pub fn set_param(&mut self, name: &str, value: &Value) -> Result<()> {
        let mut params = self.params.clone();
        match name {
            "output_height" | "output_width" => {
                let v = value
                    .as_u64()
                    .and_then(|v| u32::try_from(v).ok())
                    .ok_or_else(|| expected_type(name, "unsigned integer", value))?;
                if name == "output_height" {
                    params.output_height = v;
                } else {
                    params.output_width = v;
                }
            }
            "spatial_scale" => {
                let v = value
                    .as_f64()
                    .ok_or_else(|| expected_type(name, "number", value))?;
                params.spatial_scale = v as f32;
            }
            "sampling_ratio" => {
                params.sampling_ratio = value
                    .as_i64()
                    .and_then(|v| i32::try_from(v).ok())
                    .ok_or_else(|| expected_type(name, "integer", value))?;
            }
            _ => {
                return Err(invalid_param(name, "unknown parameter"));
            }
        }
        params.validate()?;
        self.params = params;
        Ok(())
    }
}

fn expected_type(name: &str, expected: &str, value: &Value) -> RoiAlignError {
    invalid_param(name, &format!("expected {}, got {:?}", expected, value))
}
