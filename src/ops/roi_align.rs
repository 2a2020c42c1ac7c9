//! ROI Align Kernel
//!
//! Pools every region of interest of an NHWC feature map into a fixed
//! `out_height x out_width` grid. Each output cell is the average of a
//! regular grid of bilinearly interpolated samples taken inside its bin.

use tracing::trace;

use crate::error::{Result, RoiAlignError};
use crate::tensor::Shape;

// ============================================================================
// Constants
// ============================================================================

/// Number of box coordinates in an ROI record (x1, y1, x2, y2)
pub const ROI_BOX_LEN: u32 = 4;

/// ROI record length when a leading batch index is present
pub const ROI_BATCHED_LEN: u32 = ROI_BOX_LEN + 1;

// ============================================================================
// Kernel Dimensions
// ============================================================================

/// Dimensions of one kernel invocation, resolved from the three shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelDims {
    pub num_batches: usize,
    pub in_height: usize,
    pub in_width: usize,
    pub in_depth: usize,
    pub out_height: usize,
    pub out_width: usize,
    pub num_rois: usize,
    pub roi_info_length: usize,
}

impl KernelDims {
    /// Resolve and check dimensions against the shapes and buffer lengths
    ///
    /// Every kernel precondition on shapes and buffers is checked here, so a
    /// successful resolve guarantees all reads and writes stay in bounds.
    pub fn resolve(
        input: &[f32],
        input_shape: &Shape,
        rois: &[f32],
        roi_shape: &Shape,
        output: &[f32],
        output_shape: &Shape,
    ) -> Result<Self> {
        input_shape.expect_rank("input", 4)?;
        roi_shape.expect_rank("roi", 2)?;
        output_shape.expect_rank("output", 4)?;

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

        let num_rois = roi_shape.size_of_dimension(0)?;
        let in_depth = input_shape.size_of_dimension(3)?;
        check_dimension("output batch (number of ROIs)", num_rois, output_shape, 0)?;
        check_dimension("output depth", in_depth, output_shape, 3)?;

        check_buffer("input", input, input_shape)?;
        check_buffer("roi", rois, roi_shape)?;
        check_buffer("output", output, output_shape)?;

        Ok(Self {
            num_batches: input_shape.size_of_dimension(0)? as usize,
            in_height: input_shape.size_of_dimension(1)? as usize,
            in_width: input_shape.size_of_dimension(2)? as usize,
            in_depth: in_depth as usize,
            out_height: output_shape.size_of_dimension(1)? as usize,
            out_width: output_shape.size_of_dimension(2)? as usize,
            num_rois: num_rois as usize,
            roi_info_length: roi_info_length as usize,
        })
    }

    /// Elements in one batch slice of the input
    pub fn batch_len(&self) -> usize {
        self.in_height * self.in_width * self.in_depth
    }

    /// Elements written per ROI
    pub fn roi_output_len(&self) -> usize {
        self.out_height * self.out_width * self.in_depth
    }

    fn has_batch_index(&self) -> bool {
        self.roi_info_length == ROI_BATCHED_LEN as usize
    }

    /// Check that every ROI's batch index selects an existing batch slice
    fn check_batch_indices(&self, rois: &[f32]) -> Result<()> {
        if !self.has_batch_index() {
            return Ok(());
        }
        for (roi, record) in rois.chunks_exact(self.roi_info_length).enumerate() {
            let batch_index = record[0];
            let rounded = batch_index.round();
            if !rounded.is_finite() || rounded < 0.0 || rounded >= self.num_batches as f32 {
                return Err(RoiAlignError::BatchIndexOutOfRange {
                    roi,
                    batch_index,
                    num_batches: self.num_batches as u32,
                });
            }
        }
        Ok(())
    }
}

fn check_dimension(what: &str, expected: u32, shape: &Shape, axis: usize) -> Result<()> {
    let actual = shape.size_of_dimension(axis)?;
    if actual != expected {
        return Err(RoiAlignError::DimensionMismatch {
            what: what.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

fn check_buffer(tensor: &'static str, data: &[f32], shape: &Shape) -> Result<()> {
    let expected = shape.num_elements()?;
    if data.len() != expected {
        return Err(RoiAlignError::BufferSizeMismatch {
            tensor,
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

// ============================================================================
// Kernel
// ============================================================================

/// ROI Align pooling over an NHWC feature map
///
/// # Arguments
/// * `input` / `input_shape` - Feature map `[batches, height, width, depth]`
/// * `rois` / `roi_shape` - ROI records `[num_rois, 4 | 5]`; a 5-length record
///   starts with its batch index, followed by `x1, y1, x2, y2`
/// * `spatial_scale` - Multiplier from ROI coordinates to feature-map pixels
/// * `sampling_ratio` - Samples per bin per axis; `<= 0` derives
///   `ceil(bin size)` independently per axis and per ROI
/// * `output` / `output_shape` - Pooled maps `[num_rois, out_height, out_width, depth]`
///
/// # Returns
/// `Ok(())` once every ROI has been written. Shape, buffer and batch-index
/// preconditions are checked first; on error the output is untouched.
#[allow(clippy::too_many_arguments)]
pub fn roi_align(
    input: &[f32],
    input_shape: &Shape,
    rois: &[f32],
    roi_shape: &Shape,
    spatial_scale: f32,
    sampling_ratio: i32,
    output: &mut [f32],
    output_shape: &Shape,
) -> Result<()> {
    let _span = tracing::trace_span!("roi_align").entered();

    let dims = KernelDims::resolve(input, input_shape, rois, roi_shape, output, output_shape)?;
    dims.check_batch_indices(rois)?;
    trace!(?dims, spatial_scale, sampling_ratio, "resolved kernel dimensions");

    let roi_output_len = dims.roi_output_len();
    if roi_output_len == 0 {
        return Ok(());
    }

    for (record, roi_output) in rois
        .chunks_exact(dims.roi_info_length)
        .zip(output.chunks_exact_mut(roi_output_len))
    {
        pool_roi(input, &dims, record, spatial_scale, sampling_ratio, roi_output);
    }

    Ok(())
}

/// Parallel variant of [`roi_align`]
///
/// ROIs are independent, so each one is pooled on the rayon pool into its
/// own disjoint output slab. Results are identical to [`roi_align`].
#[cfg(feature = "parallel")]
#[allow(clippy::too_many_arguments)]
pub fn roi_align_parallel(
    input: &[f32],
    input_shape: &Shape,
    rois: &[f32],
    roi_shape: &Shape,
    spatial_scale: f32,
    sampling_ratio: i32,
    output: &mut [f32],
    output_shape: &Shape,
) -> Result<()> {
    use rayon::prelude::*;

    let _span = tracing::trace_span!("roi_align_parallel").entered();

    let dims = KernelDims::resolve(input, input_shape, rois, roi_shape, output, output_shape)?;
    dims.check_batch_indices(rois)?;
    trace!(?dims, spatial_scale, sampling_ratio, "resolved kernel dimensions");

    let roi_output_len = dims.roi_output_len();
    if roi_output_len == 0 {
        return Ok(());
    }

    rois.par_chunks_exact(dims.roi_info_length)
        .zip(output.par_chunks_exact_mut(roi_output_len))
        .for_each(|(record, roi_output)| {
            pool_roi(input, &dims, record, spatial_scale, sampling_ratio, roi_output);
        });

    Ok(())
}

// ============================================================================
// Per-ROI Pooling
// ============================================================================

/// Sampling layout of one ROI along one axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisSampling {
    /// Scaled ROI start coordinate
    pub start: f32,
    /// Width of one output bin in feature-map pixels
    pub step: f32,
    /// Sample points per bin
    pub ratio: i32,
    /// Spacing between sample points within a bin
    pub bin: f32,
}

impl AxisSampling {
    /// Derive the sampling layout for one axis of a scaled ROI
    ///
    /// Degenerate or inverted ROIs are floored to one pixel.
    pub fn new(scaled_start: f32, scaled_end: f32, out_len: usize, sampling_ratio: i32) -> Self {
        let extent = (scaled_end - scaled_start).max(1.0);
        let step = extent / out_len as f32;
        let ratio = if sampling_ratio > 0 {
            sampling_ratio
        } else {
            step.ceil() as i32
        };
        Self {
            start: scaled_start,
            step,
            ratio,
            bin: step / ratio as f32,
        }
    }

    /// Continuous coordinate interval `[start, end)` of output bin `index`
    fn bin_bounds(&self, index: usize) -> (f32, f32) {
        (
            self.step * index as f32 + self.start,
            self.step * (index + 1) as f32 + self.start,
        )
    }
}

/// Pool a single ROI record into its output slab
///
/// `roi_output` must hold exactly `dims.roi_output_len()` elements and the
/// record's batch index must already be validated.
fn pool_roi(
    input: &[f32],
    dims: &KernelDims,
    record: &[f32],
    spatial_scale: f32,
    sampling_ratio: i32,
    roi_output: &mut [f32],
) {
    let (batch_id, coords) = if dims.has_batch_index() {
        (record[0].round() as usize, &record[1..])
    } else {
        (0, record)
    };
    let batch_len = dims.batch_len();
    let batch = &input[batch_id * batch_len..(batch_id + 1) * batch_len];

    let w_axis = AxisSampling::new(
        coords[0] * spatial_scale,
        coords[2] * spatial_scale,
        dims.out_width,
        sampling_ratio,
    );
    let h_axis = AxisSampling::new(
        coords[1] * spatial_scale,
        coords[3] * spatial_scale,
        dims.out_height,
        sampling_ratio,
    );
    let num_sampling_points = (i64::from(w_axis.ratio) * i64::from(h_axis.ratio)) as f32;
    let row_len = dims.in_width * dims.in_depth;

    for (cell, acc) in roi_output.chunks_exact_mut(dims.in_depth).enumerate() {
        let (h_start, h_end) = h_axis.bin_bounds(cell / dims.out_width);
        let (w_start, w_end) = w_axis.bin_bounds(cell % dims.out_width);

        acc.fill(0.0);

        for y in sample_positions(h_start, h_end, h_axis.bin) {
            let (y1, y2, dy1) = interpolation_corners(y, dims.in_height);
            for x in sample_positions(w_start, w_end, w_axis.bin) {
                let (x1, x2, dx1) = interpolation_corners(x, dims.in_width);

                let dx2 = 1.0 - dx1;
                let dy2 = 1.0 - dy1;
                let w1 = dx2 * dy2;
                let w2 = dx1 * dy2;
                let w3 = dx2 * dy1;
                let w4 = dx1 * dy1;

                let p1 = &batch[y1 * row_len + x1 * dims.in_depth..][..dims.in_depth];
                let p2 = &batch[y1 * row_len + x2 * dims.in_depth..][..dims.in_depth];
                let p3 = &batch[y2 * row_len + x1 * dims.in_depth..][..dims.in_depth];
                let p4 = &batch[y2 * row_len + x2 * dims.in_depth..][..dims.in_depth];

                for k in 0..dims.in_depth {
                    acc[k] += w1 * p1[k] + w2 * p2[k] + w3 * p3[k] + w4 * p4[k];
                }
            }
        }

        for v in acc.iter_mut() {
            *v /= num_sampling_points;
        }
    }
}

/// Sample coordinates inside a bin: `start + bin / 2`, then every `bin`,
/// while strictly below `end`
///
/// Positions accumulate in `f32`. The walk stops early if adding `bin`
/// no longer advances the position.
fn sample_positions(start: f32, end: f32, bin: f32) -> impl Iterator<Item = f32> {
    std::iter::successors(Some(start + bin / 2.0), move |&pos| {
        let next = pos + bin;
        (next > pos).then_some(next)
    })
    .take_while(move |&pos| pos < end)
}

/// Lower index, upper index and fractional offset for interpolating at `pos`
///
/// Positions at or past the last element replicate it, as do positions
/// before the first element.
fn interpolation_corners(pos: f32, len: usize) -> (usize, usize, f32) {
    let floor = pos.floor();
    if floor < 0.0 {
        return (0, 0, 0.0);
    }
    let lower = floor as usize;
    if lower >= len - 1 {
        (len - 1, len - 1, 0.0)
    } else {
        (lower, lower + 1, pos - floor)
    }
}
