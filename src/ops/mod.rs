//! Pooling Operations
//!
//! The ROI Align kernel and its parameterized operation wrapper.

mod operation;
mod roi_align;

pub use operation::{RoiAlign, RoiAlignParams};
#[cfg(feature = "parallel")]
pub use roi_align::roi_align_parallel;
pub use roi_align::{roi_align, AxisSampling, KernelDims, ROI_BATCHED_LEN, ROI_BOX_LEN};
