//! RoiAlign - Region of Interest Align pooling
//!
//! Bilinear-interpolated adaptive region pooling over a batched feature map.
//!
//! # Architecture
//!
//! - `tensor`: shape descriptors and owned `f32` tensors (NHWC layout)
//! - `ops`: the pooling kernel and the parameterized `RoiAlign` operation
//! - `fixture`: JSON operator fixtures for running and verifying the kernel
//! - `cli`: the `roialign-cli` command surface

pub mod cli;
pub mod error;
pub mod fixture;
pub mod ops;
pub mod tensor;

pub use error::{Result, RoiAlignError};
pub use ops::{roi_align, RoiAlign, RoiAlignParams};
pub use tensor::{Shape, Tensor};
