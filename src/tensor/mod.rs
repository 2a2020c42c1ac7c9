//! Tensor Types
//!
//! Shape descriptors and owned `f32` tensors. All tensors are dense,
//! contiguous and row-major; 4D feature maps use NHWC layout.

mod buffer;
mod shape;

pub use buffer::Tensor;
pub use shape::Shape;
