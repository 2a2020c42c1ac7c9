//! Operator Fixtures
//!
//! A fixture is one ROI Align invocation stored as JSON: parameters, input
//! feature map, ROI records and (optionally) the expected pooled output.
//!
//! ```json
//! {
//!   "name": "quadrants",
//!   "params": { "output_height": 2, "output_width": 2, "spatial_scale": 1.0, "sampling_ratio": 2 },
//!   "input": { "shape": [1, 4, 4, 1], "data": [0.0, 1.0, "..."] },
//!   "rois": { "shape": [1, 4], "data": [0.0, 0.0, 4.0, 4.0] },
//!   "expected": { "shape": [1, 2, 2, 1], "data": [5.0, 6.75, 12.0, 13.75] }
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, RoiAlignError};
use crate::ops::{RoiAlign, RoiAlignParams};
use crate::tensor::Tensor;

/// Default maximum absolute difference accepted by [`OperatorFixture::verify`]
pub const DEFAULT_TOLERANCE: f32 = 1e-5;

fn default_tolerance() -> f32 {
    DEFAULT_TOLERANCE
}

/// One stored ROI Align invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorFixture {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub params: RoiAlignParams,
    pub input: Tensor,
    pub rois: Tensor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Tensor>,
    #[serde(default = "default_tolerance")]
    pub tolerance: f32,
}

/// Outcome of verifying a fixture against its expected output
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureReport {
    pub name: String,
    pub max_abs_diff: f32,
    pub tolerance: f32,
}

impl FixtureReport {
    /// A NaN or infinite difference never passes
    pub fn passed(&self) -> bool {
        self.max_abs_diff.is_finite() && self.max_abs_diff <= self.tolerance
    }

    /// Convert a failed report into `FixtureMismatch`
    pub fn into_result(self) -> Result<Self> {
        if self.passed() {
            Ok(self)
        } else {
            Err(RoiAlignError::FixtureMismatch {
                name: self.name,
                max_abs_diff: self.max_abs_diff,
                tolerance: self.tolerance,
            })
        }
    }
}

impl OperatorFixture {
    /// Create a fixture without an expected output
    pub fn new(name: impl Into<String>, params: RoiAlignParams, input: Tensor, rois: Tensor) -> Self {
        Self {
            name: name.into(),
            description: None,
            params,
            input,
            rois,
            expected: None,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    /// Load a fixture from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading fixture: {}", path.display());
        let contents = fs::read_to_string(path)?;
        let fixture: OperatorFixture = serde_json::from_str(&contents)?;
        Ok(fixture)
    }

    /// Write the fixture as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        debug!("Saving fixture '{}' to {}", self.name, path.display());
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Execute the stored invocation
    pub fn run(&self) -> Result<Tensor> {
        let op = RoiAlign::new(self.params.clone())?;
        op.execute(&self.input, &self.rois)
    }

    /// Run the fixture and record the result as its expected output
    pub fn record(&mut self) -> Result<()> {
        self.expected = Some(self.run()?);
        Ok(())
    }

    /// Run the fixture and compare against the expected output
    ///
    /// A shape mismatch is an error; a value mismatch is reported through
    /// [`FixtureReport::passed`].
    pub fn verify(&self) -> Result<FixtureReport> {
        let expected = self
            .expected
            .as_ref()
            .ok_or_else(|| RoiAlignError::MissingExpected {
                name: self.name.clone(),
            })?;

        let actual = self.run()?;
        let max_abs_diff = actual.max_abs_diff(expected).ok_or_else(|| {
            RoiAlignError::DimensionMismatch {
                what: format!(
                    "fixture '{}' output shape {} vs expected {}",
                    self.name,
                    actual.shape(),
                    expected.shape()
                ),
                expected: u32::try_from(expected.len()).unwrap_or(u32::MAX),
                actual: u32::try_from(actual.len()).unwrap_or(u32::MAX),
            }
        })?;

        let report = FixtureReport {
            name: self.name.clone(),
            max_abs_diff,
            tolerance: self.tolerance,
        };
        info!(
            fixture = %report.name,
            max_abs_diff = report.max_abs_diff,
            passed = report.passed(),
            "verified fixture"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quadrants() -> OperatorFixture {
        OperatorFixture::new(
            "quadrants",
            RoiAlignParams::new(2, 2).with_sampling_ratio(2),
            Tensor::from_fn([1, 4, 4, 1], |i| i as f32).unwrap(),
            Tensor::new([1, 4], vec![0.0, 0.0, 4.0, 4.0]).unwrap(),
        )
    }

    #[test]
    fn test_verify_requires_expected() {
        let err = quadrants().verify().unwrap_err();
        assert_eq!(err.error_code(), "MISSING_EXPECTED");
    }

    #[test]
    fn test_record_then_verify() {
        let mut fixture = quadrants();
        fixture.record().unwrap();

        let report = fixture.verify().unwrap();
        assert!(report.passed());
        assert_eq!(report.max_abs_diff, 0.0);
    }

    #[test]
    fn test_verify_detects_mismatch() {
        let mut fixture = quadrants();
        fixture.expected = Some(Tensor::new([1, 2, 2, 1], vec![5.0, 6.75, 12.0, 14.0]).unwrap());

        let report = fixture.verify().unwrap();
        assert!(!report.passed());
        assert!((report.max_abs_diff - 0.25).abs() < 1e-6);
        assert_eq!(report.into_result().unwrap_err().error_code(), "FIXTURE_MISMATCH");
    }

    #[test]
    fn test_verify_fails_on_nan_output() {
        let mut fixture = OperatorFixture::new(
            "nan_pixel",
            RoiAlignParams::new(1, 1).with_sampling_ratio(1),
            Tensor::new([1, 2, 2, 1], vec![f32::NAN, 0.0, 0.0, 0.0]).unwrap(),
            Tensor::new([1, 4], vec![0.0, 0.0, 1.0, 1.0]).unwrap(),
        );
        fixture.expected = Some(Tensor::new([1, 1, 1, 1], vec![0.0]).unwrap());

        let report = fixture.verify().unwrap();
        assert!(report.max_abs_diff.is_nan());
        assert!(!report.passed());
        assert_eq!(report.into_result().unwrap_err().error_code(), "FIXTURE_MISMATCH");
    }

    #[test]
    fn test_infinite_diff_never_passes() {
        let report = FixtureReport {
            name: "inf".to_string(),
            max_abs_diff: f32::INFINITY,
            tolerance: f32::INFINITY,
        };
        assert!(!report.passed());
    }

    #[test]
    fn test_verify_shape_mismatch_is_error() {
        let mut fixture = quadrants();
        fixture.expected = Some(Tensor::zeros([1, 3, 3, 1]).unwrap());

        let err = fixture.verify().unwrap_err();
        assert!(matches!(
            err,
            RoiAlignError::DimensionMismatch {
                expected: 9,
                actual: 4,
                ..
            }
        ));
    }

    #[test]
    fn test_default_tolerance_on_deserialize() {
        let fixture = quadrants();
        let mut json = serde_json::to_value(&fixture).unwrap();
        json.as_object_mut().unwrap().remove("tolerance");

        let restored: OperatorFixture = serde_json::from_value(json).unwrap();
        assert_eq!(restored.tolerance, DEFAULT_TOLERANCE);
        assert!(restored.expected.is_none());
    }
}
