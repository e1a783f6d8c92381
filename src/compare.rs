//! Element-wise comparison of produced outputs against expected outputs.

use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};

/// `allclose`-style tolerance: `|actual - expected| <= atol + rtol * |expected|`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub rtol: f32,
    pub atol: f32,
}

impl Tolerance {
    pub fn new(rtol: f32, atol: f32) -> Self {
        Self { rtol, atol }
    }

    pub fn accepts(&self, actual: f32, expected: f32) -> bool {
        if actual.is_nan() || expected.is_nan() {
            return actual.is_nan() && expected.is_nan();
        }
        (actual - expected).abs() <= self.atol + self.rtol * expected.abs()
    }
}

/// Outcome of comparing one output tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonReport {
    pub shape_matches: bool,
    pub max_abs_error: f32,
    pub mismatched_elements: usize,
    pub total_elements: usize,
}

impl ComparisonReport {
    pub fn passed(&self) -> bool {
        self.shape_matches && self.mismatched_elements == 0
    }
}

pub fn compare_results(actual: &Tensor, expected: &Tensor, tolerance: Tolerance) -> ComparisonReport {
    if actual.shape != expected.shape {
        return ComparisonReport {
            shape_matches: false,
            max_abs_error: f32::INFINITY,
            mismatched_elements: expected.len(),
            total_elements: expected.len(),
        };
    }

    let mut max_abs_error = 0.0f32;
    let mut mismatched_elements = 0;
    for (&a, &e) in actual.data.iter().zip(&expected.data) {
        let error = (a - e).abs();
        if error > max_abs_error || error.is_nan() {
            max_abs_error = if error.is_nan() { f32::NAN } else { error };
        }
        if !tolerance.accepts(a, e) {
            mismatched_elements += 1;
        }
    }

    ComparisonReport {
        shape_matches: true,
        max_abs_error,
        mismatched_elements,
        total_elements: expected.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::ElementType;

    fn tensor(data: Vec<f32>) -> Tensor {
        let len = data.len();
        Tensor::new(vec![len], ElementType::F32, data).unwrap()
    }

    #[test]
    fn test_identical_outputs_pass() {
        let report = compare_results(
            &tensor(vec![1.0, 2.0]),
            &tensor(vec![1.0, 2.0]),
            Tolerance::new(0.0, 0.0),
        );
        assert!(report.passed());
        assert_eq!(report.max_abs_error, 0.0);
    }

    #[test]
    fn test_relative_tolerance_scales_with_expected() {
        let tolerance = Tolerance::new(1e-2, 0.0);
        assert!(tolerance.accepts(100.5, 100.0));
        assert!(!tolerance.accepts(1.5, 1.0));
    }

    #[test]
    fn test_counts_mismatched_elements() {
        let report = compare_results(
            &tensor(vec![1.0, 2.5, 3.0, 9.0]),
            &tensor(vec![1.0, 2.0, 3.0, 4.0]),
            Tolerance::new(0.0, 0.1),
        );
        assert!(!report.passed());
        assert_eq!(report.mismatched_elements, 2);
        assert_eq!(report.max_abs_error, 5.0);
    }

    #[test]
    fn test_shape_mismatch_fails() {
        let a = Tensor::filled(vec![2, 2], ElementType::F32, 1.0);
        let e = Tensor::filled(vec![4], ElementType::F32, 1.0);
        let report = compare_results(&a, &e, Tolerance::new(1.0, 1.0));
        assert!(!report.shape_matches);
        assert!(!report.passed());
    }

    #[test]
    fn test_nan_matches_only_nan() {
        let tolerance = Tolerance::new(1.0, 1.0);
        assert!(tolerance.accepts(f32::NAN, f32::NAN));
        assert!(!tolerance.accepts(f32::NAN, 0.0));
        assert!(!tolerance.accepts(0.0, f32::NAN));
    }
}
