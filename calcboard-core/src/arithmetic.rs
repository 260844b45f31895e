//! Arithmetic engine
//!
//! Folds an ordered list of inputs with one of the four supported operations.
//! Subtraction and division are strictly left-to-right:
//! `[a, b, c]` means `(a - b) - c` and `(a / b) / c`.

use crate::error::{Error, Result};
use crate::types::OperationType;

/// Minimum number of inputs a calculation accepts.
pub const MIN_INPUTS: usize = 2;

pub(crate) fn too_few_inputs() -> Error {
    Error::InvalidInput(format!(
        "inputs must be a list with at least {} numbers",
        MIN_INPUTS
    ))
}

/// Compute the result of `operation` over `inputs`.
pub fn compute(operation: OperationType, inputs: &[f64]) -> Result<f64> {
    if inputs.len() < MIN_INPUTS {
        return Err(too_few_inputs());
    }

    let (first, rest) = (inputs[0], &inputs[1..]);
    let result: f64 = match operation {
        OperationType::Addition => inputs.iter().sum(),
        OperationType::Subtraction => rest.iter().fold(first, |acc, v| acc - v),
        OperationType::Multiplication => inputs.iter().product(),
        OperationType::Division => {
            if rest.iter().any(|&v| v == 0.0) {
                return Err(Error::DivisionByZero);
            }
            rest.iter().fold(first, |acc, v| acc / v)
        }
    };

    if !result.is_finite() {
        return Err(Error::InvalidInput(
            "result is too large to represent".to_string(),
        ));
    }

    Ok(result)
}

/// Compute from an untyped tag (case-insensitive).
///
/// Input count is checked before the tag, so `("bogus", [1])` is an
/// `InvalidInput` rather than an `UnsupportedOperation`.
pub fn compute_tagged(tag: &str, inputs: &[f64]) -> Result<f64> {
    if inputs.len() < MIN_INPUTS {
        return Err(too_few_inputs());
    }
    compute(tag.parse()?, inputs)
}
