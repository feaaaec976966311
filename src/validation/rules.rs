use validator::{Validate, ValidationError};

use crate::services::errors::ServiceError;

/// Runs the derived validators on a request body and maps failures to a
/// 422 response.
pub fn check<T: Validate>(payload: &T) -> Result<(), ServiceError> {
    payload
        .validate()
        .map_err(|errors| ServiceError::Validation(errors.to_string()))
}

pub fn validate_ndc(value: &str) -> Result<(), ValidationError> {
    if normalize_ndc(value).is_some() {
        Ok(())
    } else {
        Err(ValidationError::new("ndc_format"))
    }
}

/// Canonical form of a National Drug Code: digits only, 11 long when the
/// labeler/product/package split is known.
///
/// Hyphenated codes in the 4-4-2, 5-3-2 and 5-4-1 layouts are zero-padded
/// to 5-4-2. Bare 11-digit codes pass through; bare 10-digit codes keep
/// their digits since the padding position cannot be inferred.
pub fn normalize_ndc(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit() || c == '-') {
        return None;
    }

    let segments: Vec<&str> = value.split('-').collect();
    match segments.as_slice() {
        [digits] if digits.len() == 10 || digits.len() == 11 => Some(digits.to_string()),
        [labeler, product, package] => {
            let widths = (labeler.len(), product.len(), package.len());
            match widths {
                (5, 4, 2) | (4, 4, 2) | (5, 3, 2) | (5, 4, 1) => Some(format!(
                    "{labeler:0>5}{product:0>4}{package:0>2}"
                )),
                _ => None,
            }
        }
        _ => None,
    }
}
