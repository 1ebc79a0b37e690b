use crate::error::ValidationError;
use crate::scenario::ErrorPolicy;

pub(super) fn parse_threshold(s: &str) -> Result<f64, ValidationError> {
    let value = s
        .trim()
        .parse::<f64>()
        .map_err(|err| ValidationError::InvalidThreshold {
            value: s.to_owned(),
            source: err,
        })?;
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::ThresholdOutOfRange);
    }
    Ok(value)
}

pub(super) fn parse_error_policy(s: &str) -> Result<ErrorPolicy, ValidationError> {
    s.parse::<ErrorPolicy>()
}
