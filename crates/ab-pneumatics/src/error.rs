//! Error types for volume construction.

use ab_core::error::AbError;
use thiserror::Error;

/// Errors raised while constructing pneumatic elements.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PneumaticError {
    #[error("Non-physical value: {what}")]
    NonPhysical { what: &'static str },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },
}

pub type PneumaticResult<T> = Result<T, PneumaticError>;

impl From<AbError> for PneumaticError {
    fn from(e: AbError) -> Self {
        match e {
            AbError::NonFinite { what, .. } => PneumaticError::NonPhysical { what },
            AbError::InvalidArg { what } => PneumaticError::NonPhysical { what },
        }
    }
}

impl From<PneumaticError> for AbError {
    fn from(e: PneumaticError) -> Self {
        match e {
            PneumaticError::NonPhysical { what } => AbError::InvalidArg { what },
            PneumaticError::InvalidArg { what } => AbError::InvalidArg { what },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = PneumaticError::NonPhysical { what: "volume" };
        assert!(err.to_string().contains("volume"));
    }

    #[test]
    fn error_conversion() {
        let err: PneumaticError = ab_core::ensure_positive(0.0, "length").unwrap_err().into();
        assert_eq!(err, PneumaticError::NonPhysical { what: "length" });
        let back: AbError = err.into();
        assert!(matches!(back, AbError::InvalidArg { .. }));
    }
}
