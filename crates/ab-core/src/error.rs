use thiserror::Error;

pub type AbResult<T> = Result<T, AbError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AbError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },
}
