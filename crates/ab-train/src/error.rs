//! Error types for train assembly and unit settings.

use ab_pneumatics::PneumaticError;
use ab_valves::ValveError;
use thiserror::Error;

use crate::unit::End;

/// Errors raised while assembling a train or configuring its units.
///
/// None of these can occur inside the tick itself.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrainError {
    #[error("Unknown unit")]
    UnknownUnit,

    #[error("Unit is already coupled at its {end:?} end")]
    AlreadyCoupled { end: End },

    #[error("Units are not coupled to each other")]
    NotCoupled,

    #[error("Unknown tank '{name}'")]
    UnknownTank { name: String },

    #[error("Unknown retainer setting '{name}'")]
    UnknownRetainer { name: String },

    #[error("Unknown setting '{key}'")]
    UnknownSetting { key: String },

    #[error("Setting '{key}' out of range: {value}")]
    OutOfRange { key: String, value: f64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error(transparent)]
    Valve(#[from] ValveError),

    #[error(transparent)]
    Pneumatic(#[from] PneumaticError),
}

pub type TrainResult<T> = Result<T, TrainError>;
