//! Valve construction errors.

use thiserror::Error;

/// Errors raised while building or registering a valve config.
///
/// A config that fails any of these checks is never published.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValveError {
    #[error("valve {valve}: unknown tank '{tank}'")]
    UnknownTank { valve: String, tank: String },

    #[error("valve {valve}: state '{state}' refers to unknown state '{target}'")]
    UnknownState {
        valve: String,
        state: String,
        target: String,
    },

    #[error("valve {valve}: duplicate tank '{tank}'")]
    DuplicateTank { valve: String, tank: String },

    #[error("valve {valve}: duplicate state '{state}' in piston {piston}")]
    DuplicateState {
        valve: String,
        piston: usize,
        state: String,
    },

    #[error("valve {valve}: piston {piston} has {count} states (max 16)")]
    TooManyStates {
        valve: String,
        piston: usize,
        count: usize,
    },

    #[error("valve {valve}: {count} pistons (max 8)")]
    TooManyPistons { valve: String, count: usize },

    #[error("valve {valve}: no pistons declared")]
    NoPiston { valve: String },

    #[error("valve {valve}: piston {piston} has no states")]
    EmptyPiston { valve: String, piston: usize },

    #[error("valve {valve}: {what} declared before its parent")]
    Orphan { valve: String, what: &'static str },

    #[error("valve {valve}: missing required tank '{tank}'")]
    MissingSlot { valve: String, tank: &'static str },

    #[error("valve {valve}: {what}")]
    NonPhysical { valve: String, what: &'static str },

    #[error("valve {valve}: invalid layout: {what}")]
    Layout { valve: String, what: &'static str },

    #[error("valve '{name}' is already registered")]
    AlreadyRegistered { name: String },
}

pub type ValveResult<T> = Result<T, ValveError>;
