//! ab-train: per-car brake units and the train that couples them.
//!
//! A [`BrakeUnit`] owns the air volumes laid out by its valve's
//! [`ValveConfig`](ab_valves::ValveConfig) and the packed automaton state. A
//! [`LocomotiveBrakeUnit`] wraps one and adds the compressor, main reservoir,
//! equalizing reservoir and the engineer's controls.
//!
//! The [`Train`] owns every unit in an arena and runs the fixed-step tick:
//!
//! 1. air speeds in every conduit, from a snapshot taken before any unit moves;
//! 2. boundary flow exchange, automaton step and passages, from a snapshot taken
//!    after phase 1.
//!
//! Because both phases read snapshots, the result does not depend on unit order.

pub mod error;
pub mod id;
pub mod locomotive;
pub mod settings;
pub mod sim;
pub mod train;
pub mod unit;

pub use error::{TrainError, TrainResult};
pub use id::UnitId;
pub use locomotive::{LocomotiveBrakeUnit, LocomotiveParams};
pub use settings::{PiecewiseLinear, SettingValue};
pub use sim::{SimOptions, SimRecord, UnitGauges, run_train};
pub use train::{Train, Unit};
pub use unit::{BrakeUnit, Coupling, End, Rigging};
