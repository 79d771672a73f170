//! ab-valves: data-driven brake valve automata.
//!
//! A [`ValveConfig`] describes one valve type: the tanks it owns, the pistons that
//! sense pressure differentials between two of those tanks, the states each piston
//! can be in, and the fixed passages each state opens. Configs are assembled with
//! [`ValveConfigBuilder`], resolved and validated once by `build()`, and are
//! immutable from then on. A [`ValveRegistry`] hands out shared `Arc` handles so
//! every car of a type runs against the same config.
//!
//! The automaton state of a car is a [`ValveState`]: one 4-bit field per piston.

pub mod builder;
pub mod config;
pub mod error;
pub mod registry;
pub mod slots;
pub mod state;
pub mod tables;

pub use builder::{PassageSpec, Transitions, ValveConfigBuilder};
pub use config::{Passage, Piston, RetainerSetting, StateDef, TankDef, TankKind, ValveConfig};
pub use error::{ValveError, ValveResult};
pub use registry::{DEFAULT_VALVE, ValveRegistry};
pub use state::{MAX_PISTONS, MAX_STATES_PER_PISTON, ValveState};
pub use tables::BUILTIN_NAMES;
