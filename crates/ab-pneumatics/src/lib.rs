//! ab-pneumatics: lumped-parameter air volumes for brake modelling.
//!
//! Provides:
//! - `GasVolume`: fixed-volume reservoir with isothermal pressure/mass bookkeeping
//! - `FlowConduit`: a pipe segment that also integrates a 1-D momentum equation
//!   for the air moving through it
//! - `mass_flow_rate`: compressible orifice law (subsonic + choked)
//! - `Tank`: the closed set of volume kinds a brake valve can own
//!
//! All operations are deterministic functions of state, area and time step.
//!
//! # Example
//!
//! ```
//! use ab_pneumatics::{AirVolume, GasVolume};
//! use ab_core::units::cu_in;
//!
//! let mut aux = GasVolume::new(cu_in(2500.0)).unwrap().with_psig(70.0);
//! let mut cyl = GasVolume::new(cu_in(1000.0)).unwrap();
//!
//! let moved = aux.move_air_through(&mut cyl, 4e-6, 0.01);
//! assert!(moved > 0.0);
//! assert!(cyl.psig() > 0.0);
//! ```

pub mod conduit;
pub mod error;
pub mod flow;
pub mod tank;
pub mod volume;

pub use conduit::{ConduitLink, ConduitState, FlowConduit};
pub use error::{PneumaticError, PneumaticResult};
pub use flow::{FlowConstants, mass_flow_rate};
pub use tank::{Tank, pair_mut};
pub use volume::{AirVolume, GasVolume};
