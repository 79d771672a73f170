//! ab-core: shared foundation for the air brake workspace.
//!
//! Contains:
//! - units (uom SI types, constructors, gauge/absolute pressure conversions)
//! - numeric (Real + tolerances + float helpers)
//! - error (shared error types)

pub mod error;
pub mod numeric;
pub mod units;

pub use error::{AbError, AbResult};
pub use numeric::*;
pub use units::*;
