//! `vehicle_shared`
//!
//! Simulation core for rideable vehicles, used by both client and server.
//!
//! Design goals:
//! - Deterministic per-tick state machine; no clocks or randomness in the
//!   tick path.
//! - Clear separation of concerns (math, seating, sync, wobble, net).
//! - Traits for the host world and vehicle controllers.
//! - No `unsafe`.

pub mod config;
pub mod controls;
pub mod flat;
pub mod interpolated;
pub mod math;
pub mod net;
pub mod physics;
pub mod seating;
pub mod sync;
pub mod tracked;
pub mod transform;
pub mod vehicle;
pub mod wobble;
pub mod world;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::config::*;
    pub use crate::controls::*;
    pub use crate::math::*;
    pub use crate::net::*;
    pub use crate::transform::*;
    pub use crate::vehicle::*;
    pub use crate::world::*;
}
