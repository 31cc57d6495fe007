//! `vehicle_server`
//!
//! Server-side systems:
//! - Fixed timestep simulation loop
//! - Vehicle and free entity management
//! - Receives pilot controls and passenger commands
//! - Replicates poses, wobble and passenger lists
//!
//! Networking model:
//! - In-process links carrying length-prefixed JSON frames

pub mod server;

pub use server::VehicleServer;
