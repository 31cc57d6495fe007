//! `vehicle_client`
//!
//! Client-side systems:
//! - Handshake with the server over a link
//! - Mirrored observer copies of every vehicle
//! - Input capture for the local pilot and passengers
//! - Controls and dismount commands back to the server

pub mod client;
pub mod input;

pub use client::VehicleClient;
