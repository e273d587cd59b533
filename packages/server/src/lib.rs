// Phone OTP API - Core
//
// Issues and verifies one-time passwords bound to Kenyan mobile numbers.
// Domain logic lives in domains/, infrastructure seams in kernel/,
// and the axum adapter in server/.

pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
