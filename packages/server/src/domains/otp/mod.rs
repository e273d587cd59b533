//! OTP domain - one-time passwords bound to Kenyan mobile numbers
//!
//! Responsibilities:
//! - Phone number normalization (`+254` canonical form)
//! - Code generation from the OS CSPRNG
//! - Issuing challenges with a bounded validity window
//! - Single-use verification without revealing why a code was rejected

pub mod actions;
pub mod errors;
pub mod models;
pub mod types;

pub use actions::{issue_otp, verify_otp};
pub use errors::{NotifierError, OtpError, StoreError};
pub use types::{OtpIssued, OtpVerified};
