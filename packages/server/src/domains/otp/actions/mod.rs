//! OTP domain actions - business logic functions
//!
//! Called directly from the HTTP routes with the shared `ServerDeps`.

mod issue_otp;
mod verify_otp;

pub use issue_otp::issue_otp;
pub use verify_otp::verify_otp;
