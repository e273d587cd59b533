// Common test utilities

pub mod harness;

pub use harness::*;

use otp_core::domains::otp::models::PhoneNumber;
use rand::Rng;

/// A random, valid Safaricom-style number so tests sharing one database
/// never see each other's challenges.
pub fn random_phone() -> PhoneNumber {
    let digits: u32 = rand::thread_rng().gen_range(0..100_000_000);
    PhoneNumber::normalize(&format!("07{:08}", digits)).expect("generated number is valid")
}
