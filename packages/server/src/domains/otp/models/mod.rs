pub mod challenge;
pub mod code;
pub mod phone;

pub use challenge::{Challenge, ChallengeState};
pub use code::{OtpCode, CODE_LENGTH};
pub use phone::{phone_fingerprint, PhoneNumber};
