use thiserror::Error;

/// Errors surfaced by the OTP service to the HTTP adapter.
///
/// `NotFoundOrExpired` deliberately covers unknown, expired, consumed and
/// locked-out challenges alike.
#[derive(Error, Debug)]
pub enum OtpError {
    #[error("Invalid phone number")]
    InvalidPhone,

    #[error("Invalid code format")]
    InvalidCode,

    #[error("Challenge store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("Code delivery failed: {0}")]
    DeliveryFailed(#[from] NotifierError),

    #[error("Invalid or expired code")]
    NotFoundOrExpired,
}

/// Failures of the challenge store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("An active challenge with this phone and code already exists")]
    Conflict,

    #[error("Corrupt challenge record: {0}")]
    Corrupt(String),
}

/// Failures of the out-of-band notifier.
#[derive(Error, Debug)]
pub enum NotifierError {
    #[error("Gateway rejected the message: {0}")]
    Rejected(String),

    #[error("Gateway unreachable: {0}")]
    Transport(String),
}
