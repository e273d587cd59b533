use std::fmt;

use rand::rngs::OsRng;
use rand::Rng;

pub const CODE_LENGTH: usize = 6;

/// A six-digit one-time code. Leading zeros are significant.
///
/// `Debug` is redacted so codes don't leak through `?` formatting in logs.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct OtpCode(String);

impl OtpCode {
    /// Draw a fresh code from the operating system CSPRNG.
    ///
    /// Each digit is sampled independently and uniformly from 0-9, so all
    /// 10^6 codes (including `000000`) are equally likely.
    pub fn generate() -> Self {
        let mut rng = OsRng;
        let code: String = (0..CODE_LENGTH)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect();
        Self(code)
    }

    /// Accept exactly six ASCII digits, nothing else.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.len() == CODE_LENGTH && raw.bytes().all(|b| b.is_ascii_digit()) {
            Some(Self(raw.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OtpCode(******)")
    }
}
