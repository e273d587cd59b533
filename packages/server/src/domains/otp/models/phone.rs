use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};

lazy_static! {
    // Kenyan mobile numbers: +254 or 0, then 7XXXXXXXX or 11XXXXXXX.
    // ASCII classes on purpose: `\d` would also match other Unicode digits.
    static ref KENYAN_MOBILE_REGEX: Regex =
        Regex::new(r"^(?:\+254|0)(7[0-9]{8}|11[0-9]{7})$").unwrap();
}

const COUNTRY_PREFIX: &str = "+254";

/// A Kenyan mobile number in canonical `+254XXXXXXXXX` form.
///
/// Only constructible through [`PhoneNumber::normalize`], so holding one
/// means the number passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Canonicalize a user-entered phone number.
    ///
    /// Strips all Unicode whitespace, then accepts `+2547XXXXXXXX`,
    /// `+25411XXXXXXX`, `07XXXXXXXX` and `011XXXXXXX`. Returns `None` for
    /// anything else.
    pub fn normalize(raw: &str) -> Option<Self> {
        let stripped: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        let captures = KENYAN_MOBILE_REGEX.captures(&stripped)?;
        let national = captures.get(1)?.as_str();
        Some(Self(format!("{}{}", COUNTRY_PREFIX, national)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short, stable hash of the number for log lines.
    pub fn fingerprint(&self) -> String {
        phone_fingerprint(&self.0)
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for PhoneNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Hash a phone number with SHA256 and keep the first 12 hex characters.
///
/// Logs carry this instead of the number itself.
pub fn phone_fingerprint(phone_number: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(phone_number.as_bytes());
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(12);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical(raw: &str) -> Option<String> {
        PhoneNumber::normalize(raw).map(|p| p.as_str().to_string())
    }

    #[test]
    fn test_national_safaricom_form() {
        assert_eq!(canonical("0712345678").as_deref(), Some("+254712345678"));
    }

    #[test]
    fn test_international_form_is_kept() {
        assert_eq!(canonical("+254712345678").as_deref(), Some("+254712345678"));
    }

    #[test]
    fn test_eleven_prefix_numbers() {
        assert_eq!(canonical("0112345678").as_deref(), Some("+254112345678"));
        assert_eq!(canonical("+254112345678").as_deref(), Some("+254112345678"));
    }

    #[test]
    fn test_both_forms_are_interchangeable() {
        assert_eq!(
            PhoneNumber::normalize("0712345678"),
            PhoneNumber::normalize("+254712345678")
        );
    }

    #[test]
    fn test_whitespace_is_stripped() {
        assert_eq!(canonical(" 0712 345 678 ").as_deref(), Some("+254712345678"));
        assert_eq!(canonical("+254\t712\n345678").as_deref(), Some("+254712345678"));
        // U+00A0 no-break space and U+2003 em space
        assert_eq!(
            canonical("+254\u{a0}712\u{2003}345678").as_deref(),
            Some("+254712345678")
        );
    }

    #[test]
    fn test_rejects_leading_eight() {
        assert_eq!(canonical("+254812345678"), None);
    }

    #[test]
    fn test_rejects_wrong_shapes() {
        for raw in [
            "",
            "0123456789",
            "071234567",
            "07123456789",
            "011234567",
            "01123456789",
            "254712345678",
            "+255712345678",
            "+2540712345678",
            "0712-345-678",
            "(0712)345678",
            "+254 7123456789",
            "0712345678x",
        ] {
            assert_eq!(canonical(raw), None, "{raw:?} should be rejected");
        }
    }

    #[test]
    fn test_rejects_non_ascii_digits() {
        // Arabic-Indic digits are Unicode decimal digits but not valid input
        assert_eq!(canonical("07\u{0661}\u{0662}345678"), None);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in ["0712345678", "+254 712 345 678", "0112345678", "+254110000000"] {
            let once = PhoneNumber::normalize(raw).unwrap();
            let twice = PhoneNumber::normalize(once.as_str()).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_fingerprint_is_stable_and_short() {
        let phone = PhoneNumber::normalize("0712345678").unwrap();
        assert_eq!(phone.fingerprint(), phone.fingerprint());
        assert_eq!(phone.fingerprint().len(), 12);
        assert!(phone.fingerprint().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(phone.fingerprint(), phone_fingerprint("+254712345679"));
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let phone = PhoneNumber::normalize("0712345678").unwrap();
        assert_eq!(serde_json::to_string(&phone).unwrap(), "\"+254712345678\"");
    }
}
