use sha2::{Digest, Sha256};
use std::fmt;

pub const CODE_SALT: &str = "epstein-cert";
pub const DIGEST_HEX_LEN: usize = 64;

/// Full SHA-256 fingerprint of (name, date, salt) as upper-case hex.
///
/// Each output format shows its own prefix of the same digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VerificationCode {
    digest_hex: String,
}

impl VerificationCode {
    pub fn derive(name: &str, date_text: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        hasher.update(b"-");
        hasher.update(date_text.as_bytes());
        hasher.update(b"-");
        hasher.update(CODE_SALT.as_bytes());
        let digest = hasher.finalize();
        let digest_hex = digest.iter().map(|byte| format!("{byte:02X}")).collect();
        Self { digest_hex }
    }

    /// First `len` hex digits; lengths past 64 return the whole digest.
    pub fn truncated(&self, len: usize) -> &str {
        &self.digest_hex[..len.min(DIGEST_HEX_LEN)]
    }

    pub fn as_str(&self) -> &str {
        &self.digest_hex
    }
}

impl fmt::Display for VerificationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.digest_hex)
    }
}

/// Code of `code_length` upper-case hex digits for `name` issued on `date_text`.
pub fn generate(name: &str, date_text: &str, code_length: usize) -> String {
    VerificationCode::derive(name, date_text)
        .truncated(code_length)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_digest() {
        // sha256("Jane Doe-January 15, 2026-epstein-cert")
        let expected = {
            let digest = Sha256::digest(b"Jane Doe-January 15, 2026-epstein-cert");
            digest.iter().map(|b| format!("{b:02x}")).collect::<String>()
        };
        let code = generate("Jane Doe", "January 15, 2026", 64);
        assert_eq!(code, expected.to_uppercase());
    }

    #[test]
    fn deterministic_and_sensitive_to_inputs() {
        let a = generate("Jane Doe", "January 15, 2026", 12);
        assert_eq!(a, generate("Jane Doe", "January 15, 2026", 12));
        assert_ne!(a, generate("Jane Doe", "January 16, 2026", 12));
        assert_ne!(a, generate("John Doe", "January 15, 2026", 12));
    }

    #[test]
    fn lengths_share_one_prefix() {
        let code = VerificationCode::derive("Jane Doe", "January 15, 2026");
        assert_eq!(code.truncated(12).len(), 12);
        assert_eq!(code.truncated(16).len(), 16);
        assert!(code.truncated(16).starts_with(code.truncated(12)));
        assert_eq!(code.truncated(200).len(), DIGEST_HEX_LEN);
        assert_eq!(code.truncated(0), "");
    }

    #[test]
    fn codes_are_upper_hex() {
        let code = generate("Zoë Ärger", "15. Januar 2026", 64);
        assert!(code.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn no_collisions_in_small_corpus() {
        let names = ["Anna", "Bert", "Carla", "Dieter", "Eva", "Frank", "Gina", "Hans"];
        let mut seen = std::collections::HashSet::new();
        for name in names {
            for day in 1..=28 {
                let date = format!("February {day}, 2026");
                assert!(seen.insert(generate(name, &date, 12)));
            }
        }
    }
}
