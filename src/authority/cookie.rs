use std::fmt;

use rand::RngCore;
use zeroize::Zeroizing;

const COOKIE_BYTES: usize = 16;

/// An MIT-MAGIC-COOKIE-1 value in its textual form: 32 lowercase hexadecimal characters.
/// The backing memory is zeroed when the cookie is dropped.
#[derive(Clone, PartialEq)]
pub struct Cookie(Zeroizing<String>);

impl Cookie {
    /// Length of the textual cookie.
    pub const LENGTH: usize = COOKIE_BYTES * 2;

    /// Generates a new cookie from the thread-local CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new([0u8; COOKIE_BYTES]);
        rand::rng().fill_bytes(&mut bytes[..]);
        Cookie(Zeroizing::new(hex::encode(&bytes[..])))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Cookie {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("Cookie(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_is_32_lowercase_hex_characters() {
        for _ in 0..100 {
            let cookie = Cookie::generate();
            assert_eq!(cookie.as_str().len(), Cookie::LENGTH);
            assert!(cookie.as_str().chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
        }
    }

    #[test]
    fn cookies_differ() {
        assert_ne!(Cookie::generate(), Cookie::generate());
    }

    #[test]
    fn debug_output_hides_the_value() {
        let cookie = Cookie::generate();
        assert!(!format!("{:?}", cookie).contains(cookie.as_str()));
    }
}
