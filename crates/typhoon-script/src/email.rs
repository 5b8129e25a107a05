//! Strict email-address grammar used by the notify operation.

use regex::Regex;
use std::sync::LazyLock;

const MAX_ADDRESS_LEN: usize = 254;
const MAX_LOCAL_LEN: usize = 64;

// Dot-separated atoms on both sides: no leading, trailing or doubled dots.
// The domain needs at least one dot and an alphabetic TLD.
static ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?\.)+[A-Za-z]{2,}$",
    )
    .expect("email address pattern is valid")
});

/// Check an address against the grammar.
pub fn is_valid_address(address: &str) -> bool {
    if address.len() > MAX_ADDRESS_LEN {
        return false;
    }
    match address.split_once('@') {
        Some((local, _)) if local.len() <= MAX_LOCAL_LEN => ADDRESS.is_match(address),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_valid_addresses() {
        for addr in [
            "user@example.com",
            "user.name@example.com",
            "user+tag@example.com",
            "user_name@example.co.uk",
            "user123@test-domain.com",
        ] {
            assert!(is_valid_address(addr), "expected {addr} to be valid");
        }
    }

    #[test]
    fn test_rejects_invalid_addresses() {
        for addr in [
            "not-an-email",
            "@example.com",
            "user@",
            "user @example.com",
            "user@example",
            "user@.com",
            "user..name@example.com",
            ".user@example.com",
            "user.@example.com",
            "invalid@@@email",
            "user@-example.com",
            "üser@example.com",
            "",
        ] {
            assert!(!is_valid_address(addr), "expected {addr:?} to be invalid");
        }
    }

    #[test]
    fn test_length_limits() {
        let local = "a".repeat(65);
        assert!(!is_valid_address(&format!("{local}@example.com")));
        let domain = format!("{}.com", "b".repeat(250));
        assert!(!is_valid_address(&format!("a@{domain}")));
    }
}
