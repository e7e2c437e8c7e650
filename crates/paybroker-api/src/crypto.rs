//! Constant-time comparison for shared secrets.

/// Timing-safe string comparison to prevent timing attacks.
///
/// Only the length of `expected` can leak; the position of the first
/// differing byte cannot.
pub fn timing_safe_eq(presented: &str, expected: &str) -> bool {
    if presented.len() != expected.len() {
        return false;
    }

    let mut result = 0u8;
    for (a_byte, b_byte) in presented.as_bytes().iter().zip(expected.as_bytes()) {
        result |= a_byte ^ b_byte;
    }

    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_safe_eq_same() {
        assert!(timing_safe_eq("hello", "hello"));
    }

    #[test]
    fn timing_safe_eq_different() {
        assert!(!timing_safe_eq("hello", "world"));
    }

    #[test]
    fn timing_safe_eq_different_length() {
        assert!(!timing_safe_eq("hello", "hello_world"));
        assert!(!timing_safe_eq("", "token"));
    }
}
