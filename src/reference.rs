//! Reference-number check digit.
//!
//! The Nordic bank protocols identify payments by a reference number: the
//! order identifier with a weighted mod-10 check digit appended. Weights
//! 7, 3, 1 cycle from the rightmost digit leftwards.

const WEIGHTS: [u32; 3] = [7, 3, 1];

/// Appends the 7-3-1 check digit to a numeric identifier.
///
/// ```
/// use maksu::reference::generate_reference_number;
/// assert_eq!(generate_reference_number("12345"), "123453");
/// ```
pub fn generate_reference_number(identifier: &str) -> String {
    let mut checksum = 0u32;
    for (i, ch) in identifier.chars().rev().enumerate() {
        checksum += ch.to_digit(10).unwrap_or(0) * WEIGHTS[i % 3];
    }
    let check_digit = (10 - checksum % 10) % 10;
    format!("{identifier}{check_digit}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_check_digits() {
        assert_eq!(generate_reference_number("12345"), "123453");
        assert_eq!(generate_reference_number("1"), "13");
        assert_eq!(generate_reference_number("999"), "9991");
        assert_eq!(generate_reference_number("123456789"), "1234567897");
    }

    #[test]
    fn deterministic() {
        assert_eq!(
            generate_reference_number("1000234"),
            generate_reference_number("1000234")
        );
    }
}
