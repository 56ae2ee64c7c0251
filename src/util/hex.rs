/// Parses the given text as a canonical lowercase hexadecimal number.
///
/// The text is only accepted if re-encoding the parsed value reproduces it exactly, which rejects
/// signs, uppercase digits, and leading zeros.
#[must_use]
pub fn string_to_hex(text: &str) -> Option<u64> {
    let value = u64::from_str_radix(text, 16).ok()?;

    (self::to_hex_string(value) == text).then_some(value)
}

/// Encodes the given number as a lowercase hexadecimal string.
#[must_use]
pub fn to_hex_string(value: u64) -> String {
    format!("{value:x}")
}

#[cfg(test)]
mod tests {
    use super::{string_to_hex, to_hex_string};

    #[test]
    fn numbers_round_trip() {
        for value in [0, 1, 9, 10, 15, 16, 255, 4096, 0xdead_beef, u64::MAX] {
            assert_eq!(string_to_hex(&to_hex_string(value)), Some(value));
        }
    }

    #[test]
    fn canonical_strings_round_trip() {
        for text in ["0", "1", "a", "1f", "100", "abcdef", "ffffffffffffffff"] {
            assert_eq!(string_to_hex(text).map(to_hex_string).as_deref(), Some(text));
        }
    }

    #[test]
    fn non_canonical_text_is_rejected() {
        for text in ["", "01", "00", "A", "1F", "+1", "-1", "xyz", "1 ", "10000000000000000"] {
            assert_eq!(string_to_hex(text), None, "{text:?} should be rejected");
        }
    }
}
