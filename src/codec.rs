use std::collections::VecDeque;

pub const ALPHABET_62: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const ALPHABET_95: &[u8; 95] =
    b" !\"#$%&'()*+,-./0123456789:;<=>?@ABCDEFGHIJKLMNOPQRSTUVWXYZ[\\]^_`abcdefghijklmnopqrstuvwxyz{|}~";

pub const MIN_RADIX: u32 = 2;
pub const MAX_RADIX: u32 = 95;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("radix {0} is outside of 2..=95")]
    InvalidRadix(u32),
    #[error("alphabet with {len} symbols is too short for radix {radix}")]
    AlphabetTooShort { radix: u32, len: usize },
    #[error("cannot decode an empty digit string")]
    Empty,
    #[error("'{digit}' is not a digit in radix {radix}")]
    InvalidDigit { digit: char, radix: u32 },
    #[error("\"{0}\" does not fit into a machine word")]
    Overflow(String),
}

/// Returns the digit table for `radix`, either a prefix of `custom` or of the
/// built-in 62/95 symbol tables.
pub fn base_n_table(radix: u32, custom: Option<&[u8]>) -> Result<&[u8], CodecError> {
    if !(MIN_RADIX..=MAX_RADIX).contains(&radix) {
        return Err(CodecError::InvalidRadix(radix));
    }

    let table: &[u8] = match custom {
        Some(custom) => custom,
        None if radix <= 62 => ALPHABET_62,
        None => ALPHABET_95,
    };

    table
        .get(..radix as usize)
        .ok_or(CodecError::AlphabetTooShort { radix, len: table.len() })
}

/// Decodes `token` as a number written in `radix`.
///
/// Built-in tables up to radix 36 are case-insensitive, matching
/// `parseInt(token, radix)`. Larger radices and custom alphabets compare
/// symbols exactly.
pub fn decode_digit_string(token: &str, radix: u32, alphabet: Option<&[u8]>) -> Result<usize, CodecError> {
    let table = base_n_table(radix, alphabet)?;
    let fold_case = alphabet.is_none() && radix <= 36;

    if token.is_empty() {
        return Err(CodecError::Empty);
    }

    // Horner's rule, equivalent to summing index(c) * radix^i over the reversed token
    token.chars().try_fold(0usize, |acc, digit| {
        let lookup = if fold_case { digit.to_ascii_lowercase() } else { digit };
        let value = table
            .iter()
            .position(|&symbol| symbol as char == lookup)
            .ok_or(CodecError::InvalidDigit { digit, radix })?;

        acc.checked_mul(radix as usize)
            .and_then(|acc| acc.checked_add(value))
            .ok_or_else(|| CodecError::Overflow(token.to_owned()))
    })
}

/// Inverse of [decode_digit_string]: writes `num` in `radix`.
pub fn encode_base_n(mut num: usize, radix: u32, alphabet: Option<&[u8]>) -> Result<String, CodecError> {
    let table = base_n_table(radix, alphabet)?;

    if num == 0 {
        return Ok((table[0] as char).to_string());
    }

    let mut result = VecDeque::new();
    let base = table.len();

    while num > 0 {
        result.push_front(table[num % base] as char);
        num /= base;
    }

    Ok(result.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables() {
        assert_eq!(ALPHABET_95.len(), 95);
        assert_eq!(ALPHABET_95[0], b' ');
        assert_eq!(ALPHABET_95[94], b'~');
        assert_eq!(base_n_table(62, None).unwrap(), &ALPHABET_62[..]);
        assert_eq!(base_n_table(95, None).unwrap(), &ALPHABET_95[..]);
        assert_eq!(base_n_table(16, None).unwrap(), b"0123456789abcdef");
        assert_eq!(base_n_table(70, None).unwrap(), &ALPHABET_95[..70]);
    }

    #[test]
    fn test_decode_small_radix() {
        assert_eq!(decode_digit_string("0", 10, None), Ok(0));
        assert_eq!(decode_digit_string("123", 10, None), Ok(123));
        assert_eq!(decode_digit_string("ff", 16, None), Ok(255));
        assert_eq!(decode_digit_string("FF", 16, None), Ok(255));
        assert_eq!(decode_digit_string("a7", 36, None), Ok(10 * 36 + 7));
        assert_eq!(decode_digit_string("11", 2, None), Ok(3));
    }

    #[test]
    fn test_decode_large_radix() {
        assert_eq!(decode_digit_string("Z", 62, None), Ok(61));
        assert_eq!(decode_digit_string("10", 62, None), Ok(62));
        assert_eq!(decode_digit_string("a", 62, None), Ok(10));
        assert_eq!(decode_digit_string("A", 62, None), Ok(36));
        assert_eq!(decode_digit_string("A", 40, None), Ok(36));
        // 'A' is the 34th printable character after the space
        assert_eq!(decode_digit_string("A", 95, None), Ok(33));
        assert_eq!(decode_digit_string("!!", 95, None), Ok(95 + 1));
    }

    #[test]
    fn test_decode_custom_alphabet() {
        assert_eq!(decode_digit_string("ba", 2, Some(&b"ab"[..])), Ok(2));
        assert_eq!(decode_digit_string("B", 2, Some(&b"ab"[..])), Err(CodecError::InvalidDigit { digit: 'B', radix: 2 }));
        assert_eq!(
            decode_digit_string("a", 3, Some(&b"ab"[..])),
            Err(CodecError::AlphabetTooShort { radix: 3, len: 2 })
        );
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(decode_digit_string("1", 1, None), Err(CodecError::InvalidRadix(1)));
        assert_eq!(decode_digit_string("1", 96, None), Err(CodecError::InvalidRadix(96)));
        assert_eq!(decode_digit_string("", 10, None), Err(CodecError::Empty));
        assert_eq!(decode_digit_string("1a", 10, None), Err(CodecError::InvalidDigit { digit: 'a', radix: 10 }));
        assert_eq!(decode_digit_string("Z", 40, None), Err(CodecError::InvalidDigit { digit: 'Z', radix: 40 }));
        assert!(matches!(
            decode_digit_string(&"z".repeat(64), 36, None),
            Err(CodecError::Overflow(_))
        ));
    }

    #[test]
    fn test_encode_base_n() {
        assert_eq!(encode_base_n(0, 10, None).as_deref(), Ok("0"));
        assert_eq!(encode_base_n(255, 16, None).as_deref(), Ok("ff"));
        assert_eq!(encode_base_n(61, 62, None).as_deref(), Ok("Z"));
        assert_eq!(encode_base_n(62, 62, None).as_deref(), Ok("10"));
        assert_eq!(encode_base_n(2, 2, Some(&b"ab"[..])).as_deref(), Ok("ba"));
        assert_eq!(encode_base_n(1, 0, None), Err(CodecError::InvalidRadix(0)));

        for radix in [2, 10, 36, 37, 62, 63, 95] {
            for num in [0, 1, 35, 61, 94, 1000, 123_456] {
                let encoded = encode_base_n(num, radix, None).unwrap();
                assert_eq!(decode_digit_string(&encoded, radix, None), Ok(num), "radix {radix}");
            }
        }
    }
}
