use bitstream_io::{BigEndian, BitWrite, BitWriter};
use thiserror::Error;

/// The error type that describes failures to decode Base64 encoded strings.
#[derive(Error, Debug, Eq, PartialEq)]
pub enum DecodeError {
    /// An invalid byte was found in the input. The offset and offending byte are provided.
    #[error("invalid byte {1:#04x} at offset {0}")]
    InvalidByte(usize, u8),
}

/// Number of significant bits carried by each character.
pub const BITS_PER_CHAR: usize = 6;

/// Custom base64 implementation, 6-bits aligned, no padding,
/// using the URL Safe Base64 dictionary.
///
/// Consent strings are not necessarily a multiple of 8 bits long, the last byte
/// is filled with zeroes in that case.
pub fn decode(s: &str) -> Result<Vec<u8>, DecodeError> {
    // 6 bits per character, so the output is always smaller than the input
    let mut buffer = Vec::with_capacity(s.len());
    let mut w = BitWriter::endian(&mut buffer, BigEndian);

    for (offset, b) in s.bytes().enumerate() {
        let value = base64_value(b).ok_or(DecodeError::InvalidByte(offset, b))?;
        w.write_unsigned::<6, u8>(value)
            .expect("write into vec should not fail");
    }

    w.byte_align().expect("write into vec should not fail");
    drop(w);

    Ok(buffer)
}

fn base64_value(b: u8) -> Option<u8> {
    match b {
        b'A'..=b'Z' => Some(b - b'A'),
        b'a'..=b'z' => Some(b - b'a' + 26),
        b'0'..=b'9' => Some(b - b'0' + 52),
        b'-' => Some(62),
        b'_' => Some(63),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(b'A' => Some(0))]
    #[test_case(b'Z' => Some(25))]
    #[test_case(b'a' => Some(26))]
    #[test_case(b'z' => Some(51))]
    #[test_case(b'0' => Some(52))]
    #[test_case(b'9' => Some(61))]
    #[test_case(b'-' => Some(62))]
    #[test_case(b'_' => Some(63))]
    #[test_case(b'=' => None ; "equal")]
    #[test_case(b'+' => None ; "plus")]
    #[test_case(b'/' => None ; "slash")]
    fn base64_value_map(b: u8) -> Option<u8> {
        base64_value(b)
    }

    #[test_case("DBABM" => vec![12, 16, 1, 48] ; "simple header")]
    #[test_case("DBABMA" => vec![12, 16, 1, 48, 0] ; "aligned header")]
    #[test_case("__w" => vec![255, 252, 0] ; "high bits")]
    #[test_case("" => is empty ; "empty string")]
    fn decode_base64(s: &str) -> Vec<u8> {
        decode(s).unwrap()
    }

    #[test_case("===" => DecodeError::InvalidByte(0, b'=') ; "equal signs")]
    #[test_case("a  " => DecodeError::InvalidByte(1, b' ') ; "whitespaces")]
    #[test_case("CPX+" => DecodeError::InvalidByte(3, b'+') ; "standard alphabet")]
    fn error(s: &str) -> DecodeError {
        decode(s).unwrap_err()
    }
}
