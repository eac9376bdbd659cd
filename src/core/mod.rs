use crate::ErrorKind;
use crate::core::base64::DecodeError;
use crate::core::fibonacci::fibonacci_terms;
use bitstream_io::{BigEndian, BitRead, BitReader, UnsignedInteger};
use num_iter::range_inclusive;
use num_traits::{CheckedAdd, Num, NumAssignOps, ToPrimitive};
use std::collections::BTreeSet;
use std::io;
use std::iter::repeat_with;
use thiserror::Error;

pub(crate) mod base64;
mod fibonacci;

/// The error type for failures to read values from a decoded bit buffer.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ReadError {
    /// The buffer holds fewer bits than the field being read requires.
    #[error("unexpected end of input")]
    TruncatedInput,
    /// A range entry ends before it starts.
    #[error("invalid range (start {start} is greater than end {end})")]
    InvertedRange { start: u16, end: u16 },
    /// A Fibonacci coded identifier does not fit in its integer type.
    #[error("identifier overflow in range")]
    IdOverflow,
    #[error("unable to read bits: {0}")]
    Io(io::Error),
}

impl ReadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TruncatedInput => ErrorKind::TruncatedInput,
            Self::InvertedRange { .. } | Self::IdOverflow | Self::Io(_) => ErrorKind::MalformedInput,
        }
    }
}

impl From<io::Error> for ReadError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof => Self::TruncatedInput,
            _ => Self::Io(e),
        }
    }
}

pub trait DecodeExt {
    fn decode_base64_url(&self) -> Result<Vec<u8>, DecodeError>;
}

impl DecodeExt for str {
    fn decode_base64_url(&self) -> Result<Vec<u8>, DecodeError> {
        base64::decode(self)
    }
}

pub trait FromDataReader: Sized {
    type Err;

    fn from_data_reader(r: &mut DataReader) -> Result<Self, Self::Err>;
}

/// A big-endian bit cursor over a decoded consent string buffer.
///
/// Reads past the significant bits of the buffer fail with [`ReadError::TruncatedInput`],
/// even when the buffer carries trailing padding.
pub struct DataReader<'a> {
    bit_reader: BitReader<&'a [u8], BigEndian>,
    remaining_bits: usize,
}

impl<'a> DataReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self::with_bit_len(bytes, bytes.len() * 8)
    }

    /// Creates a reader over the first `bits` bits of `bytes`.
    pub fn with_bit_len(bytes: &'a [u8], bits: usize) -> Self {
        Self {
            bit_reader: BitReader::endian(bytes, BigEndian),
            remaining_bits: bits.min(bytes.len() * 8),
        }
    }

    /// Creates a reader over the bits of a decoded Base64 string, without its padding.
    pub fn from_base64(bytes: &'a [u8], encoded: &str) -> Self {
        Self::with_bit_len(bytes, encoded.len() * base64::BITS_PER_CHAR)
    }

    fn consume(&mut self, bits: u32) -> Result<(), ReadError> {
        self.remaining_bits = self
            .remaining_bits
            .checked_sub(bits as usize)
            .ok_or(ReadError::TruncatedInput)?;
        Ok(())
    }

    pub fn parse<F>(&mut self) -> Result<F, <F as FromDataReader>::Err>
    where
        F: FromDataReader,
    {
        FromDataReader::from_data_reader(self)
    }

    pub fn read_bool(&mut self) -> Result<bool, ReadError> {
        self.consume(1)?;
        Ok(self.bit_reader.read_bit()?)
    }

    pub fn read_fixed_integer<N: UnsignedInteger>(&mut self, bits: u32) -> Result<N, ReadError> {
        self.consume(bits)?;
        Ok(self.bit_reader.read_unsigned_var(bits)?)
    }

    /// Reads a 36-bit timestamp, in deciseconds since the Unix epoch.
    pub fn read_timestamp(&mut self) -> Result<u64, ReadError> {
        self.read_fixed_integer(36)
    }

    /// Reads a 6-bit value as an uppercase letter, `0` being `'A'`.
    pub fn read_char6(&mut self) -> Result<char, ReadError> {
        let n = self.read_fixed_integer::<u8>(6)?;
        Ok((b'A' + n) as char)
    }

    pub fn read_string(&mut self, chars: usize) -> Result<String, ReadError> {
        repeat_with(|| self.read_char6()).take(chars).collect()
    }

    pub fn read_fibonacci_integer<T>(&mut self) -> Result<T, ReadError>
    where
        T: CheckedAdd + Copy + Num + NumAssignOps,
    {
        let mut fib = fibonacci_terms::<T>();
        let mut total = T::zero();
        let mut last_bit = false;

        loop {
            let bit = self.read_bool()?;

            // two consecutive 1's signal the end of the value
            if last_bit && bit {
                break;
            }

            let term = fib.next();
            if bit {
                total = term
                    .and_then(|t| total.checked_add(&t))
                    .ok_or(ReadError::IdOverflow)?;
            }
            last_bit = bit;
        }

        Ok(total)
    }

    pub fn read_fixed_bitfield(&mut self, bits: usize) -> Result<BTreeSet<u16>, ReadError> {
        let mut result = BTreeSet::new();
        for i in 1..=bits {
            if self.read_bool()? {
                result.insert(i as u16);
            }
        }

        Ok(result)
    }

    /// Reads a list of single identifiers and inclusive identifier ranges,
    /// preceded by its 12-bit entry count.
    ///
    /// Each identifier is `id_bits` wide.
    pub fn read_integer_range(&mut self, id_bits: u32) -> Result<BTreeSet<u16>, ReadError> {
        let n = self.read_fixed_integer::<u16>(12)?;
        let mut ids = BTreeSet::new();

        for _ in 0..n {
            let is_group = self.read_bool()?;
            if is_group {
                let start = self.read_fixed_integer::<u16>(id_bits)?;
                let end = self.read_fixed_integer::<u16>(id_bits)?;
                if end < start {
                    return Err(ReadError::InvertedRange { start, end });
                }
                ids.extend(start..=end);
            } else {
                ids.insert(self.read_fixed_integer::<u16>(id_bits)?);
            }
        }

        Ok(ids)
    }

    /// Reads a 16-bit maximum identifier followed by either a bitfield of that size
    /// or an integer range, depending on the encoding bit.
    pub fn read_optimized_integer_range(&mut self) -> Result<BTreeSet<u16>, ReadError> {
        let max_id = self.read_fixed_integer::<u16>(16)?;
        let is_int_range = self.read_bool()?;
        if is_int_range {
            self.read_integer_range(16)
        } else {
            self.read_fixed_bitfield(max_id as usize)
        }
    }

    /// Reads a list of Fibonacci coded identifiers and ranges.
    ///
    /// Every entry is an offset from the last identifier of the previous entry, so the
    /// output is in ascending order.
    pub fn read_fibonacci_range<T>(&mut self) -> Result<Vec<T>, ReadError>
    where
        T: CheckedAdd + Copy + Num + NumAssignOps + PartialOrd + ToPrimitive,
    {
        let n = self.read_fixed_integer::<u16>(12)?;
        let mut ids = vec![];
        let mut last_id = T::zero();

        for _ in 0..n {
            let is_group = self.read_bool()?;
            let offset = self.read_fibonacci_integer::<T>()?;
            let start = last_id.checked_add(&offset).ok_or(ReadError::IdOverflow)?;
            let end = if is_group {
                let count = self.read_fibonacci_integer::<T>()?;
                start.checked_add(&count).ok_or(ReadError::IdOverflow)?
            } else {
                start
            };

            ids.extend(range_inclusive(start, end));
            last_id = end;
        }

        Ok(ids)
    }
}
