//! Traits, helpers, and type definitions for working with consent sections.
//!
//! All known GPP section IDs are listed in the [`SectionId`] enum. Only a subset of them
//! has a built-in decoder: TCF EU v2 and the MSPA sections (US National and the Californian,
//! Virginian, Coloradan, Utahn and Connecticut state sections). Any other section can be
//! supported by passing a [`SectionRegistry`] to [`decode_gpp`](crate::decode_gpp).
//!
//! Decoded sections are returned as a [`GppSection`].
//!
use crate::ErrorKind;
use crate::core::base64::DecodeError;
use crate::core::{DataReader, DecodeExt, FromDataReader, ReadError};
use crate::sections::mspa::{MspaParsedConsent, is_mspa_section};
use crate::sections::tcfeuv2::TcfEuV2;
use fnv::FnvHashMap;
use num_derive::{FromPrimitive, ToPrimitive};
#[cfg(feature = "serde")]
use serde::Serialize;
use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use strum_macros::Display;
use thiserror::Error;

pub mod mspa;
pub mod tcfeuv1;
pub mod tcfeuv2;

#[derive(
    Clone, Copy, Debug, Display, Eq, PartialEq, Hash, Ord, PartialOrd, FromPrimitive, ToPrimitive,
)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[non_exhaustive]
pub enum SectionId {
    TcfEuV1 = 1,
    TcfEuV2 = 2,
    GppHeader = 3,
    GppSignalIntegrity = 4,
    TcfCaV1 = 5,
    UspV1 = 6,
    UsNat = 7,
    UsCa = 8,
    UsVa = 9,
    UsCo = 10,
    UsUt = 11,
    UsCt = 12,
    UsFl = 13,
    UsMt = 14,
    UsOr = 15,
    UsTx = 16,
    UsDe = 17,
    UsIa = 18,
    UsNe = 19,
    UsNh = 20,
    UsNj = 21,
    UsTn = 22,
}

pub type IdSet = BTreeSet<u16>;

/// A point in time, stored as deciseconds since the Unix epoch.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize), serde(transparent))]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn from_deciseconds(deciseconds: u64) -> Self {
        Self(deciseconds)
    }

    pub fn deciseconds(&self) -> u64 {
        self.0
    }

    /// Seconds since the Unix epoch, truncated.
    pub fn unix_seconds(&self) -> u64 {
        self.0 / 10
    }
}

impl FromDataReader for Timestamp {
    type Err = ReadError;

    fn from_data_reader(r: &mut DataReader) -> Result<Self, Self::Err> {
        Ok(Self(r.read_timestamp()?))
    }
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SectionDecodeError {
    #[error("missing section {0}")]
    MissingSection(SectionId),
    #[error("no decoder for section {0}")]
    UnsupportedSection(SectionId),
    #[error("unable to read string: {0}")]
    Read(#[from] ReadError),
    #[error("unexpected end of string in {0}")]
    UnexpectedEndOfString(String),
    #[error("invalid section version (expected {expected}, found {found})")]
    InvalidSectionVersion { expected: u8, found: u8 },
    #[error("unable to decode segment: {0}")]
    DecodeSegment(#[from] DecodeError),
    #[error("invalid segment version ({segment_version})")]
    UnknownSegmentVersion { segment_version: u8 },
    #[error("unknown segment type {segment_type}")]
    UnknownSegmentType { segment_type: u8 },
    #[error("duplicate segment type {segment_type}")]
    DuplicateSegmentType { segment_type: u8 },
    /// Failure reported by a decoder supplied through a [`SectionRegistry`].
    #[error("custom decoder failed: {0}")]
    Custom(Box<dyn std::error::Error + Send + Sync>),
}

impl SectionDecodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Read(e) => e.kind(),
            Self::DecodeSegment(_) | Self::Custom(_) => ErrorKind::MalformedInput,
            Self::UnexpectedEndOfString(_) => ErrorKind::TruncatedInput,
            Self::UnsupportedSection(_) => ErrorKind::UnsupportedSection,
            Self::MissingSection(_)
            | Self::InvalidSectionVersion { .. }
            | Self::UnknownSegmentVersion { .. }
            | Self::UnknownSegmentType { .. }
            | Self::DuplicateSegmentType { .. } => ErrorKind::StructuralMismatch,
        }
    }
}

/// A section record produced by a decoder that does not ship with this crate.
///
/// Any `'static` type that is `Debug + Send + Sync` qualifies.
pub trait CustomSection: Any + fmt::Debug + Send + Sync {}

impl<T: Any + fmt::Debug + Send + Sync> CustomSection for T {}

/// A decoded GPP section.
#[derive(Debug)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[non_exhaustive]
pub enum GppSection {
    TcfEuV2(TcfEuV2),
    Mspa(MspaParsedConsent),
    #[cfg_attr(feature = "serde", serde(skip))]
    Custom(Box<dyn CustomSection>),
}

impl GppSection {
    pub fn as_tcf_eu_v2(&self) -> Option<&TcfEuV2> {
        match self {
            Self::TcfEuV2(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_mspa(&self) -> Option<&MspaParsedConsent> {
        match self {
            Self::Mspa(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the custom record if it is of type `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Custom(c) => {
                let any: &dyn Any = &**c;
                any.downcast_ref()
            }
            _ => None,
        }
    }
}

/// A decoder bound to the raw string of one section.
pub trait SectionDecoder: fmt::Debug + Send + Sync {
    fn section_id(&self) -> SectionId;

    fn parse_consent(&self) -> Result<GppSection, SectionDecodeError>;
}

/// Provides decoders for GPP sections, taking precedence over the built-in ones.
///
/// Closures with the signature of [`SectionRegistry::decoder`] implement this trait, as does
/// [`SectionParsers`].
pub trait SectionRegistry {
    fn decoder(&self, id: SectionId, section: &str) -> Option<Box<dyn SectionDecoder>>;
}

impl<F> SectionRegistry for F
where
    F: Fn(SectionId, &str) -> Option<Box<dyn SectionDecoder>>,
{
    fn decoder(&self, id: SectionId, section: &str) -> Option<Box<dyn SectionDecoder>> {
        self(id, section)
    }
}

pub type DecoderFactory = fn(SectionId, &str) -> Box<dyn SectionDecoder>;

/// A [`SectionRegistry`] mapping section IDs to decoder factories.
#[derive(Clone, Debug, Default)]
pub struct SectionParsers {
    factories: FnvHashMap<SectionId, DecoderFactory>,
}

impl SectionParsers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: SectionId, factory: DecoderFactory) -> Self {
        self.insert(id, factory);
        self
    }

    /// Registers a factory, returning the one previously registered for `id`, if any.
    pub fn insert(&mut self, id: SectionId, factory: DecoderFactory) -> Option<DecoderFactory> {
        self.factories.insert(id, factory)
    }

    pub fn contains(&self, id: SectionId) -> bool {
        self.factories.contains_key(&id)
    }
}

impl SectionRegistry for SectionParsers {
    fn decoder(&self, id: SectionId, section: &str) -> Option<Box<dyn SectionDecoder>> {
        self.factories.get(&id).map(|factory| factory(id, section))
    }
}

/// Whether this crate ships a decoder for the given section.
pub fn has_builtin_decoder(id: SectionId) -> bool {
    id == SectionId::TcfEuV2 || is_mspa_section(id)
}

/// Returns the decoder shipped with this crate for the given section, if there is one.
pub(crate) fn builtin_decoder(id: SectionId, s: &str) -> Option<Box<dyn SectionDecoder>> {
    match id {
        SectionId::TcfEuV2 => Some(Box::new(tcfeuv2::TcfEuV2Decoder::new(s))),
        id if is_mspa_section(id) => Some(Box::new(mspa::make_mspa_decoder(id, s))),
        _ => None,
    }
}

pub(crate) fn decode_section(id: SectionId, s: &str) -> Result<GppSection, SectionDecodeError> {
    Ok(match id {
        SectionId::TcfEuV2 => GppSection::TcfEuV2(s.parse()?),
        id if is_mspa_section(id) => GppSection::Mspa(mspa::decode_mspa(id, s)?),
        id => Err(SectionDecodeError::UnsupportedSection(id))?,
    })
}

pub(crate) trait Base64EncodedStr<T> {
    fn parse_base64_str(&self) -> Result<T, SectionDecodeError>;
}

impl<T> Base64EncodedStr<T> for str
where
    T: FromDataReader<Err = SectionDecodeError>,
{
    fn parse_base64_str(&self) -> Result<T, SectionDecodeError> {
        let r = self.decode_base64_url()?;
        DataReader::from_base64(&r, self).parse()
    }
}

/// Parses a Base64-URL encoded string using '.' as separators into a type composed of a
/// mandatory core segment and an arbitrary number of optional segments.
///
/// The core segment is read by `parse_core`. A known optional segment cannot appear twice.
pub(crate) fn parse_segmented_str<T, F>(s: &str, parse_core: F) -> Result<T, SectionDecodeError>
where
    T: OptionalSegmentParser,
    F: FnOnce(&mut DataReader) -> Result<T, SectionDecodeError>,
{
    let mut segments_iter = s.split('.');

    // first mandatory section is the core segment
    let core_str = segments_iter
        .next()
        .ok_or_else(|| SectionDecodeError::UnexpectedEndOfString(s.to_string()))?;
    let core = core_str.decode_base64_url()?;
    let mut output = parse_core(&mut DataReader::from_base64(&core, core_str))?;
    let mut segments = BTreeSet::new();

    for segment in segments_iter {
        let b = segment.decode_base64_url()?;
        let mut r = DataReader::from_base64(&b, segment);

        let segment_type = T::read_segment_type(&mut r)?;
        if T::is_known_segment_type(segment_type) && !segments.insert(segment_type) {
            return Err(SectionDecodeError::DuplicateSegmentType { segment_type });
        }

        T::parse_optional_segment(segment_type, &mut r, &mut output)?;
    }

    Ok(output)
}

/// Parses the optional segments of a Base64-URL encoded string.
pub(crate) trait OptionalSegmentParser: Sized {
    fn read_segment_type(r: &mut DataReader) -> Result<u8, SectionDecodeError> {
        Ok(r.read_fixed_integer(3)?)
    }

    fn is_known_segment_type(segment_type: u8) -> bool;

    fn parse_optional_segment(
        segment_type: u8,
        r: &mut DataReader,
        into: &mut Self,
    ) -> Result<(), SectionDecodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[derive(Debug, PartialEq)]
    struct Flag(bool);

    #[derive(Debug)]
    struct FlagDecoder(String);

    impl SectionDecoder for FlagDecoder {
        fn section_id(&self) -> SectionId {
            SectionId::UspV1
        }

        fn parse_consent(&self) -> Result<GppSection, SectionDecodeError> {
            Ok(GppSection::Custom(Box::new(Flag(self.0 == "1YYY"))))
        }
    }

    fn flag_decoder(_: SectionId, s: &str) -> Box<dyn SectionDecoder> {
        Box::new(FlagDecoder(s.to_string()))
    }

    #[test_case(SectionId::TcfEuV2 => true)]
    #[test_case(SectionId::UsNat => true)]
    #[test_case(SectionId::UsCt => true)]
    #[test_case(SectionId::TcfEuV1 => false)]
    #[test_case(SectionId::UspV1 => false)]
    #[test_case(SectionId::UsFl => false)]
    fn builtin_decoders(id: SectionId) -> bool {
        assert_eq!(has_builtin_decoder(id), builtin_decoder(id, "").is_some());
        has_builtin_decoder(id)
    }

    #[test]
    fn builtin_decoder_keeps_section_id() {
        let decoder = builtin_decoder(SectionId::UsVa, "BVoYYYI").unwrap();
        assert_eq!(decoder.section_id(), SectionId::UsVa);
    }

    #[test]
    fn unsupported_section() {
        let r = decode_section(SectionId::UspV1, "1YNN");
        assert!(matches!(
            r,
            Err(SectionDecodeError::UnsupportedSection(SectionId::UspV1))
        ));
        assert_eq!(r.unwrap_err().kind(), ErrorKind::UnsupportedSection);
    }

    #[test]
    fn section_parsers_registry() {
        let parsers = SectionParsers::new().with(SectionId::UspV1, flag_decoder);
        assert!(parsers.contains(SectionId::UspV1));

        let section = parsers
            .decoder(SectionId::UspV1, "1YYY")
            .unwrap()
            .parse_consent()
            .unwrap();
        assert_eq!(section.downcast_ref::<Flag>(), Some(&Flag(true)));
        assert!(section.as_mspa().is_none());

        assert!(parsers.decoder(SectionId::UsNat, "BVVqAAEABCA").is_none());
    }

    #[test]
    fn closure_registry() {
        let registry = |id: SectionId, s: &str| -> Option<Box<dyn SectionDecoder>> {
            (id == SectionId::UspV1).then(|| flag_decoder(id, s))
        };

        let section = registry
            .decoder(SectionId::UspV1, "1NNN")
            .unwrap()
            .parse_consent()
            .unwrap();
        assert_eq!(section.downcast_ref::<Flag>(), Some(&Flag(false)));
        assert!(registry.decoder(SectionId::TcfEuV2, "").is_none());
    }

    #[test]
    fn downcast_to_wrong_type() {
        let section = GppSection::Custom(Box::new(Flag(true)));
        assert!(section.downcast_ref::<String>().is_none());
    }

    #[test]
    fn timestamp_accessors() {
        let ts = Timestamp::from_deciseconds(15100821554);
        assert_eq!(ts.deciseconds(), 15100821554);
        assert_eq!(ts.unix_seconds(), 1510082155);
    }

    #[test_case(SectionDecodeError::Read(ReadError::TruncatedInput) => ErrorKind::TruncatedInput)]
    #[test_case(SectionDecodeError::Read(ReadError::InvertedRange { start: 2, end: 1 }) => ErrorKind::MalformedInput)]
    #[test_case(SectionDecodeError::DecodeSegment(DecodeError::InvalidByte(0, b'+')) => ErrorKind::MalformedInput)]
    #[test_case(SectionDecodeError::InvalidSectionVersion { expected: 2, found: 1 } => ErrorKind::StructuralMismatch)]
    #[test_case(SectionDecodeError::DuplicateSegmentType { segment_type: 1 } => ErrorKind::StructuralMismatch)]
    fn error_kind(e: SectionDecodeError) -> ErrorKind {
        e.kind()
    }
}
