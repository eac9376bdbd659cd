//! Version 1 of the IAB Global Privacy Platform string.
//!
//! A GPP string contains a header which lists the sections which are present
//! in the next optional parts.
//!
//! A typical GPP string will look like this:
//!
//! ```text
//! DBACOP~CPXxRfAPXxRfAAfKABENB-CgAAAAAAAAAAYgAAAAAAAA~BVVqAAEABCA.QA~BVoYYZoI
//! ```
//!
//! It contains a header (`DBACOP`) and three sections separated by `~` characters: a TCF EU v2
//! section, a US National section and a Californian section.
//!
//! GPP string sections are usually encoded in a variation of URL-safe Base64.
//!
//! It is not mandatory though, and certain sections, such as the deprecated USP v1 are using
//! a simpler character set. Such sections can be decoded by supplying a
//! [`SectionRegistry`].
//!
//! # Examples
//!
//! You can use the [`GPPString::parse_str`] method to try to parse a consent string:
//!
//! ```
//! use iab_consent::v1::GPPString;
//! use iab_consent::v1::GPPDecodeError;
//!
//! fn main() -> Result<(), GPPDecodeError> {
//!     let s = GPPString::parse_str("DBABTA~1YNN")?;
//!     Ok(())
//! }
//! ```
//!
//! Since [`GPPString`] implements the [`FromStr`] trait, you can also use [`str::parse`]:
//!
//! ```
//! use iab_consent::v1::GPPString;
//! use iab_consent::v1::GPPDecodeError;
//!
//! fn main() -> Result<(), GPPDecodeError> {
//!     let s: GPPString = "DBABTA~1YNN".parse()?;
//!     Ok(())
//! }
//! ```
//!
//! If parsing fails, a [`GPPDecodeError`] is returned instead.
//!
use crate::ErrorKind;
use crate::core::base64::DecodeError;
use crate::core::{DataReader, DecodeExt, FromDataReader, ReadError};
use crate::sections::{
    GppSection, SectionDecodeError, SectionDecoder, SectionId, SectionRegistry, builtin_decoder,
    decode_section, has_builtin_decoder,
};
use fnv::FnvHashMap;
use num_traits::FromPrimitive;
use std::iter::FusedIterator;
use std::slice::Iter;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, trace};

const GPP_HEADER: u8 = 3;
const GPP_VERSION: u8 = 1;

/// The error type for GPP String decoding operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GPPDecodeError {
    /// The string does not contain the mandatory header section.
    #[error("no header found")]
    NoHeaderFound,
    /// The header is not a valid Base64-URL string.
    #[error("unable to decode header: {0}")]
    DecodeHeader(#[from] DecodeError),
    /// The header has an invalid type for this version of GPP.
    #[error("invalid header type (expected {GPP_HEADER}, found {found})")]
    InvalidHeaderType { found: u8 },
    /// The header has an invalid GPP version.
    ///
    /// Note that there is currently only V1 of the standard.
    /// If new versions are released, they will be implemented in other modules.
    #[error("invalid GPP version (expected {GPP_VERSION}, found {found})")]
    InvalidGPPVersion { found: u8 },
    /// The header could not be read.
    ///
    /// This usually occurs if the input string is truncated.
    #[error("unable to read header: {0}")]
    Read(#[from] ReadError),
    /// A section with an unknown identifier is listed in the string header.
    #[error("unsupported section id {0}")]
    UnsupportedSectionId(u16),
    /// The number of sections listed in the header does not match the number of actual sections
    /// present in the string.
    #[error("ids do not match sections (number of ids {ids}, number of sections {sections})")]
    IdSectionMismatch { ids: usize, sections: usize },
    /// A section could not be decoded, or no decoder is available for it.
    #[error("unable to decode section {id}: {source}")]
    Section {
        id: SectionId,
        #[source]
        source: SectionDecodeError,
    },
}

impl GPPDecodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DecodeHeader(_) => ErrorKind::MalformedInput,
            Self::Read(e) => e.kind(),
            Self::Section { source, .. } => source.kind(),
            Self::UnsupportedSectionId(_) => ErrorKind::UnsupportedSection,
            Self::NoHeaderFound
            | Self::InvalidHeaderType { .. }
            | Self::InvalidGPPVersion { .. }
            | Self::IdSectionMismatch { .. } => ErrorKind::StructuralMismatch,
        }
    }
}

/// The decoded header of a GPP string.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct GppHeader {
    pub header_type: u8,
    pub version: u8,
    /// Section IDs in ascending order, as listed in the header.
    pub section_ids: Vec<SectionId>,
}

impl FromStr for GppHeader {
    type Err = GPPDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let b = s.decode_base64_url()?;
        DataReader::from_base64(&b, s).parse()
    }
}

impl FromDataReader for GppHeader {
    type Err = GPPDecodeError;

    fn from_data_reader(r: &mut DataReader) -> Result<Self, Self::Err> {
        let header_type = r.read_fixed_integer(6)?;
        if header_type != GPP_HEADER {
            return Err(GPPDecodeError::InvalidHeaderType { found: header_type });
        }

        let version = r.read_fixed_integer(6)?;
        if version != GPP_VERSION {
            return Err(GPPDecodeError::InvalidGPPVersion { found: version });
        }

        let section_ids = r
            .read_fibonacci_range::<u16>()?
            .into_iter()
            .map(|id| SectionId::from_u16(id).ok_or(GPPDecodeError::UnsupportedSectionId(id)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            header_type,
            version,
            section_ids,
        })
    }
}

/// The representation of a parsed GPP consent string.
///
/// This structure gives access to the list of section IDs which it contains, as well as the raw
/// section strings.
///
/// It also offers methods to decode either a specific section, or all sections at once.
///
#[derive(Debug)]
pub struct GPPString {
    header: GppHeader,
    sections: FnvHashMap<SectionId, String>,
}

impl GPPString {
    /// Parses a string and returns a [`GPPString`] if successful.
    ///
    /// # Errors
    ///
    /// Returns a [`GPPDecodeError`] if unable to parse the string.
    ///
    pub fn parse_str(s: &str) -> Result<Self, GPPDecodeError> {
        s.parse()
    }

    pub fn header(&self) -> &GppHeader {
        &self.header
    }

    /// Returns a reference to a raw section contained in this GPP string.
    ///
    /// If the given section is not present within the GPP string, the method returns [`None`].
    ///
    /// # Example
    ///
    /// ```
    /// use std::str::FromStr;
    /// use iab_consent::sections::SectionId;
    /// use iab_consent::v1::GPPString;
    /// use iab_consent::v1::GPPDecodeError;
    ///
    /// fn main() -> Result<(), GPPDecodeError> {
    ///     let gpp_str = GPPString::from_str("DBABTA~1YNN")?;
    ///     let s = gpp_str.section(SectionId::UspV1);
    ///
    ///     assert_eq!(s, Some("1YNN"));
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn section(&self, id: SectionId) -> Option<&str> {
        self.sections.get(&id).map(|s| s.as_str())
    }

    /// Returns an iterator that yields the list of section IDs present in this GPP string.
    pub fn section_ids(&self) -> SectionIds<'_> {
        SectionIds(self.header.section_ids.iter())
    }

    /// Returns an iterator that yields the raw section strings, in header order.
    ///
    /// # Example
    ///
    /// ```
    /// use iab_consent::v1::GPPString;
    /// use iab_consent::v1::GPPDecodeError;
    ///
    /// fn main() -> Result<(), GPPDecodeError> {
    ///     let gpp_str = GPPString::parse_str("DBABTA~1YNN")?;
    ///     let mut it = gpp_str.sections();
    ///
    ///     assert_eq!(it.next(), Some("1YNN"));
    ///     assert_eq!(it.next(), None);
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn sections(&self) -> Sections<'_> {
        Sections {
            ids: self.header.section_ids.iter(),
            sections: &self.sections,
        }
    }

    /// Decodes and returns a single section of this GPP string with its built-in decoder.
    ///
    /// # Errors
    ///
    /// Returns a [`SectionDecodeError`] if decoding the section fails, if the section is not
    /// present in the string, or if this crate has no decoder for it.
    ///
    pub fn decode_section(&self, id: SectionId) -> Result<GppSection, SectionDecodeError> {
        let s = self
            .section(id)
            .ok_or(SectionDecodeError::MissingSection(id))?;
        decode_section(id, s)
    }

    /// Decodes all sections present in this GPP string with their built-in decoders.
    ///
    /// Each entry is either the decoded section or an error if decoding fails, in header order.
    pub fn decode_all_sections(&self) -> Vec<Result<GppSection, SectionDecodeError>> {
        self.header
            .section_ids
            .iter()
            .map(|&id| self.decode_section(id))
            .collect()
    }

    /// Finds a decoder for every section, looking in the registry first.
    ///
    /// # Errors
    ///
    /// Fails with [`GPPDecodeError::Section`] on the first section for which neither the
    /// registry nor this crate provides a decoder.
    pub fn resolve_decoders(
        &self,
        registry: Option<&dyn SectionRegistry>,
    ) -> Result<FnvHashMap<SectionId, Box<dyn SectionDecoder>>, GPPDecodeError> {
        self.header
            .section_ids
            .iter()
            .map(|&id| self.resolve_decoder(id, registry).map(|d| (id, d)))
            .collect()
    }

    fn resolve_decoder(
        &self,
        id: SectionId,
        registry: Option<&dyn SectionRegistry>,
    ) -> Result<Box<dyn SectionDecoder>, GPPDecodeError> {
        let s = self.section(id).ok_or(GPPDecodeError::Section {
            id,
            source: SectionDecodeError::MissingSection(id),
        })?;

        if let Some(decoder) = registry.and_then(|r| r.decoder(id, s)) {
            if has_builtin_decoder(id) {
                debug!(section_id = %id, "registry decoder overrides built-in decoder");
            }
            trace!(section_id = %id, "resolved registry decoder");
            return Ok(decoder);
        }

        let decoder = builtin_decoder(id, s).ok_or(GPPDecodeError::Section {
            id,
            source: SectionDecodeError::UnsupportedSection(id),
        })?;
        trace!(section_id = %id, "resolved built-in decoder");

        Ok(decoder)
    }

    /// Decodes every section, with the registry decoders taking precedence over built-in ones.
    ///
    /// Decoders are resolved for all sections before any of them is decoded.
    ///
    /// # Errors
    ///
    /// The first section that cannot be resolved or decoded aborts the whole operation.
    pub fn decode_all(
        &self,
        registry: Option<&dyn SectionRegistry>,
    ) -> Result<FnvHashMap<SectionId, GppSection>, GPPDecodeError> {
        let mut decoders = self.resolve_decoders(registry)?;
        let mut output = FnvHashMap::default();

        for &id in &self.header.section_ids {
            let Some(decoder) = decoders.remove(&id) else {
                continue;
            };
            let section = decoder
                .parse_consent()
                .map_err(|source| GPPDecodeError::Section { id, source })?;
            output.insert(id, section);
        }

        Ok(output)
    }
}

impl FromStr for GPPString {
    type Err = GPPDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut sections_iter = s.split('~');

        let header: GppHeader = sections_iter
            .next()
            .ok_or(GPPDecodeError::NoHeaderFound)?
            .parse()?;

        let sections = sections_iter.collect::<Vec<_>>();
        if sections.len() != header.section_ids.len() {
            return Err(GPPDecodeError::IdSectionMismatch {
                ids: header.section_ids.len(),
                sections: sections.len(),
            });
        }

        let sections = header
            .section_ids
            .iter()
            .zip(sections)
            .map(|(&id, s)| (id, s.to_string()))
            .collect();

        Ok(Self { header, sections })
    }
}

/// Created with the method [`sections`](GPPString::sections).
pub struct Sections<'a> {
    ids: Iter<'a, SectionId>,
    sections: &'a FnvHashMap<SectionId, String>,
}

impl<'a> Iterator for Sections<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.ids.next()?;
        self.sections.get(id).map(|s| s.as_str())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ids.size_hint()
    }
}

impl ExactSizeIterator for Sections<'_> {}

impl FusedIterator for Sections<'_> {}

/// Created with the method [`section_ids`](GPPString::section_ids).
pub struct SectionIds<'a>(Iter<'a, SectionId>);

impl<'a> Iterator for SectionIds<'a> {
    type Item = &'a SectionId;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl ExactSizeIterator for SectionIds<'_> {}

impl FusedIterator for SectionIds<'_> {}

/// Decodes a GPP string and all of its sections.
///
/// Sections are decoded with the decoder provided by `registry` if there is one, and with the
/// built-in decoder otherwise.
///
/// # Errors
///
/// Fails on malformed headers, on a mismatch between the header and the sections, and on the
/// first section that has no decoder or fails to decode.
pub fn decode_gpp(
    s: &str,
    registry: Option<&dyn SectionRegistry>,
) -> Result<FnvHashMap<SectionId, GppSection>, GPPDecodeError> {
    GPPString::from_str(s)?.decode_all(registry)
}

/// Parses the header of a GPP string and resolves a decoder for each section, without decoding
/// any of them.
pub fn resolve_gpp_section_decoders(
    s: &str,
    registry: Option<&dyn SectionRegistry>,
) -> Result<FnvHashMap<SectionId, Box<dyn SectionDecoder>>, GPPDecodeError> {
    GPPString::from_str(s)?.resolve_decoders(registry)
}
