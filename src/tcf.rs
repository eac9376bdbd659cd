//! Standalone TCF consent strings, outside of a GPP container.
//!
//! ```
//! use iab_consent::tcf::{TcfVersion, decode_v2, detect_tcf_version};
//!
//! let s = "CPXxRfAPXxRfAAfKABENB-CgAAAAAAAAAAYgAAAAAAAA";
//! assert_eq!(detect_tcf_version(s).unwrap(), TcfVersion::V2);
//!
//! let consent = decode_v2(s).unwrap();
//! assert_eq!(consent.core.publisher_country_code, "DE");
//! ```
use crate::ErrorKind;
use crate::core::{DataReader, DecodeExt};
use crate::sections::SectionDecodeError;
use crate::sections::tcfeuv1::TcfEuV1;
use crate::sections::tcfeuv2::TcfEuV2;
#[cfg(feature = "serde")]
use serde::Serialize;
use thiserror::Error;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum TcfVersion {
    V1,
    V2,
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TcfDecodeError {
    #[error("unable to decode TCF string: {0}")]
    Section(#[from] SectionDecodeError),
    #[error("unsupported TCF version {0}")]
    UnsupportedVersion(u8),
}

impl TcfDecodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Section(e) => e.kind(),
            Self::UnsupportedVersion(_) => ErrorKind::StructuralMismatch,
        }
    }
}

/// A decoded TCF string of either version.
#[derive(Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[non_exhaustive]
pub enum TcfConsent {
    V1(TcfEuV1),
    V2(TcfEuV2),
}

/// Reads the version of a TCF string from its first 6 bits, without decoding the rest.
pub fn detect_tcf_version(s: &str) -> Result<TcfVersion, TcfDecodeError> {
    let core = s.split('.').next().unwrap_or_default();
    let prefix = core.get(..2).unwrap_or(core);
    let bytes = prefix
        .decode_base64_url()
        .map_err(SectionDecodeError::from)?;
    let version = DataReader::from_base64(&bytes, prefix)
        .read_fixed_integer(6)
        .map_err(SectionDecodeError::from)?;

    match version {
        1 => Ok(TcfVersion::V1),
        2 => Ok(TcfVersion::V2),
        v => Err(TcfDecodeError::UnsupportedVersion(v)),
    }
}

pub fn decode_v1(s: &str) -> Result<TcfEuV1, TcfDecodeError> {
    Ok(s.parse()?)
}

pub fn decode_v2(s: &str) -> Result<TcfEuV2, TcfDecodeError> {
    Ok(s.parse()?)
}

/// Decodes a TCF string with the decoder matching its version.
pub fn decode_tcf(s: &str) -> Result<TcfConsent, TcfDecodeError> {
    Ok(match detect_tcf_version(s)? {
        TcfVersion::V1 => TcfConsent::V1(decode_v1(s)?),
        TcfVersion::V2 => TcfConsent::V2(decode_v2(s)?),
    })
}
