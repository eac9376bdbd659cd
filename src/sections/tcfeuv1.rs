use crate::core::{DataReader, FromDataReader, ReadError};
use crate::sections::{Base64EncodedStr, IdSet, SectionDecodeError, Timestamp};
#[cfg(feature = "serde")]
use serde::Serialize;
use std::str::FromStr;

// See https://github.com/InteractiveAdvertisingBureau/GDPR-Transparency-and-Consent-Framework/blob/master/Consent%20string%20and%20vendor%20list%20formats%20v1.1%20Final.md
#[derive(Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[non_exhaustive]
pub struct TcfEuV1 {
    /// Encoded version. Strings with a version other than 1 are decoded with the v1.1 layout.
    pub version: u8,
    pub created: Timestamp,
    pub last_updated: Timestamp,
    pub cmp_id: u16,
    pub cmp_version: u16,
    pub consent_screen: u8,
    pub consent_language: String,
    pub vendor_list_version: u16,
    pub purposes_allowed: IdSet,
    pub max_vendor_id: u16,
    pub vendor_consents: IdSet,
}

impl FromStr for TcfEuV1 {
    type Err = SectionDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse_base64_str()
    }
}

impl FromDataReader for TcfEuV1 {
    type Err = SectionDecodeError;

    fn from_data_reader(r: &mut DataReader) -> Result<Self, Self::Err> {
        let version = r.read_fixed_integer(6)?;
        let created = r.parse()?;
        let last_updated = r.parse()?;
        let cmp_id = r.read_fixed_integer(12)?;
        let cmp_version = r.read_fixed_integer(12)?;
        let consent_screen = r.read_fixed_integer(6)?;
        let consent_language = r.read_string(2)?;
        let vendor_list_version = r.read_fixed_integer(12)?;
        let purposes_allowed = r.read_fixed_bitfield(24)?;
        let max_vendor_id = r.read_fixed_integer(16)?;
        let vendor_consents = parse_vendor_consents(r, max_vendor_id)?;

        Ok(Self {
            version,
            created,
            last_updated,
            cmp_id,
            cmp_version,
            consent_screen,
            consent_language,
            vendor_list_version,
            purposes_allowed,
            max_vendor_id,
            vendor_consents,
        })
    }
}

fn parse_vendor_consents(r: &mut DataReader, max_vendor_id: u16) -> Result<IdSet, ReadError> {
    let is_range = r.read_bool()?;
    Ok(if is_range {
        let default_consent = r.read_bool()?;
        let ids = r.read_integer_range(16)?;

        // listed vendors are the exceptions to the default consent
        (1..=max_vendor_id)
            .filter(|id| default_consent ^ ids.contains(id))
            .collect()
    } else {
        r.read_fixed_bitfield(max_vendor_id as usize)?
    })
}
