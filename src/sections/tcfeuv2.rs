use crate::core::{DataReader, FromDataReader, ReadError};
use crate::sections::{
    GppSection, IdSet, OptionalSegmentParser, SectionDecodeError, SectionDecoder, SectionId,
    Timestamp, parse_segmented_str,
};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
#[cfg(feature = "serde")]
use serde::Serialize;
use std::str::FromStr;
use tracing::debug;

const TCF_VERSION: u8 = 2;

const DISCLOSED_VENDORS_SEGMENT: u8 = 1;
const ALLOWED_VENDORS_SEGMENT: u8 = 2;
const PUBLISHER_PURPOSES_SEGMENT: u8 = 3;

/// A TCF v2 consent string, from version 2.0 to 2.2.
#[derive(Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[non_exhaustive]
pub struct TcfEuV2 {
    pub core: Core,
    pub disclosed_vendors: Option<IdSet>,
    pub allowed_vendors: Option<IdSet>,
    pub publisher_purposes: Option<PublisherPurposes>,
}

impl FromStr for TcfEuV2 {
    type Err = SectionDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_segmented_str(s, |r| {
            Ok(Self {
                core: r.parse()?,
                disclosed_vendors: None,
                allowed_vendors: None,
                publisher_purposes: None,
            })
        })
    }
}

impl OptionalSegmentParser for TcfEuV2 {
    fn is_known_segment_type(segment_type: u8) -> bool {
        matches!(
            segment_type,
            DISCLOSED_VENDORS_SEGMENT | ALLOWED_VENDORS_SEGMENT | PUBLISHER_PURPOSES_SEGMENT
        )
    }

    fn parse_optional_segment(
        segment_type: u8,
        r: &mut DataReader,
        into: &mut Self,
    ) -> Result<(), SectionDecodeError> {
        match segment_type {
            DISCLOSED_VENDORS_SEGMENT => {
                into.disclosed_vendors = Some(r.read_optimized_integer_range()?);
            }
            ALLOWED_VENDORS_SEGMENT => {
                into.allowed_vendors = Some(r.read_optimized_integer_range()?);
            }
            PUBLISHER_PURPOSES_SEGMENT => {
                into.publisher_purposes = Some(r.parse()?);
            }
            _ => {
                debug!(segment_type, "skipping unknown TCF v2 segment");
            }
        }

        Ok(())
    }
}

#[derive(Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[non_exhaustive]
pub struct Core {
    pub created: Timestamp,
    pub last_updated: Timestamp,
    pub cmp_id: u16,
    pub cmp_version: u16,
    pub consent_screen: u8,
    pub consent_language: String,
    pub vendor_list_version: u16,
    pub policy_version: u8,
    pub is_service_specific: bool,
    pub use_non_standard_stacks: bool,
    pub special_feature_optins: IdSet,
    pub purpose_consents: IdSet,
    pub purpose_legitimate_interests: IdSet,
    pub purpose_one_treatment: bool,
    pub publisher_country_code: String,
    pub vendor_consents: IdSet,
    pub vendor_legitimate_interests: IdSet,
    pub publisher_restrictions: Vec<PublisherRestriction>,
}

impl FromDataReader for Core {
    type Err = SectionDecodeError;

    fn from_data_reader(r: &mut DataReader) -> Result<Self, Self::Err> {
        let version = r.read_fixed_integer(6)?;
        if version != TCF_VERSION {
            return Err(SectionDecodeError::InvalidSectionVersion {
                expected: TCF_VERSION,
                found: version,
            });
        }

        Ok(Self {
            created: r.parse()?,
            last_updated: r.parse()?,
            cmp_id: r.read_fixed_integer(12)?,
            cmp_version: r.read_fixed_integer(12)?,
            consent_screen: r.read_fixed_integer(6)?,
            consent_language: r.read_string(2)?,
            vendor_list_version: r.read_fixed_integer(12)?,
            policy_version: r.read_fixed_integer(6)?,
            is_service_specific: r.read_bool()?,
            use_non_standard_stacks: r.read_bool()?,
            special_feature_optins: r.read_fixed_bitfield(12)?,
            purpose_consents: r.read_fixed_bitfield(24)?,
            purpose_legitimate_interests: r.read_fixed_bitfield(24)?,
            purpose_one_treatment: r.read_bool()?,
            publisher_country_code: r.read_string(2)?,
            vendor_consents: r.read_optimized_integer_range()?,
            vendor_legitimate_interests: r.read_optimized_integer_range()?,
            publisher_restrictions: parse_publisher_restrictions(r)?,
        })
    }
}

fn parse_publisher_restrictions(
    r: &mut DataReader,
) -> Result<Vec<PublisherRestriction>, ReadError> {
    let n = r.read_fixed_integer::<u16>(12)?;
    (0..n).map(|_| r.parse()).collect()
}

#[derive(Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PublisherRestriction {
    pub purpose_id: u8,
    pub restriction_type: RestrictionType,
    pub restricted_vendor_ids: IdSet,
}

impl FromDataReader for PublisherRestriction {
    type Err = ReadError;

    fn from_data_reader(r: &mut DataReader) -> Result<Self, Self::Err> {
        Ok(Self {
            purpose_id: r.read_fixed_integer(6)?,
            restriction_type: RestrictionType::from_u8(r.read_fixed_integer(2)?)
                .unwrap_or(RestrictionType::Undefined),
            restricted_vendor_ids: r.read_integer_range(16)?,
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, FromPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum RestrictionType {
    NotAllowed = 0,
    RequireConsent = 1,
    RequireLegitimateInterest = 2,
    Undefined = 3,
}

#[derive(Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[non_exhaustive]
pub struct PublisherPurposes {
    pub consents: IdSet,
    pub legitimate_interests: IdSet,
    pub custom_consents: IdSet,
    pub custom_legitimate_interests: IdSet,
}

impl FromDataReader for PublisherPurposes {
    type Err = ReadError;

    fn from_data_reader(r: &mut DataReader) -> Result<Self, Self::Err> {
        let consents = r.read_fixed_bitfield(24)?;
        let legitimate_interests = r.read_fixed_bitfield(24)?;
        let custom_purposes = r.read_fixed_integer::<u8>(6)? as usize;

        Ok(Self {
            consents,
            legitimate_interests,
            custom_consents: r.read_fixed_bitfield(custom_purposes)?,
            custom_legitimate_interests: r.read_fixed_bitfield(custom_purposes)?,
        })
    }
}

/// Built-in decoder for the TCF EU v2 section of a GPP string.
#[derive(Clone, Debug)]
pub struct TcfEuV2Decoder {
    section: String,
}

impl TcfEuV2Decoder {
    pub fn new(section: &str) -> Self {
        Self {
            section: section.to_string(),
        }
    }
}

impl SectionDecoder for TcfEuV2Decoder {
    fn section_id(&self) -> SectionId {
        SectionId::TcfEuV2
    }

    fn parse_consent(&self) -> Result<GppSection, SectionDecodeError> {
        Ok(GppSection::TcfEuV2(self.section.parse()?))
    }
}
