//! Multi-State Privacy Agreement sections.
//!
//! US National and the state sections share one record type, [`MspaParsedConsent`]. Each
//! (section, version) pair has its own field layout, described by a table of two-bit fields
//! that drives a single decoding loop. Fields that are not part of a section's layout keep
//! their default value.
//!
use crate::core::{DataReader, ReadError};
use crate::sections::{
    GppSection, OptionalSegmentParser, SectionDecodeError, SectionDecoder, SectionId,
    parse_segmented_str,
};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
#[cfg(feature = "serde")]
use serde::Serialize;
use std::collections::BTreeMap;

const VERSION_BITS: u32 = 6;
const FIELD_BITS: u32 = 2;
const SUBSECTION_TYPE_BITS: u32 = 2;

const GPC_SUBSECTION: u8 = 1;

/// Sections decoded by [`MspaDecoder`].
pub const MSPA_SECTIONS: [SectionId; 6] = [
    SectionId::UsNat,
    SectionId::UsCa,
    SectionId::UsVa,
    SectionId::UsCo,
    SectionId::UsUt,
    SectionId::UsCt,
];

pub fn is_mspa_section(id: SectionId) -> bool {
    MSPA_SECTIONS.contains(&id)
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, FromPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum Notice {
    #[default]
    NotApplicable = 0,
    Provided = 1,
    NotProvided = 2,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, FromPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum OptOut {
    #[default]
    NotApplicable = 0,
    OptedOut = 1,
    NotOptedOut = 2,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, FromPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum Consent {
    #[default]
    NotApplicable = 0,
    NoConsent = 1,
    Consent = 2,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, FromPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum MspaMode {
    #[default]
    NotApplicable = 0,
    Yes = 1,
    No = 2,
}

/// The decoded content of an MSPA section.
///
/// Sensitive data categories and known child categories are indexed from 0, in the order
/// they appear in the section.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[non_exhaustive]
pub struct MspaParsedConsent {
    pub version: u8,
    pub sharing_notice: Notice,
    pub sale_opt_out_notice: Notice,
    pub sharing_opt_out_notice: Notice,
    pub targeted_advertising_opt_out_notice: Notice,
    pub sensitive_data_processing_opt_out_notice: Notice,
    pub sensitive_data_limit_use_notice: Notice,
    pub sale_opt_out: OptOut,
    pub sharing_opt_out: OptOut,
    pub targeted_advertising_opt_out: OptOut,
    pub sensitive_data_processing_consents: BTreeMap<u8, Consent>,
    pub sensitive_data_processing_opt_outs: BTreeMap<u8, OptOut>,
    pub known_child_sensitive_data_consents: BTreeMap<u8, Consent>,
    pub personal_data_consent: Consent,
    pub mspa_covered_transaction: MspaMode,
    pub mspa_opt_out_option_mode: MspaMode,
    pub mspa_service_provider_mode: MspaMode,
    pub gpc: Option<bool>,
}

impl MspaParsedConsent {
    /// Whether a Global Privacy Control signal was set, an absent subsection counting as unset.
    pub fn gpc_signal(&self) -> bool {
        self.gpc.unwrap_or(false)
    }

    fn read_field(&mut self, field: Field, r: &mut DataReader) -> Result<(), ReadError> {
        match field {
            Field::SharingNotice => self.sharing_notice = read_value(r)?,
            Field::SaleOptOutNotice => self.sale_opt_out_notice = read_value(r)?,
            Field::SharingOptOutNotice => self.sharing_opt_out_notice = read_value(r)?,
            Field::TargetedAdvertisingOptOutNotice => {
                self.targeted_advertising_opt_out_notice = read_value(r)?
            }
            Field::SensitiveDataProcessingOptOutNotice => {
                self.sensitive_data_processing_opt_out_notice = read_value(r)?
            }
            Field::SensitiveDataLimitUseNotice => {
                self.sensitive_data_limit_use_notice = read_value(r)?
            }
            Field::SaleOptOut => self.sale_opt_out = read_value(r)?,
            Field::SharingOptOut => self.sharing_opt_out = read_value(r)?,
            Field::TargetedAdvertisingOptOut => self.targeted_advertising_opt_out = read_value(r)?,
            Field::SensitiveDataProcessingConsents(n) => {
                self.sensitive_data_processing_consents = read_values(r, n)?
            }
            Field::SensitiveDataProcessingOptOuts(n) => {
                self.sensitive_data_processing_opt_outs = read_values(r, n)?
            }
            Field::KnownChildSensitiveDataConsents(n) => {
                self.known_child_sensitive_data_consents = read_values(r, n)?
            }
            Field::PersonalDataConsent => self.personal_data_consent = read_value(r)?,
            Field::MspaCoveredTransaction => self.mspa_covered_transaction = read_value(r)?,
            Field::MspaOptOutOptionMode => self.mspa_opt_out_option_mode = read_value(r)?,
            Field::MspaServiceProviderMode => self.mspa_service_provider_mode = read_value(r)?,
        }

        Ok(())
    }
}

impl OptionalSegmentParser for MspaParsedConsent {
    fn read_segment_type(r: &mut DataReader) -> Result<u8, SectionDecodeError> {
        Ok(r.read_fixed_integer(SUBSECTION_TYPE_BITS)?)
    }

    fn is_known_segment_type(segment_type: u8) -> bool {
        segment_type == GPC_SUBSECTION
    }

    fn parse_optional_segment(
        segment_type: u8,
        r: &mut DataReader,
        into: &mut Self,
    ) -> Result<(), SectionDecodeError> {
        match segment_type {
            GPC_SUBSECTION => into.gpc = Some(r.read_bool()?),
            _ => return Err(SectionDecodeError::UnknownSegmentType { segment_type }),
        }

        Ok(())
    }
}

/// Reads a two-bit value, the reserved pattern decoding as the default variant.
fn read_value<T: FromPrimitive + Default>(r: &mut DataReader) -> Result<T, ReadError> {
    Ok(T::from_u8(r.read_fixed_integer(FIELD_BITS)?).unwrap_or_default())
}

fn read_values<T: FromPrimitive + Default>(
    r: &mut DataReader,
    n: u8,
) -> Result<BTreeMap<u8, T>, ReadError> {
    (0..n).map(|i| read_value(r).map(|v| (i, v))).collect()
}

/// A field of an MSPA core segment. Repeated fields carry their number of categories.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Field {
    SharingNotice,
    SaleOptOutNotice,
    SharingOptOutNotice,
    TargetedAdvertisingOptOutNotice,
    SensitiveDataProcessingOptOutNotice,
    SensitiveDataLimitUseNotice,
    SaleOptOut,
    SharingOptOut,
    TargetedAdvertisingOptOut,
    SensitiveDataProcessingConsents(u8),
    SensitiveDataProcessingOptOuts(u8),
    KnownChildSensitiveDataConsents(u8),
    PersonalDataConsent,
    MspaCoveredTransaction,
    MspaOptOutOptionMode,
    MspaServiceProviderMode,
}

use Field::*;

const US_NAT_V1: &[Field] = &[
    SharingNotice,
    SaleOptOutNotice,
    SharingOptOutNotice,
    TargetedAdvertisingOptOutNotice,
    SensitiveDataProcessingOptOutNotice,
    SensitiveDataLimitUseNotice,
    SaleOptOut,
    SharingOptOut,
    TargetedAdvertisingOptOut,
    SensitiveDataProcessingConsents(12),
    KnownChildSensitiveDataConsents(2),
    PersonalDataConsent,
    MspaCoveredTransaction,
    MspaOptOutOptionMode,
    MspaServiceProviderMode,
];

const US_NAT_V2: &[Field] = &[
    SharingNotice,
    SaleOptOutNotice,
    SharingOptOutNotice,
    TargetedAdvertisingOptOutNotice,
    SensitiveDataProcessingOptOutNotice,
    SensitiveDataLimitUseNotice,
    SaleOptOut,
    SharingOptOut,
    TargetedAdvertisingOptOut,
    SensitiveDataProcessingConsents(16),
    KnownChildSensitiveDataConsents(3),
    PersonalDataConsent,
    MspaCoveredTransaction,
    MspaOptOutOptionMode,
    MspaServiceProviderMode,
];

const US_CA_V1: &[Field] = &[
    SaleOptOutNotice,
    SharingOptOutNotice,
    SensitiveDataLimitUseNotice,
    SaleOptOut,
    SharingOptOut,
    SensitiveDataProcessingOptOuts(9),
    KnownChildSensitiveDataConsents(2),
    PersonalDataConsent,
    MspaCoveredTransaction,
    MspaOptOutOptionMode,
    MspaServiceProviderMode,
];

const US_VA_V1: &[Field] = &[
    SharingNotice,
    SaleOptOutNotice,
    TargetedAdvertisingOptOutNotice,
    SaleOptOut,
    TargetedAdvertisingOptOut,
    SensitiveDataProcessingConsents(8),
    KnownChildSensitiveDataConsents(1),
    MspaCoveredTransaction,
    MspaOptOutOptionMode,
    MspaServiceProviderMode,
];

const US_CO_V1: &[Field] = &[
    SharingNotice,
    SaleOptOutNotice,
    TargetedAdvertisingOptOutNotice,
    SaleOptOut,
    TargetedAdvertisingOptOut,
    SensitiveDataProcessingConsents(7),
    KnownChildSensitiveDataConsents(1),
    MspaCoveredTransaction,
    MspaOptOutOptionMode,
    MspaServiceProviderMode,
];

const US_UT_V1: &[Field] = &[
    SharingNotice,
    SaleOptOutNotice,
    TargetedAdvertisingOptOutNotice,
    SensitiveDataProcessingOptOutNotice,
    SaleOptOut,
    TargetedAdvertisingOptOut,
    SensitiveDataProcessingOptOuts(8),
    KnownChildSensitiveDataConsents(1),
    MspaCoveredTransaction,
    MspaOptOutOptionMode,
    MspaServiceProviderMode,
];

const US_CT_V1: &[Field] = &[
    SharingNotice,
    SaleOptOutNotice,
    TargetedAdvertisingOptOutNotice,
    SaleOptOut,
    TargetedAdvertisingOptOut,
    SensitiveDataProcessingConsents(8),
    KnownChildSensitiveDataConsents(3),
    MspaCoveredTransaction,
    MspaOptOutOptionMode,
    MspaServiceProviderMode,
];

fn schema(id: SectionId, version: u8) -> Option<&'static [Field]> {
    Some(match (id, version) {
        (SectionId::UsNat, 1) => US_NAT_V1,
        (SectionId::UsNat, 2) => US_NAT_V2,
        (SectionId::UsCa, 1) => US_CA_V1,
        (SectionId::UsVa, 1) => US_VA_V1,
        (SectionId::UsCo, 1) => US_CO_V1,
        (SectionId::UsUt, 1) => US_UT_V1,
        (SectionId::UsCt, 1) => US_CT_V1,
        _ => return None,
    })
}

fn decode_core(id: SectionId, r: &mut DataReader) -> Result<MspaParsedConsent, SectionDecodeError> {
    let version = r.read_fixed_integer(VERSION_BITS)?;
    let fields = schema(id, version).ok_or(SectionDecodeError::UnknownSegmentVersion {
        segment_version: version,
    })?;

    let mut consent = MspaParsedConsent {
        version,
        ..Default::default()
    };
    for &field in fields {
        consent.read_field(field, r)?;
    }

    Ok(consent)
}

/// Decodes an MSPA section string, core segment and subsections.
pub fn decode_mspa(id: SectionId, s: &str) -> Result<MspaParsedConsent, SectionDecodeError> {
    if !is_mspa_section(id) {
        return Err(SectionDecodeError::UnsupportedSection(id));
    }

    parse_segmented_str(s, |r| decode_core(id, r))
}

/// Built-in decoder for the MSPA sections of a GPP string.
#[derive(Clone, Debug)]
pub struct MspaDecoder {
    section_id: SectionId,
    section: String,
}

impl SectionDecoder for MspaDecoder {
    fn section_id(&self) -> SectionId {
        self.section_id
    }

    fn parse_consent(&self) -> Result<GppSection, SectionDecodeError> {
        Ok(GppSection::Mspa(decode_mspa(self.section_id, &self.section)?))
    }
}

/// Creates the decoder for an MSPA section.
///
/// The section ID is only checked when decoding: a non-MSPA ID fails with
/// [`SectionDecodeError::UnsupportedSection`].
pub fn make_mspa_decoder(section_id: SectionId, section: &str) -> MspaDecoder {
    MspaDecoder {
        section_id,
        section: section.to_string(),
    }
}
