//! This crate decodes IAB consent strings: standalone
//! [TCF](https://github.com/InteractiveAdvertisingBureau/GDPR-Transparency-and-Consent-Framework)
//! v1.1 and v2 strings, as well as
//! [Global Privacy Platform](https://github.com/InteractiveAdvertisingBureau/Global-Privacy-Platform)
//! (GPP) strings.
//!
//! GPP sections with a built-in decoder are TCF EU v2 and the MSPA sections: US National,
//! California, Virginia, Colorado, Utah and Connecticut. Decoders for other sections can be
//! supplied through a [`SectionRegistry`](sections::SectionRegistry).
//!
//! NOTE: This is not an official IAB library.
//!
//! # Decoding GPP strings
//!
//! A GPP Consent String is made of a mandatory header and a list of sections.
//!
//! ```
//! # use std::error::Error;
//! #
//! # fn main() -> Result<(), Box<dyn Error>> {
//! use iab_consent::decode_gpp;
//! use iab_consent::sections::SectionId;
//! use iab_consent::sections::mspa::OptOut;
//!
//! let s = "DBACOP~CPXuQIAPXuQIAAfKABENB-CgACAAAAAAAAYgF5wAQF5gAAAA.YAAAAAAAAAAA~BVVqAAEABCA.YA~BVoYYZoI";
//! let sections = decode_gpp(s, None)?;
//!
//! // does the user consent to vendor 755 creating a personalized ads profile?
//! let tcf = sections[&SectionId::TcfEuV2].as_tcf_eu_v2().ok_or("not a TCF section")?;
//! assert!(tcf.core.purpose_consents.contains(&3));
//! assert!(tcf.core.vendor_consents.contains(&755));
//!
//! // did the user opt out of the sale of their data in the US?
//! let us_nat = sections[&SectionId::UsNat].as_mspa().ok_or("not an MSPA section")?;
//! assert_eq!(us_nat.sale_opt_out, OptOut::NotOptedOut);
//! assert_eq!(us_nat.gpc, Some(true));
//! # Ok(())
//! # }
//! ```
//!
//! The [`GPPString`](v1::GPPString) type gives access to the header and the raw sections, and
//! can decode sections individually.
//!
//! # Decoding TCF strings
//!
//! ```
//! # use std::error::Error;
//! #
//! # fn main() -> Result<(), Box<dyn Error>> {
//! use iab_consent::{TcfVersion, decode_v1, detect_tcf_version};
//!
//! let s = "BOEFEAyOEFEAyAHABDENAI4AAAB9vABAASA";
//! assert_eq!(detect_tcf_version(s)?, TcfVersion::V1);
//!
//! let consent = decode_v1(s)?;
//! assert!(consent.vendor_consents.contains(&8));
//! assert!(!consent.vendor_consents.contains(&9));
//! # Ok(())
//! # }
//! ```
//!
//! # Error handling
//!
//! This crate is conservative with regard to how it handles parsing failure. If a string cannot be
//! fully decoded, then it is considered as an error. Decoding a GPP string fails as soon as one of
//! its sections fails.
//!
//! This is done to avoid obtaining erroneous user consent information from potentially corrupted
//! payloads.
//!
//! Every error type exposes a `kind()` method returning an [`ErrorKind`].
//!
pub(crate) mod core;
pub mod sections;
pub mod tcf;
pub mod v1;

pub use crate::core::ReadError;
pub use crate::core::base64::DecodeError as Base64DecodeError;
pub use crate::tcf::{TcfDecodeError, TcfVersion, decode_v1, decode_v2, detect_tcf_version};
pub use crate::v1::{GPPDecodeError, decode_gpp, resolve_gpp_section_decoders};

/// Broad classification of decoding failures.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    /// Characters outside of the Base64-URL alphabet, or values violating an encoding rule.
    MalformedInput,
    /// The input ends before all the fields it announces.
    TruncatedInput,
    /// Versions, section counts or segment types that do not match the expected structure.
    StructuralMismatch,
    /// A section for which no decoder is available.
    UnsupportedSection,
}
