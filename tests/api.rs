use iab_consent::sections::mspa::{Consent, MspaMode, Notice, OptOut, make_mspa_decoder};
use iab_consent::sections::{
    GppSection, SectionDecodeError, SectionDecoder, SectionId, SectionParsers,
};
use iab_consent::{
    ErrorKind, GPPDecodeError, TcfVersion, decode_gpp, decode_v1, decode_v2, detect_tcf_version,
    resolve_gpp_section_decoders,
};
use test_case::test_case;

/// A USP v1 string, made of a version digit followed by three Y/N/- flags.
#[derive(Debug, PartialEq)]
struct UspV1 {
    opt_out_notice: bool,
    opt_out_sale: bool,
}

#[derive(Debug)]
struct UsPrivacyDecoder(String);

#[derive(Debug, thiserror::Error)]
#[error("invalid USP v1 string {0:?}")]
struct InvalidUspV1(String);

impl SectionDecoder for UsPrivacyDecoder {
    fn section_id(&self) -> SectionId {
        SectionId::UspV1
    }

    fn parse_consent(&self) -> Result<GppSection, SectionDecodeError> {
        let b = self.0.as_bytes();
        if b.len() != 4 || b[0] != b'1' {
            return Err(SectionDecodeError::Custom(Box::new(InvalidUspV1(
                self.0.clone(),
            ))));
        }

        Ok(GppSection::Custom(Box::new(UspV1 {
            opt_out_notice: b[1] == b'Y',
            opt_out_sale: b[2] == b'Y',
        })))
    }
}

fn usp_v1(_: SectionId, s: &str) -> Box<dyn SectionDecoder> {
    Box::new(UsPrivacyDecoder(s.to_string()))
}

#[test]
fn tcf_v1() {
    let s = "BOEFEAyOEFEAyAHABDENAI4AAAB9vABAASA";
    assert_eq!(detect_tcf_version(s).unwrap(), TcfVersion::V1);

    let consent = decode_v1(s).unwrap();
    assert_eq!(consent.cmp_id, 7);
    assert_eq!(consent.consent_language, "EN");
    assert_eq!(consent.max_vendor_id, 2011);
    assert_eq!(consent.vendor_consents.len(), 2010);
}

#[test]
fn tcf_v2() {
    let s = "CPXuQIAPXuQIAAfKABENB-CgACAAAAAAAAYgF5wAQF5gAAAA.YAAAAAAAAAAA";
    assert_eq!(detect_tcf_version(s).unwrap(), TcfVersion::V2);

    let consent = decode_v2(s).unwrap();
    assert!(consent.core.purpose_consents.contains(&3));
    assert!(consent.core.vendor_consents.contains(&755));
    assert!(consent.publisher_purposes.is_some());
}

#[test]
fn gpp_with_registry() {
    let parsers = SectionParsers::new().with(SectionId::UspV1, usp_v1);
    let sections = decode_gpp(
        "DBACNY~CPXxRfAPXxRfAAfKABENB-CgAAAAAAAAAAYgAAAAAAAA~1YNN",
        Some(&parsers),
    )
    .unwrap();

    assert_eq!(sections.len(), 2);
    assert_eq!(
        sections[&SectionId::UspV1].downcast_ref::<UspV1>(),
        Some(&UspV1 {
            opt_out_notice: true,
            opt_out_sale: false,
        })
    );
}

#[test]
fn gpp_with_failing_registry_decoder() {
    let parsers = SectionParsers::new().with(SectionId::UspV1, usp_v1);
    let e = decode_gpp("DBABTA~2YNN", Some(&parsers)).unwrap_err();

    assert!(matches!(
        e,
        GPPDecodeError::Section {
            id: SectionId::UspV1,
            source: SectionDecodeError::Custom(_)
        }
    ));
    assert_eq!(e.kind(), ErrorKind::MalformedInput);
}

#[test]
fn gpp_mspa_sections() {
    let sections = decode_gpp("DBACLD~BqqAqqqqqqA~BVoYYYQg.YA", None).unwrap();

    let us_nat = sections[&SectionId::UsNat].as_mspa().unwrap();
    assert_eq!(us_nat.sharing_notice, Notice::NotProvided);
    assert_eq!(us_nat.sale_opt_out, OptOut::NotApplicable);
    assert_eq!(us_nat.personal_data_consent, Consent::Consent);
    assert_eq!(us_nat.mspa_covered_transaction, MspaMode::No);
    assert_eq!(us_nat.gpc, None);

    let us_ct = sections[&SectionId::UsCt].as_mspa().unwrap();
    assert_eq!(us_ct.known_child_sensitive_data_consents.len(), 3);
    assert!(us_ct.gpc_signal());
}

#[test]
fn resolve_decoders_with_closure() {
    let registry = |id: SectionId, s: &str| -> Option<Box<dyn SectionDecoder>> {
        match id {
            SectionId::UspV1 => Some(usp_v1(id, s)),
            _ => None,
        }
    };

    let decoders =
        resolve_gpp_section_decoders("DBABjw~BPXuQIAPXuQIAAfKABENB-CgAAAAAAAAAAAAAAAA~1YNN", Some(&registry));

    // no decoder for TCF Canada
    let e = decoders.unwrap_err();
    assert!(matches!(
        e,
        GPPDecodeError::Section {
            id: SectionId::TcfCaV1,
            source: SectionDecodeError::UnsupportedSection(SectionId::TcfCaV1)
        }
    ));

    let decoders = resolve_gpp_section_decoders("DBABTA~1YNN", Some(&registry)).unwrap();
    assert_eq!(decoders[&SectionId::UspV1].section_id(), SectionId::UspV1);
}

#[test]
fn standalone_mspa_decoder() {
    let decoder = make_mspa_decoder(SectionId::UsUt, "BVaGGGCA.YA");
    let section = decoder.parse_consent().unwrap();
    let us_ut = section.as_mspa().unwrap();

    assert_eq!(us_ut.sensitive_data_processing_opt_outs.len(), 8);
    assert!(us_ut.sensitive_data_processing_consents.is_empty());
    assert_eq!(us_ut.gpc, Some(true));
}

#[test_case("DBABM~CPX" => ErrorKind::TruncatedInput ; "truncated section")]
#[test_case("DBABM~CPX*" => ErrorKind::MalformedInput ; "invalid character")]
#[test_case("DBACNY~CPXxRfAPXxRfAAfKABENB-CgAAAAAAAAAAYgAAAAAAAA" => ErrorKind::StructuralMismatch ; "count mismatch")]
#[test_case("DBABTA~1YNN" => ErrorKind::UnsupportedSection ; "no decoder")]
#[test_case("DBABRY~1YNN" => ErrorKind::UnsupportedSection ; "unknown section id")]
#[test_case("BOEFEAyOEFEAyAHABDENAI4AAAB9vABAASA" => ErrorKind::StructuralMismatch ; "not a gpp string")]
#[test_case("DBABAAAVg~BVVqAAEABCA" => ErrorKind::MalformedInput ; "section id overflow")]
#[test_case("DBACLAAAAw~BVoYYYQg~BVoYYYQg" => ErrorKind::MalformedInput ; "repeated section id")]
#[test_case("DBABVg~BVoYYYQ" => ErrorKind::TruncatedInput ; "section one field short")]
fn gpp_error_kind(s: &str) -> ErrorKind {
    decode_gpp(s, None).unwrap_err().kind()
}
