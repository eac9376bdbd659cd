use assert_json_diff::assert_json_eq;
use iab_consent::decode_gpp;
use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::io;
use std::io::ErrorKind;
use std::path::Path;

/// A GPP string and the JSON serialization of its decoded sections, keyed by section ID.
#[derive(Deserialize)]
pub struct Fixture {
    gpp_string: String,
    expected_sections: Value,
}

impl Fixture {
    pub fn load_from_file<P: AsRef<Path>>(p: P) -> io::Result<Self> {
        let f = File::open(p)?;
        let fixture: Self = serde_json::from_reader(&f)
            .map_err(|e| io::Error::new(ErrorKind::InvalidData, e.to_string()))?;
        Ok(fixture)
    }

    pub fn assert_json_matches(&self) {
        let sections = match decode_gpp(&self.gpp_string, None) {
            Ok(sections) => sections,
            Err(e) => panic!("unable to decode {:?}: {e}", self.gpp_string),
        };

        let actual = serde_json::to_value(&sections).expect("sections should serialize");
        assert_json_eq!(actual, self.expected_sections);
    }
}
