use proc_macro2::TokenStream;
use quote::quote;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::{env, fs};
use walkdir::WalkDir;

const TEST_DATA_DIR: &str = "tests/data";

fn main() -> Result<(), Box<dyn Error>> {
    println!("cargo::rerun-if-changed={TEST_DATA_DIR}");
    generate_fixture_tests()
}

/// Generates one test case per JSON fixture, each pairing a GPP string with the expected
/// serialization of its decoded sections.
fn generate_fixture_tests() -> Result<(), Box<dyn Error>> {
    let test_cases = find_test_cases();
    let token_stream = quote! {
        use test_case::test_case;
        #(#test_cases)*
        fn decode_fixture(filename: &str) {
            crate::common::Fixture::load_from_file(filename).unwrap().assert_json_matches();
        }
    };
    let syntax_tree = syn::parse2(token_stream)?;
    let pretty = prettyplease::unparse(&syntax_tree);

    let out_dir = env::var("OUT_DIR")?;
    let dest_path = Path::new(&out_dir).join("fixture_tests.rs");
    fs::write(dest_path, pretty)?;

    Ok(())
}

fn find_fixtures() -> Vec<PathBuf> {
    let mut fixtures = WalkDir::new(TEST_DATA_DIR)
        .into_iter()
        .flatten()
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .is_some_and(|ext| ext == "json")
        })
        .map(|e| e.into_path())
        .collect::<Vec<_>>();
    fixtures.sort();
    fixtures
}

fn find_test_cases() -> Vec<TokenStream> {
    find_fixtures()
        .into_iter()
        .filter_map(|entry| {
            let path = entry.to_str()?.to_string();
            let name = entry.file_stem()?.to_str()?.to_string();
            Some(quote! {
                #[test_case(#path ; #name)]
            })
        })
        .collect()
}
