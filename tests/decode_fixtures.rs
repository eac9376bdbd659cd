#![cfg(feature = "serde")]

mod common;

include!(concat!(env!("OUT_DIR"), "/fixture_tests.rs"));
