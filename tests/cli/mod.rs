//! Tests against the termcore binary.

pub mod common;
pub mod one_shot_test;
