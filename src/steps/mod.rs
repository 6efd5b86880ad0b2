//! Concrete steps built on [`crate::step::Step`].

use crate::Result;
use crate::error::Error;
use std::str::FromStr;

pub mod convert;

pub use convert::ConvertStep;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Case {
    Upper,
    Lower,
}

impl FromStr for Case {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "upper" => Ok(Case::Upper),
            "lower" => Ok(Case::Lower),
            _ => Err(Error::InvalidCaseConversion(s.to_string())),
        }
    }
}

/// Convert the characters of `s` from index `from` (in chars) onward to `case`.
pub fn change_case(s: &str, from: usize, case: Case) -> String {
    s.chars()
        .enumerate()
        .map(|(i, c)| match (i >= from, case) {
            (false, _) => c.to_string(),
            (true, Case::Upper) => c.to_uppercase().to_string(),
            (true, Case::Lower) => c.to_lowercase().to_string(),
        })
        .collect()
}

/// [`change_case`] with the mode given by name.
pub fn change_case_named(s: &str, from: usize, case: &str) -> Result<String> {
    Ok(change_case(s, from, case.parse()?))
}
