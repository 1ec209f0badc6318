//! PEP 508 environment markers as sets of environments.
//!
//! Markers are parsed into a [`Condition`], a canonical disjunction of clauses over the Python
//! version, the string-valued environment keys and the requested extras. Conditions support
//! conjunction, disjunction and negation, and can be checked for emptiness, universality and
//! containment.

use std::error::Error;
use std::fmt::{Display, Formatter};

use unicode_width::UnicodeWidthChar;

pub use condition::{Condition, ConditionContents};
pub use environment::MarkerEnvironment;
pub use expression::{
    MarkerExpression, MarkerOperator, MarkerValue, MarkerValueString, MarkerValueVersion,
};

mod condition;
mod cursor;
mod environment;
mod expression;
mod parse;
mod python;

/// A marker that failed to parse, with the offending span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerParseError {
    pub message: String,
    /// Span start, as a byte offset.
    pub start: usize,
    /// Span length, in bytes.
    pub len: usize,
    /// The input string so we can print it underlined.
    pub input: String,
}

impl Display for MarkerParseError {
    /// Pretty formatting with underline.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let start = self.start.min(self.input.len());
        let end = (self.start + self.len).min(self.input.len());
        let start_offset = self.input[..start]
            .chars()
            .flat_map(UnicodeWidthChar::width)
            .sum::<usize>();
        let underline_len = self.input[start..end]
            .chars()
            .flat_map(UnicodeWidthChar::width)
            .sum::<usize>()
            .max(1);
        write!(
            f,
            "{}\n{}\n{}{}",
            self.message,
            self.input,
            " ".repeat(start_offset),
            "^".repeat(underline_len)
        )
    }
}

impl Error for MarkerParseError {}

#[cfg(test)]
mod tests;
