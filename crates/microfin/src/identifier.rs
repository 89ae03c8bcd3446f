//! Display identifiers derived from sequence values.
//!
//! Issued strings are persisted and shown verbatim, so the prefixes and widths below are an
//! external contract: never change them for an existing deployment.

use serde::{Deserialize, Serialize};

/// Raised when a sequence value cannot be rendered without truncation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    #[error("sequence value {value} does not fit in {width} digits for prefix {prefix}")]
    SequenceOverflow {
        prefix: String,
        value: u64,
        width: u32,
    },
    #[error("identifier width for prefix {prefix} must be at least one digit")]
    ZeroWidth { prefix: String },
    #[error("'{raw}' is not a {prefix}- identifier of {width} digits")]
    Malformed {
        raw: String,
        prefix: String,
        width: u32,
    },
}

/// Render `value` as `PREFIX-` followed by exactly `width` zero-padded digits.
pub fn format(prefix: &str, value: u64, width: u32) -> Result<String, IdentifierError> {
    if width == 0 {
        return Err(IdentifierError::ZeroWidth {
            prefix: prefix.to_string(),
        });
    }
    if value > max_value(width) {
        return Err(IdentifierError::SequenceOverflow {
            prefix: prefix.to_string(),
            value,
            width,
        });
    }

    Ok(format!("{prefix}-{value:0width$}", width = width as usize))
}

/// Inverse of [`format`]: recovers the sequence value from a display identifier.
pub fn parse(prefix: &str, width: u32, raw: &str) -> Result<u64, IdentifierError> {
    if width == 0 {
        return Err(IdentifierError::ZeroWidth {
            prefix: prefix.to_string(),
        });
    }
    let malformed = || IdentifierError::Malformed {
        raw: raw.to_string(),
        prefix: prefix.to_string(),
        width,
    };

    let digits = raw
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('-'))
        .ok_or_else(malformed)?;

    if digits.len() != width as usize || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }

    digits.parse::<u64>().map_err(|_| malformed())
}

fn max_value(width: u32) -> u64 {
    10u64.checked_pow(width).map_or(u64::MAX, |limit| limit - 1)
}

/// The identifier families issued by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    Membership,
    LoanApplication,
    Loan,
}

impl IdentifierKind {
    /// Counter name in the sequence store.
    pub const fn sequence_name(self) -> &'static str {
        match self {
            IdentifierKind::Membership => "membership",
            IdentifierKind::LoanApplication => "loanApplication",
            IdentifierKind::Loan => "loan",
        }
    }

    pub const fn prefix(self) -> &'static str {
        match self {
            IdentifierKind::Membership => "ZMID",
            IdentifierKind::LoanApplication => "APP",
            IdentifierKind::Loan => "LN",
        }
    }

    pub const fn width(self) -> u32 {
        7
    }

    pub fn format(self, value: u64) -> Result<String, IdentifierError> {
        format(self.prefix(), value, self.width())
    }

    pub fn parse(self, raw: &str) -> Result<u64, IdentifierError> {
        parse(self.prefix(), self.width(), raw)
    }

    pub fn from_sequence_name(name: &str) -> Option<Self> {
        [
            IdentifierKind::Membership,
            IdentifierKind::LoanApplication,
            IdentifierKind::Loan,
        ]
        .into_iter()
        .find(|kind| kind.sequence_name() == name)
    }
}
