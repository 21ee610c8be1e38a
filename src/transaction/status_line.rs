//! Status line decoding.
//!
//! # Grammar
//! ```text
//! status-line = code [ SP phrase ]
//! code        = 1*DIGIT          ; base 10, at most u64::MAX
//! phrase      = *CHAR            ; everything after the first SP, verbatim
//! ```
//!
//! Leading whitespace, signs and any separator other than a single space make
//! the code unparseable. Codes above 599 still decode and classify as `Error`.

use thiserror::Error;

use crate::transaction::record::HighLevelStatus;

/// A decoded status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub status: HighLevelStatus,
    pub code: u64,
    pub phrase: String,
}

/// The status line could not be split into a numeric code and phrase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Status line {line:?} is malformed: {reason}")]
pub struct MalformedStatusLine {
    pub line: String,
    pub reason: &'static str,
}

/// Decode a status line such as `"404 User not found"`.
pub fn decode_status_line(line: &str) -> Result<StatusLine, MalformedStatusLine> {
    let (code, phrase) = match line.split_once(' ') {
        Some((code, phrase)) => (code, phrase),
        None => (line, ""),
    };

    let malformed = |reason| MalformedStatusLine {
        line: line.to_string(),
        reason,
    };

    if code.is_empty() {
        return Err(malformed("missing status code"));
    }
    if !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed("status code is not a base-10 integer"));
    }
    let code: u64 = code
        .parse()
        .map_err(|_| malformed("status code does not fit in 64 bits"))?;

    Ok(StatusLine {
        status: HighLevelStatus::from_code(code),
        code,
        phrase: phrase.to_string(),
    })
}
