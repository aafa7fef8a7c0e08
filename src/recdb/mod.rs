//! The services database text format.
//!
//! A database is an ordered tree of named records; each record's value is
//! a quoted string, a parenthesized list of quoted strings, or a braced
//! object of nested records. C-style and `//` comments are legal anywhere
//! whitespace is. The parser produces positioned errors; the writer emits
//! the canonical indented form that [`parse`] round-trips.

mod parse;
mod write;

pub use parse::{parse_database, parse_record};
pub use write::{write_database, write_qstring, RecWriter};

use crate::ircstr::IrcDict;
use thiserror::Error;

/// A parsed database: record name to value, case-folded keys.
pub type Db = IrcDict<Record>;

/// One record value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    String(String),
    List(Vec<String>),
    Object(Db),
}

impl Record {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Record::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Record::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Db> {
        match self {
            Record::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut Db> {
        match self {
            Record::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Numeric view of a string record.
    pub fn as_u64(&self) -> Option<u64> {
        self.as_str().and_then(|s| s.parse().ok())
    }
}

/// Convenience accessors used by every database reader.
pub trait DbExt {
    fn get_str(&self, name: &str) -> Option<&str>;
    fn get_u64(&self, name: &str) -> Option<u64>;
    fn get_list(&self, name: &str) -> Option<&[String]>;
    fn get_object(&self, name: &str) -> Option<&Db>;
}

impl DbExt for Db {
    fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Record::as_str)
    }

    fn get_u64(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(Record::as_u64)
    }

    fn get_list(&self, name: &str) -> Option<&[String]> {
        self.get(name).and_then(Record::as_list)
    }

    fn get_object(&self, name: &str) -> Option<&Db> {
        self.get(name).and_then(Record::as_object)
    }
}

/// What went wrong, without position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    UnterminatedString,
    ExpectedOpenQuote,
    ExpectedComma,
    ExpectedStartRecordData,
    ExpectedSemicolon,
    ExpectedRecordData,
    BadEscape,
    TrailingGarbage,
}

impl ParseErrorKind {
    pub fn reason(self) -> &'static str {
        match self {
            Self::UnterminatedString => "Unterminated string",
            Self::ExpectedOpenQuote => "Expected '\"'",
            Self::ExpectedComma => "Expected ','",
            Self::ExpectedStartRecordData => "Expected start of some record data",
            Self::ExpectedSemicolon => "Expected ';'",
            Self::ExpectedRecordData => "Expected record data",
            Self::BadEscape => "Invalid escape sequence",
            Self::TrailingGarbage => "Expected end of database",
        }
    }
}

/// A positioned parse failure. Fatal at boot; surfaced verbatim when help
/// or database files are re-read at runtime.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("line {line} column {column}: {}", kind.reason())]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub kind: ParseErrorKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_accessors() {
        let r = Record::String("42".into());
        assert_eq!(r.as_str(), Some("42"));
        assert_eq!(r.as_u64(), Some(42));
        assert!(r.as_object().is_none());
    }

    #[test]
    fn db_ext_lookups_fold_case() {
        let mut db = Db::new();
        db.insert("Max_Owned", Record::String("5".into()));
        assert_eq!(db.get_u64("max_owned"), Some(5));
    }
}
