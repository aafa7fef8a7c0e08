//! Parser for the database text format.
//!
//! Built on `nom` input threading; failures are non-recoverable and carry
//! the record-grammar reason plus the input position they occurred at.

use super::{Db, ParseError, ParseErrorKind, Record};
use nom::bytes::complete::{tag, take_until};
use nom::IResult;

/// Parser error: the remaining input where the failure happened plus the
/// grammar-level reason.
#[derive(Debug)]
pub(crate) struct RawError<'a> {
    input: &'a str,
    kind: ParseErrorKind,
}

impl<'a> nom::error::ParseError<&'a str> for RawError<'a> {
    fn from_error_kind(input: &'a str, _: nom::error::ErrorKind) -> Self {
        RawError {
            input,
            kind: ParseErrorKind::ExpectedRecordData,
        }
    }

    fn append(_: &'a str, _: nom::error::ErrorKind, other: Self) -> Self {
        other
    }
}

type PResult<'a, T> = IResult<&'a str, T, RawError<'a>>;

fn fail<T>(input: &str, kind: ParseErrorKind) -> PResult<'_, T> {
    Err(nom::Err::Failure(RawError { input, kind }))
}

/// Skip whitespace plus block and line comments, in any interleaving.
fn ws0(mut i: &str) -> PResult<'_, ()> {
    loop {
        let trimmed = i.trim_start();
        if let Ok((rest, _)) = tag::<_, _, RawError>("//")(trimmed) {
            i = match take_until::<_, _, RawError>("\n")(rest) {
                Ok((rest, _)) => rest,
                Err(_) => "",
            };
        } else if let Ok((rest, _)) = tag::<_, _, RawError>("/*")(trimmed) {
            i = match take_until::<_, _, RawError>("*/")(rest) {
                Ok((rest, _)) => &rest[2..],
                Err(_) => "",
            };
        } else {
            return Ok((trimmed, ()));
        }
    }
}

/// Quoted-string body, starting just past the opening quote.
fn qstring_body(i: &str) -> PResult<'_, String> {
    let mut out = String::new();
    let mut iter = i.char_indices();
    while let Some((pos, c)) = iter.next() {
        match c {
            '"' => return Ok((&i[pos + 1..], out)),
            // Literal newlines are never stored; they round-trip as \n.
            '\n' => return fail(&i[pos..], ParseErrorKind::UnterminatedString),
            '\\' => {
                let Some((epos, esc)) = iter.next() else {
                    return fail("", ParseErrorKind::UnterminatedString);
                };
                match esc {
                    '\\' | '"' => out.push(esc),
                    'a' => out.push('\x07'),
                    'b' => out.push('\x08'),
                    't' => out.push('\t'),
                    'n' => out.push('\n'),
                    'v' => out.push('\x0b'),
                    'f' => out.push('\x0c'),
                    'r' => out.push('\r'),
                    '0'..='7' => {
                        // Up to three octal digits; a third is only legal
                        // when the first is 0-3 (values cap at \377).
                        let mut val = esc as u32 - '0' as u32;
                        let mut ndigits = 1;
                        while ndigits < 3 && !(ndigits == 2 && esc > '3') {
                            let mut peek = iter.clone();
                            match peek.next() {
                                Some((_, d @ '0'..='7')) => {
                                    val = val * 8 + (d as u32 - '0' as u32);
                                    iter = peek;
                                    ndigits += 1;
                                }
                                _ => break,
                            }
                        }
                        out.push(char::from(val as u8));
                    }
                    'x' => {
                        let mut val = 0u32;
                        let mut ndigits = 0;
                        while ndigits < 2 {
                            let mut peek = iter.clone();
                            match peek.next() {
                                Some((_, d)) if d.is_ascii_hexdigit() => {
                                    val = val * 16 + d.to_digit(16).unwrap();
                                    iter = peek;
                                    ndigits += 1;
                                }
                                _ => break,
                            }
                        }
                        if ndigits == 0 {
                            return fail(&i[epos..], ParseErrorKind::BadEscape);
                        }
                        out.push(char::from(val as u8));
                    }
                    _ => return fail(&i[epos..], ParseErrorKind::BadEscape),
                }
            }
            _ => out.push(c),
        }
    }
    fail("", ParseErrorKind::UnterminatedString)
}

fn qstring(i: &str) -> PResult<'_, String> {
    let (i, _) = ws0(i)?;
    match i.strip_prefix('"') {
        Some(rest) => qstring_body(rest),
        None => fail(i, ParseErrorKind::ExpectedOpenQuote),
    }
}

fn string_list(i: &str) -> PResult<'_, Vec<String>> {
    // Caller consumed the '('.
    let mut list = Vec::new();
    let (mut i, _) = ws0(i)?;
    if let Some(rest) = i.strip_prefix(')') {
        return Ok((rest, list));
    }
    loop {
        let (rest, s) = qstring(i)?;
        list.push(s);
        let (rest, _) = ws0(rest)?;
        if let Some(rest) = rest.strip_prefix(')') {
            return Ok((rest, list));
        }
        match rest.strip_prefix(',') {
            Some(rest) => i = rest,
            None => return fail(rest, ParseErrorKind::ExpectedComma),
        }
    }
}

fn object(i: &str) -> PResult<'_, Db> {
    // Caller consumed the '{'.
    let mut db = Db::new();
    let mut i = i;
    loop {
        let (rest, _) = ws0(i)?;
        if let Some(rest) = rest.strip_prefix('}') {
            return Ok((rest, db));
        }
        let (rest, (name, value)) = record(rest)?;
        db.insert(&name, value);
        i = rest;
    }
}

fn value(i: &str) -> PResult<'_, Record> {
    let (i, _) = ws0(i)?;
    if i.is_empty() {
        return fail(i, ParseErrorKind::ExpectedRecordData);
    }
    if let Some(rest) = i.strip_prefix('"') {
        let (rest, s) = qstring_body(rest)?;
        Ok((rest, Record::String(s)))
    } else if let Some(rest) = i.strip_prefix('{') {
        let (rest, db) = object(rest)?;
        Ok((rest, Record::Object(db)))
    } else if let Some(rest) = i.strip_prefix('(') {
        let (rest, list) = string_list(rest)?;
        Ok((rest, Record::List(list)))
    } else {
        fail(i, ParseErrorKind::ExpectedStartRecordData)
    }
}

fn record(i: &str) -> PResult<'_, (String, Record)> {
    let (i, name) = qstring(i)?;
    let (i, _) = ws0(i)?;
    // Optional '=' between name and value.
    let i = i.strip_prefix('=').unwrap_or(i);
    let (i, val) = value(i)?;
    let (i, _) = ws0(i)?;
    match i.strip_prefix(';') {
        Some(rest) => Ok((rest, (name, val))),
        None => fail(i, ParseErrorKind::ExpectedSemicolon),
    }
}

fn position(full: &str, rest: &str) -> (usize, usize) {
    let consumed = full.len() - rest.len();
    let prefix = &full[..consumed];
    let line = 1 + prefix.matches('\n').count();
    let column = consumed - prefix.rfind('\n').map_or(0, |p| p + 1) + 1;
    (line, column)
}

fn raise(full: &str, err: nom::Err<RawError<'_>>) -> ParseError {
    let (rest, kind) = match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => (e.input, e.kind),
        nom::Err::Incomplete(_) => ("", ParseErrorKind::ExpectedRecordData),
    };
    let (line, column) = position(full, rest);
    ParseError { line, column, kind }
}

/// Parse a whole database document.
pub fn parse_database(text: &str) -> Result<Db, ParseError> {
    let mut db = Db::new();
    let mut i = text;
    loop {
        let (rest, _) = ws0(i).map_err(|e| raise(text, e))?;
        if rest.is_empty() {
            return Ok(db);
        }
        let (rest, (name, value)) = record(rest).map_err(|e| raise(text, e))?;
        db.insert(&name, value);
        i = rest;
    }
}

/// Parse exactly one record, as given on a command line.
pub fn parse_record(text: &str) -> Result<(String, Record), ParseError> {
    let (rest, rec) = record(text).map_err(|e| raise(text, e))?;
    let (rest, _) = ws0(rest).map_err(|e| raise(text, e))?;
    if rest.is_empty() {
        Ok(rec)
    } else {
        let (line, column) = position(text, rest);
        Err(ParseError {
            line,
            column,
            kind: ParseErrorKind::TrailingGarbage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recdb::DbExt;

    #[test]
    fn parses_scalars_objects_and_lists() {
        let db = parse_database(
            r#"
            "name" "value";
            "numbers" ("1", "2", "3");
            "nested" {
                "inner" = "x";
                "empty" ();
            };
            "#,
        )
        .unwrap();
        assert_eq!(db.get_str("name"), Some("value"));
        assert_eq!(db.get_list("numbers").unwrap().len(), 3);
        let nested = db.get_object("nested").unwrap();
        assert_eq!(nested.get_str("inner"), Some("x"));
        assert_eq!(nested.get_list("empty"), Some(&[][..]));
    }

    #[test]
    fn skips_comments_anywhere_whitespace_is_legal() {
        let db = parse_database(
            "// leading comment\n\"a\" /* mid */ \"1\"; /* trail\nmultiline */ \"b\" \"2\";",
        )
        .unwrap();
        assert_eq!(db.get_str("a"), Some("1"));
        assert_eq!(db.get_str("b"), Some("2"));
    }

    #[test]
    fn decodes_escapes() {
        let db = parse_database(r#""k" "a\tb\n\"q\"\\";"#).unwrap();
        assert_eq!(db.get_str("k"), Some("a\tb\n\"q\"\\"));

        let db = parse_database(r#""k" "\101\x41\7";"#).unwrap();
        assert_eq!(db.get_str("k"), Some("AA\x07"));
    }

    #[test]
    fn octal_escape_caps_at_one_byte() {
        // \46 followed by '6': first digit > 3 limits the escape to two
        // digits, so the trailing 6 is a literal.
        let db = parse_database(r#""k" "\466";"#).unwrap();
        assert_eq!(db.get_str("k"), Some("\u{26}6"));
    }

    #[test]
    fn reports_position_of_errors() {
        let err = parse_database("\"ok\" \"fine\";\n  \"bad\" \"x\"").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.kind, ParseErrorKind::ExpectedSemicolon);

        let err = parse_database("\"unclosed\" \"abc").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnterminatedString);

        let err = parse_database("nonsense").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::ExpectedOpenQuote);
        assert_eq!(err.line, 1);
        assert_eq!(err.column, 1);
    }

    #[test]
    fn single_record_rejects_trailing_garbage() {
        let (name, val) = parse_record("\"greeting\" \"hello\";").unwrap();
        assert_eq!(name, "greeting");
        assert_eq!(val.as_str(), Some("hello"));

        let err = parse_record("\"a\" \"b\"; \"extra\"").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::TrailingGarbage);
    }

    #[test]
    fn missing_value_after_name_is_an_error() {
        let err = parse_database("\"name\"").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::ExpectedRecordData);
    }
}
