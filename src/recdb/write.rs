//! Canonical writer for the database text format.
//!
//! Output is the indented form the parser round-trips: one record per
//! line, a tab per nesting depth, objects opened with `{` and closed by
//! an indented `};`. I/O errors propagate straight out of every method,
//! leaving the sink in a well-defined (abandonable) state.

use super::{Db, Record};
use std::io::{self, Write};

/// Write one quoted string with the minimal escape set: the named escapes
/// for bytes that have them, octal for other control bytes, everything
/// else raw.
pub fn write_qstring(out: &mut impl Write, s: &str) -> io::Result<()> {
    out.write_all(b"\"")?;
    for c in s.chars() {
        match c {
            '\\' => out.write_all(b"\\\\")?,
            '"' => out.write_all(b"\\\"")?,
            '\x07' => out.write_all(b"\\a")?,
            '\x08' => out.write_all(b"\\b")?,
            '\t' => out.write_all(b"\\t")?,
            '\n' => out.write_all(b"\\n")?,
            '\x0b' => out.write_all(b"\\v")?,
            '\x0c' => out.write_all(b"\\f")?,
            '\r' => out.write_all(b"\\r")?,
            c if (c as u32) < 0x20 || c == '\x7f' => {
                write!(out, "\\{:03o}", c as u32)?;
            }
            c => {
                let mut buf = [0u8; 4];
                out.write_all(c.encode_utf8(&mut buf).as_bytes())?;
            }
        }
    }
    out.write_all(b"\"")
}

/// Streaming record writer with the indent/complex discipline shared by
/// the database flusher.
pub struct RecWriter<W: Write> {
    out: W,
    indent: usize,
    // Stack of complex flags for open records; the top governs whether
    // records separate with newlines or spaces.
    complex: Vec<bool>,
}

impl<W: Write> RecWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            indent: 0,
            complex: Vec::new(),
        }
    }

    fn complex_here(&self) -> bool {
        self.complex.last().copied().unwrap_or(true)
    }

    fn pre_record(&mut self) -> io::Result<()> {
        if self.complex_here() {
            for _ in 0..self.indent {
                self.out.write_all(b"\t")?;
            }
        }
        Ok(())
    }

    fn post_record(&mut self) -> io::Result<()> {
        self.out
            .write_all(if self.complex_here() { b";\n" } else { b"; " })
    }

    /// Open a nested object record. `complex` selects multi-line layout.
    pub fn start_record(&mut self, name: &str, complex: bool) -> io::Result<()> {
        self.pre_record()?;
        write_qstring(&mut self.out, name)?;
        self.out.write_all(b" { ")?;
        self.complex.push(complex);
        if complex {
            self.indent += 1;
            self.out.write_all(b"\n")?;
        }
        Ok(())
    }

    pub fn end_record(&mut self) -> io::Result<()> {
        debug_assert!(!self.complex.is_empty());
        if self.complex_here() {
            self.indent = self.indent.saturating_sub(1);
        }
        self.pre_record()?;
        self.complex.pop();
        self.out.write_all(b"}")?;
        self.post_record()
    }

    pub fn write_string(&mut self, name: &str, value: &str) -> io::Result<()> {
        self.pre_record()?;
        write_qstring(&mut self.out, name)?;
        self.out.write_all(b" ")?;
        write_qstring(&mut self.out, value)?;
        self.post_record()
    }

    pub fn write_u64(&mut self, name: &str, value: u64) -> io::Result<()> {
        self.write_string(name, &value.to_string())
    }

    pub fn write_string_list(&mut self, name: &str, list: &[String]) -> io::Result<()> {
        self.pre_record()?;
        write_qstring(&mut self.out, name)?;
        self.out.write_all(b" (")?;
        for (ii, item) in list.iter().enumerate() {
            if ii > 0 {
                self.out.write_all(b", ")?;
            }
            write_qstring(&mut self.out, item)?;
        }
        self.out.write_all(b")")?;
        self.post_record()
    }

    /// Recursively write a parsed tree under the current position.
    pub fn write_tree(&mut self, db: &Db) -> io::Result<()> {
        for (name, record) in db.iter() {
            match record {
                Record::String(s) => self.write_string(name, s)?,
                Record::List(l) => self.write_string_list(name, l)?,
                Record::Object(o) => {
                    self.start_record(name, true)?;
                    self.write_tree(o)?;
                    self.end_record()?;
                }
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Write a whole database document.
pub fn write_database(out: &mut impl Write, db: &Db) -> io::Result<()> {
    let mut w = RecWriter::new(out);
    w.write_tree(db)?;
    w.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recdb::parse_database;

    fn sample() -> Db {
        let mut users = Db::new();
        users.insert("Alice", Record::String("500".into()));
        users.insert("bob", Record::String("200".into()));
        let mut chan = Db::new();
        chan.insert("registered", Record::String("1000000".into()));
        chan.insert("topic", Record::String("quoted \"topic\" \\ here".into()));
        chan.insert("users", Record::Object(users));
        chan.insert(
            "masks",
            Record::List(vec!["*!*@a.example".into(), "*!*@b.example".into()]),
        );
        let mut db = Db::new();
        db.insert("#test", Record::Object(chan));
        db.insert("control", Record::String("\x01\x02".into()));
        db
    }

    #[test]
    fn round_trips_canonical_form() {
        let db = sample();
        let mut buf = Vec::new();
        write_database(&mut buf, &db).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let reparsed = parse_database(&text).unwrap();
        assert_eq!(reparsed, db);
    }

    #[test]
    fn control_bytes_use_numeric_escapes() {
        let mut buf = Vec::new();
        write_qstring(&mut buf, "\x01A").unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "\"\\001A\"");
    }

    #[test]
    fn objects_indent_with_tabs() {
        let db = sample();
        let mut buf = Vec::new();
        write_database(&mut buf, &db).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("\"#test\" { \n"));
        assert!(text.contains("\t\"registered\" \"1000000\";\n"));
        assert!(text.contains("\t\t\"Alice\" \"500\";\n"));
        assert!(text.ends_with(";\n"));
    }

    #[test]
    fn simple_records_stay_on_one_line() {
        let mut buf = Vec::new();
        {
            let mut w = RecWriter::new(&mut buf);
            w.start_record("suspended", false).unwrap();
            w.write_string("suspender", "ops").unwrap();
            w.write_u64("issued", 123).unwrap();
            w.end_record().unwrap();
        }
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "\"suspended\" { \"suspender\" \"ops\"; \"issued\" \"123\"; };\n"
        );
    }
}
