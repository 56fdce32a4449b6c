//! Reader and writer for the `project.pbxproj` text format.
//!
//! The format is the old-style ASCII property list: dictionaries are written
//! as `{ key = value; }`, arrays as `( value, value, )`, and strings either
//! bare (when every character is in a small safe set) or double quoted with
//! backslash escapes. Comments (`/* ... */` and `// ...`) are ignored on read.
//!
//! [`serialize`] lays out the `objects` dictionary the way Xcode does, one
//! `/* Begin ... section */` block per `isa`, so files written here diff
//! cleanly against files written by the IDE. [`parse`] accepts anything
//! [`serialize`] produces.

use std::collections::BTreeMap;
use std::fmt::Write;

use indexmap::IndexMap;

use super::value::{Record, Value};
use crate::types::{Result, XcError};

/// Header line Xcode writes at the top of every project file.
pub const HEADER: &str = "// !$*UTF8*$!";

/// Parses a whole project file into its top-level dictionary.
pub fn parse(text: &str) -> Result<Record> {
    let mut parser = Parser::new(text);
    parser.skip_trivia()?;
    let value = parser.value()?;
    parser.skip_trivia()?;
    if !parser.at_end() {
        return Err(parser.error("unexpected content after the top-level dictionary"));
    }
    match value {
        Value::Dict(map) => Ok(map),
        _ => Err(XcError::Parse {
            line: 1,
            message: "top-level value must be a dictionary".to_string(),
        }),
    }
}

/// Parses a single value, e.g. one build setting.
pub fn parse_value(text: &str) -> Result<Value> {
    let mut parser = Parser::new(text);
    parser.skip_trivia()?;
    let value = parser.value()?;
    parser.skip_trivia()?;
    if !parser.at_end() {
        return Err(parser.error("unexpected content after value"));
    }
    Ok(value)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0, line: 1 }
    }

    fn error(&self, message: impl Into<String>) -> XcError {
        XcError::Parse {
            line: self.line,
            message: message.into(),
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            let rest = self.rest();
            if rest.starts_with("//") {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else if rest.starts_with("/*") {
                let start_line = self.line;
                self.pos += 2;
                loop {
                    if self.rest().starts_with("*/") {
                        self.pos += 2;
                        break;
                    }
                    if self.bump().is_none() {
                        return Err(XcError::Parse {
                            line: start_line,
                            message: "unterminated comment".to_string(),
                        });
                    }
                }
            } else if self.peek().is_some_and(char::is_whitespace) {
                self.bump();
            } else {
                return Ok(());
            }
        }
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        self.skip_trivia()?;
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(self.error(format!("expected '{expected}', found '{c}'"))),
            None => Err(self.error(format!("expected '{expected}', found end of input"))),
        }
    }

    fn value(&mut self) -> Result<Value> {
        self.skip_trivia()?;
        match self.peek() {
            Some('{') => self.dict(),
            Some('(') => self.array(),
            Some('"') | Some('\'') => self.quoted().map(Value::String),
            Some('<') => Err(self.error("binary data values are not supported")),
            Some(_) => self.bare().map(Value::String),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn dict(&mut self) -> Result<Value> {
        self.expect('{')?;
        let mut map = IndexMap::new();
        loop {
            self.skip_trivia()?;
            if self.peek() == Some('}') {
                self.bump();
                return Ok(Value::Dict(map));
            }
            let key = match self.value()? {
                Value::String(key) => key,
                _ => return Err(self.error("dictionary keys must be strings")),
            };
            self.expect('=')?;
            let value = self.value()?;
            self.expect(';')?;
            map.insert(key, value);
        }
    }

    fn array(&mut self) -> Result<Value> {
        self.expect('(')?;
        let mut items = Vec::new();
        loop {
            self.skip_trivia()?;
            if self.peek() == Some(')') {
                self.bump();
                return Ok(Value::Array(items));
            }
            items.push(self.value()?);
            self.skip_trivia()?;
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(')') => {}
                Some(c) => return Err(self.error(format!("expected ',' or ')', found '{c}'"))),
                None => return Err(self.error("unterminated array")),
            }
        }
    }

    fn quoted(&mut self) -> Result<String> {
        let quote = self.bump().ok_or_else(|| self.error("expected string"))?;
        let mut out = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(out),
                Some('\\') => {
                    let escaped = self.bump().ok_or_else(|| self.error("unterminated escape"))?;
                    match escaped {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        'U' => out.push(self.unicode_escape()?),
                        other => out.push(other),
                    }
                }
                Some(c) => out.push(c),
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    fn unicode_escape(&mut self) -> Result<char> {
        let digits: String = (0..4).filter_map(|_| self.bump()).collect();
        u32::from_str_radix(&digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.error(format!("invalid unicode escape \\U{digits}")))
    }

    fn bare(&mut self) -> Result<String> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            let rest = self.rest();
            if c.is_whitespace()
                || matches!(c, '{' | '}' | '(' | ')' | ';' | ',' | '=' | '"' | '\'')
                || rest.starts_with("//")
                || rest.starts_with("/*")
            {
                break;
            }
            self.bump();
        }
        if self.pos == start {
            let found = self.peek().map(String::from).unwrap_or_default();
            return Err(self.error(format!("unexpected character '{found}'")));
        }
        Ok(self.src[start..self.pos].to_string())
    }
}

/// Whether a string can be written without quotes.
fn is_bare_safe(s: &str) -> bool {
    !s.is_empty()
        && !s.contains("//")
        && !s.contains("___")
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '/' | ':' | '.' | '-'))
}

fn write_string(out: &mut String, s: &str) {
    if is_bare_safe(s) {
        out.push_str(s);
        return;
    }
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push('\t');
    }
}

fn write_value(out: &mut String, value: &Value, depth: usize) {
    match value {
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push_str("(\n");
            for item in items {
                indent(out, depth + 1);
                write_value(out, item, depth + 1);
                out.push_str(",\n");
            }
            indent(out, depth);
            out.push(')');
        }
        Value::Dict(map) => {
            out.push_str("{\n");
            write_entries(out, map, depth + 1);
            indent(out, depth);
            out.push('}');
        }
    }
}

/// Kinds Xcode writes on a single line inside the objects table.
const SINGLE_LINE_ISA: &[&str] = &["PBXBuildFile", "PBXFileReference"];

/// Writes a value without line breaks: `{isa = PBXBuildFile; fileRef = X; }`.
fn write_inline(out: &mut String, value: &Value) {
    match value {
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('(');
            for item in items {
                write_inline(out, item);
                out.push_str(", ");
            }
            out.push(')');
        }
        Value::Dict(map) => {
            out.push('{');
            let isa = map.get_key_value("isa");
            for (key, value) in isa.into_iter().chain(map.iter().filter(|(k, _)| k.as_str() != "isa")) {
                write_string(out, key);
                out.push_str(" = ");
                write_inline(out, value);
                out.push_str("; ");
            }
            out.push('}');
        }
    }
}

/// Writes `key = value;` lines, `isa` first as Xcode does.
fn write_entries(out: &mut String, map: &IndexMap<String, Value>, depth: usize) {
    let isa = map.get_key_value("isa");
    for (key, value) in isa.into_iter().chain(map.iter().filter(|(k, _)| k.as_str() != "isa")) {
        indent(out, depth);
        write_string(out, key);
        out.push_str(" = ");
        write_value(out, value, depth);
        out.push_str(";\n");
    }
}

fn write_objects(out: &mut String, objects: &IndexMap<String, Value>) {
    let mut sections: BTreeMap<&str, Vec<(&String, &Value)>> = BTreeMap::new();
    for (id, record) in objects {
        let isa = record
            .as_dict()
            .and_then(|r| r.get("isa"))
            .and_then(Value::as_str)
            .unwrap_or("");
        sections.entry(isa).or_default().push((id, record));
    }

    out.push_str("{\n");
    for (isa, mut records) in sections {
        records.sort_by(|a, b| a.0.cmp(b.0));
        let _ = writeln!(out, "\n/* Begin {isa} section */");
        let single_line = SINGLE_LINE_ISA.contains(&isa);
        for (id, record) in records {
            indent(out, 2);
            write_string(out, id);
            out.push_str(" = ");
            if single_line {
                write_inline(out, record);
            } else {
                write_value(out, record, 2);
            }
            out.push_str(";\n");
        }
        let _ = writeln!(out, "/* End {isa} section */");
    }
    indent(out, 1);
    out.push('}');
}

/// Serializes a whole project document.
///
/// The `objects` entry is written in per-`isa` sections; everything else
/// uses the generic layout.
pub fn serialize(document: &Record) -> String {
    let mut out = String::new();
    out.push_str(HEADER);
    out.push_str("\n{\n");
    for (key, value) in document {
        indent(&mut out, 1);
        write_string(&mut out, key);
        out.push_str(" = ");
        match (key.as_str(), value) {
            ("objects", Value::Dict(objects)) => write_objects(&mut out, objects),
            _ => write_value(&mut out, value, 1),
        }
        out.push_str(";\n");
    }
    out.push_str("}\n");
    out
}
