//! Decoder for string-literal structured fields.
//!
//! Sample rows carry two structured sub-fields as text in Python literal
//! syntax: a coded mapping (`{'cell type': 'T cell'}`) and a list of
//! ontology term codes (`['CL:0000084', u'UBERON:0000178']`). This module
//! parses the supported literal subset into `serde_json::Value`.
//!
//! Supported: quoted strings (single or double, optional `u`/`b` prefix,
//! backslash escapes), integers (optional `L` suffix), floats, `True`,
//! `False`, `None`, lists, tuples (decoded as lists), and dicts with scalar
//! keys (non-string keys are stringified).

use crate::error::FieldError;
use serde_json::{Map, Number, Value};

/// Field name used in errors for the coded mapping.
pub const KEY_VALUE_FIELD: &str = "key_value";
/// Field name used in errors for the ontology code list.
pub const ONTOLOGY_FIELD: &str = "ontology_mapping";

/// Parse one literal expression.
pub fn parse_literal(field: &str, text: &str) -> Result<Value, FieldError> {
    let mut parser = Parser::new(field, text);
    parser.skip_ws();
    let value = parser.value()?;
    parser.skip_ws();
    if parser.peek().is_some() {
        return Err(parser.error("trailing characters after literal"));
    }
    Ok(value)
}

/// Absent, blank, and `None` all mean "no structured value".
fn is_blank(text: Option<&str>) -> bool {
    match text {
        None => true,
        Some(t) => {
            let t = t.trim();
            t.is_empty() || t == "None"
        }
    }
}

/// Decode a coded-mapping field into an object.
pub fn decode_coded_mapping(text: Option<&str>) -> Result<Map<String, Value>, FieldError> {
    if is_blank(text) {
        return Ok(Map::new());
    }
    let text = text.unwrap_or_default();
    match parse_literal(KEY_VALUE_FIELD, text)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(FieldError {
            field: KEY_VALUE_FIELD.to_string(),
            offset: 0,
            reason: "expected a mapping".to_string(),
        }),
    }
}

/// Decode an ontology field into its list of term codes.
pub fn decode_ontology_codes(text: Option<&str>) -> Result<Vec<String>, FieldError> {
    if is_blank(text) {
        return Ok(Vec::new());
    }
    let text = text.unwrap_or_default();
    let items = match parse_literal(ONTOLOGY_FIELD, text)? {
        Value::Array(items) => items,
        Value::Null => return Ok(Vec::new()),
        _ => {
            return Err(FieldError {
                field: ONTOLOGY_FIELD.to_string(),
                offset: 0,
                reason: "expected a list of term codes".to_string(),
            })
        }
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::String(code) => Ok(code),
            other => Err(FieldError {
                field: ONTOLOGY_FIELD.to_string(),
                offset: 0,
                reason: format!("term code must be a string, got {}", other),
            }),
        })
        .collect()
}

struct Parser<'a> {
    field: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(field: &'a str, text: &str) -> Self {
        Self {
            field,
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> FieldError {
        FieldError {
            field: self.field.to_string(),
            offset: self.pos,
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), FieldError> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => {
                self.pos -= 1;
                Err(self.error(format!("expected '{}', found '{}'", expected, c)))
            }
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    fn value(&mut self) -> Result<Value, FieldError> {
        match self.peek() {
            Some('[') => self.sequence('[', ']'),
            Some('(') => self.sequence('(', ')'),
            Some('{') => self.dict(),
            Some('\'') | Some('"') => self.string().map(Value::String),
            Some('u') | Some('U') | Some('b') | Some('B')
                if matches!(self.peek_at(1), Some('\'') | Some('"')) =>
            {
                self.pos += 1;
                self.string().map(Value::String)
            }
            Some(c) if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.number(),
            Some(c) if c.is_ascii_alphabetic() => self.keyword(),
            Some(c) => Err(self.error(format!("unexpected character '{}'", c))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn sequence(&mut self, open: char, close: char) -> Result<Value, FieldError> {
        self.expect(open)?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(Value::Array(items));
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(c) if c == close => {}
                _ => return Err(self.error(format!("expected ',' or '{}'", close))),
            }
        }
    }

    fn dict(&mut self) -> Result<Value, FieldError> {
        self.expect('{')?;
        let mut map = Map::new();
        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.pos += 1;
                return Ok(Value::Object(map));
            }
            let key = match self.value()? {
                Value::String(s) => s,
                Value::Array(_) | Value::Object(_) => {
                    return Err(self.error("dict keys must be scalars"))
                }
                Value::Null => "None".to_string(),
                Value::Bool(true) => "True".to_string(),
                Value::Bool(false) => "False".to_string(),
                Value::Number(n) => n.to_string(),
            };
            self.skip_ws();
            self.expect(':')?;
            self.skip_ws();
            let value = self.value()?;
            map.insert(key, value);
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some('}') => {}
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }

    fn string(&mut self) -> Result<String, FieldError> {
        let quote = match self.bump() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.error("expected a quote")),
        };
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => match self.bump() {
                    None => return Err(self.error("unterminated escape")),
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('0') => out.push('\0'),
                    Some('\\') => out.push('\\'),
                    Some('\'') => out.push('\''),
                    Some('"') => out.push('"'),
                    Some('x') => out.push(self.hex_escape(2)?),
                    Some('u') => out.push(self.hex_escape(4)?),
                    Some(other) => {
                        // unknown escapes are kept verbatim
                        out.push('\\');
                        out.push(other);
                    }
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn hex_escape(&mut self, digits: usize) -> Result<char, FieldError> {
        let mut code = 0u32;
        for _ in 0..digits {
            let d = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error("invalid hex escape"))?;
            code = code * 16 + d;
        }
        char::from_u32(code).ok_or_else(|| self.error("invalid code point"))
    }

    fn number(&mut self) -> Result<Value, FieldError> {
        let start = self.pos;
        let mut is_float = false;
        if matches!(self.peek(), Some('-') | Some('+')) {
            self.pos += 1;
        }
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => self.pos += 1,
                '.' => {
                    is_float = true;
                    self.pos += 1;
                }
                'e' | 'E' => {
                    is_float = true;
                    self.pos += 1;
                    if matches!(self.peek(), Some('-') | Some('+')) {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        // long-integer suffix
        if !is_float && matches!(self.peek(), Some('L') | Some('l')) {
            self.pos += 1;
        }

        if is_float {
            let f: f64 = text
                .parse()
                .map_err(|_| self.error(format!("invalid float '{}'", text)))?;
            Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| self.error("non-finite float"))
        } else {
            let i: i64 = text
                .parse()
                .map_err(|_| self.error(format!("invalid integer '{}'", text)))?;
            Ok(Value::from(i))
        }
    }

    fn keyword(&mut self) -> Result<Value, FieldError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match word.as_str() {
            "None" => Ok(Value::Null),
            "True" => Ok(Value::Bool(true)),
            "False" => Ok(Value::Bool(false)),
            _ => {
                self.pos = start;
                Err(self.error(format!("unknown name '{}'", word)))
            }
        }
    }
}
