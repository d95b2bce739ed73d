//! Literal value reader.
//!
//! Reads the relaxed JSON superset used for default values, field arguments
//! and directive arguments: bare enum symbols, `$var` references, quoted or
//! bare object keys, and commas as optional separators.

use crate::class;
use crate::lexer::Lexer;
use graft_core::{Error, Map, Result, Value};

/// Reads one value literal.
pub fn read_value(lx: &mut Lexer<'_>) -> Result<Value> {
    let b = lx.skip_space();
    match b {
        b'"' => lx.read_string().map(Value::String),
        b'$' => {
            lx.read_byte();
            let pos = lx.pos();
            let name = lx.read_token();
            if name.is_empty() {
                return Err(Error::parse(pos, "expected variable name after '$'"));
            }
            Ok(Value::Var(name))
        }
        b'[' => read_list(lx),
        b'{' => read_object(lx),
        b'-' | b'+' | b'.' | b'0'..=b'9' => read_number(lx),
        _ if class::is_token(b) => {
            let token = lx.read_token();
            Ok(match token.as_str() {
                "null" => Value::Null,
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::Enum(token),
            })
        }
        _ => Err(lx.unexpected(b, "value")),
    }
}

fn read_number(lx: &mut Lexer<'_>) -> Result<Value> {
    let pos = lx.pos();
    let text = lx.read_number_token();
    let next = lx.peek();
    if !class::is_term(next) {
        return Err(Error::parse(
            lx.pos(),
            format!("invalid number {text}{}", next as char),
        ));
    }
    let digits = text.strip_prefix('+').unwrap_or(&text);
    let is_float = digits.contains(['.', 'e', 'E']);
    if !is_float {
        if let Ok(i) = digits.parse::<i64>() {
            return Ok(Value::Int(i));
        }
    }
    digits
        .parse::<f64>()
        .map(Value::Float)
        .map_err(|_| Error::parse(pos, format!("invalid number {text}")))
}

fn read_list(lx: &mut Lexer<'_>) -> Result<Value> {
    let start = lx.pos();
    lx.read_byte();
    let mut items = Vec::new();
    loop {
        match lx.skip_space() {
            b']' => {
                lx.read_byte();
                return Ok(Value::List(items));
            }
            0 => return Err(Error::parse(start, "unterminated list")),
            _ => items.push(read_value(lx)?),
        }
    }
}

fn read_object(lx: &mut Lexer<'_>) -> Result<Value> {
    let start = lx.pos();
    lx.read_byte();
    let mut map = Map::new();
    loop {
        let b = lx.skip_space();
        let key_pos = lx.pos();
        let key = match b {
            b'}' => {
                lx.read_byte();
                return Ok(Value::Object(map));
            }
            0 => return Err(Error::parse(start, "unterminated object")),
            b'"' => lx.read_string()?,
            _ => lx.read_name("object key")?,
        };
        lx.expect(b':')?;
        let value = read_value(lx)?;
        if map.insert(key.clone(), value).is_some() {
            return Err(Error::parse(key_pos, format!("duplicate object key {key}")));
        }
    }
}
