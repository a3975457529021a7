//! Fixed-width binary encoding of records.
//!
//! Field encodings (little-endian, no delimiters):
//! - INT: 4-byte signed integer
//! - FLOAT: 4-byte IEEE-754
//! - VARCHAR[n]: UTF-8, truncated on a char boundary, zero-padded to n bytes
//! - DATE: 10 ASCII bytes "YYYY-MM-DD", `0000-00-00` when unknown
//! - ARRAY[FLOAT;2]: two packed 4-byte floats

use super::schema::{Column, Schema};
use super::value::{Record, Value};
use bytes::{Buf, BufMut};
use chrono::NaiveDate;
use tabula_common::types::DATE_WIDTH;
use tabula_common::{ColumnType, EncodingPolicy, Key, Result, TabulaError};
use tracing::warn;

/// Placeholder stored for missing or invalid dates.
pub const DATE_SENTINEL: &str = "0000-00-00";

/// Outcome of converting one input value: `Ok(None)` means "use the default".
type Converted<T> = std::result::Result<Option<T>, String>;

/// Encodes and decodes records of one schema.
#[derive(Debug, Clone)]
pub struct RecordCodec {
    schema: Schema,
    policy: EncodingPolicy,
}

impl RecordCodec {
    /// Creates a codec for `schema`.
    pub fn new(schema: Schema, policy: EncodingPolicy) -> Self {
        Self { schema, policy }
    }

    /// Returns the schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the encoding policy.
    pub fn policy(&self) -> EncodingPolicy {
        self.policy
    }

    /// Returns the encoded record size.
    pub fn record_size(&self) -> usize {
        self.schema.record_size()
    }

    /// Encodes a record into exactly `record_size()` bytes.
    pub fn encode(&self, record: &Record) -> Result<Vec<u8>> {
        if record.len() != self.schema.len() {
            return Err(TabulaError::Schema(format!(
                "record has {} values, schema has {} columns",
                record.len(),
                self.schema.len()
            )));
        }

        let mut buf = Vec::with_capacity(self.schema.record_size());
        for (column, value) in self.schema.columns().iter().zip(record.values()) {
            self.encode_field(column, value, &mut buf)?;
        }
        Ok(buf)
    }

    /// Decodes a record previously produced by `encode`.
    pub fn decode(&self, bytes: &[u8]) -> Result<Record> {
        if bytes.len() != self.schema.record_size() {
            return Err(TabulaError::InvalidParameter {
                name: "record length".to_string(),
                value: format!("{} (expected {})", bytes.len(), self.schema.record_size()),
            });
        }

        let mut buf = bytes;
        let mut values = Vec::with_capacity(self.schema.len());
        for column in self.schema.columns() {
            let value = match column.column_type {
                ColumnType::Int => Value::Int(buf.get_i32_le()),
                ColumnType::Float => Value::Float(buf.get_f32_le()),
                ColumnType::Varchar(width) => {
                    let text = decode_text(&buf[..width as usize]);
                    buf.advance(width as usize);
                    Value::Text(text)
                }
                ColumnType::Date => {
                    let text = decode_text(&buf[..DATE_WIDTH]);
                    buf.advance(DATE_WIDTH);
                    Value::Text(text)
                }
                ColumnType::FloatPair => {
                    let a = buf.get_f32_le();
                    let b = buf.get_f32_le();
                    Value::FloatPair(a, b)
                }
            };
            values.push(value);
        }
        Ok(Record::new(values))
    }

    /// Reads the INT key at `key_column` from an encoded record.
    pub fn key_of(&self, bytes: &[u8], key_column: usize) -> Result<Key> {
        self.schema.key_at(bytes, key_column)
    }

    fn encode_field(&self, column: &Column, value: &Value, buf: &mut Vec<u8>) -> Result<()> {
        match column.column_type {
            ColumnType::Int => {
                let v = self.resolve(column, value, to_int(value), 0)?;
                buf.put_i32_le(v);
            }
            ColumnType::Float => {
                let v = self.resolve(column, value, to_float(value), 0.0)?;
                buf.put_f32_le(v);
            }
            ColumnType::Varchar(width) => {
                let width = width as usize;
                let text = self.resolve(column, value, to_text(value), String::new())?;
                let bytes = truncate_utf8(&text, width).as_bytes();
                buf.put_slice(bytes);
                buf.put_bytes(0, width - bytes.len());
            }
            ColumnType::Date => {
                let date = self.resolve(column, value, to_date(value), DATE_SENTINEL.to_string())?;
                buf.put_slice(date.as_bytes());
            }
            ColumnType::FloatPair => {
                let (a, b) = self.resolve(column, value, to_float_pair(value), (0.0, 0.0))?;
                buf.put_f32_le(a);
                buf.put_f32_le(b);
            }
        }
        Ok(())
    }

    /// Applies the encoding policy to a conversion result.
    fn resolve<T>(
        &self,
        column: &Column,
        value: &Value,
        converted: Converted<T>,
        default: T,
    ) -> Result<T> {
        match converted {
            Ok(Some(v)) => Ok(v),
            Ok(None) => Ok(default),
            Err(reason) => match self.policy {
                EncodingPolicy::Strict => Err(TabulaError::Encoding {
                    column: column.name.clone(),
                    reason,
                }),
                EncodingPolicy::Lenient => {
                    warn!(
                        column = %column.name,
                        column_type = %column.column_type,
                        value = %value,
                        reason = %reason,
                        "malformed value replaced by column default"
                    );
                    Ok(default)
                }
            },
        }
    }
}

// =============================================================================
// Value conversions
// =============================================================================

/// Strips surrounding whitespace and quotes left over from literal parsing.
fn clean(s: &str) -> &str {
    s.trim().trim_matches(|c| c == '\'' || c == '"').trim()
}

fn to_int(value: &Value) -> Converted<i32> {
    match value {
        Value::Null => Ok(None),
        Value::Int(v) => Ok(Some(*v)),
        Value::Float(f) => {
            if f.fract() == 0.0 && *f >= -2_147_483_648.0 && *f < 2_147_483_648.0 {
                Ok(Some(*f as i32))
            } else {
                Err(format!("{} is not representable as INT", f))
            }
        }
        Value::Text(s) => {
            let s = clean(s);
            if s.is_empty() {
                return Ok(None);
            }
            s.parse::<i32>()
                .map(Some)
                .map_err(|_| format!("'{}' is not an integer", s))
        }
        Value::FloatPair(..) => Err("array value given for INT".to_string()),
    }
}

fn to_float(value: &Value) -> Converted<f32> {
    match value {
        Value::Null => Ok(None),
        Value::Int(v) => Ok(Some(*v as f32)),
        Value::Float(f) => Ok(Some(*f)),
        Value::Text(s) => {
            let s = clean(s);
            if s.is_empty() {
                return Ok(None);
            }
            s.parse::<f32>()
                .map(Some)
                .map_err(|_| format!("'{}' is not a number", s))
        }
        Value::FloatPair(..) => Err("array value given for FLOAT".to_string()),
    }
}

fn to_text(value: &Value) -> Converted<String> {
    match value {
        Value::Null => Ok(None),
        Value::Text(s) => Ok(Some(s.clone())),
        Value::Int(v) => Ok(Some(v.to_string())),
        Value::Float(f) => Ok(Some(f.to_string())),
        Value::FloatPair(..) => Err("array value given for VARCHAR".to_string()),
    }
}

fn to_date(value: &Value) -> Converted<String> {
    match value {
        Value::Null => Ok(None),
        Value::Text(s) => {
            let s = clean(s);
            if s.is_empty() || s == DATE_SENTINEL {
                return Ok(None);
            }
            normalize_date(s).map(Some)
        }
        other => Err(format!("{} is not a date", other)),
    }
}

fn to_float_pair(value: &Value) -> Converted<(f32, f32)> {
    match value {
        Value::Null => Ok(None),
        Value::FloatPair(a, b) => Ok(Some((*a, *b))),
        Value::Text(s) => {
            let s = clean(s);
            if s.is_empty() {
                return Ok(None);
            }
            let inner = s
                .strip_prefix('[')
                .and_then(|r| r.strip_suffix(']'))
                .or_else(|| s.strip_prefix('(').and_then(|r| r.strip_suffix(')')))
                .unwrap_or(s);
            let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
            match parts.as_slice() {
                [a, b] => match (a.parse::<f32>(), b.parse::<f32>()) {
                    (Ok(a), Ok(b)) => Ok(Some((a, b))),
                    _ => Err(format!("'{}' is not a pair of floats", s)),
                },
                _ => Err(format!("'{}' is not a pair of floats", s)),
            }
        }
        other => Err(format!("{} is not a pair of floats", other)),
    }
}

/// Normalizes a date to `YYYY-MM-DD`.
///
/// Accepts `-` or `/` separators. A first segment of at most two digits means
/// the input is `DD-MM-YYYY` and is reordered.
pub fn normalize_date(input: &str) -> std::result::Result<String, String> {
    let invalid = || format!("'{}' is not a valid date", input);

    let parts: Vec<&str> = input.split(|c| c == '-' || c == '/').collect();
    if parts.len() != 3
        || parts
            .iter()
            .any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()))
    {
        return Err(invalid());
    }

    let (year, month, day) = if parts[0].len() <= 2 {
        (parts[2], parts[1], parts[0])
    } else {
        (parts[0], parts[1], parts[2])
    };

    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    let day: u32 = day.parse().map_err(|_| invalid())?;
    if !(1..=9999).contains(&year) {
        return Err(invalid());
    }

    NaiveDate::from_ymd_opt(year, month, day)
        .map(|date| date.format("%Y-%m-%d").to_string())
        .ok_or_else(invalid)
}

/// Returns the longest prefix of `s` that fits in `max_bytes` without
/// splitting a code point.
fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn decode_text(field: &[u8]) -> String {
    let end = field.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    String::from_utf8_lossy(&field[..end]).into_owned()
}
