//! Universal Binary JSON decoding.
//!
//! XGBoost 2.x writes UBJSON whenever the model file name has no `.json`
//! extension, which includes the `xgboost-model` entry of training-job
//! artifacts. The document is decoded into a [`serde_json::Value`] so the
//! JSON model types deserialize it unchanged.
//!
//! Supported markers: `Z N T F i U I l L d D H C S [ ] { }` plus the
//! optimized container headers `$` (element type) and `#` (count).

use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Containers nested deeper than this are rejected
const MAX_DEPTH: usize = 128;

/// Reasons a byte stream is not a well-formed UBJSON document
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UbjsonError {
    #[error("unexpected end of input at byte {0}")]
    Eof(usize),
    #[error("unknown type marker 0x{marker:02x} at byte {offset}")]
    Marker { marker: u8, offset: usize },
    #[error("invalid length {len} at byte {offset}")]
    Length { len: i64, offset: usize },
    #[error("typed container without a count at byte {0}")]
    MissingCount(usize),
    #[error("invalid UTF-8 string at byte {0}")]
    Utf8(usize),
    #[error("invalid high-precision number at byte {0}")]
    HighPrecision(usize),
    #[error("containers nested deeper than {MAX_DEPTH} levels")]
    TooDeep,
    #[error("{0} trailing bytes after the document")]
    Trailing(usize),
}

type Result<T> = std::result::Result<T, UbjsonError>;

/// Whether `bytes` open a UBJSON object rather than a JSON text object.
///
/// Both start with `{`; in JSON the next byte is whitespace, `"` or `}`,
/// in UBJSON it is the length marker of the first key or a container header.
pub fn is_object(bytes: &[u8]) -> bool {
    matches!(
        bytes,
        [b'{', b'i' | b'U' | b'I' | b'l' | b'L' | b'$' | b'#', ..]
    )
}

/// Decode a complete UBJSON document.
///
/// Non-finite floats have no JSON representation and decode as `null`.
pub fn from_slice(bytes: &[u8]) -> Result<Value> {
    let mut reader = Reader { bytes, pos: 0 };
    let value = reader.value(0)?;
    match bytes.len() - reader.pos {
        0 => Ok(value),
        rest => Err(UbjsonError::Trailing(rest)),
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(UbjsonError::Eof(self.bytes.len()));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn fixed<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Next value, skipping no-op markers
    fn value(&mut self, depth: usize) -> Result<Value> {
        loop {
            let offset = self.pos;
            let marker = self.byte()?;
            if marker != b'N' {
                return self.typed_value(marker, offset, depth);
            }
        }
    }

    fn typed_value(&mut self, marker: u8, offset: usize, depth: usize) -> Result<Value> {
        match marker {
            b'Z' => Ok(Value::Null),
            b'T' => Ok(Value::Bool(true)),
            b'F' => Ok(Value::Bool(false)),
            b'i' | b'U' | b'I' | b'l' | b'L' => Ok(Value::from(self.integer(marker, offset)?)),
            b'd' => {
                let v = f32::from_be_bytes(self.fixed()?);
                Ok(float_value(f64::from(v)))
            }
            b'D' => {
                let v = f64::from_be_bytes(self.fixed()?);
                Ok(float_value(v))
            }
            b'H' => {
                let text = self.string()?;
                serde_json::from_str::<Number>(&text)
                    .map(Value::Number)
                    .map_err(|_| UbjsonError::HighPrecision(offset))
            }
            b'C' => Ok(Value::String(char::from(self.byte()?).to_string())),
            b'S' => Ok(Value::String(self.string()?)),
            b'[' => self.array(depth + 1),
            b'{' => self.object(depth + 1),
            _ => Err(UbjsonError::Marker { marker, offset }),
        }
    }

    fn integer(&mut self, marker: u8, offset: usize) -> Result<i64> {
        Ok(match marker {
            b'i' => i64::from(i8::from_be_bytes(self.fixed()?)),
            b'U' => i64::from(self.byte()?),
            b'I' => i64::from(i16::from_be_bytes(self.fixed()?)),
            b'l' => i64::from(i32::from_be_bytes(self.fixed()?)),
            b'L' => i64::from_be_bytes(self.fixed()?),
            _ => return Err(UbjsonError::Marker { marker, offset }),
        })
    }

    fn length(&mut self) -> Result<usize> {
        let offset = self.pos;
        let marker = self.byte()?;
        let len = self.integer(marker, offset)?;
        usize::try_from(len).map_err(|_| UbjsonError::Length { len, offset })
    }

    fn string(&mut self) -> Result<String> {
        let len = self.length()?;
        let offset = self.pos;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| UbjsonError::Utf8(offset))
    }

    /// Optional `$<type>` and `#<count>` following an opening bracket
    fn container_header(&mut self) -> Result<(Option<u8>, Option<usize>)> {
        let mut element = None;
        if self.peek() == Some(b'$') {
            self.pos += 1;
            element = Some(self.byte()?);
            if self.peek() != Some(b'#') {
                return Err(UbjsonError::MissingCount(self.pos));
            }
        }
        let mut count = None;
        if self.peek() == Some(b'#') {
            self.pos += 1;
            let offset = self.pos;
            let n = self.length()?;
            // Every element occupies at least one byte of the remaining input.
            if n > self.remaining() {
                return Err(UbjsonError::Length {
                    len: i64::try_from(n).unwrap_or(i64::MAX),
                    offset,
                });
            }
            count = Some(n);
        }
        Ok((element, count))
    }

    fn element(&mut self, element: Option<u8>, depth: usize) -> Result<Value> {
        match element {
            Some(marker) => {
                let offset = self.pos;
                self.typed_value(marker, offset, depth)
            }
            None => self.value(depth),
        }
    }

    fn array(&mut self, depth: usize) -> Result<Value> {
        if depth > MAX_DEPTH {
            return Err(UbjsonError::TooDeep);
        }
        let (element, count) = self.container_header()?;

        let mut items = Vec::new();
        match count {
            Some(count) => {
                items.reserve(count);
                for _ in 0..count {
                    items.push(self.element(element, depth)?);
                }
            }
            None => loop {
                match self.peek() {
                    Some(b']') => {
                        self.pos += 1;
                        break;
                    }
                    Some(b'N') => self.pos += 1,
                    Some(_) => items.push(self.value(depth)?),
                    None => return Err(UbjsonError::Eof(self.pos)),
                }
            },
        }
        Ok(Value::Array(items))
    }

    fn object(&mut self, depth: usize) -> Result<Value> {
        if depth > MAX_DEPTH {
            return Err(UbjsonError::TooDeep);
        }
        let (element, count) = self.container_header()?;

        let mut map = Map::new();
        match count {
            Some(count) => {
                for _ in 0..count {
                    let key = self.string()?;
                    let value = self.element(element, depth)?;
                    map.insert(key, value);
                }
            }
            None => loop {
                match self.peek() {
                    Some(b'}') => {
                        self.pos += 1;
                        break;
                    }
                    Some(b'N') => self.pos += 1,
                    Some(_) => {
                        let key = self.string()?;
                        let value = self.value(depth)?;
                        map.insert(key, value);
                    }
                    None => return Err(UbjsonError::Eof(self.pos)),
                }
            },
        }
        Ok(Value::Object(map))
    }
}

fn float_value(v: f64) -> Value {
    Number::from_f64(v).map_or(Value::Null, Value::Number)
}
