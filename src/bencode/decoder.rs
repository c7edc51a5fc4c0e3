use super::BencodeValue;
use crate::error::{Result, TorrentError};
use std::collections::BTreeMap;

/// Decode a single bencoded value from `data`.
///
/// Trailing bytes after the first complete value are ignored; callers that
/// care about framing (there are none in this crate) can thread their own
/// cursor through [`decode_value`].
pub fn decode(data: &[u8]) -> Result<BencodeValue> {
    let mut pos = 0;
    decode_value(data, &mut pos)
}

fn err(msg: impl Into<String>) -> TorrentError {
    TorrentError::Bencode(msg.into())
}

fn decode_value(data: &[u8], pos: &mut usize) -> Result<BencodeValue> {
    match data.get(*pos) {
        None => Err(err("unexpected end of input")),
        Some(b'i') => decode_integer(data, pos),
        Some(b'l') => decode_list(data, pos),
        Some(b'd') => decode_dict(data, pos),
        Some(b'0'..=b'9') => decode_string(data, pos),
        Some(&c) => Err(err(format!("invalid leading byte {:?}", c as char))),
    }
}

fn decode_integer(data: &[u8], pos: &mut usize) -> Result<BencodeValue> {
    *pos += 1; // skip 'i'

    let start = *pos;
    while *pos < data.len() && data[*pos] != b'e' {
        *pos += 1;
    }
    if *pos >= data.len() {
        return Err(err("integer missing 'e' terminator"));
    }

    let body = std::str::from_utf8(&data[start..*pos])
        .map_err(|_| err("non-numeric integer body"))?;
    let num = body
        .parse::<i64>()
        .map_err(|_| err(format!("non-numeric integer body {:?}", body)))?;

    *pos += 1; // skip 'e'
    Ok(BencodeValue::Integer(num))
}

fn decode_string(data: &[u8], pos: &mut usize) -> Result<BencodeValue> {
    Ok(BencodeValue::String(decode_string_raw(data, pos)?))
}

fn decode_string_raw(data: &[u8], pos: &mut usize) -> Result<Vec<u8>> {
    let start = *pos;
    while *pos < data.len() && data[*pos] != b':' {
        *pos += 1;
    }
    if *pos >= data.len() {
        return Err(err("string missing ':' separator"));
    }

    let len_str = std::str::from_utf8(&data[start..*pos])
        .map_err(|_| err("invalid string length"))?;
    let len = len_str
        .parse::<usize>()
        .map_err(|_| err(format!("invalid string length {:?}", len_str)))?;

    *pos += 1; // skip ':'

    if data.len() - *pos < len {
        return Err(err(format!(
            "string length {} exceeds remaining input ({} bytes)",
            len,
            data.len() - *pos
        )));
    }

    let bytes = data[*pos..*pos + len].to_vec();
    *pos += len;
    Ok(bytes)
}

fn decode_list(data: &[u8], pos: &mut usize) -> Result<BencodeValue> {
    *pos += 1; // skip 'l'

    let mut list = Vec::new();
    while *pos < data.len() && data[*pos] != b'e' {
        list.push(decode_value(data, pos)?);
    }
    if *pos >= data.len() {
        return Err(err("list missing 'e' terminator"));
    }

    *pos += 1; // skip 'e'
    Ok(BencodeValue::List(list))
}

fn decode_dict(data: &[u8], pos: &mut usize) -> Result<BencodeValue> {
    *pos += 1; // skip 'd'

    let mut dict = BTreeMap::new();
    while *pos < data.len() && data[*pos] != b'e' {
        if !data[*pos].is_ascii_digit() {
            return Err(err("dictionary key must be a string"));
        }
        let key = decode_string_raw(data, pos)?;
        let value = decode_value(data, pos)?;
        dict.insert(key, value);
    }
    if *pos >= data.len() {
        return Err(err("dictionary missing 'e' terminator"));
    }

    *pos += 1; // skip 'e'
    Ok(BencodeValue::Dict(dict))
}
