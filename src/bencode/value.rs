use std::collections::BTreeMap;

/// A decoded bencode value.
///
/// Byte strings stay raw `Vec<u8>` internally; torrent files routinely carry
/// non-UTF-8 fields (piece hashes, compact peer lists). Conversion to text
/// happens only at presentation boundaries via [`BencodeValue::as_str`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BencodeValue {
    /// Byte string: `<length>:<contents>`
    String(Vec<u8>),
    /// Integer: `i<number>e`
    Integer(i64),
    /// List: `l<values>e`
    List(Vec<BencodeValue>),
    /// Dictionary: `d<key-value pairs>e`; `BTreeMap` keeps keys in the
    /// byte-wise order canonical encoding requires.
    Dict(BTreeMap<Vec<u8>, BencodeValue>),
}

impl BencodeValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            BencodeValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            BencodeValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// View a byte string as text, if it happens to be valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn as_list(&self) -> Option<&[BencodeValue]> {
        match self {
            BencodeValue::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<Vec<u8>, BencodeValue>> {
        match self {
            BencodeValue::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Look up a dictionary entry by key.
    pub fn dict_get(&self, key: &[u8]) -> Option<&BencodeValue> {
        self.as_dict()?.get(key)
    }

    pub fn dict_get_str(&self, key: &[u8]) -> Option<&str> {
        self.dict_get(key)?.as_str()
    }

    pub fn dict_get_int(&self, key: &[u8]) -> Option<i64> {
        self.dict_get(key)?.as_integer()
    }

    pub fn dict_get_bytes(&self, key: &[u8]) -> Option<&[u8]> {
        self.dict_get(key)?.as_bytes()
    }
}
