use super::BencodeValue;

/// Encode a value into canonical bencode bytes.
///
/// Canonical means dictionary keys in byte-wise ascending order and byte
/// strings emitted verbatim whether or not they are valid text. Info-hash
/// computation re-encodes the parsed info dictionary, so the output must
/// reproduce canonical input byte-for-byte.
pub fn encode(value: &BencodeValue) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(value, &mut out);
    out
}

fn encode_into(value: &BencodeValue, out: &mut Vec<u8>) {
    match value {
        BencodeValue::String(s) => encode_bytes(s, out),
        BencodeValue::Integer(i) => {
            out.push(b'i');
            out.extend_from_slice(i.to_string().as_bytes());
            out.push(b'e');
        }
        BencodeValue::List(list) => {
            out.push(b'l');
            for item in list {
                encode_into(item, out);
            }
            out.push(b'e');
        }
        BencodeValue::Dict(dict) => {
            out.push(b'd');
            // BTreeMap iteration order is already the canonical key order.
            for (key, val) in dict {
                encode_bytes(key, out);
                encode_into(val, out);
            }
            out.push(b'e');
        }
    }
}

fn encode_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(bytes.len().to_string().as_bytes());
    out.push(b':');
    out.extend_from_slice(bytes);
}
