use super::Pieces;
use crate::bencode::{encode, BencodeValue};
use crate::error::{Result, TorrentError};
use sha1::{Digest, Sha1};

/// Parsed metadata from a single-file `.torrent` file.
#[derive(Debug, Clone)]
pub struct Manifest {
    /// URL of the tracker
    pub announce: String,
    /// Suggested name for the downloaded file
    pub name: String,
    /// Total file length in bytes
    pub length: u64,
    /// Number of bytes in each piece (except possibly the last)
    pub piece_length: u64,
    /// SHA-1 hashes of all pieces, in order
    pub pieces: Pieces,
    /// SHA-1 hash of the canonically encoded info dictionary
    pub info_hash: [u8; 20],
    /// The parsed `info` subtree, retained so the hash can always be
    /// recomputed from the exact bytes the tracker and peers expect.
    info: BencodeValue,
}

impl Manifest {
    pub fn from_bencode(value: BencodeValue) -> Result<Self> {
        let announce = value
            .dict_get_str(b"announce")
            .ok_or_else(|| invalid("missing or non-string 'announce'"))?
            .to_string();

        let info = value
            .dict_get(b"info")
            .ok_or_else(|| invalid("missing 'info' dictionary"))?;
        let info_dict = info
            .as_dict()
            .ok_or_else(|| invalid("'info' must be a dictionary"))?;

        if info_dict.contains_key(b"files".as_ref()) {
            return Err(invalid("multi-file torrents are not supported"));
        }

        let length = info
            .dict_get_int(b"length")
            .and_then(|i| u64::try_from(i).ok())
            .ok_or_else(|| invalid("missing or invalid 'length'"))?;

        let name = info
            .dict_get_str(b"name")
            .ok_or_else(|| invalid("missing or non-string 'name'"))?
            .to_string();

        let piece_length = info
            .dict_get_int(b"piece length")
            .and_then(|i| u64::try_from(i).ok())
            .filter(|&l| l > 0)
            .ok_or_else(|| invalid("missing or invalid 'piece length'"))?;

        let pieces_bytes = info
            .dict_get_bytes(b"pieces")
            .ok_or_else(|| invalid("missing or non-string 'pieces'"))?;
        let pieces = Pieces::from_bytes(pieces_bytes)?;

        let expected_count = length.div_ceil(piece_length) as usize;
        if pieces.len() != expected_count {
            return Err(invalid(&format!(
                "torrent has {} piece hashes but length/piece-length implies {}",
                pieces.len(),
                expected_count
            )));
        }

        // The hash covers the canonical re-encoding of the parsed subtree,
        // never a reconstruction from the typed fields above.
        let info_hash = compute_info_hash(info);

        Ok(Manifest {
            announce,
            name,
            length,
            piece_length,
            pieces,
            info_hash,
            info: info.clone(),
        })
    }

    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    /// Length of the piece at `index`; the last piece takes the remainder.
    pub fn piece_length_at(&self, index: usize) -> u64 {
        let start = index as u64 * self.piece_length;
        (self.length - start).min(self.piece_length)
    }

    pub fn info_hash_hex(&self) -> String {
        hex::encode(self.info_hash)
    }

    /// Canonical bencoding of the info dictionary.
    pub fn info_bytes(&self) -> Vec<u8> {
        encode(&self.info)
    }
}

fn invalid(msg: &str) -> TorrentError {
    TorrentError::InvalidTorrent(msg.to_string())
}

fn compute_info_hash(info: &BencodeValue) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(encode(info));
    hasher.finalize().into()
}
