mod downloader;

pub use downloader::PieceDownloader;

use crate::error::{Result, TorrentError};
use sha1::{Digest, Sha1};

/// Standard block size (16 KiB). Every block request uses this length
/// except the final block of a piece, which takes the remainder.
pub const BLOCK_SIZE: u32 = 16 * 1024;

/// Accumulates one piece's blocks until it reaches the expected length.
///
/// Blocks arrive strictly in offset order because the downloader keeps a
/// single request outstanding; a block for the wrong piece or at the wrong
/// offset is a protocol violation, not something to splice in.
#[derive(Debug)]
pub struct PieceBuffer {
    index: u32,
    expected_len: u64,
    expected_hash: [u8; 20],
    data: Vec<u8>,
}

impl PieceBuffer {
    pub fn new(index: u32, expected_len: u64, expected_hash: [u8; 20]) -> Self {
        Self {
            index,
            expected_len,
            expected_hash,
            data: Vec::with_capacity(expected_len as usize),
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes still missing.
    pub fn remaining(&self) -> u64 {
        self.expected_len - self.len()
    }

    pub fn is_complete(&self) -> bool {
        self.len() == self.expected_len
    }

    /// Append a block reported at `offset` for piece `piece_index`.
    pub fn push_block(&mut self, piece_index: u32, offset: u32, block: &[u8]) -> Result<()> {
        if piece_index != self.index {
            return Err(TorrentError::Peer(format!(
                "got block for piece {} while downloading piece {}",
                piece_index, self.index
            )));
        }
        if offset as u64 != self.len() {
            return Err(TorrentError::Peer(format!(
                "got block at offset {} but buffer holds {} bytes",
                offset,
                self.len()
            )));
        }
        if self.len() + block.len() as u64 > self.expected_len {
            return Err(TorrentError::Peer(format!(
                "block of {} bytes overflows piece {} ({} of {} bytes filled)",
                block.len(),
                self.index,
                self.len(),
                self.expected_len
            )));
        }

        self.data.extend_from_slice(block);
        Ok(())
    }

    /// Verify the assembled piece and hand its bytes over.
    ///
    /// Consumes the buffer: verification happens exactly once, and only on
    /// a complete piece.
    pub fn into_verified(self) -> Result<Vec<u8>> {
        if !self.is_complete() {
            return Err(TorrentError::Peer(format!(
                "piece {} verified before completion ({} of {} bytes)",
                self.index,
                self.data.len(),
                self.expected_len
            )));
        }

        let mut hasher = Sha1::new();
        hasher.update(&self.data);
        let digest: [u8; 20] = hasher.finalize().into();

        if digest != self.expected_hash {
            return Err(TorrentError::Integrity(format!(
                "piece {} hash {} does not match expected {}",
                self.index,
                hex::encode(digest),
                hex::encode(self.expected_hash)
            )));
        }

        Ok(self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_of(data: &[u8]) -> [u8; 20] {
        let mut hasher = Sha1::new();
        hasher.update(data);
        hasher.finalize().into()
    }

    #[test]
    fn test_sequential_blocks_complete_the_piece() {
        let payload: Vec<u8> = (0u8..100).collect();
        let mut buffer = PieceBuffer::new(0, 100, hash_of(&payload));

        buffer.push_block(0, 0, &payload[..60]).unwrap();
        assert!(!buffer.is_complete());
        assert_eq!(buffer.remaining(), 40);

        buffer.push_block(0, 60, &payload[60..]).unwrap();
        assert!(buffer.is_complete());
        assert_eq!(buffer.into_verified().unwrap(), payload);
    }

    #[test]
    fn test_rejects_wrong_piece_index() {
        let mut buffer = PieceBuffer::new(3, 10, [0u8; 20]);
        assert!(buffer.push_block(4, 0, &[1, 2]).is_err());
    }

    #[test]
    fn test_rejects_out_of_order_offset() {
        let mut buffer = PieceBuffer::new(0, 10, [0u8; 20]);
        assert!(buffer.push_block(0, 5, &[1, 2]).is_err());
    }

    #[test]
    fn test_rejects_overflowing_block() {
        let mut buffer = PieceBuffer::new(0, 4, [0u8; 20]);
        assert!(buffer.push_block(0, 0, &[1, 2, 3, 4, 5]).is_err());
    }

    #[test]
    fn test_verify_detects_corruption() {
        let payload = vec![1u8; 8];
        let mut buffer = PieceBuffer::new(0, 8, hash_of(&payload));
        buffer.push_block(0, 0, &[2u8; 8]).unwrap();
        assert!(matches!(
            buffer.into_verified(),
            Err(TorrentError::Integrity(_))
        ));
    }

    #[test]
    fn test_verify_requires_completion() {
        let mut buffer = PieceBuffer::new(0, 8, [0u8; 20]);
        buffer.push_block(0, 0, &[1u8; 4]).unwrap();
        assert!(matches!(buffer.into_verified(), Err(TorrentError::Peer(_))));
    }
}
