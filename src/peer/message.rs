use crate::error::{Result, TorrentError};
use bytes::{Buf, BufMut, BytesMut};

/// Identifies a block within a piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Piece index
    pub piece_index: u32,
    /// Byte offset within the piece
    pub offset: u32,
    /// Block length in bytes
    pub length: u32,
}

impl BlockInfo {
    pub fn new(piece_index: u32, offset: u32, length: u32) -> Self {
        Self {
            piece_index,
            offset,
            length,
        }
    }
}

/// Peer wire messages.
///
/// Ids this client never acts on are still parsed so the read loop can log
/// and skip them; anything else lands in `Unknown` and is skipped the same
/// way rather than killing the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerMessage {
    /// Zero-length frame
    KeepAlive,
    Choke,
    Unchoke,
    Interested,
    NotInterested,
    Have { piece_index: u32 },
    Bitfield { bitfield: Vec<u8> },
    Request { block: BlockInfo },
    Piece {
        piece_index: u32,
        offset: u32,
        data: Vec<u8>,
    },
    Cancel { block: BlockInfo },
    /// Any id this client does not recognize
    Unknown { id: u8 },
}

impl PeerMessage {
    const CHOKE: u8 = 0;
    const UNCHOKE: u8 = 1;
    const INTERESTED: u8 = 2;
    const NOT_INTERESTED: u8 = 3;
    const HAVE: u8 = 4;
    const BITFIELD: u8 = 5;
    const REQUEST: u8 = 6;
    const PIECE: u8 = 7;
    const CANCEL: u8 = 8;

    /// Serialize as a full frame: `<4-byte length prefix><id><payload>`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();

        match self {
            PeerMessage::KeepAlive => {
                buf.put_u32(0);
            }
            PeerMessage::Choke => put_bare(&mut buf, Self::CHOKE),
            PeerMessage::Unchoke => put_bare(&mut buf, Self::UNCHOKE),
            PeerMessage::Interested => put_bare(&mut buf, Self::INTERESTED),
            PeerMessage::NotInterested => put_bare(&mut buf, Self::NOT_INTERESTED),
            PeerMessage::Have { piece_index } => {
                buf.put_u32(5);
                buf.put_u8(Self::HAVE);
                buf.put_u32(*piece_index);
            }
            PeerMessage::Bitfield { bitfield } => {
                buf.put_u32((1 + bitfield.len()) as u32);
                buf.put_u8(Self::BITFIELD);
                buf.put_slice(bitfield);
            }
            PeerMessage::Request { block } => {
                buf.put_u32(13);
                buf.put_u8(Self::REQUEST);
                buf.put_u32(block.piece_index);
                buf.put_u32(block.offset);
                buf.put_u32(block.length);
            }
            PeerMessage::Piece {
                piece_index,
                offset,
                data,
            } => {
                buf.put_u32((9 + data.len()) as u32);
                buf.put_u8(Self::PIECE);
                buf.put_u32(*piece_index);
                buf.put_u32(*offset);
                buf.put_slice(data);
            }
            PeerMessage::Cancel { block } => {
                buf.put_u32(13);
                buf.put_u8(Self::CANCEL);
                buf.put_u32(block.piece_index);
                buf.put_u32(block.offset);
                buf.put_u32(block.length);
            }
            PeerMessage::Unknown { id } => put_bare(&mut buf, *id),
        }

        buf.to_vec()
    }

    /// Parse a message from its id and payload (length prefix already
    /// consumed by the connection's framing).
    pub fn parse(id: u8, mut payload: &[u8]) -> Result<Self> {
        match id {
            Self::CHOKE => Ok(PeerMessage::Choke),
            Self::UNCHOKE => Ok(PeerMessage::Unchoke),
            Self::INTERESTED => Ok(PeerMessage::Interested),
            Self::NOT_INTERESTED => Ok(PeerMessage::NotInterested),
            Self::HAVE => {
                if payload.len() < 4 {
                    return Err(truncated("have", payload.len()));
                }
                Ok(PeerMessage::Have {
                    piece_index: payload.get_u32(),
                })
            }
            Self::BITFIELD => Ok(PeerMessage::Bitfield {
                bitfield: payload.to_vec(),
            }),
            Self::REQUEST => {
                if payload.len() < 12 {
                    return Err(truncated("request", payload.len()));
                }
                Ok(PeerMessage::Request {
                    block: BlockInfo::new(payload.get_u32(), payload.get_u32(), payload.get_u32()),
                })
            }
            Self::PIECE => {
                if payload.len() < 8 {
                    return Err(truncated("piece", payload.len()));
                }
                let piece_index = payload.get_u32();
                let offset = payload.get_u32();
                Ok(PeerMessage::Piece {
                    piece_index,
                    offset,
                    data: payload.to_vec(),
                })
            }
            Self::CANCEL => {
                if payload.len() < 12 {
                    return Err(truncated("cancel", payload.len()));
                }
                Ok(PeerMessage::Cancel {
                    block: BlockInfo::new(payload.get_u32(), payload.get_u32(), payload.get_u32()),
                })
            }
            id => Ok(PeerMessage::Unknown { id }),
        }
    }
}

fn put_bare(buf: &mut BytesMut, id: u8) {
    buf.put_u32(1);
    buf.put_u8(id);
}

fn truncated(name: &str, len: usize) -> TorrentError {
    TorrentError::Peer(format!("truncated {} payload ({} bytes)", name, len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_frame_layout() {
        let message = PeerMessage::Request {
            block: BlockInfo::new(2, 16384, 16384),
        };
        let bytes = message.to_bytes();
        assert_eq!(bytes.len(), 17);
        assert_eq!(&bytes[0..4], &[0, 0, 0, 13]);
        assert_eq!(bytes[4], 6);
        assert_eq!(&bytes[5..9], &2u32.to_be_bytes());
        assert_eq!(&bytes[9..13], &16384u32.to_be_bytes());
        assert_eq!(&bytes[13..17], &16384u32.to_be_bytes());
    }

    #[test]
    fn test_interested_frame_layout() {
        assert_eq!(PeerMessage::Interested.to_bytes(), vec![0, 0, 0, 1, 2]);
    }

    #[test]
    fn test_keepalive_frame_is_length_zero() {
        assert_eq!(PeerMessage::KeepAlive.to_bytes(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_parse_piece() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&3u32.to_be_bytes());
        payload.extend_from_slice(&16384u32.to_be_bytes());
        payload.extend_from_slice(b"blockdata");

        let message = PeerMessage::parse(7, &payload).unwrap();
        assert_eq!(
            message,
            PeerMessage::Piece {
                piece_index: 3,
                offset: 16384,
                data: b"blockdata".to_vec(),
            }
        );
    }

    #[test]
    fn test_parse_unknown_id() {
        assert_eq!(
            PeerMessage::parse(20, b"whatever").unwrap(),
            PeerMessage::Unknown { id: 20 }
        );
    }

    #[test]
    fn test_parse_truncated_request() {
        assert!(PeerMessage::parse(6, &[0, 0, 0, 1]).is_err());
    }

    #[test]
    fn test_roundtrip_via_frame() {
        let original = PeerMessage::Piece {
            piece_index: 1,
            offset: 0,
            data: vec![0xDE, 0xAD],
        };
        let frame = original.to_bytes();
        let parsed = PeerMessage::parse(frame[4], &frame[5..]).unwrap();
        assert_eq!(parsed, original);
    }
}
