mod manifest;
mod piece;

pub use manifest::Manifest;
pub use piece::{PieceHash, Pieces};

use crate::bencode::decode;
use crate::error::Result;
use std::path::Path;
use tokio::fs;

/// Load and parse a `.torrent` file.
pub async fn load_torrent_file<P: AsRef<Path>>(path: P) -> Result<Manifest> {
    let data = fs::read(path).await?;
    parse_torrent(&data)
}

/// Parse torrent metadata from raw bytes.
pub fn parse_torrent(data: &[u8]) -> Result<Manifest> {
    Manifest::from_bencode(decode(data)?)
}
