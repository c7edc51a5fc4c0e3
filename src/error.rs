use thiserror::Error;

#[derive(Error, Debug)]
pub enum TorrentError {
    #[error("Bencode parsing error: {0}")]
    Bencode(String),

    #[error("Invalid torrent file: {0}")]
    InvalidTorrent(String),

    #[error("Tracker error: {0}")]
    Tracker(String),

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Peer wire error: {0}")]
    Peer(String),

    #[error("Piece integrity check failed: {0}")]
    Integrity(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("URL parse error: {0}")]
    UrlParse(String),
}

impl From<url::ParseError> for TorrentError {
    fn from(err: url::ParseError) -> Self {
        TorrentError::UrlParse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TorrentError>;
