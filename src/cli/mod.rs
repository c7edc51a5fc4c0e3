use crate::bencode::{decode, BencodeValue};
use crate::client::{ClientConfig, TorrentClient};
use crate::error::{Result, TorrentError};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "torrent-dl")]
#[command(about = "A single-file BitTorrent download client", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a bencoded value and print it as JSON
    Decode {
        /// The bencoded value
        value: String,
    },

    /// Show information about a torrent file
    Info {
        /// Path to the .torrent file
        torrent: PathBuf,
    },

    /// Ask the torrent's tracker for peers
    Peers {
        /// Path to the .torrent file
        torrent: PathBuf,
    },

    /// Perform a handshake with one peer
    Handshake {
        /// Path to the .torrent file
        torrent: PathBuf,
        /// Peer address as ip:port
        peer: String,
    },

    /// Download a single verified piece
    #[command(name = "download_piece")]
    DownloadPiece {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
        /// Path to the .torrent file
        torrent: PathBuf,
        /// Zero-based piece index
        piece_index: usize,
    },

    /// Download the whole file
    Download {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
        /// Path to the .torrent file
        torrent: PathBuf,
    },
}

impl Cli {
    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Commands::Decode { value } => {
                let decoded = decode(value.as_bytes())?;
                println!("{}", render_json(&decoded));
            }

            Commands::Info { torrent } => {
                let manifest = crate::torrent::load_torrent_file(torrent).await?;
                println!("Tracker URL: {}", manifest.announce);
                println!("Length: {}", manifest.length);
                println!("Info Hash: {}", manifest.info_hash_hex());
                println!("Piece Length: {}", manifest.piece_length);
                println!("Piece Hashes:");
                for hash in manifest.pieces.iter() {
                    println!("{}", hash.to_hex());
                }
            }

            Commands::Peers { torrent } => {
                let manifest = crate::torrent::load_torrent_file(torrent).await?;
                let client = TorrentClient::new(ClientConfig::default());
                for peer in client.fetch_peers(&manifest).await? {
                    println!("{}", peer);
                }
            }

            Commands::Handshake { torrent, peer } => {
                let manifest = crate::torrent::load_torrent_file(torrent).await?;
                let addr: SocketAddr = peer
                    .parse()
                    .map_err(|_| TorrentError::Peer(format!("invalid peer address {:?}", peer)))?;
                let client = TorrentClient::new(ClientConfig::default());
                let remote_id = client.handshake(&manifest, addr).await?;
                println!("Peer ID: {}", hex::encode(remote_id));
            }

            Commands::DownloadPiece {
                output,
                torrent,
                piece_index,
            } => {
                let manifest = crate::torrent::load_torrent_file(torrent).await?;
                let client = TorrentClient::new(ClientConfig::default());
                let data = client.download_piece(&manifest, *piece_index).await?;
                write_output(output, &data).await?;
                println!(
                    "Piece {} downloaded to {}.",
                    piece_index,
                    output.display()
                );
            }

            Commands::Download { output, torrent } => {
                let manifest = crate::torrent::load_torrent_file(torrent).await?;
                let client = TorrentClient::new(ClientConfig::default());
                let data = client.download(&manifest).await?;
                write_output(output, &data).await?;
                println!(
                    "Downloaded {} to {}.",
                    torrent.display(),
                    output.display()
                );
            }
        }

        Ok(())
    }
}

async fn write_output(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, data).await?;
    info!("Wrote {} bytes to {}", data.len(), path.display());
    Ok(())
}

/// Render a decoded value as JSON text. This is the one place byte strings
/// are treated as text; invalid UTF-8 is replaced rather than rejected.
fn render_json(value: &BencodeValue) -> String {
    match value {
        BencodeValue::String(bytes) => json_string(&String::from_utf8_lossy(bytes)),
        BencodeValue::Integer(i) => i.to_string(),
        BencodeValue::List(items) => {
            let inner: Vec<String> = items.iter().map(render_json).collect();
            format!("[{}]", inner.join(","))
        }
        BencodeValue::Dict(dict) => {
            let inner: Vec<String> = dict
                .iter()
                .map(|(key, val)| {
                    format!(
                        "{}:{}",
                        json_string(&String::from_utf8_lossy(key)),
                        render_json(val)
                    )
                })
                .collect();
            format!("{{{}}}", inner.join(","))
        }
    }
}

fn json_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_json_scalars() {
        assert_eq!(render_json(&decode(b"5:hello").unwrap()), "\"hello\"");
        assert_eq!(render_json(&decode(b"i52e").unwrap()), "52");
        assert_eq!(render_json(&decode(b"i-52e").unwrap()), "-52");
    }

    #[test]
    fn test_render_json_containers() {
        assert_eq!(
            render_json(&decode(b"l5:helloi52ee").unwrap()),
            "[\"hello\",52]"
        );
        assert_eq!(
            render_json(&decode(b"d3:foo3:bar5:helloi52ee").unwrap()),
            "{\"foo\":\"bar\",\"hello\":52}"
        );
    }

    #[test]
    fn test_render_json_escapes() {
        assert_eq!(
            render_json(&BencodeValue::String(b"a\"b\\c\nd".to_vec())),
            "\"a\\\"b\\\\c\\nd\""
        );
    }
}
