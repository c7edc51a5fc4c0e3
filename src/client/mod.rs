use crate::error::{Result, TorrentError};
use crate::peer::PeerConnection;
use crate::piece::PieceDownloader;
use crate::torrent::Manifest;
use crate::tracker::{generate_peer_id, Peer, TrackerClient, TrackerRequest};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Admission bound: how many piece tasks may run at once.
pub const MAX_ACTIVE_PIECE_TASKS: usize = 5;

pub struct ClientConfig {
    /// Port advertised to the tracker
    pub listen_port: u16,
    /// Concurrent piece-download limit
    pub max_active: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            listen_port: 6881,
            max_active: MAX_ACTIVE_PIECE_TASKS,
        }
    }
}

/// Top-level client: one announce, then piece downloads.
pub struct TorrentClient {
    config: ClientConfig,
    peer_id: [u8; 20],
}

impl TorrentClient {
    pub fn new(config: ClientConfig) -> Self {
        let peer_id = generate_peer_id();
        info!("Client initialized with peer_id: {}", hex::encode(peer_id));
        Self { config, peer_id }
    }

    /// Announce and return the tracker's peer list.
    pub async fn fetch_peers(&self, manifest: &Manifest) -> Result<Vec<Peer>> {
        let request = TrackerRequest::new(
            manifest.info_hash,
            self.peer_id,
            self.config.listen_port,
            manifest.length,
        );
        let response = TrackerClient::new()
            .announce(&manifest.announce, &request)
            .await?;
        Ok(response.peers)
    }

    /// Handshake with one specific peer and report its peer ID.
    pub async fn handshake(&self, manifest: &Manifest, addr: std::net::SocketAddr) -> Result<[u8; 20]> {
        let mut conn = PeerConnection::connect(addr, manifest.info_hash, self.peer_id).await?;
        let remote = *conn
            .remote_peer_id()
            .ok_or_else(|| TorrentError::Handshake("peer sent no peer ID".to_string()))?;
        conn.close().await;
        Ok(remote)
    }

    /// Download one verified piece.
    pub async fn download_piece(&self, manifest: &Manifest, index: usize) -> Result<Vec<u8>> {
        let peers = self.fetch_peers(manifest).await?;
        fetch_piece_with_fallback(manifest, &peers, self.peer_id, index).await
    }

    /// Download the whole file.
    pub async fn download(&self, manifest: &Manifest) -> Result<Vec<u8>> {
        let peers = self.fetch_peers(manifest).await?;
        DownloadScheduler::new(manifest.clone(), peers, self.peer_id, self.config.max_active)
            .run()
            .await
    }
}

/// Bounded-concurrency orchestration across all pieces.
///
/// Every piece task is spawned up front; a semaphore admits at most
/// `max_active` of them past the gate at any instant. Each admitted task
/// owns one connection at a time and writes its result into its own slot,
/// and reassembly happens only after the join barrier drains every task.
pub struct DownloadScheduler {
    manifest: Arc<Manifest>,
    peers: Arc<Vec<Peer>>,
    peer_id: [u8; 20],
    max_active: usize,
}

impl DownloadScheduler {
    pub fn new(manifest: Manifest, peers: Vec<Peer>, peer_id: [u8; 20], max_active: usize) -> Self {
        Self {
            manifest: Arc::new(manifest),
            peers: Arc::new(peers),
            peer_id,
            max_active,
        }
    }

    pub async fn run(&self) -> Result<Vec<u8>> {
        let piece_count = self.manifest.piece_count();
        info!(
            "Scheduling {} pieces ({} bytes) across {} peers, {} active at a time",
            piece_count,
            self.manifest.length,
            self.peers.len(),
            self.max_active
        );

        let semaphore = Arc::new(Semaphore::new(self.max_active));
        let mut tasks = JoinSet::new();

        for index in 0..piece_count {
            let manifest = Arc::clone(&self.manifest);
            let peers = Arc::clone(&self.peers);
            let semaphore = Arc::clone(&semaphore);
            let peer_id = self.peer_id;

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| TorrentError::Peer("admission gate closed".to_string()))?;
                let data = fetch_piece_with_fallback(&manifest, &peers, peer_id, index).await?;
                Ok::<_, TorrentError>((index, data))
            });
        }

        // Write-once slots, filled as tasks drain through the join barrier.
        let mut slots: Vec<Option<Vec<u8>>> = vec![None; piece_count];
        while let Some(joined) = tasks.join_next().await {
            let (index, data) = joined
                .map_err(|e| TorrentError::Peer(format!("piece task failed to run: {}", e)))??;
            slots[index] = Some(data);
        }

        let mut file = Vec::with_capacity(self.manifest.length as usize);
        for (index, slot) in slots.into_iter().enumerate() {
            let data = slot.ok_or_else(|| {
                TorrentError::Peer(format!("piece {} finished without a result", index))
            })?;
            file.extend_from_slice(&data);
        }

        info!("All {} pieces verified and assembled", piece_count);
        Ok(file)
    }
}

/// Try each tracker-returned peer in order until one yields a verified
/// piece. An integrity failure is just another failed candidate; only when
/// the whole list is exhausted does the piece fail.
async fn fetch_piece_with_fallback(
    manifest: &Manifest,
    peers: &[Peer],
    peer_id: [u8; 20],
    index: usize,
) -> Result<Vec<u8>> {
    let expected_hash = *manifest
        .pieces
        .get(index)
        .ok_or_else(|| TorrentError::Peer(format!("piece index {} out of range", index)))?
        .as_bytes();
    let piece_length = manifest.piece_length_at(index);

    let mut last_error = TorrentError::Tracker("tracker returned no peers".to_string());
    for peer in peers {
        match attempt_piece(manifest.info_hash, peer_id, *peer, index, piece_length, expected_hash)
            .await
        {
            Ok(data) => {
                info!("Piece {} downloaded from {}", index, peer);
                return Ok(data);
            }
            Err(e) => {
                warn!("Piece {} from {} failed: {}", index, peer, e);
                last_error = e;
            }
        }
    }

    Err(last_error)
}

/// One attempt: fresh connection, handshake, block loop, verify, close.
async fn attempt_piece(
    info_hash: [u8; 20],
    peer_id: [u8; 20],
    peer: Peer,
    index: usize,
    piece_length: u64,
    expected_hash: [u8; 20],
) -> Result<Vec<u8>> {
    let mut conn = PeerConnection::connect(peer.addr, info_hash, peer_id).await?;
    let result = PieceDownloader::new(&mut conn, index as u32, piece_length, expected_hash)
        .run()
        .await;
    conn.close().await;
    result
}
