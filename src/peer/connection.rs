use super::{Handshake, HandshakeState, PeerMessage, HANDSHAKE_LEN};
use crate::error::{Result, TorrentError};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

/// Deadline for establishing the TCP connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Deadline for each read; a peer that goes quiet cannot wedge its task.
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on a declared frame length. The largest legitimate inbound
/// frame is a Piece carrying one 16 KiB block; bitfields for any plausible
/// torrent fit with room to spare.
const MAX_FRAME_LEN: usize = 1 << 20;

/// One TCP connection to one peer, created per piece-download attempt and
/// never reused.
pub struct PeerConnection {
    addr: SocketAddr,
    stream: TcpStream,
    state: HandshakeState,
    local_peer_id: [u8; 20],
    remote_peer_id: Option<[u8; 20]>,
}

impl PeerConnection {
    /// Connect and run the handshake through to verification.
    pub async fn connect(
        addr: SocketAddr,
        info_hash: [u8; 20],
        local_peer_id: [u8; 20],
    ) -> Result<Self> {
        debug!("Connecting to peer: {}", addr);

        let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| TorrentError::Peer(format!("connect to {} timed out", addr)))?
            .map_err(|e| TorrentError::Peer(format!("failed to connect to {}: {}", addr, e)))?;

        let mut conn = Self {
            addr,
            stream,
            state: HandshakeState::Connected,
            local_peer_id,
            remote_peer_id: None,
        };
        conn.handshake(info_hash).await?;

        info!("Handshake verified with peer: {}", addr);
        Ok(conn)
    }

    async fn handshake(&mut self, info_hash: [u8; 20]) -> Result<()> {
        let handshake = Handshake::new(info_hash, self.local_peer_id);
        self.stream.write_all(&handshake.to_bytes()).await?;
        self.state = HandshakeState::HandshakeSent;

        let mut response = [0u8; HANDSHAKE_LEN];
        match timeout(READ_TIMEOUT, self.stream.read_exact(&mut response)).await {
            Err(_) => {
                return Err(TorrentError::Handshake(format!(
                    "handshake read from {} timed out",
                    self.addr
                )))
            }
            Ok(Err(e)) => {
                return Err(TorrentError::Handshake(format!(
                    "truncated handshake from {}: {}",
                    self.addr, e
                )))
            }
            Ok(Ok(_)) => {}
        }

        let reply = Handshake::from_bytes(&response)?;
        if reply.info_hash != info_hash {
            return Err(TorrentError::Handshake(format!(
                "info hash mismatch from {}",
                self.addr
            )));
        }

        self.remote_peer_id = Some(reply.peer_id);
        self.state = HandshakeState::HandshakeVerified;
        Ok(())
    }

    /// Send one framed message.
    pub async fn send_message(&mut self, message: &PeerMessage) -> Result<()> {
        self.stream.write_all(&message.to_bytes()).await?;
        debug!("Sent message to {}: {:?}", self.addr, message);
        Ok(())
    }

    /// Read one framed message. Zero-length frames come back as `KeepAlive`.
    pub async fn receive_message(&mut self) -> Result<PeerMessage> {
        let mut length_buf = [0u8; 4];
        self.read_exact_deadline(&mut length_buf).await?;

        let length = u32::from_be_bytes(length_buf) as usize;
        if length == 0 {
            return Ok(PeerMessage::KeepAlive);
        }
        if length > MAX_FRAME_LEN {
            return Err(TorrentError::Peer(format!(
                "peer {} declared a {} byte frame",
                self.addr, length
            )));
        }

        let mut frame = vec![0u8; length];
        self.read_exact_deadline(&mut frame).await?;

        let message = PeerMessage::parse(frame[0], &frame[1..])?;
        debug!("Received message from {}: {:?}", self.addr, message);
        Ok(message)
    }

    async fn read_exact_deadline(&mut self, buf: &mut [u8]) -> Result<()> {
        timeout(READ_TIMEOUT, self.stream.read_exact(buf))
            .await
            .map_err(|_| TorrentError::Peer(format!("read from {} timed out", self.addr)))?
            .map_err(|e| TorrentError::Peer(format!("read from {} failed: {}", self.addr, e)))?;
        Ok(())
    }

    /// Shut the stream down; the connection is done after this.
    pub async fn close(&mut self) {
        let _ = self.stream.shutdown().await;
        self.state = HandshakeState::Closed;
        debug!("Closed connection to {}", self.addr);
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn remote_peer_id(&self) -> Option<&[u8; 20]> {
        self.remote_peer_id.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Accept one connection, echo a handshake with the given info hash.
    async fn handshake_responder(info_hash: [u8; 20]) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut inbound = [0u8; HANDSHAKE_LEN];
            stream.read_exact(&mut inbound).await.unwrap();
            let reply = Handshake::new(info_hash, [9u8; 20]);
            stream.write_all(&reply.to_bytes()).await.unwrap();
            // Hold the socket open until the client is done with it.
            let mut scratch = [0u8; 1];
            let _ = stream.read(&mut scratch).await;
        });
        addr
    }

    #[tokio::test]
    async fn test_connect_verifies_matching_info_hash() {
        let info_hash = [7u8; 20];
        let addr = handshake_responder(info_hash).await;

        let mut conn = PeerConnection::connect(addr, info_hash, [1u8; 20])
            .await
            .unwrap();
        assert_eq!(conn.state(), HandshakeState::HandshakeVerified);
        assert_eq!(conn.remote_peer_id(), Some(&[9u8; 20]));

        conn.close().await;
        assert_eq!(conn.state(), HandshakeState::Closed);
    }

    #[tokio::test]
    async fn test_connect_rejects_info_hash_mismatch() {
        let addr = handshake_responder([8u8; 20]).await;
        let result = PeerConnection::connect(addr, [7u8; 20], [1u8; 20]).await;
        assert!(matches!(result, Err(TorrentError::Handshake(_))));
    }

    #[tokio::test]
    async fn test_connect_rejects_truncated_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut inbound = [0u8; HANDSHAKE_LEN];
            stream.read_exact(&mut inbound).await.unwrap();
            // Half a handshake, then hang up.
            stream.write_all(&[19u8; 30]).await.unwrap();
        });

        let result = PeerConnection::connect(addr, [7u8; 20], [1u8; 20]).await;
        assert!(matches!(result, Err(TorrentError::Handshake(_))));
    }
}
