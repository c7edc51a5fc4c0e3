use super::{PieceBuffer, BLOCK_SIZE};
use crate::error::Result;
use crate::peer::{BlockInfo, PeerConnection, PeerMessage};
use tracing::{debug, trace};

/// Per-piece protocol state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DownloadState {
    /// Waiting for the peer's bitfield (its content is unused; any
    /// bitfield triggers the same transition)
    AwaitBitfield,
    /// Interested sent, waiting to be unchoked
    AwaitUnchoke,
    /// Request/Piece loop in flight
    Downloading,
    /// Buffer filled; ready for verification
    Complete,
}

/// Drives the block request/response loop for a single piece over an
/// already-handshaken connection.
pub struct PieceDownloader<'a> {
    conn: &'a mut PeerConnection,
    buffer: PieceBuffer,
    state: DownloadState,
}

impl<'a> PieceDownloader<'a> {
    pub fn new(
        conn: &'a mut PeerConnection,
        piece_index: u32,
        piece_length: u64,
        expected_hash: [u8; 20],
    ) -> Self {
        Self {
            conn,
            buffer: PieceBuffer::new(piece_index, piece_length, expected_hash),
            state: DownloadState::AwaitBitfield,
        }
    }

    /// Run the state machine to completion and return the verified bytes.
    pub async fn run(mut self) -> Result<Vec<u8>> {
        debug!(
            "Downloading piece {} ({} bytes) from {}",
            self.buffer.index(),
            self.buffer.remaining(),
            self.conn.addr()
        );

        while self.state != DownloadState::Complete {
            let message = self.conn.receive_message().await?;
            self.handle_message(message).await?;
        }

        self.buffer.into_verified()
    }

    async fn handle_message(&mut self, message: PeerMessage) -> Result<()> {
        match (self.state, message) {
            (DownloadState::AwaitBitfield, PeerMessage::Bitfield { .. }) => {
                self.conn.send_message(&PeerMessage::Interested).await?;
                self.state = DownloadState::AwaitUnchoke;
            }
            (DownloadState::AwaitUnchoke, PeerMessage::Unchoke) => {
                self.request_next_block().await?;
                self.state = DownloadState::Downloading;
            }
            (
                DownloadState::Downloading,
                PeerMessage::Piece {
                    piece_index,
                    offset,
                    data,
                },
            ) => {
                self.buffer.push_block(piece_index, offset, &data)?;
                if self.buffer.is_complete() {
                    self.state = DownloadState::Complete;
                } else {
                    self.request_next_block().await?;
                }
            }
            // Keep-alives and anything out of step with the current state
            // are discarded and the read loop continues.
            (state, message) => {
                trace!("Ignoring {:?} in state {:?}", message, state);
            }
        }
        Ok(())
    }

    async fn request_next_block(&mut self) -> Result<()> {
        let length = (self.buffer.remaining()).min(BLOCK_SIZE as u64) as u32;
        let block = BlockInfo::new(self.buffer.index(), self.buffer.len() as u32, length);
        self.conn.send_message(&PeerMessage::Request { block }).await
    }
}
