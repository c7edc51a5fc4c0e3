mod connection;
mod message;
mod protocol;

pub use connection::{PeerConnection, CONNECT_TIMEOUT, READ_TIMEOUT};
pub use message::{BlockInfo, PeerMessage};
pub use protocol::{Handshake, HANDSHAKE_LEN, PROTOCOL_STRING};

/// Lifecycle of one peer connection. A connection only carries wire
/// messages once it reaches `HandshakeVerified`; any handshake failure is
/// fatal for the connection, there is no retry at this layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// No socket yet
    Disconnected,
    /// TCP established, nothing sent
    Connected,
    /// Our 68-byte handshake is on the wire
    HandshakeSent,
    /// Peer's handshake received and its info hash matched ours
    HandshakeVerified,
    /// Stream shut down
    Closed,
}

impl Default for HandshakeState {
    fn default() -> Self {
        Self::Disconnected
    }
}
