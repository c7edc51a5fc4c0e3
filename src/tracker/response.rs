use super::Peer;
use crate::bencode::BencodeValue;
use crate::error::{Result, TorrentError};

/// Decoded announce response.
#[derive(Debug, Clone)]
pub struct TrackerResponse {
    /// Seconds to wait before re-announcing, when the tracker sends one
    pub interval: Option<u64>,
    /// Peer addresses from the compact `peers` field
    pub peers: Vec<Peer>,
}

impl TrackerResponse {
    pub fn from_bencode(value: BencodeValue) -> Result<Self> {
        let dict = value
            .as_dict()
            .ok_or_else(|| TorrentError::Tracker("response must be a dictionary".to_string()))?;

        if let Some(failure) = dict.get(b"failure reason".as_ref()) {
            let reason = failure.as_str().unwrap_or("unknown failure").to_string();
            return Err(TorrentError::Tracker(reason));
        }

        let interval = dict
            .get(b"interval".as_ref())
            .and_then(|v| v.as_integer())
            .and_then(|i| u64::try_from(i).ok());

        // Only the compact form is supported; a list-of-dicts `peers` value
        // fails the as_bytes check below.
        let peers_bytes = dict
            .get(b"peers".as_ref())
            .ok_or_else(|| TorrentError::Tracker("missing 'peers' field".to_string()))?
            .as_bytes()
            .ok_or_else(|| {
                TorrentError::Tracker("'peers' is not a compact byte string".to_string())
            })?;

        let peers = Peer::from_compact_list(peers_bytes)?;

        Ok(TrackerResponse { interval, peers })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bencode::decode;

    #[test]
    fn test_parse_compact_response() {
        let mut body = b"d8:intervali900e5:peers12:".to_vec();
        body.extend_from_slice(&[127, 0, 0, 1, 0x1A, 0xE1, 127, 0, 0, 2, 0x1A, 0xE2]);
        body.push(b'e');

        let response = TrackerResponse::from_bencode(decode(&body).unwrap()).unwrap();
        assert_eq!(response.interval, Some(900));
        assert_eq!(response.peers.len(), 2);
        assert_eq!(response.peers[0].to_string(), "127.0.0.1:6881");
    }

    #[test]
    fn test_missing_peers_rejected() {
        let response = TrackerResponse::from_bencode(decode(b"d8:intervali900ee").unwrap());
        assert!(response.is_err());
    }

    #[test]
    fn test_ragged_peers_rejected() {
        let mut body = b"d5:peers7:".to_vec();
        body.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7]);
        body.push(b'e');
        assert!(TrackerResponse::from_bencode(decode(&body).unwrap()).is_err());
    }

    #[test]
    fn test_failure_reason_surfaces() {
        let response =
            TrackerResponse::from_bencode(decode(b"d14:failure reason9:not founde").unwrap());
        match response {
            Err(TorrentError::Tracker(reason)) => assert_eq!(reason, "not found"),
            other => panic!("expected tracker error, got {:?}", other),
        }
    }

    #[test]
    fn test_peer_list_form_rejected() {
        let response = TrackerResponse::from_bencode(
            decode(b"d5:peersld2:ip9:127.0.0.14:porti6881eeee").unwrap(),
        );
        assert!(response.is_err());
    }
}
