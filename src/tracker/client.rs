use super::{TrackerRequest, TrackerResponse};
use crate::bencode::decode;
use crate::error::{Result, TorrentError};
use reqwest::Client;
use tracing::{debug, info};

/// HTTP announce client.
pub struct TrackerClient {
    client: Client,
}

impl TrackerClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Announce to the tracker and decode the peer list.
    pub async fn announce(
        &self,
        announce_url: &str,
        request: &TrackerRequest,
    ) -> Result<TrackerResponse> {
        info!("Announcing to tracker: {}", announce_url);

        // The query carries raw percent-encoded binary fields, so it is
        // appended verbatim rather than going through a parameter encoder;
        // the URL parser preserves existing %XX sequences.
        let separator = if announce_url.contains('?') { '&' } else { '?' };
        let url = reqwest::Url::parse(&format!(
            "{}{}{}",
            announce_url,
            separator,
            request.to_query_string()
        ))?;

        debug!("Tracker request URL: {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        debug!(
            "Tracker response status: {}, body length: {}",
            status,
            body.len()
        );

        if !status.is_success() {
            return Err(TorrentError::Tracker(format!("HTTP error: {}", status)));
        }

        let tracker_response = TrackerResponse::from_bencode(decode(&body)?)?;

        info!("Received {} peers from tracker", tracker_response.peers.len());

        Ok(tracker_response)
    }
}

impl Default for TrackerClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response, capturing the request line.
    async fn one_shot_http(body: Vec<u8>) -> (String, tokio::sync::oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut byte = [0u8; 1];
            while !request.ends_with(b"\r\n\r\n") {
                stream.read_exact(&mut byte).await.unwrap();
                request.push(byte[0]);
            }
            let request_line = String::from_utf8_lossy(&request)
                .lines()
                .next()
                .unwrap_or_default()
                .to_string();
            let _ = tx.send(request_line);

            let header = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            stream.write_all(header.as_bytes()).await.unwrap();
            stream.write_all(&body).await.unwrap();
        });

        (format!("http://{}/announce", addr), rx)
    }

    #[tokio::test]
    async fn test_announce_roundtrip() {
        let mut body = b"d8:intervali1800e5:peers6:".to_vec();
        body.extend_from_slice(&[127, 0, 0, 1, 0x1A, 0xE1]);
        body.push(b'e');
        let (url, request_line) = one_shot_http(body).await;

        let request = TrackerRequest::new([0xAA; 20], [0x42; 20], 6881, 128);
        let response = TrackerClient::new().announce(&url, &request).await.unwrap();

        assert_eq!(response.peers.len(), 1);
        assert_eq!(response.peers[0].to_string(), "127.0.0.1:6881");
        assert_eq!(response.interval, Some(1800));

        // The binary info hash must reach the wire as byte-wise %XX pairs.
        let line = request_line.await.unwrap();
        assert!(line.contains(&format!("info_hash={}", "%aa".repeat(20))));
        assert!(line.contains("left=128"));
    }

    #[tokio::test]
    async fn test_announce_failure_reason() {
        let (url, _) = one_shot_http(b"d14:failure reason12:unregisterede".to_vec()).await;
        let request = TrackerRequest::new([0u8; 20], [0u8; 20], 6881, 0);
        let result = TrackerClient::new().announce(&url, &request).await;
        assert!(matches!(result, Err(TorrentError::Tracker(_))));
    }
}
