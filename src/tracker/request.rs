/// Announce request parameters.
#[derive(Debug, Clone)]
pub struct TrackerRequest {
    /// SHA-1 hash of the info dictionary
    pub info_hash: [u8; 20],
    /// Our 20-byte peer ID
    pub peer_id: [u8; 20],
    /// Port we claim to listen on
    pub port: u16,
    /// Total bytes uploaded so far
    pub uploaded: u64,
    /// Total bytes downloaded so far
    pub downloaded: u64,
    /// Bytes remaining until the download is complete
    pub left: u64,
    /// Request the compact peer-list format
    pub compact: bool,
}

impl TrackerRequest {
    pub fn new(info_hash: [u8; 20], peer_id: [u8; 20], port: u16, left: u64) -> Self {
        Self {
            info_hash,
            peer_id,
            port,
            uploaded: 0,
            downloaded: 0,
            left,
            compact: true,
        }
    }

    /// Build the raw query string. `info_hash` and `peer_id` are binary, so
    /// they are percent-encoded byte-by-byte here and the result is appended
    /// to the announce URL verbatim; handing them to an HTTP client's
    /// parameter encoder would mangle them as text.
    pub fn to_query_string(&self) -> String {
        format!(
            "info_hash={}&peer_id={}&port={}&uploaded={}&downloaded={}&left={}&compact={}",
            urlencode_bytes(&self.info_hash),
            urlencode_bytes(&self.peer_id),
            self.port,
            self.uploaded,
            self.downloaded,
            self.left,
            if self.compact { 1 } else { 0 },
        )
    }
}

/// Percent-encode every byte as `%XX`, without exception.
fn urlencode_bytes(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("%{:02x}", b)).collect()
}
