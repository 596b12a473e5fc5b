//! Remote retrieval of zone files and exit lists.

use flate2::read::GzDecoder;
use std::io::Read;
use std::time::Duration;

use crate::{Error, Result};

/// Default base URL of the aggregated country zone files.
pub const DEFAULT_ZONE_BASE_URL: &str = "http://www.ipdeny.com/ipblocks/data/aggregated";

/// Default URL of the anonymizer exit list.
pub const DEFAULT_ANONYMIZER_URL: &str = "https://check.torproject.org/torbulkexitlist";

/// Default per-request timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetcher retrieves the raw body of a remote resource.
pub trait Fetcher: Send + Sync {
    /// Fetch `url` and return its body.
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// URL of a country's aggregated zone file.
pub fn zone_url(base_url: &str, country: &str) -> String {
    format!(
        "{}/{}{}",
        base_url.trim_end_matches('/'),
        country,
        crate::cache::ZONE_SUFFIX
    )
}

/// Blocking HTTP fetcher backed by `ureq`.
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    /// Create a fetcher with the default timeout.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_FETCH_TIMEOUT)
    }

    /// Create a fetcher with a custom per-request timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("zoneauth/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.agent.get(url).call().map_err(|e| match e {
            ureq::Error::Status(status, _) => Error::HttpStatus {
                url: url.to_string(),
                status,
            },
            ureq::Error::Transport(t) => Error::Fetch {
                url: url.to_string(),
                message: t.to_string(),
            },
        })?;

        let mut body = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|e| Error::Fetch {
                url: url.to_string(),
                message: format!("failed to read response: {}", e),
            })?;

        log::debug!("Fetched {} ({} bytes)", url, body.len());
        Ok(body)
    }
}

/// Check if data is gzip compressed.
pub fn is_gzip(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b
}

/// Turn a fetched body into cacheable text.
///
/// Gzip payloads are decompressed. A body with no non-whitespace content is
/// rejected so an upstream outage cannot replace a good cache with nothing.
pub fn decode_body(url: &str, raw: Vec<u8>) -> Result<Vec<u8>> {
    let data = if is_gzip(&raw) {
        let mut decoder = GzDecoder::new(&raw[..]);
        let mut data = Vec::new();
        decoder
            .read_to_end(&mut data)
            .map_err(|e| Error::Decompress(e.to_string()))?;
        data
    } else {
        raw
    };

    if data.iter().all(u8::is_ascii_whitespace) {
        return Err(Error::EmptyResponse(url.to_string()));
    }
    Ok(data)
}
