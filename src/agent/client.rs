//! Server client for the device agent.
//!
//! The agent is strictly sequential, so the client is synchronous; the
//! trait exists so cycle logic tests can substitute a mock.

use std::io::Read;
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{DisplayRequest, DisplayResponse};

/// What the cycle logic needs from the server.
pub trait DisplayApi {
    /// POST the display request, returning the server's instruction.
    fn poll_display(&self, device_uuid: &str, request: &DisplayRequest) -> Result<DisplayResponse>;

    /// Download the resolved image.
    fn download(&self, url: &str) -> Result<Vec<u8>>;
}

/// HTTP implementation over `ureq`.
pub struct HttpApi {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout(timeout)
            .build();
        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl DisplayApi for HttpApi {
    fn poll_display(&self, device_uuid: &str, request: &DisplayRequest) -> Result<DisplayResponse> {
        let url = format!("{}/api/devices/{device_uuid}/display", self.base_url);
        debug!("polling {url}");
        let response = self
            .agent
            .post(&url)
            .send_json(request)?
            .into_json::<DisplayResponse>()
            .map_err(|e| Error::Decode(format!("display response: {e}")))?;
        Ok(response)
    }

    fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.agent.get(url).call()?;

        let capacity = response
            .header("Content-Length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);

        let mut bytes = Vec::with_capacity(capacity);
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| Error::Fetch {
                url: url.to_string(),
                reason: format!("body read: {e}"),
            })?;
        debug!("downloaded {} bytes from {url}", bytes.len());
        Ok(bytes)
    }
}
