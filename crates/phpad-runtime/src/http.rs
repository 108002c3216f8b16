//! HTTP-backed build artifact fetching for native hosts.

#![allow(missing_docs)]

use std::io::Read;
use std::time::Duration;

use crate::engine::BuildSource;
use crate::error::EngineError;

/// Caps a runaway artifact download (largest real build is ~50 MiB).
const MAX_ARTIFACT_BYTES: u64 = 256 * 1024 * 1024;

/// Fetches build artifacts over HTTP relative to a base URL. The browser
/// shell supplies its own fetch-backed implementation; this one serves
/// native embedding and tests against a local artifact server.
pub struct HttpBuildSource {
    agent: ureq::Agent,
    base_url: String,
}

impl std::fmt::Debug for HttpBuildSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBuildSource")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl HttpBuildSource {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5))
            .timeout_read(Duration::from_secs(60))
            .build();
        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl BuildSource for HttpBuildSource {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, EngineError> {
        let url = format!("{}/{path}", self.base_url);
        let response = match self.agent.get(&url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(status, _)) => {
                return Err(EngineError::HttpStatus {
                    status,
                    path: path.to_string(),
                });
            }
            Err(err) => {
                return Err(EngineError::Network {
                    path: path.to_string(),
                    reason: err.to_string(),
                });
            }
        };
        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_ARTIFACT_BYTES)
            .read_to_end(&mut bytes)
            .map_err(|err| EngineError::Network {
                path: path.to_string(),
                reason: err.to_string(),
            })?;
        Ok(bytes)
    }
}
