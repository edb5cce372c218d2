//! Remote waveform service client
//!
//! The request carries identifier, window, and desired quality code; the
//! response is raw decodable container bytes. "No data in range" is a
//! distinct condition, mapped to `Error::NoData` so per-channel loops can
//! skip and continue.

use crate::app::models::{ChannelIdentifier, RequestWindow};
use crate::constants::{BLANK_LOCATION_SENTINEL, DEFAULT_QUALITY_CODE, REMOTE_TIMEOUT_SECS};
use crate::{Error, Result};
use std::time::Duration;
use tracing::debug;

/// Source of raw waveform container bytes
pub trait WaveformClient {
    /// Fetch container bytes for one channel over one window
    ///
    /// `Err(NoData)` means the service legitimately has nothing there.
    fn fetch_bytes(
        &self,
        id: &ChannelIdentifier,
        window: &RequestWindow,
        quality: Option<char>,
    ) -> Result<Vec<u8>>;
}

/// HTTP client for a dataselect-style waveform endpoint
pub struct HttpWaveformClient {
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl HttpWaveformClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(REMOTE_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    fn build_query(
        &self,
        id: &ChannelIdentifier,
        window: &RequestWindow,
        quality: Option<char>,
    ) -> Vec<(String, String)> {
        let location = if id.location.is_empty() {
            BLANK_LOCATION_SENTINEL.to_string()
        } else {
            id.location.clone()
        };
        vec![
            ("net".to_string(), id.network.clone()),
            ("sta".to_string(), id.station.clone()),
            ("loc".to_string(), location),
            ("cha".to_string(), id.channel.clone()),
            ("starttime".to_string(), window.start.to_rfc3339()),
            ("endtime".to_string(), window.end.to_rfc3339()),
            (
                "quality".to_string(),
                quality.unwrap_or(DEFAULT_QUALITY_CODE).to_string(),
            ),
        ]
    }
}

impl WaveformClient for HttpWaveformClient {
    fn fetch_bytes(
        &self,
        id: &ChannelIdentifier,
        window: &RequestWindow,
        quality: Option<char>,
    ) -> Result<Vec<u8>> {
        let params = self.build_query(id, window, quality);

        debug!("waveform request to {} for {} {}", self.endpoint, id, window);
        let response = self
            .client
            .get(format!("{}/query", self.endpoint))
            .query(&params)
            .send()?;

        let status = response.status();
        if status == reqwest::StatusCode::NO_CONTENT || status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::no_data(format!("{id} over {window}")));
        }
        if !status.is_success() {
            return Err(Error::transient_msg(format!(
                "waveform service returned {status} for {id}"
            )));
        }

        Ok(response.bytes()?.to_vec())
    }
}
