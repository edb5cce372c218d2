//! Remote metadata service clients
//!
//! Two request/response shapes exist in the field: the classic station
//! metadata service (pipe-delimited channel text, `net/sta/loc/cha`
//! parameters) and the array-style deployment service (comma-delimited rows,
//! `array/station/component` parameters). Both normalize into the same
//! availability records.

use crate::app::models::{AvailabilityRecord, RequestWindow};
use crate::app::services::geodetic::RadiusFilter;
use crate::app::services::inventory::parse_channel_rows;
use crate::app::services::sncl::SnclPattern;
use crate::config::ServiceStyle;
use crate::constants::{BLANK_LOCATION_SENTINEL, REMOTE_TIMEOUT_SECS};
use crate::{Error, Result};
use std::time::Duration;
use tracing::debug;

/// Source of channel-epoch metadata
///
/// The trait seam lets resolver tests supply canned epochs without a
/// network.
pub trait MetadataClient {
    /// Channel epochs matching the pattern and constraints
    ///
    /// An empty result is a legitimate answer; transport and parse failures
    /// surface as `TransientSource`.
    fn channel_epochs(
        &self,
        pattern: &SnclPattern,
        window: &RequestWindow,
        radius: Option<&RadiusFilter>,
    ) -> Result<Vec<AvailabilityRecord>>;
}

/// HTTP metadata client for both service styles
pub struct HttpMetadataClient {
    endpoint: String,
    style: ServiceStyle,
    client: reqwest::blocking::Client,
}

impl HttpMetadataClient {
    pub fn new(endpoint: impl Into<String>, style: ServiceStyle) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(REMOTE_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            style,
            client,
        })
    }

    fn build_query(
        &self,
        pattern: &SnclPattern,
        window: &RequestWindow,
        radius: Option<&RadiusFilter>,
    ) -> Vec<(String, String)> {
        // a blank location is sent as the explicit sentinel
        let location = if pattern.location.is_empty() {
            BLANK_LOCATION_SENTINEL.to_string()
        } else {
            pattern.location.clone()
        };

        let mut params = match self.style {
            ServiceStyle::Station => vec![
                ("net".to_string(), pattern.network.clone()),
                ("sta".to_string(), pattern.station.clone()),
                ("loc".to_string(), location),
                ("cha".to_string(), pattern.channel.clone()),
                ("level".to_string(), "channel".to_string()),
                ("format".to_string(), "text".to_string()),
            ],
            ServiceStyle::Array => vec![
                ("array".to_string(), pattern.network.clone()),
                ("station".to_string(), pattern.station.clone()),
                ("location".to_string(), location),
                ("component".to_string(), pattern.channel.clone()),
                ("format".to_string(), "csv".to_string()),
            ],
        };
        params.push(("starttime".to_string(), window.start.to_rfc3339()));
        params.push(("endtime".to_string(), window.end.to_rfc3339()));

        if let Some(r) = radius {
            params.push(("latitude".to_string(), r.latitude.to_string()));
            params.push(("longitude".to_string(), r.longitude.to_string()));
            if let Some(min) = r.min_radius {
                params.push(("minradius".to_string(), min.to_string()));
            }
            if let Some(max) = r.max_radius {
                params.push(("maxradius".to_string(), max.to_string()));
            }
        }
        params
    }
}

impl MetadataClient for HttpMetadataClient {
    fn channel_epochs(
        &self,
        pattern: &SnclPattern,
        window: &RequestWindow,
        radius: Option<&RadiusFilter>,
    ) -> Result<Vec<AvailabilityRecord>> {
        let params = self.build_query(pattern, window, radius);
        debug!("metadata request to {} for {}", self.endpoint, pattern);

        let response = self
            .client
            .get(format!("{}/query", self.endpoint))
            .query(&params)
            .send()?;

        let status = response.status();
        if status == reqwest::StatusCode::NO_CONTENT || status == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(Error::transient_msg(format!(
                "metadata service returned {status} for {pattern}"
            )));
        }

        let body = response.text()?;
        let delimiter = match self.style {
            ServiceStyle::Station => b'|',
            ServiceStyle::Array => b',',
        };
        parse_channel_rows(body.as_bytes(), delimiter)
    }
}
