//! SNCL pattern matching with a configurable field order
//!
//! Translates dotted Network.Station.Location.Channel patterns with `*`/`?`
//! wildcards into anchored regexes and matches them against channel
//! identifiers. The on-disk/preference field order is configurable (for
//! example `N.S.L.C` or `S.N.L.C`); internally everything is canonical
//! N, S, L, C.

use crate::app::models::ChannelIdentifier;
use crate::constants::BLANK_LOCATION_SENTINEL;
use crate::{Error, Result};
use regex::Regex;
use std::fmt;

/// One of the four SNCL fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnclField {
    Network,
    Station,
    Location,
    Channel,
}

impl SnclField {
    fn from_letter(letter: &str) -> Result<Self> {
        match letter {
            "N" => Ok(Self::Network),
            "S" => Ok(Self::Station),
            "L" => Ok(Self::Location),
            "C" => Ok(Self::Channel),
            other => Err(Error::configuration(format!(
                "unknown SNCL field letter '{other}' (expected N, S, L, or C)"
            ))),
        }
    }
}

/// The order in which the four fields appear in dotted identifier strings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnclOrder {
    fields: [SnclField; 4],
}

impl SnclOrder {
    /// Parse an order specification such as `"N.S.L.C"`
    ///
    /// Each letter must appear exactly once; anything else is a
    /// configuration error.
    pub fn parse(spec: &str) -> Result<Self> {
        let letters: Vec<&str> = spec.split('.').collect();
        if letters.len() != 4 {
            return Err(Error::configuration(format!(
                "SNCL order '{spec}' must have 4 dot-separated fields, found {}",
                letters.len()
            )));
        }
        let mut fields = [SnclField::Network; 4];
        for (i, letter) in letters.iter().enumerate() {
            fields[i] = SnclField::from_letter(letter)?;
        }
        for f in [
            SnclField::Network,
            SnclField::Station,
            SnclField::Location,
            SnclField::Channel,
        ] {
            if !fields.contains(&f) {
                return Err(Error::configuration(format!(
                    "SNCL order '{spec}' is missing field {f:?}"
                )));
            }
        }
        Ok(Self { fields })
    }

    /// Reorder four raw fields from this order into canonical N, S, L, C
    fn canonicalize(&self, raw: [&str; 4]) -> [String; 4] {
        let mut out = [String::new(), String::new(), String::new(), String::new()];
        for (value, field) in raw.iter().zip(self.fields.iter()) {
            let slot = match field {
                SnclField::Network => 0,
                SnclField::Station => 1,
                SnclField::Location => 2,
                SnclField::Channel => 3,
            };
            out[slot] = (*value).to_string();
        }
        out
    }
}

impl Default for SnclOrder {
    fn default() -> Self {
        Self::parse(crate::constants::DEFAULT_SNCL_ORDER).expect("default order is valid")
    }
}

/// A channel identifier pattern where any field may contain `*` or `?`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnclPattern {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    /// The pattern text as supplied, for logging and cache fingerprints
    text: String,
}

impl SnclPattern {
    /// Parse a dotted pattern according to the configured field order
    ///
    /// A wrong field count is a configuration error, fatal to the run that
    /// requested it.
    pub fn parse(text: &str, order: &SnclOrder) -> Result<Self> {
        let parts: Vec<&str> = text.split('.').collect();
        if parts.len() != 4 {
            return Err(Error::configuration(format!(
                "SNCL pattern '{text}' must have 4 dot-separated fields, found {}",
                parts.len()
            )));
        }
        let [network, station, location, channel] =
            order.canonicalize([parts[0], parts[1], parts[2], parts[3]]);
        let location = if location == BLANK_LOCATION_SENTINEL {
            String::new()
        } else {
            location
        };
        Ok(Self {
            network,
            station,
            location,
            channel,
            text: text.to_string(),
        })
    }

    /// The pattern text as originally supplied
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The canonical dotted pattern, N.S.L.C order
    pub fn canonical(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }

    /// True when no field contains a wildcard
    pub fn is_literal(&self) -> bool {
        !self.canonical().contains(['*', '?'])
    }

    /// Compile into an anchored regex over canonical dotted identifiers
    ///
    /// Literal dots are escaped before wildcard expansion; reversing the two
    /// substitutions would corrupt the dots introduced by `*` -> `.*`.
    pub fn to_regex(&self) -> Result<Regex> {
        let escaped = self
            .canonical()
            .replace('.', r"\.")
            .replace('*', ".*")
            .replace('?', ".");
        Ok(Regex::new(&format!("^{escaped}$"))?)
    }

    /// Match against a channel identifier
    pub fn matches(&self, id: &ChannelIdentifier) -> bool {
        self.matches_id(&id.sncl_id())
    }

    /// Match against a canonical dotted identifier string
    pub fn matches_id(&self, sncl_id: &str) -> bool {
        match self.to_regex() {
            Ok(re) => re.is_match(sncl_id),
            // a pattern that parsed into four fields always compiles
            Err(_) => false,
        }
    }

    /// Convert a fully literal pattern into a concrete identifier
    pub fn to_identifier(&self) -> Option<ChannelIdentifier> {
        if !self.is_literal() {
            return None;
        }
        Some(ChannelIdentifier::new(
            self.network.clone(),
            self.station.clone(),
            self.location.clone(),
            self.channel.clone(),
        ))
    }
}

impl fmt::Display for SnclPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}
