//! Serialization format abstraction for HTTP bodies.
//!
//! Request and response bodies go through [`Format`] rather than through a
//! specific JSON library, so handlers do not change if another wire format is
//! added. JSON is encoded with sonic-rs.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::GatewayError;

/// Supported body formats.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub enum Format {
    #[default]
    Json,
}

impl std::str::FromStr for Format {
    type Err = ();

    /// Parses a `Content-Type` value, ignoring parameters such as `charset`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mime = s.split(';').next().unwrap_or_default().trim();
        if mime.eq_ignore_ascii_case("application/json") {
            Ok(Format::Json)
        } else {
            Err(())
        }
    }
}

impl Format {
    /// Returns the MIME content type for this format.
    pub fn content_type(self) -> &'static str {
        match self {
            Format::Json => "application/json",
        }
    }

    pub fn serialize<T: Serialize>(self, val: &T) -> Result<Vec<u8>, GatewayError> {
        match self {
            Format::Json => Ok(sonic_rs::to_vec(val).map_err(eyre::Report::new)?),
        }
    }

    /// Decodes a request body. Failures are the caller's fault.
    pub fn deserialize<T: DeserializeOwned>(self, body: &[u8]) -> Result<T, GatewayError> {
        match self {
            Format::Json => sonic_rs::from_slice(body)
                .map_err(|e| GatewayError::BadRequest(format!("malformed JSON body: {e}"))),
        }
    }
}
