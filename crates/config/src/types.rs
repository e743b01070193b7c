//! Common type definitions shared across the Parapet TLS stack.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// TLS protocol version
///
/// The token forms (`TLSv1.2`, ...) match what operators write in the
/// protocol allow-list. Versions not named in the allow-list are disabled
/// when the server context is assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TlsVersion {
    #[serde(rename = "TLSv1.0")]
    Tls10,
    #[serde(rename = "TLSv1.1")]
    Tls11,
    #[serde(rename = "TLSv1.2")]
    Tls12,
    #[serde(rename = "TLSv1.3")]
    Tls13,
}

impl TlsVersion {
    /// Token form of this version, as accepted in configuration.
    pub fn as_token(&self) -> &'static str {
        match self {
            TlsVersion::Tls10 => "TLSv1.0",
            TlsVersion::Tls11 => "TLSv1.1",
            TlsVersion::Tls12 => "TLSv1.2",
            TlsVersion::Tls13 => "TLSv1.3",
        }
    }
}

impl fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// Error returned when a protocol allow-list entry is not a recognised token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognised TLS version token: {0}")]
pub struct UnknownTlsVersion(pub String);

impl FromStr for TlsVersion {
    type Err = UnknownTlsVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("TLSv1.0") {
            Ok(TlsVersion::Tls10)
        } else if s.eq_ignore_ascii_case("TLSv1.1") {
            Ok(TlsVersion::Tls11)
        } else if s.eq_ignore_ascii_case("TLSv1.2") {
            Ok(TlsVersion::Tls12)
        } else if s.eq_ignore_ascii_case("TLSv1.3") {
            Ok(TlsVersion::Tls13)
        } else {
            Err(UnknownTlsVersion(s.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tokens_case_insensitively() {
        assert_eq!("TLSv1.2".parse::<TlsVersion>().unwrap(), TlsVersion::Tls12);
        assert_eq!("tlsv1.3".parse::<TlsVersion>().unwrap(), TlsVersion::Tls13);
        assert_eq!("TLSV1.0".parse::<TlsVersion>().unwrap(), TlsVersion::Tls10);
    }

    #[test]
    fn rejects_unknown_tokens() {
        let err = "SSLv3".parse::<TlsVersion>().unwrap_err();
        assert_eq!(err, UnknownTlsVersion("SSLv3".to_string()));
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for version in [
            TlsVersion::Tls10,
            TlsVersion::Tls11,
            TlsVersion::Tls12,
            TlsVersion::Tls13,
        ] {
            assert_eq!(version.to_string().parse::<TlsVersion>().unwrap(), version);
        }
    }
}
