//! Listener-side and upstream-side TLS configuration types
//!
//! These structs describe everything the context assembler in `parapet-tls`
//! needs to build a server or client TLS context. Hostnames served by the
//! additional certificates are not listed here: they are read from the
//! certificates themselves (DNS subject-alternative names plus the subject
//! Common Name) when the SNI lookup tree is populated.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::TlsVersion;

// ============================================================================
// TLS Configuration (listener side)
// ============================================================================

/// TLS configuration for a terminating listener
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Default certificate chain file (PEM), used when SNI is absent or
    /// matches no registered hostname
    pub cert_file: PathBuf,

    /// Private key file (PEM) for the default certificate
    pub key_file: PathBuf,

    /// Passphrase for encrypted private keys (applies to every key this
    /// listener loads)
    #[serde(default)]
    pub key_passphrase: Option<String>,

    /// Additional key/certificate pairs dispatched by SNI
    #[serde(default)]
    pub additional_certs: Vec<SniCertificate>,

    /// CA certificate file for client verification
    pub ca_file: Option<PathBuf>,

    /// Require client certificates
    #[serde(default)]
    pub client_auth: bool,

    /// TLS protocol allow-list; versions not named here are disabled
    #[serde(default = "default_protocols")]
    pub protocols: Vec<TlsVersion>,

    /// Cipher suites in server preference order (empty = provider defaults)
    #[serde(default)]
    pub cipher_suites: Vec<String>,

    /// ALPN protocols in server preference order
    #[serde(default = "default_alpn_protocols")]
    pub alpn_protocols: Vec<String>,

    /// Server-side session cache for resumption
    #[serde(default = "default_session_resumption")]
    pub session_resumption: bool,

    /// Session cache capacity
    #[serde(default = "default_session_cache_size")]
    pub session_cache_size: usize,

    /// Session ticket key ring file (concatenated 64-byte records)
    pub ticket_key_file: Option<PathBuf>,

    /// Lifetime hint for issued session tickets
    #[serde(default = "default_ticket_lifetime")]
    pub ticket_lifetime_secs: u32,
}

/// A key/certificate pair served to clients whose SNI matches one of the
/// certificate's registered names
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SniCertificate {
    /// Certificate chain file path
    pub cert_file: PathBuf,

    /// Private key file path
    pub key_file: PathBuf,
}

// ============================================================================
// Upstream TLS Configuration (client side)
// ============================================================================

/// TLS configuration for connections the proxy opens toward upstreams
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamTlsConfig {
    /// Trust anchors for upstream verification (system roots when unset)
    pub ca_file: Option<PathBuf>,

    /// Client certificate chain presented to upstreams
    pub client_cert: Option<PathBuf>,

    /// Private key for the client certificate
    pub client_key: Option<PathBuf>,

    /// Passphrase for an encrypted client key
    #[serde(default)]
    pub key_passphrase: Option<String>,

    /// TLS protocol allow-list; versions not named here are disabled
    #[serde(default = "default_protocols")]
    pub protocols: Vec<TlsVersion>,

    /// Cipher suites in preference order (empty = provider defaults)
    #[serde(default)]
    pub cipher_suites: Vec<String>,
}

impl Default for UpstreamTlsConfig {
    fn default() -> Self {
        Self {
            ca_file: None,
            client_cert: None,
            client_key: None,
            key_passphrase: None,
            protocols: default_protocols(),
            cipher_suites: Vec::new(),
        }
    }
}

// ============================================================================
// Default Value Functions
// ============================================================================

pub(crate) fn default_protocols() -> Vec<TlsVersion> {
    vec![TlsVersion::Tls12, TlsVersion::Tls13]
}

fn default_alpn_protocols() -> Vec<String> {
    vec!["h2".to_string(), "http/1.1".to_string()]
}

fn default_session_resumption() -> bool {
    true
}

fn default_session_cache_size() -> usize {
    4096
}

fn default_ticket_lifetime() -> u32 {
    // 12 hours, matching the ticket key rotation cadence operators run.
    12 * 3600
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_default_allows_modern_versions_only() {
        let config = UpstreamTlsConfig::default();
        assert!(config.ca_file.is_none());
        assert!(config.client_cert.is_none());
    }

    #[test]
    fn default_protocols_exclude_legacy_versions() {
        let protocols = default_protocols();
        assert!(protocols.contains(&TlsVersion::Tls12));
        assert!(protocols.contains(&TlsVersion::Tls13));
        assert!(!protocols.contains(&TlsVersion::Tls10));
        assert!(!protocols.contains(&TlsVersion::Tls11));
    }
}
