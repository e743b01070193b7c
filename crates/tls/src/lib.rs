//! TLS termination core for the Parapet proxy
//!
//! This crate builds the TLS contexts a reverse proxy terminates HTTP/2
//! with, and dispatches certificates by Server Name Indication (SNI).
//!
//! # Features
//!
//! - SNI-based certificate selection over a compressed suffix trie
//! - Wildcard certificate matching per RFC 6125 (e.g. `*.example.com`)
//! - Default certificate fallback
//! - mTLS client certificate verification
//! - Session ticket encryption with key-ring rotation
//! - Peer certificate verification against hostnames and IP addresses
//!
//! The lookup tree is populated once at startup from the configured
//! certificates and is read-only afterwards; per-handshake lookups take
//! `&self` and run concurrently on worker threads without locking.

// ============================================================================
// Module Declarations
// ============================================================================

pub mod context;
pub mod handshake;
pub mod hostname;
pub mod names;
pub mod resolver;
pub mod ticket;
pub mod tree;

// ============================================================================
// Public API Re-exports
// ============================================================================

pub use context::{
    build_client_config, build_server_config, encode_protocol_list, load_ca_store,
    proto_version_mask, select_protocol, supported_versions,
};
pub use handshake::HandshakeMonitor;
pub use hostname::{hostname_match, verify_peer_hostname};
pub use names::{extract_names, CertificateNames};
pub use resolver::SniResolver;
pub use ticket::{load_ticket_keys, RingTicketer, TicketKey, TicketKeyRing, TicketKeyUse};
pub use tree::CertLookupTree;

/// Error type for TLS operations
#[derive(Debug)]
pub enum TlsError {
    /// Failed to load a certificate file
    CertificateLoad(String),
    /// Failed to load a private key file
    KeyLoad(String),
    /// Failed to build a TLS configuration
    ConfigBuild(String),
    /// Certificate/key mismatch
    CertKeyMismatch(String),
    /// Invalid certificate
    InvalidCertificate(String),
    /// Invalid session ticket key material
    TicketKeys(String),
}

impl std::fmt::Display for TlsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TlsError::CertificateLoad(e) => write!(f, "failed to load certificate: {}", e),
            TlsError::KeyLoad(e) => write!(f, "failed to load private key: {}", e),
            TlsError::ConfigBuild(e) => write!(f, "failed to build TLS config: {}", e),
            TlsError::CertKeyMismatch(e) => write!(f, "certificate/key mismatch: {}", e),
            TlsError::InvalidCertificate(e) => write!(f, "invalid certificate: {}", e),
            TlsError::TicketKeys(e) => write!(f, "invalid ticket keys: {}", e),
        }
    }
}

impl std::error::Error for TlsError {}
