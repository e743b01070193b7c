//! TLS context assembly
//!
//! Builds the server and client TLS configurations the proxy runs with:
//! protocol version masking, cipher selection, key-exchange preference,
//! SNI dispatch, mutual authentication, session cache and ticket ring,
//! and the ALPN preference list. Any error here is fatal to startup;
//! nothing in this module runs on the handshake path.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::crypto::{aws_lc_rs, CryptoProvider};
use rustls::server::{NoServerSessionStorage, ServerSessionMemoryCache, WebPkiClientVerifier};
use rustls::{ClientConfig, RootCertStore, ServerConfig, SupportedProtocolVersion};
use tracing::{debug, info, warn};

use parapet_config::{TlsConfig, TlsVersion, UpstreamTlsConfig};

use crate::resolver::{load_cert_chain, load_private_key, SniResolver};
use crate::ticket::{load_ticket_keys, RingTicketer, TicketKeyRing};
use crate::TlsError;

// ============================================================================
// Protocol Version Mask
// ============================================================================

/// Disablement flag for TLS 1.0
pub const NO_TLS10: u8 = 1 << 0;
/// Disablement flag for TLS 1.1
pub const NO_TLS11: u8 = 1 << 1;
/// Disablement flag for TLS 1.2
pub const NO_TLS12: u8 = 1 << 2;
/// Disablement flag for TLS 1.3
pub const NO_TLS13: u8 = 1 << 3;

const VERSION_FLAGS: [(TlsVersion, u8); 4] = [
    (TlsVersion::Tls10, NO_TLS10),
    (TlsVersion::Tls11, NO_TLS11),
    (TlsVersion::Tls12, NO_TLS12),
    (TlsVersion::Tls13, NO_TLS13),
];

/// Compute the protocol disablement mask: the OR of the flags of every
/// version *not* named in the allow-list.
pub fn proto_version_mask(allowed: &[TlsVersion]) -> u8 {
    let mut mask = 0;
    for (version, flag) in VERSION_FLAGS {
        if !allowed.contains(&version) {
            mask |= flag;
        }
    }
    mask
}

/// Translate a disablement mask into the version set offered to peers.
///
/// TLS 1.0 and 1.1 have no representation in the stack — their flags can
/// only ever disable. A mask that leaves no buildable version is a
/// configuration error.
pub fn supported_versions(
    mask: u8,
) -> Result<Vec<&'static SupportedProtocolVersion>, TlsError> {
    let mut versions = Vec::with_capacity(2);
    if mask & NO_TLS12 == 0 {
        versions.push(&rustls::version::TLS12);
    }
    if mask & NO_TLS13 == 0 {
        versions.push(&rustls::version::TLS13);
    }
    if versions.is_empty() {
        return Err(TlsError::ConfigBuild(
            "protocol allow-list leaves no usable TLS version".to_string(),
        ));
    }
    Ok(versions)
}

// ============================================================================
// ALPN Wire Helpers
// ============================================================================

/// Encode a protocol preference list as the length-prefixed wire blob
/// advertised during negotiation.
pub fn encode_protocol_list<P: AsRef<[u8]>>(protos: &[P]) -> Result<Vec<u8>, TlsError> {
    let mut out = Vec::new();
    for proto in protos {
        let proto = proto.as_ref();
        if proto.is_empty() || proto.len() > 255 {
            return Err(TlsError::ConfigBuild(format!(
                "ALPN identifier length {} out of range",
                proto.len()
            )));
        }
        out.push(proto.len() as u8);
        out.extend_from_slice(proto);
    }
    if out.len() > u16::MAX as usize {
        return Err(TlsError::ConfigBuild(format!(
            "ALPN identifier list too long: {}",
            out.len()
        )));
    }
    Ok(out)
}

/// Select the application protocol: walk the server preference list and
/// return the first client-offered entry that matches.
///
/// `client_list` is the client's raw length-prefixed blob; entries that
/// overrun the buffer end the scan of that preference.
pub fn select_protocol<'a>(
    preferences: &[Vec<u8>],
    client_list: &'a [u8],
) -> Option<&'a [u8]> {
    for preferred in preferences {
        let mut rest = client_list;
        while let Some((&len, tail)) = rest.split_first() {
            let len = len as usize;
            if tail.len() < len {
                break;
            }
            let (proto, next) = tail.split_at(len);
            if proto == preferred.as_slice() {
                return Some(proto);
            }
            rest = next;
        }
    }
    None
}

// ============================================================================
// Provider Assembly
// ============================================================================

/// Build the crypto provider: P-256 preferred for key exchange, cipher
/// suites restricted to the configured names when any are given.
fn crypto_provider(cipher_suites: &[String]) -> Result<CryptoProvider, TlsError> {
    let mut provider = aws_lc_rs::default_provider();

    // P-256 first: its computational cost is well below the larger
    // curves and every client supports it.
    provider.kx_groups = vec![
        aws_lc_rs::kx_group::SECP256R1,
        aws_lc_rs::kx_group::X25519,
        aws_lc_rs::kx_group::SECP384R1,
    ];

    if !cipher_suites.is_empty() {
        let mut selected = Vec::with_capacity(cipher_suites.len());
        for name in cipher_suites {
            let suite = provider
                .cipher_suites
                .iter()
                .copied()
                .find(|suite| format!("{:?}", suite.suite()).eq_ignore_ascii_case(name))
                .ok_or_else(|| {
                    TlsError::ConfigBuild(format!("unknown or unsupported cipher suite: {name}"))
                })?;
            selected.push(suite);
        }
        provider.cipher_suites = selected;
    }

    Ok(provider)
}

/// Load CA certificates into a trust store (client verification or
/// upstream trust anchors)
pub fn load_ca_store(ca_path: &Path) -> Result<RootCertStore, TlsError> {
    let ca_file = File::open(ca_path)
        .map_err(|e| TlsError::CertificateLoad(format!("{}: {}", ca_path.display(), e)))?;
    let mut ca_reader = BufReader::new(ca_file);

    let mut root_store = RootCertStore::empty();
    let certs = rustls_pemfile::certs(&mut ca_reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TlsError::CertificateLoad(format!("{}: {}", ca_path.display(), e)))?;

    for cert in certs {
        root_store.add(cert).map_err(|e| {
            TlsError::InvalidCertificate(format!("failed to add CA certificate: {}", e))
        })?;
    }

    if root_store.is_empty() {
        return Err(TlsError::CertificateLoad(format!(
            "{}: no CA certificates found",
            ca_path.display()
        )));
    }

    info!(
        ca_file = %ca_path.display(),
        cert_count = root_store.len(),
        "loaded CA certificates"
    );

    Ok(root_store)
}

// ============================================================================
// Server Context
// ============================================================================

/// Build the server TLS configuration from our configuration
pub fn build_server_config(config: &TlsConfig) -> Result<ServerConfig, TlsError> {
    let resolver = SniResolver::from_config(config)?;
    let provider = Arc::new(crypto_provider(&config.cipher_suites)?);
    let versions = supported_versions(proto_version_mask(&config.protocols))?;

    let builder = ServerConfig::builder_with_provider(Arc::clone(&provider))
        .with_protocol_versions(&versions)
        .map_err(|e| TlsError::ConfigBuild(format!("protocol versions rejected: {}", e)))?;

    let builder = if config.client_auth {
        let Some(ca_path) = &config.ca_file else {
            return Err(TlsError::ConfigBuild(
                "client_auth enabled but no ca_file configured".to_string(),
            ));
        };
        let root_store = load_ca_store(ca_path)?;
        let verifier =
            WebPkiClientVerifier::builder_with_provider(Arc::new(root_store), provider)
                .build()
                .map_err(|e| {
                    TlsError::ConfigBuild(format!("failed to build client verifier: {}", e))
                })?;
        info!("mTLS enabled: client certificates required");
        builder.with_client_cert_verifier(verifier)
    } else {
        builder.with_no_client_auth()
    };

    let mut server_config = builder.with_cert_resolver(Arc::new(resolver));

    server_config.alpn_protocols = config
        .alpn_protocols
        .iter()
        .map(|p| p.as_bytes().to_vec())
        .collect();
    // The wire form is validated here so a bad identifier fails startup,
    // not the first handshake.
    encode_protocol_list(&server_config.alpn_protocols)?;

    if config.session_resumption {
        server_config.session_storage = ServerSessionMemoryCache::new(config.session_cache_size);
    } else {
        server_config.session_storage = Arc::new(NoServerSessionStorage {});
    }

    if let Some(ticket_path) = &config.ticket_key_file {
        let keys = load_ticket_keys(ticket_path)?;
        let ring = TicketKeyRing::new(keys)?;
        debug!(keys = ring.len(), "session ticket key ring installed");
        server_config.ticketer = Arc::new(RingTicketer::new(ring, config.ticket_lifetime_secs));
    }

    debug!("server TLS configuration built");

    Ok(server_config)
}

// ============================================================================
// Client Context
// ============================================================================

/// Build the client TLS configuration for upstream connections.
///
/// Advertises HTTP/2 via ALPN. Trust anchors come from `ca_file` when
/// configured, the system store otherwise.
pub fn build_client_config(config: &UpstreamTlsConfig) -> Result<ClientConfig, TlsError> {
    let provider = Arc::new(crypto_provider(&config.cipher_suites)?);
    let versions = supported_versions(proto_version_mask(&config.protocols))?;

    let root_store = match &config.ca_file {
        Some(ca_path) => load_ca_store(ca_path)?,
        None => {
            let mut root_store = RootCertStore::empty();
            let loaded = rustls_native_certs::load_native_certs();
            for error in loaded.errors {
                warn!(error = %error, "skipping unreadable system trust anchor");
            }
            for cert in loaded.certs {
                if let Err(e) = root_store.add(cert) {
                    debug!(error = %e, "rejected system trust anchor");
                }
            }
            if root_store.is_empty() {
                return Err(TlsError::CertificateLoad(
                    "no system trust anchors could be loaded".to_string(),
                ));
            }
            root_store
        }
    };

    let builder = ClientConfig::builder_with_provider(provider)
        .with_protocol_versions(&versions)
        .map_err(|e| TlsError::ConfigBuild(format!("protocol versions rejected: {}", e)))?
        .with_root_certificates(root_store);

    let mut client_config = match (&config.client_cert, &config.client_key) {
        (Some(cert_path), Some(key_path)) => {
            let certs = load_cert_chain(cert_path)?;
            let key = load_private_key(key_path, config.key_passphrase.as_deref())?;
            builder.with_client_auth_cert(certs, key).map_err(|e| {
                TlsError::ConfigBuild(format!("failed to configure client certificate: {}", e))
            })?
        }
        (None, None) => builder.with_no_client_auth(),
        _ => {
            return Err(TlsError::ConfigBuild(
                "client_cert and client_key must be configured together".to_string(),
            ));
        }
    };

    client_config.alpn_protocols = vec![b"h2".to_vec()];

    debug!("client TLS configuration built");

    Ok(client_config)
}
