//! Startup validation of TLS configuration
//!
//! Validates certificate material before the context assembler runs:
//! referenced files must exist, certificates must parse, and expired
//! certificates are rejected. Expiry within 30 days produces a warning so
//! operators see it before it becomes an outage.

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use thiserror::Error;
use tracing::debug;

use crate::server::TlsConfig;

/// Size of one persisted session ticket key record
/// (16-byte name + 16-byte AES key + 32-byte HMAC key).
const TICKET_KEY_RECORD_LEN: u64 = 64;

/// Which part of the configuration a finding refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Certificate,
    Key,
    Trust,
    TicketKeys,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Certificate => write!(f, "certificate"),
            ErrorCategory::Key => write!(f, "key"),
            ErrorCategory::Trust => write!(f, "trust"),
            ErrorCategory::TicketKeys => write!(f, "ticket-keys"),
        }
    }
}

/// A fatal validation finding
#[derive(Debug, Clone, Error)]
#[error("{category}: {message}")]
pub struct ValidationError {
    pub category: ErrorCategory,
    pub message: String,
}

impl ValidationError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

/// A non-fatal validation finding
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub message: String,
}

impl ValidationWarning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Accumulated validation outcome
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// True when no fatal findings were recorded
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate a listener TLS configuration
pub fn validate_tls(config: &TlsConfig) -> ValidationResult {
    let mut result = ValidationResult::new();

    check_pair(&mut result, &config.cert_file, &config.key_file);

    for sni in &config.additional_certs {
        check_pair(&mut result, &sni.cert_file, &sni.key_file);
    }

    if config.client_auth {
        match &config.ca_file {
            Some(ca_path) if !ca_path.exists() => {
                result.add_error(ValidationError::new(
                    ErrorCategory::Trust,
                    format!("CA certificate not found: {:?}", ca_path),
                ));
            }
            Some(_) => {}
            None => {
                result.add_error(ValidationError::new(
                    ErrorCategory::Trust,
                    "client_auth enabled but no ca_file configured",
                ));
            }
        }
    }

    if config.protocols.is_empty() {
        result.add_error(ValidationError::new(
            ErrorCategory::Certificate,
            "protocol allow-list is empty; every TLS version would be disabled",
        ));
    }

    if let Some(ticket_path) = &config.ticket_key_file {
        check_ticket_key_file(&mut result, ticket_path);
    }

    debug!(
        errors = result.errors.len(),
        warnings = result.warnings.len(),
        "TLS configuration validated"
    );

    result
}

fn check_pair(result: &mut ValidationResult, cert_file: &Path, key_file: &Path) {
    if !cert_file.exists() {
        result.add_error(ValidationError::new(
            ErrorCategory::Certificate,
            format!("certificate not found: {:?}", cert_file),
        ));
        return;
    }
    if !key_file.exists() {
        result.add_error(ValidationError::new(
            ErrorCategory::Key,
            format!("private key not found: {:?}", key_file),
        ));
        return;
    }

    match load_and_validate_cert(cert_file) {
        Ok(Some(expiry_warning)) => result.add_warning(expiry_warning),
        Ok(None) => {}
        Err(e) => result.add_error(e),
    }
}

fn check_ticket_key_file(result: &mut ValidationResult, path: &Path) {
    match fs::metadata(path) {
        Ok(meta) if meta.len() == 0 || meta.len() % TICKET_KEY_RECORD_LEN != 0 => {
            result.add_error(ValidationError::new(
                ErrorCategory::TicketKeys,
                format!(
                    "ticket key file {:?} must hold whole {}-byte records, found {} bytes",
                    path,
                    TICKET_KEY_RECORD_LEN,
                    meta.len()
                ),
            ));
        }
        Ok(_) => {}
        Err(e) => {
            result.add_error(ValidationError::new(
                ErrorCategory::TicketKeys,
                format!("ticket key file {:?} unreadable: {}", path, e),
            ));
        }
    }
}

/// Load a certificate and check its expiry
fn load_and_validate_cert(cert_path: &Path) -> Result<Option<ValidationWarning>, ValidationError> {
    let cert_pem = fs::read(cert_path).map_err(|e| {
        ValidationError::new(
            ErrorCategory::Certificate,
            format!("failed to read certificate {:?}: {}", cert_path, e),
        )
    })?;

    let pem = pem::parse(&cert_pem).map_err(|e| {
        ValidationError::new(
            ErrorCategory::Certificate,
            format!("failed to parse certificate {:?}: {}", cert_path, e),
        )
    })?;

    let (_, cert) = x509_parser::parse_x509_certificate(pem.contents()).map_err(|e| {
        ValidationError::new(
            ErrorCategory::Certificate,
            format!("invalid X509 certificate {:?}: {}", cert_path, e),
        )
    })?;

    let now = SystemTime::now();
    let not_after = cert.validity().not_after.timestamp();
    if not_after < 0 {
        return Err(ValidationError::new(
            ErrorCategory::Certificate,
            format!("certificate {:?} has a nonsensical notAfter", cert_path),
        ));
    }
    let expiry_time = SystemTime::UNIX_EPOCH + Duration::from_secs(not_after as u64);

    if expiry_time < now {
        return Err(ValidationError::new(
            ErrorCategory::Certificate,
            format!(
                "certificate expired: {:?} (expired at {})",
                cert_path,
                cert.validity().not_after
            ),
        ));
    }

    let thirty_days = Duration::from_secs(30 * 86400);
    if expiry_time < now + thirty_days {
        return Ok(Some(ValidationWarning::new(format!(
            "certificate expires soon: {:?} (expires at {})",
            cert_path,
            cert.validity().not_after
        ))));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::SniCertificate;
    use crate::types::TlsVersion;
    use rcgen::{CertificateParams, KeyPair};
    use std::path::PathBuf;

    fn write_cert_pair(dir: &Path, stem: &str, names: &[&str]) -> (PathBuf, PathBuf) {
        let key = KeyPair::generate().expect("generate key");
        let params =
            CertificateParams::new(names.iter().map(|n| n.to_string()).collect::<Vec<_>>())
                .expect("params");
        let cert = params.self_signed(&key).expect("self-signed cert");

        let cert_path = dir.join(format!("{stem}.crt"));
        let key_path = dir.join(format!("{stem}.key"));
        fs::write(&cert_path, cert.pem()).expect("write cert");
        fs::write(&key_path, key.serialize_pem()).expect("write key");
        (cert_path, key_path)
    }

    fn config_with(cert_file: PathBuf, key_file: PathBuf) -> TlsConfig {
        TlsConfig {
            cert_file,
            key_file,
            key_passphrase: None,
            additional_certs: vec![],
            ca_file: None,
            client_auth: false,
            protocols: vec![TlsVersion::Tls12, TlsVersion::Tls13],
            cipher_suites: vec![],
            alpn_protocols: vec!["h2".to_string()],
            session_resumption: true,
            session_cache_size: 1024,
            ticket_key_file: None,
            ticket_lifetime_secs: 3600,
        }
    }

    #[test]
    fn accepts_valid_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let (cert, key) = write_cert_pair(dir.path(), "server", &["example.com"]);
        let result = validate_tls(&config_with(cert, key));
        assert!(result.is_ok(), "unexpected errors: {:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn reports_missing_certificate() {
        let dir = tempfile::tempdir().unwrap();
        let (_, key) = write_cert_pair(dir.path(), "server", &["example.com"]);
        let config = config_with(dir.path().join("nonexistent.crt"), key);

        let result = validate_tls(&config);
        assert!(!result.is_ok());
        assert!(result
            .errors
            .iter()
            .any(|e| e.category == ErrorCategory::Certificate
                && e.message.contains("certificate not found")));
    }

    #[test]
    fn reports_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let (cert, _) = write_cert_pair(dir.path(), "server", &["example.com"]);
        let config = config_with(cert, dir.path().join("nonexistent.key"));

        let result = validate_tls(&config);
        assert!(result
            .errors
            .iter()
            .any(|e| e.category == ErrorCategory::Key));
    }

    #[test]
    fn reports_garbage_certificate() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("bogus.crt");
        let key = dir.path().join("bogus.key");
        fs::write(&cert, "not a certificate").unwrap();
        fs::write(&key, "not a key").unwrap();

        let result = validate_tls(&config_with(cert, key));
        assert!(!result.is_ok());
    }

    #[test]
    fn reports_missing_sni_certificate() {
        let dir = tempfile::tempdir().unwrap();
        let (cert, key) = write_cert_pair(dir.path(), "server", &["example.com"]);
        let mut config = config_with(cert, key);
        config.additional_certs.push(SniCertificate {
            cert_file: dir.path().join("missing.crt"),
            key_file: dir.path().join("missing.key"),
        });

        let result = validate_tls(&config);
        assert!(!result.is_ok());
    }

    #[test]
    fn client_auth_requires_ca_file() {
        let dir = tempfile::tempdir().unwrap();
        let (cert, key) = write_cert_pair(dir.path(), "server", &["example.com"]);
        let mut config = config_with(cert, key);
        config.client_auth = true;

        let result = validate_tls(&config);
        assert!(result
            .errors
            .iter()
            .any(|e| e.category == ErrorCategory::Trust));
    }

    #[test]
    fn empty_protocol_allow_list_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (cert, key) = write_cert_pair(dir.path(), "server", &["example.com"]);
        let mut config = config_with(cert, key);
        config.protocols.clear();

        let result = validate_tls(&config);
        assert!(!result.is_ok());
    }

    #[test]
    fn ticket_key_file_must_hold_whole_records() {
        let dir = tempfile::tempdir().unwrap();
        let (cert, key) = write_cert_pair(dir.path(), "server", &["example.com"]);

        let ticket_path = dir.path().join("ticket.keys");
        fs::write(&ticket_path, vec![0u8; 65]).unwrap();
        let mut config = config_with(cert, key);
        config.ticket_key_file = Some(ticket_path.clone());

        let result = validate_tls(&config);
        assert!(result
            .errors
            .iter()
            .any(|e| e.category == ErrorCategory::TicketKeys));

        fs::write(&ticket_path, vec![0u8; 128]).unwrap();
        let result = validate_tls(&config);
        assert!(result.is_ok(), "unexpected errors: {:?}", result.errors);
    }
}
