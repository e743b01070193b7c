//! Certificate name extraction
//!
//! Pulls the names a certificate is valid for out of its DER encoding:
//! DNS subject-alternative names, IP-address subject-alternative names,
//! and the subject Common Name. Names carrying an embedded NUL byte are
//! rejected, since a NUL can smuggle a different effective hostname past
//! string-based consumers.

use tracing::{debug, warn};
use x509_parser::extensions::GeneralName;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::TlsError;

/// The names a certificate covers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateNames {
    /// DNS subject-alternative names, in certificate order
    pub dns_names: Vec<String>,
    /// Raw IP-address subject-alternative names (4 or 16 bytes each)
    pub ip_addrs: Vec<Vec<u8>>,
    /// First usable subject Common Name, if any
    pub common_name: Option<String>,
}

/// Extract DNS names, IP addresses and the Common Name from a DER-encoded
/// certificate.
///
/// A missing subjectAltName extension is not an error; a certificate
/// without any usable name simply yields an empty result. Individual
/// entries containing NUL bytes are skipped with a warning.
pub fn extract_names(cert_der: &[u8]) -> Result<CertificateNames, TlsError> {
    let (_, cert) = X509Certificate::from_der(cert_der)
        .map_err(|e| TlsError::InvalidCertificate(format!("failed to parse certificate: {e}")))?;

    let mut names = CertificateNames::default();

    match cert.subject_alternative_name() {
        Ok(Some(san)) => {
            for general_name in &san.value.general_names {
                match general_name {
                    GeneralName::DNSName(dns) => {
                        if dns.contains('\0') {
                            warn!("rejecting SAN dNSName with embedded NUL byte");
                            continue;
                        }
                        names.dns_names.push((*dns).to_string());
                    }
                    GeneralName::IPAddress(ip) if ip.len() == 4 || ip.len() == 16 => {
                        names.ip_addrs.push(ip.to_vec());
                    }
                    GeneralName::IPAddress(ip) => {
                        warn!(len = ip.len(), "rejecting SAN iPAddress of invalid length");
                    }
                    _ => {}
                }
            }
        }
        Ok(None) => {}
        Err(e) => {
            return Err(TlsError::InvalidCertificate(format!(
                "malformed subjectAltName extension: {e}"
            )));
        }
    }

    for attr in cert.subject().iter_common_name() {
        match attr.as_str() {
            Ok(cn) if cn.contains('\0') => {
                warn!("rejecting subject Common Name with embedded NUL byte");
            }
            Ok(cn) => {
                names.common_name = Some(cn.to_string());
                break;
            }
            Err(e) => {
                debug!(error = %e, "skipping undecodable Common Name entry");
            }
        }
    }

    if names.common_name.is_none() && names.dns_names.is_empty() {
        warn!("certificate carries no usable DNS name or Common Name");
    }

    Ok(names)
}
