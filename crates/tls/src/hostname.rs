//! Hostname matching for certificate names
//!
//! Implements the RFC 6125 §6.4.3 wildcard semantics used both by the SNI
//! lookup tree and by peer certificate verification. Comparisons are
//! ASCII-case-insensitive and operate on raw bytes so a malformed SNI value
//! can never panic the handshake path.

use std::net::IpAddr;

use crate::names::CertificateNames;

/// Match a presented hostname against a certificate name, honouring
/// wildcard rules.
///
/// A `*` enables wildcard matching only when it sits in the left-most
/// label, the pattern has at least two dots, and the pattern is not an
/// IDN A-label (`xn--` prefix). A disabled wildcard degrades to a literal
/// case-insensitive comparison. The wildcard never crosses a label
/// boundary and must cover at least one character, so `*.example.com`
/// matches `a.example.com` but neither `example.com` nor
/// `a.b.example.com`.
pub fn hostname_match(pattern: &[u8], hostname: &[u8]) -> bool {
    let Some(pt_wildcard) = pattern.iter().position(|&b| b == b'*') else {
        return pattern.eq_ignore_ascii_case(hostname);
    };

    let Some(pt_left) = pattern.iter().position(|&b| b == b'.') else {
        return pattern.eq_ignore_ascii_case(hostname);
    };

    // At least 2 dots are required to enable wildcard match, the wildcard
    // must be in the left-most label, and a wildcard embedded in an
    // A-label is never honoured.
    if pt_wildcard > pt_left
        || !pattern[pt_left + 1..].contains(&b'.')
        || starts_with_ignore_case(pattern, b"xn--")
    {
        return pattern.eq_ignore_ascii_case(hostname);
    }

    let Some(hn_left) = hostname.iter().position(|&b| b == b'.') else {
        return false;
    };
    if !pattern[pt_left..].eq_ignore_ascii_case(&hostname[hn_left..]) {
        return false;
    }

    // '*' must cover at least one character.
    if hn_left < pt_left {
        return false;
    }

    starts_with_ignore_case(&hostname[..hn_left], &pattern[..pt_wildcard])
        && ends_with_ignore_case(&hostname[..hn_left], &pattern[pt_wildcard + 1..pt_left])
}

/// Verify a peer certificate's names against the hostname (or numeric IP)
/// the connection was opened to.
///
/// Numeric hosts are compared octet-wise against IP-address
/// subject-alternative names, falling back to a literal Common Name
/// comparison when the certificate carries no IP entries. DNS hosts are
/// matched against DNS subject-alternative names with wildcard support,
/// falling back to the Common Name when no DNS entries exist.
pub fn verify_peer_hostname(hostname: &str, names: &CertificateNames) -> bool {
    if let Ok(addr) = hostname.parse::<IpAddr>() {
        if names.ip_addrs.is_empty() {
            return names
                .common_name
                .as_deref()
                .is_some_and(|cn| cn.as_bytes().eq_ignore_ascii_case(hostname.as_bytes()));
        }
        let octets = match addr {
            IpAddr::V4(v4) => v4.octets().to_vec(),
            IpAddr::V6(v6) => v6.octets().to_vec(),
        };
        return names.ip_addrs.iter().any(|ip| ip[..] == octets[..]);
    }

    if names.dns_names.is_empty() {
        return names
            .common_name
            .as_deref()
            .is_some_and(|cn| hostname_match(cn.as_bytes(), hostname.as_bytes()));
    }
    names
        .dns_names
        .iter()
        .any(|dns| hostname_match(dns.as_bytes(), hostname.as_bytes()))
}

fn starts_with_ignore_case(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.len() >= needle.len() && haystack[..needle.len()].eq_ignore_ascii_case(needle)
}

fn ends_with_ignore_case(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.len() >= needle.len()
        && haystack[haystack.len() - needle.len()..].eq_ignore_ascii_case(needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, hostname: &str) -> bool {
        hostname_match(pattern.as_bytes(), hostname.as_bytes())
    }

    #[test]
    fn literal_patterns_compare_case_insensitively() {
        assert!(matches("example.com", "example.com"));
        assert!(matches("EXAMPLE.com", "example.COM"));
        assert!(!matches("example.com", "example.org"));
        assert!(!matches("example.com", "www.example.com"));
    }

    #[test]
    fn wildcard_matches_single_label() {
        assert!(matches("*.example.com", "a.example.com"));
        assert!(matches("*.example.com", "mail.example.com"));
        assert!(matches("*.Example.COM", "MAIL.example.com"));
    }

    #[test]
    fn wildcard_requires_at_least_one_character() {
        assert!(!matches("*.example.com", "example.com"));
        assert!(!matches("*.example.com", ".example.com"));
    }

    #[test]
    fn wildcard_does_not_cross_label_boundaries() {
        assert!(!matches("*.example.com", "a.b.example.com"));
    }

    #[test]
    fn wildcard_with_prefix_and_suffix_fragments() {
        assert!(matches("www*.example.com", "www1.example.com"));
        assert!(matches("ba*n.example.com", "baron.example.com"));
        assert!(!matches("www*.example.com", "web1.example.com"));
        assert!(!matches("ba*n.example.com", "baro.example.com"));
    }

    #[test]
    fn wildcard_requires_two_dots() {
        // Only one dot: wildcard disabled, literal comparison applies.
        assert!(!matches("*.com", "example.com"));
        assert!(matches("*.com", "*.com"));
    }

    #[test]
    fn wildcard_must_be_in_leftmost_label() {
        assert!(!matches("www.*.example.com", "www.a.example.com"));
        assert!(matches("www.*.example.com", "www.*.example.com"));
    }

    #[test]
    fn idn_a_label_disables_wildcard() {
        assert!(!matches("xn--*.example.com", "xn--caf-dma.example.com"));
        assert!(matches("xn--*.example.com", "XN--*.example.com"));
    }

    #[test]
    fn hostname_without_dot_never_wildcard_matches() {
        assert!(!matches("*.example.com", "localhost"));
    }

    fn names(dns: &[&str], ips: &[&[u8]], cn: Option<&str>) -> CertificateNames {
        CertificateNames {
            dns_names: dns.iter().map(|s| s.to_string()).collect(),
            ip_addrs: ips.iter().map(|b| b.to_vec()).collect(),
            common_name: cn.map(|s| s.to_string()),
        }
    }

    #[test]
    fn verifies_dns_hostname_against_san_entries() {
        let names = names(&["api.example.com", "*.cdn.example.com"], &[], None);
        assert!(verify_peer_hostname("api.example.com", &names));
        assert!(verify_peer_hostname("edge1.cdn.example.com", &names));
        assert!(!verify_peer_hostname("other.example.com", &names));
    }

    #[test]
    fn falls_back_to_common_name_without_dns_sans() {
        let names = names(&[], &[], Some("*.example.com"));
        assert!(verify_peer_hostname("a.example.com", &names));
        assert!(!verify_peer_hostname("example.com", &names));
    }

    #[test]
    fn dns_sans_shadow_the_common_name() {
        let names = names(&["api.example.com"], &[], Some("other.example.com"));
        assert!(!verify_peer_hostname("other.example.com", &names));
    }

    #[test]
    fn verifies_numeric_host_against_ip_sans() {
        let names = names(&[], &[&[192, 0, 2, 1]], None);
        assert!(verify_peer_hostname("192.0.2.1", &names));
        assert!(!verify_peer_hostname("192.0.2.2", &names));
    }

    #[test]
    fn verifies_ipv6_host_against_ip_sans() {
        let mut v6 = [0u8; 16];
        v6[15] = 1;
        let names = names(&[], &[&v6], None);
        assert!(verify_peer_hostname("::1", &names));
        assert!(!verify_peer_hostname("::2", &names));
    }

    #[test]
    fn numeric_host_falls_back_to_common_name_literal() {
        let names = names(&["ignored.example.com"], &[], Some("192.0.2.7"));
        assert!(verify_peer_hostname("192.0.2.7", &names));
        assert!(!verify_peer_hostname("192.0.2.8", &names));
    }
}
