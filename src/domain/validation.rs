//! Input validation and normalization for lookup targets

use once_cell::sync::Lazy;
use regex::Regex;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use super::errors::DomainError;

static DOMAIN_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?$").unwrap());
static TOP_LEVEL_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[a-z]{2,63}|xn--[a-z0-9-]{1,59})$").unwrap());
static EMAIL_LOCAL_PART: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9!#$%&'*+/=?^_`{|}~.-]{1,64}$").unwrap());

/// Suffixes that never resolve on the public internet
const RESERVED_SUFFIXES: &[&str] = &[
    "localhost",
    "local",
    "localdomain",
    "internal",
    "invalid",
    "test",
    "home.arpa",
];

const MAX_DOMAIN_LENGTH: usize = 253;

/// Parse an address and reject anything that is not publicly routable
pub fn validate_ip(raw: &str) -> Result<IpAddr, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::invalid("targetValue", "IP address is required"));
    }

    let unbracketed = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(trimmed);

    let ip: IpAddr = unbracketed
        .parse()
        .map_err(|_| DomainError::invalid("targetValue", "Invalid IP address format"))?;

    if is_reserved_ip(&ip) {
        return Err(DomainError::invalid(
            "targetValue",
            "Private, loopback and reserved addresses cannot be looked up",
        ));
    }

    Ok(ip)
}

/// Whether an address belongs to a private, loopback or otherwise reserved range
pub fn is_reserved_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_reserved_v4(v4),
        IpAddr::V6(v6) => is_reserved_v6(v6),
    }
}

fn is_reserved_v4(ip: &Ipv4Addr) -> bool {
    let [a, b, c, _] = ip.octets();

    ip.is_unspecified()
        || ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_broadcast()
        || ip.is_documentation()
        || ip.is_multicast()
        || a == 0
        // shared address space 100.64.0.0/10
        || (a == 100 && (b & 0xc0) == 64)
        // IETF protocol assignments 192.0.0.0/24
        || (a == 192 && b == 0 && c == 0)
        // benchmarking 198.18.0.0/15
        || (a == 198 && (b & 0xfe) == 18)
        // reserved 240.0.0.0/4
        || a >= 240
}

fn is_reserved_v6(ip: &Ipv6Addr) -> bool {
    if let Some(mapped) = ip.to_ipv4_mapped() {
        return is_reserved_v4(&mapped);
    }

    let segments = ip.segments();
    ip.is_unspecified()
        || ip.is_loopback()
        || ip.is_multicast()
        // unique local fc00::/7
        || (segments[0] & 0xfe00) == 0xfc00
        // link local fe80::/10
        || (segments[0] & 0xffc0) == 0xfe80
        // documentation 2001:db8::/32
        || (segments[0] == 0x2001 && segments[1] == 0x0db8)
        // discard-only 100::/64
        || (segments[0] == 0x0100 && segments[1..4].iter().all(|s| *s == 0))
}

/// Normalize a domain name and check it is a public, well-formed hostname.
///
/// Scheme prefixes, paths, ports and a trailing root dot are stripped before
/// validation, so pasted URLs resolve to their host.
pub fn validate_domain(raw: &str) -> Result<String, DomainError> {
    let mut host = raw.trim().to_ascii_lowercase();
    if host.is_empty() {
        return Err(DomainError::invalid("targetValue", "Domain is required"));
    }

    for scheme in ["https://", "http://"] {
        if let Some(rest) = host.strip_prefix(scheme) {
            host = rest.to_string();
        }
    }
    if let Some(idx) = host.find(['/', '?', '#']) {
        host.truncate(idx);
    }
    if let Some(idx) = host.rfind(':') {
        host.truncate(idx);
    }
    let host = host.trim_end_matches('.').to_string();

    if host.len() > MAX_DOMAIN_LENGTH {
        return Err(DomainError::invalid("targetValue", "Domain is too long"));
    }
    if host.parse::<IpAddr>().is_ok() {
        return Err(DomainError::invalid(
            "targetValue",
            "Expected a domain name, got an IP address",
        ));
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return Err(DomainError::invalid(
            "targetValue",
            "Domain must contain at least two labels",
        ));
    }
    if labels.iter().any(|label| !DOMAIN_LABEL.is_match(label)) {
        return Err(DomainError::invalid("targetValue", "Invalid domain format"));
    }
    let tld = labels[labels.len() - 1];
    if !TOP_LEVEL_LABEL.is_match(tld) {
        return Err(DomainError::invalid("targetValue", "Invalid top-level domain"));
    }
    if RESERVED_SUFFIXES
        .iter()
        .any(|suffix| host == *suffix || host.ends_with(&format!(".{}", suffix)))
    {
        return Err(DomainError::invalid(
            "targetValue",
            "Reserved and internal domains cannot be looked up",
        ));
    }

    Ok(host)
}

/// Normalize an email address (lowercase, trimmed) and validate its parts
pub fn validate_email(raw: &str) -> Result<String, DomainError> {
    let email = raw.trim().to_ascii_lowercase();
    let (local, domain) = email
        .split_once('@')
        .ok_or_else(|| DomainError::invalid("targetValue", "Invalid email format"))?;

    if !EMAIL_LOCAL_PART.is_match(local) || local.starts_with('.') || local.ends_with('.') {
        return Err(DomainError::invalid("targetValue", "Invalid email format"));
    }
    let domain = validate_domain(domain)?;

    Ok(format!("{}@{}", local, domain))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_reserved_addresses() {
        for raw in [
            "10.0.0.1",
            "127.0.0.1",
            "::1",
            "192.168.1.20",
            "172.16.4.4",
            "169.254.10.10",
            "100.64.0.1",
            "0.0.0.0",
            "255.255.255.255",
            "203.0.113.7",
            "fd00::1",
            "fe80::1",
            "2001:db8::1",
            "::ffff:10.0.0.1",
        ] {
            assert!(validate_ip(raw).is_err(), "{} should be rejected", raw);
        }
    }

    #[test]
    fn test_accepts_public_addresses() {
        assert_eq!(validate_ip(" 8.8.8.8 ").unwrap().to_string(), "8.8.8.8");
        assert_eq!(
            validate_ip("[2606:4700:4700::1111]").unwrap().to_string(),
            "2606:4700:4700::1111"
        );
        assert_eq!(
            validate_ip("2606:4700:4700:0:0:0:0:1111").unwrap().to_string(),
            "2606:4700:4700::1111"
        );
    }

    #[test]
    fn test_rejects_malformed_addresses() {
        assert!(validate_ip("").is_err());
        assert!(validate_ip("300.1.1.1").is_err());
        assert!(validate_ip("1.2.3").is_err());
    }

    #[test]
    fn test_domain_normalization() {
        assert_eq!(validate_domain("Example.COM.").unwrap(), "example.com");
        assert_eq!(
            validate_domain("https://shop.example.net/path?q=1").unwrap(),
            "shop.example.net"
        );
        assert_eq!(validate_domain("example.org:8443").unwrap(), "example.org");
    }

    #[test]
    fn test_domain_rejections() {
        assert!(validate_domain("localhost").is_err());
        assert!(validate_domain("printer.local").is_err());
        assert!(validate_domain("-bad-.com").is_err());
        assert!(validate_domain("exa mple.com").is_err());
        assert!(validate_domain("example.c0m").is_err());
        assert!(validate_domain("8.8.8.8").is_err());
        assert!(validate_domain(&format!("{}.com", "a".repeat(64))).is_err());
    }

    #[test]
    fn test_email_validation() {
        assert_eq!(
            validate_email(" Jane.Doe@Example.com ").unwrap(),
            "jane.doe@example.com"
        );
        assert!(validate_email("no-at-sign.example.com").is_err());
        assert!(validate_email("user@localhost").is_err());
        assert!(validate_email(".user@example.com").is_err());
    }
}
