//! Validation of TRISA endpoints and certificate common names

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ModelError, Result};

// DNS name grammar: labels of at most 63 octets, alphanumeric with interior
// hyphens, joined by dots. From https://stackoverflow.com/a/3824105/488917
static CNRE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])(\.([a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9\-]{0,61}[a-zA-Z0-9]))*$",
    )
    .expect("common name pattern must compile")
});

/// Validate a TRISA endpoint of the form `host:port` with a numeric port.
pub fn validate_endpoint(endpoint: &str) -> Result<()> {
    let (host, port) = endpoint
        .rsplit_once(':')
        .ok_or_else(|| ModelError::InvalidEndpoint("unable to parse endpoint string".into()))?;

    if host.is_empty() {
        return Err(ModelError::InvalidEndpoint(
            "missing host in endpoint string".into(),
        ));
    }

    if port.is_empty() {
        return Err(ModelError::InvalidEndpoint(
            "missing port in endpoint string".into(),
        ));
    }

    if port.parse::<u16>().is_err() {
        return Err(ModelError::InvalidEndpoint(
            "endpoint port is not an integer".into(),
        ));
    }

    Ok(())
}

/// Split a `host:port` endpoint and return the host, e.g. to derive the
/// certificate common name when the registration omits one.
pub fn endpoint_host(endpoint: &str) -> Result<&str> {
    validate_endpoint(endpoint)?;
    let (host, _) = endpoint
        .rsplit_once(':')
        .ok_or_else(|| ModelError::InvalidEndpoint("unable to parse endpoint string".into()))?;
    Ok(host)
}

/// Validate a certificate common name.
///
/// The common name must not be empty and must not start with a `*` (DNS
/// wildcards cannot appear on TRISA identity certificates). It carries no
/// scheme and no port; each label is at most 63 octets and must not begin
/// or end with a hyphen.
pub fn validate_common_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ModelError::InvalidCommonName(
            "common name should not be empty".into(),
        ));
    }

    if name.starts_with('*') {
        return Err(ModelError::InvalidCommonName(
            "wildcards are not allowed in TRISA common names".into(),
        ));
    }

    if !CNRE.is_match(name) {
        return Err(ModelError::InvalidCommonName(
            "common name does not match domain name grammar".into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_endpoints() {
        for endpoint in ["trisa.example.com:443", "localhost:8000", "10.8.0.2:443"] {
            assert!(validate_endpoint(endpoint).is_ok(), "{endpoint}");
        }
    }

    #[test]
    fn invalid_endpoints() {
        for endpoint in [
            "",
            "trisa.example.com",
            ":443",
            "trisa.example.com:",
            "trisa.example.com:https",
            "https://trisa.example.com:443",
        ] {
            assert!(validate_endpoint(endpoint).is_err(), "{endpoint}");
        }
    }

    #[test]
    fn endpoint_host_strips_port() {
        assert_eq!(endpoint_host("trisa.example.com:443").unwrap(), "trisa.example.com");
    }

    #[test]
    fn valid_common_names() {
        for name in ["trisa.example.com", "example.com", "a.b.c", "vasp-1.example.io"] {
            assert!(validate_common_name(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn invalid_common_names() {
        for name in [
            "",
            "*.example.com",
            "-bad.example.com",
            "bad-.example.com",
            "trisa.example.com:443",
            "https://trisa.example.com",
        ] {
            assert!(validate_common_name(name).is_err(), "{name}");
        }
    }
}
