//! PKCS#12 bundle parsing
//!
//! The CA delivers issued certificates as password-protected PKCS#12
//! bundles. The certificate manager opens the bundle with the password
//! stored in the vault and extracts the leaf X.509 into the
//! [`CertificateDetails`] payload persisted on the VASP record.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::NaiveDateTime;
use openssl::asn1::Asn1TimeRef;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::Id;
use openssl::x509::{X509NameRef, X509};
use thiserror::Error;

use gds_models::{CertificateDetails, CertificateName};

#[derive(Debug, Error)]
pub enum Pkcs12Error {
    #[error("could not parse PKCS#12 bundle: {0}")]
    Openssl(#[from] openssl::error::ErrorStack),

    #[error("the stored password is not valid UTF-8")]
    Password,

    #[error("the bundle does not contain a certificate")]
    NoCertificate,

    #[error("could not parse certificate validity time: {0}")]
    Time(String),
}

/// Open a PKCS#12 bundle with the given password and extract the leaf
/// certificate's parsed details.
pub fn parse_identity_certificate(
    der: &[u8],
    password: &[u8],
) -> Result<CertificateDetails, Pkcs12Error> {
    let password = std::str::from_utf8(password).map_err(|_| Pkcs12Error::Password)?;
    let parsed = Pkcs12::from_der(der)?.parse2(password)?;
    let cert = parsed.cert.ok_or(Pkcs12Error::NoCertificate)?;

    let mut chain = String::new();
    if let Some(stack) = &parsed.ca {
        for ca in stack {
            chain.push_str(&String::from_utf8_lossy(&ca.to_pem()?));
        }
    }

    details_from_x509(&cert, chain)
}

fn details_from_x509(cert: &X509, chain: String) -> Result<CertificateDetails, Pkcs12Error> {
    let serial_number = cert.serial_number().to_bn()?.to_hex_str()?.to_string();
    let fingerprint = to_hex(&cert.digest(MessageDigest::sha256())?);

    let public_key_algorithm = match cert.public_key()?.id() {
        Id::RSA => "RSA",
        Id::EC => "ECDSA",
        Id::ED25519 => "Ed25519",
        Id::DSA => "DSA",
        _ => "UNKNOWN",
    };

    Ok(CertificateDetails {
        // Internal version numbering is zero-based; X.509v3 is version 2.
        version: i64::from(cert.version()) + 1,
        serial_number,
        signature: BASE64.encode(cert.signature().as_slice()),
        signature_algorithm: cert.signature_algorithm().object().to_string(),
        public_key_algorithm: public_key_algorithm.into(),
        subject: name_details(cert.subject_name()),
        issuer: name_details(cert.issuer_name()),
        not_before: asn1_to_rfc3339(cert.not_before())?,
        not_after: asn1_to_rfc3339(cert.not_after())?,
        fingerprint,
        revoked: false,
        data: BASE64.encode(cert.to_der()?),
        chain,
    })
}

fn name_entry(name: &X509NameRef, nid: Nid) -> String {
    name.entries_by_nid(nid)
        .next()
        .and_then(|entry| entry.data().as_utf8().ok())
        .map(|s| s.to_string())
        .unwrap_or_default()
}

fn name_details(name: &X509NameRef) -> CertificateName {
    CertificateName {
        common_name: name_entry(name, Nid::COMMONNAME),
        organization: name_entry(name, Nid::ORGANIZATIONNAME),
        organizational_unit: name_entry(name, Nid::ORGANIZATIONALUNITNAME),
        locality: name_entry(name, Nid::LOCALITYNAME),
        province: name_entry(name, Nid::STATEORPROVINCENAME),
        country: name_entry(name, Nid::COUNTRYNAME),
    }
}

// ASN.1 times render as e.g. "May  5 08:00:00 2026 GMT"; normalize the
// whitespace and reparse into RFC3339.
fn asn1_to_rfc3339(time: &Asn1TimeRef) -> Result<String, Pkcs12Error> {
    let repr = time.to_string();
    let parts: Vec<&str> = repr.split_whitespace().collect();
    if parts.len() < 4 {
        return Err(Pkcs12Error::Time(repr));
    }

    let normalized = format!("{} {} {} {}", parts[0], parts[1], parts[2], parts[3]);
    let parsed = NaiveDateTime::parse_from_str(&normalized, "%b %d %H:%M:%S %Y")
        .map_err(|err| Pkcs12Error::Time(format!("{repr}: {err}")))?;
    Ok(parsed.and_utc().to_rfc3339())
}

fn to_hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02x}", b)).collect()
}
