//! Wire types and constants for the batch enrollment API

use serde::{Deserialize, Serialize};

use crate::error::{CaError, Result};

/// Batch statuses the pipeline acts on. The CA emits other values while a
/// batch is still active; anything not listed here leaves the request in
/// PROCESSING.
pub const BATCH_STATUS_READY_FOR_DOWNLOAD: &str = "READY_FOR_DOWNLOAD";
pub const BATCH_STATUS_REJECTED: &str = "REJECTED";
pub const BATCH_STATUS_NOT_ACCEPTABLE: &str = "NOT_ACCEPTABLE";

/// End-entity profile taking only the common name and bundle password.
pub const PROFILE_CIPHER_TRACE_EE: &str = "CipherTraceEE";
/// End-entity profile carrying the full subject distinguished name.
pub const PROFILE_CIPHER_TRACE_END_ENTITY: &str = "CipherTraceEndEntityCertificate";

pub const PARAM_COMMON_NAME: &str = "commonName";
pub const PARAM_DNS_NAMES: &str = "dNSName";
pub const PARAM_PKCS12_PASSWORD: &str = "pkcs12Password";
pub const PARAM_ORGANIZATION_NAME: &str = "organizationName";
pub const PARAM_LOCALITY_NAME: &str = "localityName";
pub const PARAM_STATE_OR_PROVINCE_NAME: &str = "stateOrProvinceName";
pub const PARAM_COUNTRY_NAME: &str = "countryName";

/// Parameters a profile requires on every batch submission.
pub fn profile_required_params(profile: &str) -> Result<&'static [&'static str]> {
    match profile {
        PROFILE_CIPHER_TRACE_EE => Ok(&[PARAM_COMMON_NAME, PARAM_PKCS12_PASSWORD]),
        PROFILE_CIPHER_TRACE_END_ENTITY => Ok(&[
            PARAM_COMMON_NAME,
            PARAM_PKCS12_PASSWORD,
            PARAM_ORGANIZATION_NAME,
            PARAM_LOCALITY_NAME,
            PARAM_STATE_OR_PROVINCE_NAME,
            PARAM_COUNTRY_NAME,
        ]),
        _ => Err(CaError::UnknownProfile(profile.to_owned())),
    }
}

/// Reject a submission whose parameter map is missing anything the profile
/// requires, before the request ever reaches the CA.
pub fn validate_profile_params(
    profile: &str,
    params: &std::collections::HashMap<String, String>,
) -> Result<()> {
    for &required in profile_required_params(profile)? {
        if params.get(required).map_or(true, |v| v.is_empty()) {
            return Err(CaError::MissingParameter(required));
        }
    }
    Ok(())
}

/// Batch record as returned by submission and by the detail endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResponse {
    #[serde(default)]
    pub batch_id: i64,
    #[serde(default)]
    pub authority_id: i64,
    #[serde(default)]
    pub order_number: i64,
    /// RFC3339 creation time assigned by the CA
    #[serde(default)]
    pub creation_date: String,
    #[serde(default)]
    pub batch_name: String,
    /// May be empty on detail payloads; callers fall back to the status
    /// endpoint when it is.
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub reject_reason: String,
}

/// Processing counters for a batch: how many enrollments are still active,
/// how many succeeded, and how many failed.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ProcessingInfo {
    #[serde(default)]
    pub active: i64,
    #[serde(default)]
    pub success: i64,
    #[serde(default)]
    pub failed: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn ee_profile_requires_common_name_and_password() {
        let mut params = HashMap::new();
        params.insert(PARAM_COMMON_NAME.to_owned(), "trisa.example.com".to_owned());
        assert!(matches!(
            validate_profile_params(PROFILE_CIPHER_TRACE_EE, &params),
            Err(CaError::MissingParameter(PARAM_PKCS12_PASSWORD))
        ));

        params.insert(PARAM_PKCS12_PASSWORD.to_owned(), "qDhAwnfMjgDEzzUC".to_owned());
        assert!(validate_profile_params(PROFILE_CIPHER_TRACE_EE, &params).is_ok());
    }

    #[test]
    fn end_entity_profile_requires_subject_fields() {
        let mut params = HashMap::new();
        params.insert(PARAM_COMMON_NAME.to_owned(), "trisa.example.com".to_owned());
        params.insert(PARAM_PKCS12_PASSWORD.to_owned(), "qDhAwnfMjgDEzzUC".to_owned());
        params.insert(PARAM_ORGANIZATION_NAME.to_owned(), "TRISA Member VASP".to_owned());
        params.insert(PARAM_LOCALITY_NAME.to_owned(), "Menlo Park".to_owned());
        params.insert(PARAM_STATE_OR_PROVINCE_NAME.to_owned(), "California".to_owned());

        // countryName absent
        assert!(matches!(
            validate_profile_params(PROFILE_CIPHER_TRACE_END_ENTITY, &params),
            Err(CaError::MissingParameter(PARAM_COUNTRY_NAME))
        ));
    }

    #[test]
    fn unknown_profiles_are_refused() {
        let params = HashMap::new();
        assert!(matches!(
            validate_profile_params("NoSuchProfile", &params),
            Err(CaError::UnknownProfile(_))
        ));
    }
}
