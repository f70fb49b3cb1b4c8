//! IVMS101 legal person payload and the TRIXO questionnaire
//!
//! Only the subset of IVMS101 the directory actually reads is modeled here;
//! the full interVASP message standard lives with the compliance messaging
//! layer, not the directory.

use serde::{Deserialize, Serialize};

/// The category of business the registering organization declares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BusinessCategory {
    #[default]
    UnknownEntity,
    PrivateOrganization,
    GovernmentEntity,
    BusinessEntity,
    NonCommercialEntity,
}

/// Type codes for legal person name identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegalPersonNameTypeCode {
    /// Registered legal name
    #[serde(rename = "LEGL")]
    Legal,
    /// Short or abbreviated trading name
    #[serde(rename = "SHRT")]
    Short,
    /// Trading or doing-business-as name
    #[serde(rename = "TRAD")]
    Trading,
}

/// A single name identifier on a legal person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegalPersonNameId {
    pub legal_person_name: String,
    pub legal_person_name_identifier_type: LegalPersonNameTypeCode,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegalPersonName {
    #[serde(default)]
    pub name_identifiers: Vec<LegalPersonNameId>,
}

/// IVMS101 legal person subset carried on the VASP record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegalPerson {
    #[serde(default)]
    pub name: LegalPersonName,
    /// ISO-3166-1 alpha-2 country of registration
    #[serde(default)]
    pub country_of_registration: String,
}

impl LegalPerson {
    /// The registered legal name, preferring a LEGL identifier and falling
    /// back to the first identifier of any type.
    pub fn name(&self) -> Option<&str> {
        let ids = &self.name.name_identifiers;
        ids.iter()
            .find(|id| id.legal_person_name_identifier_type == LegalPersonNameTypeCode::Legal)
            .or_else(|| ids.first())
            .map(|id| id.legal_person_name.as_str())
    }
}

/// TRIXO questionnaire: the regulatory self-disclosure submitted alongside
/// the registration. The directory stores it verbatim for reviewers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrixoQuestionnaire {
    #[serde(default)]
    pub primary_national_jurisdiction: String,
    #[serde(default)]
    pub primary_regulator: String,
    #[serde(default)]
    pub financial_transfers_permitted: String,
    #[serde(default)]
    pub has_required_regulatory_program: String,
    #[serde(default)]
    pub conducts_customer_kyc: bool,
    #[serde(default)]
    pub kyc_threshold: f64,
    #[serde(default)]
    pub kyc_threshold_currency: String,
    #[serde(default)]
    pub must_comply_travel_rule: bool,
    #[serde(default)]
    pub applicable_regulations: Vec<String>,
    #[serde(default)]
    pub compliance_threshold: f64,
    #[serde(default)]
    pub compliance_threshold_currency: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_name_prefers_legl_identifier() {
        let person = LegalPerson {
            name: LegalPersonName {
                name_identifiers: vec![
                    LegalPersonNameId {
                        legal_person_name: "AliceCoin".into(),
                        legal_person_name_identifier_type: LegalPersonNameTypeCode::Short,
                    },
                    LegalPersonNameId {
                        legal_person_name: "AliceCoin Exchange, Ltd".into(),
                        legal_person_name_identifier_type: LegalPersonNameTypeCode::Legal,
                    },
                ],
            },
            country_of_registration: "US".into(),
        };

        assert_eq!(person.name(), Some("AliceCoin Exchange, Ltd"));
    }

    #[test]
    fn legal_name_falls_back_to_first_identifier() {
        let person = LegalPerson {
            name: LegalPersonName {
                name_identifiers: vec![LegalPersonNameId {
                    legal_person_name: "Bravo Digital".into(),
                    legal_person_name_identifier_type: LegalPersonNameTypeCode::Trading,
                }],
            },
            ..Default::default()
        };

        assert_eq!(person.name(), Some("Bravo Digital"));
    }
}
