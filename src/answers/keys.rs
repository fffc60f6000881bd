//! Answer keys shared across steps.
//!
//! Keys are global: later steps read what earlier steps (and the server) wrote.

// Account
pub const ACCOUNT_TYPE: &str = "account_type";
pub const AUTH_MODE: &str = "auth_mode";
pub const EMAIL: &str = "email";
pub const PASSWORD: &str = "password";

// Contact
pub const FIRST_NAME: &str = "first_name";
pub const LAST_NAME: &str = "last_name";
pub const PHONE: &str = "phone";
pub const COUNTRY: &str = "country";
pub const ADDRESS_LINE: &str = "address_line";
pub const CITY: &str = "city";
pub const POSTAL_CODE: &str = "postal_code";

// Identity
pub const ID_DOCUMENT_TYPE: &str = "id_document_type";
pub const ID_NUMBER: &str = "id_number";
pub const ID_FRONT_FILE: &str = "id_front_file";
pub const ID_BACK_FILE: &str = "id_back_file";

// Financial profile (individuals)
pub const EMPLOYMENT_STATUS: &str = "employment_status";
pub const EMPLOYER_NAME: &str = "employer_name";
pub const SOURCE_OF_FUNDS: &str = "source_of_funds";

// Business details
pub const LEGAL_NAME: &str = "legal_name";
pub const REGISTRATION_NUMBER: &str = "registration_number";
pub const INCORPORATION_COUNTRY: &str = "incorporation_country";
pub const REGISTERED_ADDRESS: &str = "registered_address";
pub const BUSINESS_ACTIVITIES: &str = "business_activities";

// Business classification
pub const OWNERSHIP_STRUCTURE: &str = "ownership_structure";
pub const HOLDS_CLIENT_ASSETS: &str = "holds_client_assets";
pub const USES_INTERMEDIARIES: &str = "uses_intermediaries";
pub const INTERMEDIARY_DETAILS: &str = "intermediary_details";

// Ownership
pub const BENEFICIAL_OWNERS: &str = "beneficial_owners";

// Questionnaire
pub const EXPECTED_MONTHLY_VOLUME: &str = "expected_monthly_volume";
pub const PEP_EXPOSURE: &str = "pep_exposure";
pub const PEP_DETAILS: &str = "pep_details";
pub const SANCTIONS_EXPOSURE: &str = "sanctions_exposure";

// Documents
pub const DOCUMENTS: &str = "documents";

// Declarations
pub const DECLARATION_ACCURATE: &str = "declaration_accurate";
pub const DECLARATION_TERMS: &str = "declaration_terms";
pub const DECLARATION_PRIVACY: &str = "declaration_privacy";
pub const DECLARATION_AUTHORISED_SIGNATORY: &str = "declaration_authorised_signatory";
pub const DECLARATION_BENEFICIAL_OWNERS: &str = "declaration_beneficial_owners";

/// Keys written by the engine or the server, never typed by the applicant.
pub mod reserved {
    pub const APPLICATION_ID: &str = "application_id";
    pub const APPLICANT_ID: &str = "applicant_id";
    pub const TENANT_ID: &str = "tenant_id";
    pub const EXTERNAL_REF: &str = "external_ref";
    pub const ID_FRONT_DOCUMENT: &str = "id_front_document";
    pub const ID_BACK_DOCUMENT: &str = "id_back_document";
    pub const DATE_OF_BIRTH: &str = "date_of_birth";
    pub const NATIONALITY: &str = "nationality";
    pub const RISK_RESOLUTION: &str = "risk_resolution";
    pub const LOW_RISK: &str = "low_risk";
    pub const FLOW_VARIANT: &str = "flow_variant";
    pub const MONITORING_LEVEL: &str = "monitoring_level";
    pub const REQUIRED_DOCUMENT_SETS: &str = "required_document_sets";
    pub const EVIDENCE_SUMMARY: &str = "evidence_summary";
    pub const SUBMITTED: &str = "submitted";
    pub const SUBMITTED_AT: &str = "submitted_at";

    pub const ALL: &[&str] = &[
        APPLICATION_ID,
        APPLICANT_ID,
        TENANT_ID,
        EXTERNAL_REF,
        ID_FRONT_DOCUMENT,
        ID_BACK_DOCUMENT,
        DATE_OF_BIRTH,
        NATIONALITY,
        RISK_RESOLUTION,
        LOW_RISK,
        FLOW_VARIANT,
        MONITORING_LEVEL,
        REQUIRED_DOCUMENT_SETS,
        EVIDENCE_SUMMARY,
        SUBMITTED,
        SUBMITTED_AT,
    ];
}

/// Values of the `account_type` answer.
pub mod account_types {
    pub const INDIVIDUAL: &str = "individual";
    pub const BUSINESS: &str = "business";
}

/// Values of the `auth_mode` answer.
pub mod auth_modes {
    pub const CREATE: &str = "create";
    pub const LOGIN: &str = "login";
}

/// Values of the `flow_variant` answer.
pub mod flow_variants {
    pub const BASIC: &str = "basic";
    pub const ADVANCED: &str = "advanced";
}
