//! The KYC/KYB questionnaire, authored once.

use crate::answers::keys::{self, account_types, flow_variants, reserved};
use crate::error::FlowError;
use crate::rules::{Predicate, RuleSet};

use super::model::{
    FieldDescriptor as F, FieldKind, OverrideCondition, OverrideEffect, StepDescriptor, StepGraph,
    VisibilityOverride,
};

/// Stable step ids. Persisted in drafts, so never rename.
pub mod step_ids {
    pub const ACCOUNT: &str = "account";
    pub const CONTACT: &str = "contact";
    pub const IDENTITY: &str = "identity";
    pub const FINANCIAL_PROFILE: &str = "financial_profile";
    pub const BUSINESS_DETAILS: &str = "business_details";
    pub const BUSINESS_CLASSIFICATION: &str = "business_classification";
    pub const OWNERSHIP: &str = "ownership";
    pub const QUESTIONNAIRE: &str = "questionnaire";
    pub const DOCUMENTS: &str = "documents";
    pub const REVIEW: &str = "review";
}

const ACCOUNT_TYPES: &[&str] = &[account_types::INDIVIDUAL, account_types::BUSINESS];
const AUTH_MODES: &[&str] = &[keys::auth_modes::CREATE, keys::auth_modes::LOGIN];
const ID_DOCUMENT_TYPES: &[&str] = &["passport", "national_id", "driving_licence"];
const EMPLOYMENT_STATUSES: &[&str] = &["employed", "self_employed", "unemployed", "retired", "student"];
const FUND_SOURCES: &[&str] = &["salary", "savings", "investments", "inheritance", "business_income", "other"];
const OWNERSHIP_STRUCTURES: &[&str] = &["direct", "layered", "trust", "publicly_listed"];

fn is_business() -> Predicate {
    Predicate::equals(keys::ACCOUNT_TYPE, account_types::BUSINESS)
}

/// Build the default onboarding graph. Fails only if the catalog itself is malformed.
pub fn kyc_step_graph() -> Result<StepGraph, FlowError> {
    use step_ids::*;

    let steps = vec![
        StepDescriptor::new(
            ACCOUNT,
            "Create your account",
            vec![
                F::new(keys::ACCOUNT_TYPE, "I am applying as", FieldKind::Choice(ACCOUNT_TYPES)).required(),
                F::new(keys::AUTH_MODE, "New or returning", FieldKind::Choice(AUTH_MODES)),
                F::new(keys::EMAIL, "Email address", FieldKind::Email).required(),
                F::new(keys::PASSWORD, "Password", FieldKind::Password)
                    .required()
                    .sensitive(),
            ],
        ),
        StepDescriptor::new(
            CONTACT,
            "Contact details",
            vec![
                F::new(keys::FIRST_NAME, "First name", FieldKind::Text).required(),
                F::new(keys::LAST_NAME, "Last name", FieldKind::Text).required(),
                F::new(keys::PHONE, "Phone number", FieldKind::Text).required(),
                F::new(keys::COUNTRY, "Country of residence", FieldKind::Text).required(),
                F::new(keys::ADDRESS_LINE, "Address", FieldKind::Text),
                F::new(keys::CITY, "City", FieldKind::Text),
                F::new(keys::POSTAL_CODE, "Postal code", FieldKind::Text),
            ],
        ),
        StepDescriptor::new(
            IDENTITY,
            "Verify your identity",
            vec![
                F::new(keys::ID_DOCUMENT_TYPE, "Document type", FieldKind::Choice(ID_DOCUMENT_TYPES))
                    .required(),
                F::new(keys::ID_NUMBER, "Document number", FieldKind::Text).required(),
                F::new(keys::ID_FRONT_FILE, "Front of document", FieldKind::File),
                F::new(keys::ID_BACK_FILE, "Back of document", FieldKind::File),
            ],
        ),
        StepDescriptor::new(
            FINANCIAL_PROFILE,
            "Financial profile",
            vec![
                F::new(keys::EMPLOYMENT_STATUS, "Employment status", FieldKind::Choice(EMPLOYMENT_STATUSES))
                    .required(),
                F::new(keys::EMPLOYER_NAME, "Employer", FieldKind::Text),
                F::new(keys::SOURCE_OF_FUNDS, "Source of funds", FieldKind::MultiChoice(FUND_SOURCES))
                    .required(),
            ],
        )
        .visible_when(RuleSet::one(Predicate::equals(
            keys::ACCOUNT_TYPE,
            account_types::INDIVIDUAL,
        ))),
        StepDescriptor::new(
            BUSINESS_DETAILS,
            "Business details",
            vec![
                F::new(keys::LEGAL_NAME, "Registered legal name", FieldKind::Text).required(),
                F::new(keys::REGISTRATION_NUMBER, "Company registration number", FieldKind::Text)
                    .required(),
                F::new(keys::INCORPORATION_COUNTRY, "Country of incorporation", FieldKind::Text)
                    .required(),
                F::new(keys::REGISTERED_ADDRESS, "Registered address", FieldKind::Text).required(),
                F::new(keys::BUSINESS_ACTIVITIES, "Business activities", FieldKind::List).required(),
            ],
        )
        .visible_when(RuleSet::one(is_business())),
        StepDescriptor::new(
            BUSINESS_CLASSIFICATION,
            "Business classification",
            vec![
                F::new(
                    keys::OWNERSHIP_STRUCTURE,
                    "Ownership structure",
                    FieldKind::Choice(OWNERSHIP_STRUCTURES),
                )
                .required(),
                F::new(keys::HOLDS_CLIENT_ASSETS, "Do you hold client assets?", FieldKind::Boolean)
                    .required(),
                F::new(keys::USES_INTERMEDIARIES, "Do you act through intermediaries?", FieldKind::Boolean)
                    .required(),
                F::new(keys::INTERMEDIARY_DETAILS, "Intermediary details", FieldKind::Text),
            ],
        )
        .visible_when(RuleSet::one(is_business())),
        StepDescriptor::new(
            OWNERSHIP,
            "Beneficial owners",
            vec![F::new(keys::BENEFICIAL_OWNERS, "Beneficial owners (25%+)", FieldKind::List).required()],
        )
        .visible_when(RuleSet::one(is_business())),
        StepDescriptor::new(
            QUESTIONNAIRE,
            "Enhanced due diligence",
            vec![
                F::new(keys::EXPECTED_MONTHLY_VOLUME, "Expected monthly volume", FieldKind::Number)
                    .required(),
                F::new(keys::PEP_EXPOSURE, "Any politically exposed persons?", FieldKind::Boolean)
                    .required(),
                F::new(keys::PEP_DETAILS, "PEP details", FieldKind::Text),
                F::new(keys::SANCTIONS_EXPOSURE, "Exposure to sanctioned countries?", FieldKind::Boolean)
                    .required(),
            ],
        )
        .visible_when(RuleSet::one(is_business())),
        StepDescriptor::new(
            DOCUMENTS,
            "Supporting documents",
            vec![F::new(keys::DOCUMENTS, "Upload documents", FieldKind::Documents).required()],
        )
        .visible_when(RuleSet::one(Predicate::equals(
            reserved::FLOW_VARIANT,
            flow_variants::ADVANCED,
        ))),
        StepDescriptor::new(
            REVIEW,
            "Review and submit",
            vec![
                F::new(keys::DECLARATION_ACCURATE, "The information provided is accurate", FieldKind::Checkbox)
                    .required(),
                F::new(keys::DECLARATION_TERMS, "I accept the terms of service", FieldKind::Checkbox)
                    .required(),
                F::new(keys::DECLARATION_PRIVACY, "I have read the privacy notice", FieldKind::Checkbox)
                    .required(),
                F::new(
                    keys::DECLARATION_AUTHORISED_SIGNATORY,
                    "I am authorised to act for the business",
                    FieldKind::Checkbox,
                ),
                F::new(
                    keys::DECLARATION_BENEFICIAL_OWNERS,
                    "All beneficial owners have been disclosed",
                    FieldKind::Checkbox,
                ),
            ],
        ),
    ];

    let overrides = vec![
        VisibilityOverride {
            step_id: ACCOUNT,
            condition: OverrideCondition::Resuming,
            effect: OverrideEffect::Hide,
        },
        VisibilityOverride {
            step_id: QUESTIONNAIRE,
            condition: OverrideCondition::Rules(RuleSet::one(Predicate::equals(
                reserved::LOW_RISK,
                "true",
            ))),
            effect: OverrideEffect::Hide,
        },
        VisibilityOverride {
            step_id: DOCUMENTS,
            condition: OverrideCondition::Rules(RuleSet::one(is_business())),
            effect: OverrideEffect::Show,
        },
    ];

    StepGraph::new(steps, overrides)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::AnswerStore;
    use crate::onboarding::model::VisibilityContext;

    fn visible_ids(answers: &AnswerStore) -> Vec<&'static str> {
        kyc_step_graph()
            .unwrap()
            .visible_steps(answers, VisibilityContext::default())
            .iter()
            .map(|s| s.id)
            .collect()
    }

    #[test]
    fn catalog_is_valid_and_ends_with_review() {
        let graph = kyc_step_graph().unwrap();
        assert_eq!(graph.len(), 10);
        assert_eq!(graph.get(0).unwrap().id, step_ids::ACCOUNT);
        assert_eq!(graph.terminal_id(), step_ids::REVIEW);
        assert!(graph.sensitive_keys().contains(keys::PASSWORD));
    }

    #[test]
    fn fresh_answers_show_common_steps() {
        let ids = visible_ids(&AnswerStore::new());
        assert_eq!(
            ids,
            vec![step_ids::ACCOUNT, step_ids::CONTACT, step_ids::IDENTITY, step_ids::REVIEW]
        );
    }

    #[test]
    fn individual_path() {
        let mut answers = AnswerStore::new();
        answers.set(keys::ACCOUNT_TYPE, account_types::INDIVIDUAL);
        let ids = visible_ids(&answers);
        assert!(ids.contains(&step_ids::FINANCIAL_PROFILE));
        assert!(!ids.contains(&step_ids::BUSINESS_DETAILS));
        assert!(!ids.contains(&step_ids::DOCUMENTS));
    }

    #[test]
    fn low_risk_business_hides_questionnaire_but_keeps_documents() {
        let mut answers = AnswerStore::new();
        answers.set(keys::ACCOUNT_TYPE, account_types::BUSINESS);
        let before = visible_ids(&answers);
        assert!(before.contains(&step_ids::QUESTIONNAIRE));
        assert!(before.contains(&step_ids::DOCUMENTS));

        answers.set(reserved::LOW_RISK, true);
        answers.set(reserved::FLOW_VARIANT, flow_variants::BASIC);
        let after = visible_ids(&answers);
        assert!(!after.contains(&step_ids::QUESTIONNAIRE));
        assert!(after.contains(&step_ids::DOCUMENTS));
    }

    #[test]
    fn resume_hides_account_step() {
        let graph = kyc_step_graph().unwrap();
        let ids: Vec<_> = graph
            .visible_steps(&AnswerStore::new(), VisibilityContext { resuming: true })
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids[0], step_ids::CONTACT);
    }
}
