//! Submission gate: the terminal step's permission to submit.
//!
//! `can_submit` holds only when the declarations for the applicant's
//! category are all checked, the evidence summary reports nothing missing,
//! and the application has not been submitted already.

use serde::Serialize;

use crate::answers::AnswerStore;
use crate::answers::keys::{self, reserved};
use crate::services::{AccountType, EvidenceSummary};

const INDIVIDUAL_DECLARATIONS: &[&str] = &[
    keys::DECLARATION_ACCURATE,
    keys::DECLARATION_TERMS,
    keys::DECLARATION_PRIVACY,
];

const BUSINESS_DECLARATIONS: &[&str] = &[
    keys::DECLARATION_ACCURATE,
    keys::DECLARATION_TERMS,
    keys::DECLARATION_PRIVACY,
    keys::DECLARATION_AUTHORISED_SIGNATORY,
    keys::DECLARATION_BENEFICIAL_OWNERS,
];

/// Breakdown of the gate for renderers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionStatus {
    pub missing_declarations: Vec<&'static str>,
    /// `None` until an evidence summary has been loaded.
    pub missing_documents: Option<Vec<String>>,
    pub evidence_bypassed: bool,
    pub submitted: bool,
    pub can_submit: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SubmissionGate {
    bypass_evidence: bool,
}

impl SubmissionGate {
    pub fn new(bypass_evidence: bool) -> Self {
        Self { bypass_evidence }
    }

    /// Declarations required for the applicant's category.
    ///
    /// An unknown category gets the stricter business set.
    pub fn required_declarations(answers: &AnswerStore) -> &'static [&'static str] {
        match answers.text(keys::ACCOUNT_TYPE).and_then(AccountType::parse) {
            Some(AccountType::Individual) => INDIVIDUAL_DECLARATIONS,
            _ => BUSINESS_DECLARATIONS,
        }
    }

    pub fn missing_declarations(answers: &AnswerStore) -> Vec<&'static str> {
        Self::required_declarations(answers)
            .iter()
            .copied()
            .filter(|k| !answers.is_checked(k))
            .collect()
    }

    /// The cached evidence summary, if one has been loaded and parses.
    pub fn evidence(answers: &AnswerStore) -> Option<EvidenceSummary> {
        let raw = answers.object(reserved::EVIDENCE_SUMMARY)?;
        serde_json::from_value(serde_json::Value::Object(raw.clone())).ok()
    }

    pub fn evidence_complete(&self, answers: &AnswerStore) -> bool {
        self.bypass_evidence || Self::evidence(answers).is_some_and(|s| s.is_complete())
    }

    pub fn has_submitted(answers: &AnswerStore) -> bool {
        answers.is_checked(reserved::SUBMITTED)
    }

    pub fn can_submit(&self, answers: &AnswerStore) -> bool {
        !Self::has_submitted(answers)
            && Self::missing_declarations(answers).is_empty()
            && self.evidence_complete(answers)
    }

    pub fn status(&self, answers: &AnswerStore) -> SubmissionStatus {
        SubmissionStatus {
            missing_declarations: Self::missing_declarations(answers),
            missing_documents: Self::evidence(answers).map(|s| s.missing_document_types),
            evidence_bypassed: self.bypass_evidence,
            submitted: Self::has_submitted(answers),
            can_submit: self.can_submit(answers),
        }
    }
}
