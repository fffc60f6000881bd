//! Step gate table: "may the applicant leave this step?"
//!
//! Gates are pure predicates over the answer store. Steps without a gate
//! are always permitted.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::answers::{AnswerStore, DocumentRef};
use crate::answers::keys::{self, account_types, auth_modes};
use crate::config::FlowConfig;

use super::catalog::step_ids;
use super::submission::SubmissionGate;

/// A single gate predicate.
pub type Gate = Arc<dyn Fn(&AnswerStore) -> bool + Send + Sync>;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// Map from step id to gate.
#[derive(Clone, Default)]
pub struct GateTable {
    gates: HashMap<&'static str, Gate>,
}

impl GateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, step_id: &'static str, gate: F)
    where
        F: Fn(&AnswerStore) -> bool + Send + Sync + 'static,
    {
        self.gates.insert(step_id, Arc::new(gate));
    }

    pub fn with<F>(mut self, step_id: &'static str, gate: F) -> Self
    where
        F: Fn(&AnswerStore) -> bool + Send + Sync + 'static,
    {
        self.register(step_id, gate);
        self
    }

    /// Evaluate the gate for `step_id`. Unknown ids are permitted.
    pub fn can_leave(&self, step_id: &str, answers: &AnswerStore) -> bool {
        self.gates.get(step_id).is_none_or(|gate| gate(answers))
    }

    pub fn contains(&self, step_id: &str) -> bool {
        self.gates.contains_key(step_id)
    }

    /// Gates for the built-in catalog.
    pub fn defaults(config: &FlowConfig, submission: SubmissionGate) -> Self {
        let min_password = config.min_password_length;

        Self::new()
            .with(step_ids::ACCOUNT, move |a| account_complete(a, min_password))
            .with(step_ids::CONTACT, |a| {
                all_present(a, &[keys::FIRST_NAME, keys::LAST_NAME, keys::PHONE, keys::COUNTRY])
            })
            .with(step_ids::IDENTITY, |a| {
                all_present(a, &[keys::ID_DOCUMENT_TYPE, keys::ID_NUMBER])
            })
            .with(step_ids::FINANCIAL_PROFILE, financial_profile_complete)
            .with(step_ids::BUSINESS_DETAILS, business_details_complete)
            .with(step_ids::BUSINESS_CLASSIFICATION, classification_complete)
            .with(step_ids::OWNERSHIP, |a| has_non_blank_item(a, keys::BENEFICIAL_OWNERS))
            .with(step_ids::QUESTIONNAIRE, questionnaire_complete)
            .with(step_ids::DOCUMENTS, documents_uploaded)
            .with(step_ids::REVIEW, move |a| submission.can_submit(a))
    }
}

fn all_present(answers: &AnswerStore, keys: &[&str]) -> bool {
    keys.iter().all(|k| answers.has(k))
}

fn has_non_blank_item(answers: &AnswerStore, key: &str) -> bool {
    answers.list(key).iter().any(|item| !item.trim().is_empty())
}

/// `dependent` is required only when `flag` is true.
fn conditionally_present(answers: &AnswerStore, flag: &str, dependent: &str) -> bool {
    !answers.is_checked(flag) || answers.has(dependent)
}

fn account_complete(answers: &AnswerStore, min_password: usize) -> bool {
    let account_type_ok = matches!(
        answers.text(keys::ACCOUNT_TYPE),
        Some(account_types::INDIVIDUAL | account_types::BUSINESS)
    );
    let email_ok = answers
        .text(keys::EMAIL)
        .is_some_and(|e| EMAIL_RE.is_match(e));
    let creating = answers.text(keys::AUTH_MODE).unwrap_or(auth_modes::CREATE) == auth_modes::CREATE;
    let password_ok = match answers.get(keys::PASSWORD).and_then(|v| v.as_str()) {
        Some(p) if creating => p.chars().count() >= min_password,
        Some(p) => !p.is_empty(),
        None => false,
    };
    account_type_ok && email_ok && password_ok
}

fn financial_profile_complete(answers: &AnswerStore) -> bool {
    let employer_ok = answers.text(keys::EMPLOYMENT_STATUS) != Some("employed")
        || answers.has(keys::EMPLOYER_NAME);
    answers.has(keys::EMPLOYMENT_STATUS) && employer_ok && !answers.list(keys::SOURCE_OF_FUNDS).is_empty()
}

/// Registration group AND address group AND at least one activity.
fn business_details_complete(answers: &AnswerStore) -> bool {
    let registration = all_present(
        answers,
        &[keys::LEGAL_NAME, keys::REGISTRATION_NUMBER, keys::INCORPORATION_COUNTRY],
    );
    let address = answers.has(keys::REGISTERED_ADDRESS);
    registration && address && has_non_blank_item(answers, keys::BUSINESS_ACTIVITIES)
}

fn classification_complete(answers: &AnswerStore) -> bool {
    answers.has(keys::OWNERSHIP_STRUCTURE)
        && answers.flag(keys::HOLDS_CLIENT_ASSETS).is_some()
        && answers.flag(keys::USES_INTERMEDIARIES).is_some()
        && conditionally_present(answers, keys::USES_INTERMEDIARIES, keys::INTERMEDIARY_DETAILS)
}

/// At least one entry, and every entry a reference the intake service issued.
fn documents_uploaded(answers: &AnswerStore) -> bool {
    answers.object(keys::DOCUMENTS).is_some_and(|docs| {
        !docs.is_empty()
            && docs.values().all(|entry| {
                serde_json::from_value::<DocumentRef>(entry.clone())
                    .is_ok_and(|doc| !doc.document_id.trim().is_empty())
            })
    })
}

fn questionnaire_complete(answers: &AnswerStore) -> bool {
    answers
        .number(keys::EXPECTED_MONTHLY_VOLUME)
        .is_some_and(|v| v > 0.0)
        && answers.flag(keys::PEP_EXPOSURE).is_some()
        && answers.flag(keys::SANCTIONS_EXPOSURE).is_some()
        && conditionally_present(answers, keys::PEP_EXPOSURE, keys::PEP_DETAILS)
}
