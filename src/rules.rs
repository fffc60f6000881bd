//! Visibility rules: a small fixed predicate vocabulary over the answer store.
//!
//! A `RuleSet` is satisfied when every predicate is (logical AND). Missing
//! answers never match `equals` or `includesAny` and never satisfy `exists`.

use serde::{Deserialize, Serialize};

use crate::answers::{AnswerStore, AnswerValue};

/// A single predicate over one answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Predicate {
    /// String-coerced equality: `{"field": k, "equals": v}`. `v` may be any
    /// JSON scalar; it is coerced the same way as the answer.
    Equals {
        field: String,
        equals: serde_json::Value,
    },
    /// List membership or scalar membership: `{"field": k, "includesAny": [..]}`.
    IncludesAny {
        field: String,
        #[serde(rename = "includesAny")]
        includes_any: Vec<String>,
    },
    /// Truthiness: `{"field": k, "exists": true}`. `false` inverts the test.
    Exists { field: String, exists: bool },
}

impl Predicate {
    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Equals {
            field: field.into(),
            equals: serde_json::Value::String(value.into()),
        }
    }

    pub fn includes_any<I, S>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::IncludesAny {
            field: field.into(),
            includes_any: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Self::Exists {
            field: field.into(),
            exists: true,
        }
    }

    pub fn field(&self) -> &str {
        match self {
            Self::Equals { field, .. } | Self::IncludesAny { field, .. } | Self::Exists { field, .. } => {
                field
            }
        }
    }

    /// Evaluate against the store. Pure.
    pub fn matches(&self, answers: &AnswerStore) -> bool {
        let value = answers.get(self.field());
        match self {
            Self::Equals { equals, .. } => {
                let Some(expected) = AnswerValue::from_json(equals.clone()).coerce_string() else {
                    return false;
                };
                value
                    .and_then(|v| v.coerce_string())
                    .is_some_and(|s| s == expected)
            }
            Self::IncludesAny { includes_any, .. } => {
                value.is_some_and(|v| v.contains_any(includes_any))
            }
            Self::Exists { exists, .. } => {
                let present = value.is_some_and(|v| v.is_present());
                present == *exists
            }
        }
    }
}

/// Ordered conjunction of predicates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet(Vec<Predicate>);

impl RuleSet {
    pub fn new(predicates: Vec<Predicate>) -> Self {
        Self(predicates)
    }

    /// Single-predicate rule set.
    pub fn one(predicate: Predicate) -> Self {
        Self(vec![predicate])
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All predicates hold. Short-circuits on the first failure.
    pub fn is_satisfied(&self, answers: &AnswerStore) -> bool {
        self.0.iter().all(|p| p.matches(answers))
    }
}

/// Whether a step guarded by `rules` is visible. No rules ⇒ visible.
pub fn visible(rules: Option<&RuleSet>, answers: &AnswerStore) -> bool {
    rules.is_none_or(|r| r.is_satisfied(answers))
}
