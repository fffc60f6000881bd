//! The flat answer store and atomic patches.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::value::AnswerValue;

/// Flat key → value record holding every answer collected across the flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerStore {
    values: BTreeMap<String, AnswerValue>,
}

impl AnswerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a persisted JSON object.
    pub fn from_json_map(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            values: map
                .into_iter()
                .map(|(k, v)| (k, AnswerValue::from_json(v)))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&AnswerValue> {
        self.values.get(key)
    }

    /// Write a value. Returns the previous value, if any.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<AnswerValue>) -> Option<AnswerValue> {
        self.values.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<AnswerValue> {
        self.values.remove(key)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AnswerValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Whether `key` holds a present (truthy) value.
    pub fn has(&self, key: &str) -> bool {
        self.values.get(key).is_some_and(AnswerValue::is_present)
    }

    /// Trimmed non-empty text at `key`.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .and_then(AnswerValue::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(AnswerValue::as_bool)
    }

    /// `true` only when `key` holds an affirmative boolean.
    pub fn is_checked(&self, key: &str) -> bool {
        self.flag(key).unwrap_or(false)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(AnswerValue::as_number)
    }

    pub fn list(&self, key: &str) -> &[String] {
        self.values
            .get(key)
            .and_then(AnswerValue::as_list)
            .unwrap_or(&[])
    }

    pub fn object(&self, key: &str) -> Option<&serde_json::Map<String, serde_json::Value>> {
        self.values.get(key).and_then(AnswerValue::as_object)
    }

    /// Apply every write in `patch`, in order.
    pub fn apply(&mut self, patch: AnswerPatch) {
        for (key, value) in patch.writes {
            self.values.insert(key, value);
        }
    }

    /// JSON object suitable for persistence.
    ///
    /// Drops `excluded` keys and staged files, which have no durable form.
    pub fn to_persisted(&self, excluded: &HashSet<&str>) -> serde_json::Map<String, serde_json::Value> {
        self.values
            .iter()
            .filter(|(k, _)| !excluded.contains(k.as_str()))
            .filter_map(|(k, v)| v.to_json().map(|json| (k.clone(), json)))
            .collect()
    }
}

/// An ordered batch of writes applied to the store in one step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnswerPatch {
    writes: Vec<(String, AnswerValue)>,
}

impl AnswerPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style write.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AnswerValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<AnswerValue>) {
        self.writes.push((key.into(), value.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.writes.iter().map(|(k, _)| k.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&AnswerValue> {
        self.writes
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Append every write from `other`.
    pub fn extend(&mut self, other: AnswerPatch) {
        self.writes.extend(other.writes);
    }
}
