//! Step graph model: descriptors, fields and visibility overrides.

use std::collections::HashSet;

use serde::Serialize;

use crate::answers::AnswerStore;
use crate::answers::keys::reserved;
use crate::error::FlowError;
use crate::rules::{self, RuleSet};

/// How a field is rendered and what shape its answer takes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "options", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Email,
    Password,
    Number,
    Boolean,
    Checkbox,
    Choice(&'static [&'static str]),
    MultiChoice(&'static [&'static str]),
    List,
    File,
    Documents,
}

/// A single input on a step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    /// Shown with a "required" marker. Enforcement lives in the gate table.
    pub required: bool,
    /// Never written to the local mirror or the remote draft.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub sensitive: bool,
}

impl FieldDescriptor {
    pub const fn new(key: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            key,
            label,
            kind,
            required: false,
            sensitive: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

/// One screen of the questionnaire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepDescriptor {
    pub id: &'static str,
    pub label: &'static str,
    pub fields: Vec<FieldDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<RuleSet>,
}

impl StepDescriptor {
    pub fn new(id: &'static str, label: &'static str, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            id,
            label,
            fields,
            visibility: None,
        }
    }

    pub fn visible_when(mut self, rules: RuleSet) -> Self {
        self.visibility = Some(rules);
        self
    }
}

/// When an override applies.
#[derive(Debug, Clone, PartialEq)]
pub enum OverrideCondition {
    Rules(RuleSet),
    /// The controller was started from a remote draft.
    Resuming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideEffect {
    Show,
    Hide,
}

/// Forces a step visible or hidden regardless of its declared rule.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibilityOverride {
    pub step_id: &'static str,
    pub condition: OverrideCondition,
    pub effect: OverrideEffect,
}

/// Non-answer inputs to visibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisibilityContext {
    pub resuming: bool,
}

/// Ordered, immutable list of steps plus their overrides.
#[derive(Debug, Clone)]
pub struct StepGraph {
    steps: Vec<StepDescriptor>,
    overrides: Vec<VisibilityOverride>,
}

impl StepGraph {
    pub fn new(
        steps: Vec<StepDescriptor>,
        overrides: Vec<VisibilityOverride>,
    ) -> Result<Self, FlowError> {
        if steps.is_empty() {
            return Err(FlowError::InvalidGraph("graph has no steps".into()));
        }

        let mut seen = HashSet::new();
        for step in &steps {
            if !seen.insert(step.id) {
                return Err(FlowError::InvalidGraph(format!("duplicate step id {}", step.id)));
            }
        }

        if let Some(o) = overrides.iter().find(|o| !seen.contains(o.step_id)) {
            return Err(FlowError::InvalidGraph(format!(
                "override targets unknown step {}",
                o.step_id
            )));
        }

        Ok(Self { steps, overrides })
    }

    pub fn steps(&self) -> &[StepDescriptor] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&StepDescriptor> {
        self.steps.get(index)
    }

    pub fn find(&self, id: &str) -> Option<&StepDescriptor> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == id)
    }

    /// The terminal step id (last in the list).
    pub fn terminal_id(&self) -> &'static str {
        self.steps.last().map(|s| s.id).unwrap_or_default()
    }

    /// Whether `step` is currently relevant.
    ///
    /// Overrides are checked first, in order; the first match decides.
    pub fn is_visible(&self, step: &StepDescriptor, answers: &AnswerStore, ctx: VisibilityContext) -> bool {
        for o in self.overrides.iter().filter(|o| o.step_id == step.id) {
            let applies = match &o.condition {
                OverrideCondition::Rules(rules) => rules.is_satisfied(answers),
                OverrideCondition::Resuming => ctx.resuming,
            };
            if applies {
                return o.effect == OverrideEffect::Show;
            }
        }
        rules::visible(step.visibility.as_ref(), answers)
    }

    /// Steps currently relevant, in graph order.
    pub fn visible_steps(&self, answers: &AnswerStore, ctx: VisibilityContext) -> Vec<&StepDescriptor> {
        self.steps
            .iter()
            .filter(|s| self.is_visible(s, answers, ctx))
            .collect()
    }

    /// The descriptor for field `key`, on whichever step declares it.
    pub fn field(&self, key: &str) -> Option<&FieldDescriptor> {
        self.steps
            .iter()
            .flat_map(|s| s.fields.iter())
            .find(|f| f.key == key)
    }

    /// Keys the applicant may write.
    pub fn field_keys(&self) -> HashSet<&'static str> {
        self.steps
            .iter()
            .flat_map(|s| s.fields.iter().map(|f| f.key))
            .collect()
    }

    /// Field keys plus engine/server-written keys.
    pub fn known_keys(&self) -> HashSet<&'static str> {
        let mut keys = self.field_keys();
        keys.extend(reserved::ALL.iter().copied());
        keys
    }

    /// Keys that must never be persisted.
    pub fn sensitive_keys(&self) -> HashSet<&'static str> {
        self.steps
            .iter()
            .flat_map(|s| s.fields.iter())
            .filter(|f| f.sensitive)
            .map(|f| f.key)
            .collect()
    }
}
