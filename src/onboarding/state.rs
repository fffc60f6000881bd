//! Flow state: the answers, the position and the per-session flags.

use serde::Serialize;
use uuid::Uuid;

use crate::answers::AnswerStore;
use crate::error::FlowError;
use crate::services::Session;

use super::model::{StepDescriptor, StepGraph, VisibilityContext};

/// Operational error scoped to the step that raised it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepError {
    pub step_id: String,
    pub message: String,
}

impl StepError {
    pub fn new(step_id: impl Into<String>, error: &FlowError) -> Self {
        Self {
            step_id: step_id.into(),
            message: error.to_string(),
        }
    }
}

/// Mutable state owned by the controller.
///
/// `position` indexes the full step list so a step keeps its identity as
/// visibility changes around it.
#[derive(Debug)]
pub struct FlowState {
    pub answers: AnswerStore,
    pub position: usize,
    pub show_validation_errors: bool,
    pub last_error: Option<StepError>,
    /// Set only when the flow was loaded from a remote draft.
    pub resume_mode: bool,
    pub session: Option<Session>,
    /// Sent with every submit attempt for this application.
    pub submission_key: Uuid,
}

impl Default for FlowState {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowState {
    pub fn new() -> Self {
        Self {
            answers: AnswerStore::new(),
            position: 0,
            show_validation_errors: false,
            last_error: None,
            resume_mode: false,
            session: None,
            submission_key: Uuid::new_v4(),
        }
    }

    pub fn context(&self) -> VisibilityContext {
        VisibilityContext {
            resuming: self.resume_mode,
        }
    }

    pub fn current_step<'g>(&self, graph: &'g StepGraph) -> Option<&'g StepDescriptor> {
        graph.get(self.position)
    }

    pub fn current_step_id(&self, graph: &StepGraph) -> &'static str {
        self.current_step(graph).map(|s| s.id).unwrap_or_default()
    }

    /// Ids of the visible steps, in order.
    pub fn visible_ids(&self, graph: &StepGraph) -> Vec<&'static str> {
        graph
            .visible_steps(&self.answers, self.context())
            .iter()
            .map(|s| s.id)
            .collect()
    }

    /// Position of the current step inside the visible subset.
    pub fn visible_index(&self, graph: &StepGraph) -> Option<usize> {
        let current = self.current_step(graph)?.id;
        self.visible_ids(graph).iter().position(|id| *id == current)
    }

    /// Move to `index`. Any step change clears the validation flag.
    pub fn move_to(&mut self, index: usize) -> bool {
        if index == self.position {
            return false;
        }
        self.position = index;
        self.show_validation_errors = false;
        true
    }

    /// Apply at most one position correction. Returns whether the step changed.
    pub fn repair(&mut self, graph: &StepGraph) -> bool {
        let repaired = repair_position(graph, &self.answers, self.context(), self.position);
        self.move_to(repaired)
    }
}

/// Where the flow should stand given the current visibility.
///
/// A visible current step stays put. Otherwise the first visible step at
/// or after `position` wins, then the last visible step, then index 0.
pub fn repair_position(
    graph: &StepGraph,
    answers: &AnswerStore,
    ctx: VisibilityContext,
    position: usize,
) -> usize {
    let visible: Vec<&str> = graph
        .visible_steps(answers, ctx)
        .iter()
        .map(|s| s.id)
        .collect();
    if visible.is_empty() {
        return 0;
    }
    if graph.get(position).is_some_and(|s| visible.contains(&s.id)) {
        return position;
    }

    graph
        .steps()
        .iter()
        .enumerate()
        .skip(position)
        .find(|(_, s)| visible.contains(&s.id))
        .map(|(i, _)| i)
        .or_else(|| visible.last().and_then(|id| graph.index_of(id)))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::keys::{self, reserved};
    use crate::onboarding::catalog::{kyc_step_graph, step_ids};
    use crate::onboarding::model::{FieldDescriptor, FieldKind};
    use crate::rules::{Predicate, RuleSet};

    fn business_state_at(graph: &StepGraph, step: &str) -> FlowState {
        let mut state = FlowState::new();
        state.answers.set(keys::ACCOUNT_TYPE, "business");
        state.position = graph.index_of(step).unwrap();
        state
    }

    #[test]
    fn visible_step_is_left_alone() {
        let graph = kyc_step_graph().unwrap();
        let mut state = business_state_at(&graph, step_ids::OWNERSHIP);
        state.show_validation_errors = true;
        assert!(!state.repair(&graph));
        assert!(state.show_validation_errors);
    }

    #[test]
    fn hidden_step_moves_forward() {
        let graph = kyc_step_graph().unwrap();
        let mut state = business_state_at(&graph, step_ids::QUESTIONNAIRE);
        state.answers.set(reserved::LOW_RISK, true);
        assert!(state.repair(&graph));
        assert_eq!(state.current_step_id(&graph), step_ids::DOCUMENTS);
    }

    #[test]
    fn switching_category_moves_to_next_visible() {
        let graph = kyc_step_graph().unwrap();
        let mut state = business_state_at(&graph, step_ids::BUSINESS_DETAILS);
        state.answers.set(keys::ACCOUNT_TYPE, "individual");
        state.repair(&graph);
        assert_eq!(state.current_step_id(&graph), step_ids::REVIEW);
        assert!(state.visible_ids(&graph).contains(&state.current_step_id(&graph)));
    }

    #[test]
    fn repair_is_idempotent() {
        let graph = kyc_step_graph().unwrap();
        let mut state = business_state_at(&graph, step_ids::QUESTIONNAIRE);
        state.answers.set(reserved::LOW_RISK, true);
        state.repair(&graph);
        let first = state.position;
        assert!(!state.repair(&graph));
        assert_eq!(state.position, first);
    }

    #[test]
    fn falls_back_to_last_visible_then_zero() {
        let gated = |id: &'static str| {
            StepDescriptor::new(id, id, vec![FieldDescriptor::new("x", "X", FieldKind::Text)])
                .visible_when(RuleSet::one(Predicate::exists(format!("show_{id}"))))
        };
        let graph = StepGraph::new(vec![gated("a"), gated("b"), gated("c")], vec![]).unwrap();

        let mut answers = AnswerStore::new();
        assert_eq!(repair_position(&graph, &answers, VisibilityContext::default(), 2), 0);

        answers.set("show_a", true);
        assert_eq!(repair_position(&graph, &answers, VisibilityContext::default(), 2), 0);

        answers.set("show_b", true);
        assert_eq!(repair_position(&graph, &answers, VisibilityContext::default(), 2), 1);
        assert_eq!(repair_position(&graph, &answers, VisibilityContext::default(), 99), 1);
    }

    #[test]
    fn moving_clears_validation_flag() {
        let mut state = FlowState::new();
        state.show_validation_errors = true;
        assert!(state.move_to(3));
        assert!(!state.show_validation_errors);
        assert_eq!(state.visible_index(&kyc_step_graph().unwrap()), None);
    }
}
