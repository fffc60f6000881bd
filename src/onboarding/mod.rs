//! Onboarding flow engine.
//!
//! The applicant moves through an ordered step graph whose visible subset
//! is recomputed from the answers on every change. Leaving a step consults
//! the gate table, then runs the step's transition action; the terminal
//! step is guarded by the submission gate.

pub mod actions;
pub mod catalog;
pub mod controller;
pub mod gates;
pub mod model;
pub mod routes;
pub mod state;
pub mod submission;

pub use actions::{ActionContext, ActionOutput, ActionTable, TransitionAction};
pub use catalog::{kyc_step_graph, step_ids};
pub use controller::{FlowController, FlowSnapshot, Navigation, SaveOutcome, SubmitOutcome};
pub use gates::GateTable;
pub use model::{FieldDescriptor, FieldKind, StepDescriptor, StepGraph, VisibilityContext};
pub use routes::{OnboardingRouteState, onboarding_routes};
pub use state::{FlowState, StepError};
pub use submission::{SubmissionGate, SubmissionStatus};
