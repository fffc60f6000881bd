//! KYC Onboard: dynamic onboarding flow engine for KYC/KYB applications.

pub mod answers;
pub mod config;
pub mod error;
pub mod onboarding;
pub mod rules;
pub mod services;
pub mod store;
