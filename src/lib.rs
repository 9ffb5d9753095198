//! KYC Verification Engine
//!
//! Identity verification for customer onboarding:
//! - Segments hand photographs into finger regions
//! - Matches a selfie against the face on an identity document
//! - Screens the customer against sanctions, PEP and adverse-media lists
//! - Decides approve or needs-review from independent gates and notifies once
//! - Drives a session through its capture steps in strict order
//! - Keeps an auditable trail of every run and review
//!
//! ONE-SHOT LOOP:
//! INPUT → OCR → CLASSIFY → FACE MATCH → SCREEN → DECIDE → NOTIFY → AUDIT

pub mod api;
pub mod audit;
pub mod compliance;
pub mod config;
pub mod decision;
pub mod documents;
pub mod error;
pub mod facial;
mod http;
pub mod models;
pub mod notification;
pub mod orchestrator;
pub mod segmentation;
pub mod session;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use error::{KycError, Result};

// Re-export common types
pub use config::KycConfig;
pub use models::*;
