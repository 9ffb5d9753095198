//! Decision engine for KYC outcomes
//!
//! A flat OR of independent gates. Every gate is evaluated; each failing gate
//! contributes one required action, and any required action forces review.
//! The engine never rejects: rejection is a separate human decision.

use crate::compliance::{aggregate, ComplianceResult, RiskLevel};
use crate::documents::DocumentClassification;
use crate::facial::FacialMatchResult;
use crate::models::{Contact, CustomerStatus};
use crate::notification::{Notification, NotificationDelivery, Notifier};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Signals the engine decides on, gathered by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionInputs {
    pub id_document: DocumentClassification,
    pub address_document: DocumentClassification,
    pub facial_match: FacialMatchResult,
    pub compliance: ComplianceResult,
}

impl DecisionInputs {
    /// Re-derive every summary flag from the scores and categories it
    /// summarizes, against the given thresholds, so caller-supplied flags
    /// and thresholds cannot contradict them.
    pub fn rederived(&self, document_threshold: f64, facial_threshold: f64) -> Self {
        Self {
            id_document: self.id_document.reviewed_against(document_threshold),
            address_document: self.address_document.reviewed_against(document_threshold),
            facial_match: FacialMatchResult::new(self.facial_match.similarity_score, facial_threshold),
            compliance: aggregate(
                self.compliance.sanctions.clone(),
                self.compliance.pep.clone(),
                self.compliance.adverse_media.clone(),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResult {
    pub status: CustomerStatus,
    pub required_actions: Vec<String>,
}

impl DecisionResult {
    /// The one notification this outcome calls for.
    pub fn notification(&self) -> Notification {
        match self.status {
            CustomerStatus::Approved => Notification::Approval,
            _ => Notification::Review {
                required_actions: self.required_actions.clone(),
            },
        }
    }
}

/// A decision together with the notification it triggered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifiedDecision {
    pub decision: DecisionResult,
    pub notification: Notification,
    pub delivery: NotificationDelivery,
}

/// One independent condition that can force review.
pub trait DecisionGate: Send + Sync {
    fn name(&self) -> &'static str;

    /// Human-readable action added when the gate fails
    fn required_action(&self) -> &'static str;

    fn fails(&self, inputs: &DecisionInputs) -> bool;
}

pub struct DecisionEngine {
    gates: Vec<Box<dyn DecisionGate>>,
}

impl DecisionEngine {
    pub fn new() -> Self {
        Self { gates: Vec::new() }
    }

    pub fn add_gate(&mut self, gate: Box<dyn DecisionGate>) {
        self.gates.push(gate);
    }

    pub fn gate_names(&self) -> Vec<&'static str> {
        self.gates.iter().map(|g| g.name()).collect()
    }

    /// Evaluate every gate in registration order (pure).
    pub fn decide(&self, inputs: &DecisionInputs) -> DecisionResult {
        let required_actions: Vec<String> = self
            .gates
            .iter()
            .filter(|gate| gate.fails(inputs))
            .map(|gate| gate.required_action().to_string())
            .collect();

        if inputs.compliance.risk_level == RiskLevel::Unknown {
            warn!("Compliance risk unknown: one or more screening categories errored");
        }

        let status = if required_actions.is_empty() {
            CustomerStatus::Approved
        } else {
            CustomerStatus::NeedsReview
        };

        info!(
            gate_count = self.gates.len(),
            status = %status,
            required_actions = required_actions.len(),
            "Decision completed"
        );

        DecisionResult {
            status,
            required_actions,
        }
    }

    /// Decide, then dispatch exactly one notification.
    ///
    /// Delivery failures are reported in the result and never change the decision.
    pub async fn decide_and_notify(
        &self,
        inputs: &DecisionInputs,
        contact: &Contact,
        notifier: &dyn Notifier,
    ) -> NotifiedDecision {
        let decision = self.decide(inputs);
        let notification = decision.notification();
        let delivery = notifier.notify(&notification, contact).await;

        NotifiedDecision {
            decision,
            notification,
            delivery,
        }
    }
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new()
    }
}

//
// ================= Gates =================
//

pub struct IdDocumentGate;

impl DecisionGate for IdDocumentGate {
    fn name(&self) -> &'static str {
        "id_document_classification"
    }

    fn required_action(&self) -> &'static str {
        "ID document verification needs review"
    }

    fn fails(&self, inputs: &DecisionInputs) -> bool {
        inputs.id_document.needs_review
    }
}

pub struct AddressDocumentGate;

impl DecisionGate for AddressDocumentGate {
    fn name(&self) -> &'static str {
        "address_document_classification"
    }

    fn required_action(&self) -> &'static str {
        "Address document verification needs review"
    }

    fn fails(&self, inputs: &DecisionInputs) -> bool {
        inputs.address_document.needs_review
    }
}

pub struct FacialMatchGate;

impl DecisionGate for FacialMatchGate {
    fn name(&self) -> &'static str {
        "facial_match"
    }

    fn required_action(&self) -> &'static str {
        "Facial verification failed"
    }

    fn fails(&self, inputs: &DecisionInputs) -> bool {
        !inputs.facial_match.verified
    }
}

/// Fires on `High` only; an `Unknown` level is surfaced through the
/// errored category records, not turned into a match.
pub struct ComplianceRiskGate;

impl DecisionGate for ComplianceRiskGate {
    fn name(&self) -> &'static str {
        "compliance_risk"
    }

    fn required_action(&self) -> &'static str {
        "Compliance check requires review"
    }

    fn fails(&self, inputs: &DecisionInputs) -> bool {
        inputs.compliance.risk_level == RiskLevel::High
    }
}

/// Engine with the four standard gates in reporting order.
pub fn create_default_decision_engine() -> DecisionEngine {
    let mut engine = DecisionEngine::new();
    engine.add_gate(Box::new(IdDocumentGate));
    engine.add_gate(Box::new(AddressDocumentGate));
    engine.add_gate(Box::new(FacialMatchGate));
    engine.add_gate(Box::new(ComplianceRiskGate));
    engine
}

//
// ================= Tests =================
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance::{aggregate, ScreeningCategory, ScreeningCategoryResult, ScreeningHit};
    use crate::notification::DeliveryStatus;
    use crate::testing::{classification, contact, passing_inputs, RecordingNotifier};

    fn compliance(sanctions_hit: bool) -> ComplianceResult {
        let hits = if sanctions_hit {
            vec![ScreeningHit {
                name: "Jane Doe".into(),
                score: 0.9,
                source: "ofac".into(),
                url: None,
            }]
        } else {
            vec![]
        };
        aggregate(
            ScreeningCategoryResult::completed(ScreeningCategory::Sanctions, hits),
            ScreeningCategoryResult::completed(ScreeningCategory::Pep, vec![]),
            ScreeningCategoryResult::completed(ScreeningCategory::AdverseMedia, vec![]),
        )
    }

    #[test]
    fn test_all_gates_pass_is_approved() {
        let engine = create_default_decision_engine();
        let result = engine.decide(&passing_inputs());

        assert_eq!(result.status, CustomerStatus::Approved);
        assert!(result.required_actions.is_empty());
    }

    #[test]
    fn test_each_gate_alone_forces_review() {
        let engine = create_default_decision_engine();

        let mut inputs = passing_inputs();
        inputs.id_document = classification(0.5);
        assert_eq!(
            engine.decide(&inputs).required_actions,
            vec!["ID document verification needs review"]
        );

        let mut inputs = passing_inputs();
        inputs.address_document = classification(0.5);
        assert_eq!(
            engine.decide(&inputs).required_actions,
            vec!["Address document verification needs review"]
        );

        let mut inputs = passing_inputs();
        inputs.facial_match = FacialMatchResult::new(0.4, 0.9);
        assert_eq!(
            engine.decide(&inputs).required_actions,
            vec!["Facial verification failed"]
        );

        let mut inputs = passing_inputs();
        inputs.compliance = compliance(true);
        let result = engine.decide(&inputs);
        assert_eq!(result.status, CustomerStatus::NeedsReview);
        assert_eq!(result.required_actions, vec!["Compliance check requires review"]);
    }

    #[test]
    fn test_actions_are_union_in_gate_order() {
        let engine = create_default_decision_engine();
        let inputs = DecisionInputs {
            id_document: classification(0.5),
            address_document: classification(0.5),
            facial_match: FacialMatchResult::new(0.1, 0.9),
            compliance: compliance(true),
        };

        let result = engine.decide(&inputs);
        assert_eq!(
            result.required_actions,
            vec![
                "ID document verification needs review",
                "Address document verification needs review",
                "Facial verification failed",
                "Compliance check requires review",
            ]
        );
    }

    #[test]
    fn test_rederived_ignores_contradicting_flags() {
        let engine = create_default_decision_engine();
        let mut inputs = passing_inputs();
        inputs.id_document.confidence = 0.05;
        inputs.id_document.needs_review = false;
        inputs.facial_match = FacialMatchResult {
            similarity_score: 0.10,
            verified: true,
            threshold: 0.05,
        };
        inputs.compliance.risk_level = RiskLevel::Low;
        inputs.compliance.sanctions = compliance(true).sanctions;

        let rederived = inputs.rederived(0.85, 0.9);
        assert_eq!(rederived.facial_match.threshold, 0.9);

        let result = engine.decide(&rederived);
        assert_eq!(result.status, CustomerStatus::NeedsReview);
        assert_eq!(
            result.required_actions,
            vec![
                "ID document verification needs review",
                "Facial verification failed",
                "Compliance check requires review",
            ]
        );
    }

    #[test]
    fn test_unknown_risk_does_not_add_compliance_action() {
        let engine = create_default_decision_engine();
        let mut inputs = passing_inputs();
        inputs.compliance = aggregate(
            ScreeningCategoryResult::failed(ScreeningCategory::Sanctions, "HTTP 500"),
            ScreeningCategoryResult::completed(ScreeningCategory::Pep, vec![]),
            ScreeningCategoryResult::completed(ScreeningCategory::AdverseMedia, vec![]),
        );

        let result = engine.decide(&inputs);
        assert_eq!(inputs.compliance.risk_level, RiskLevel::Unknown);
        assert!(result.required_actions.is_empty());
    }

    #[tokio::test]
    async fn test_decide_and_notify_sends_one_review_notification() {
        let engine = create_default_decision_engine();
        let notifier = RecordingNotifier::default();
        let mut inputs = passing_inputs();
        inputs.facial_match = FacialMatchResult::new(0.2, 0.9);

        let outcome = engine.decide_and_notify(&inputs, &contact(), &notifier).await;

        assert_eq!(outcome.decision.status, CustomerStatus::NeedsReview);
        assert_eq!(
            outcome.notification,
            Notification::Review {
                required_actions: vec!["Facial verification failed".into()]
            }
        );
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_delivery_keeps_decision() {
        let engine = create_default_decision_engine();
        let notifier = RecordingNotifier::failing();

        let outcome = engine
            .decide_and_notify(&passing_inputs(), &contact(), &notifier)
            .await;

        assert_eq!(outcome.decision.status, CustomerStatus::Approved);
        assert_eq!(outcome.notification, Notification::Approval);
        assert_eq!(outcome.delivery.email.status, DeliveryStatus::Failed);
    }

    #[test]
    fn test_default_gate_order() {
        let engine = create_default_decision_engine();
        assert_eq!(
            engine.gate_names(),
            vec![
                "id_document_classification",
                "address_document_classification",
                "facial_match",
                "compliance_risk"
            ]
        );
    }
}
