//! One-shot KYC orchestration
//!
//! INPUT → OCR → CLASSIFY → FACE MATCH → SCREEN → DECIDE → NOTIFY → AUDIT
//!
//! Collaborator failures in OCR, classification or face matching fail the
//! run with the collaborator's message. Screening failures degrade their
//! category instead.

use crate::audit::{compute_fingerprint, digest_bytes, ApplicationDigest, AuditEvent, AuditLog, AuditRecord};
use crate::compliance::{ComplianceScreener, ComplyAdvantageClient, ScreeningProvider};
use crate::config::KycConfig;
use crate::decision::{create_default_decision_engine, DecisionEngine, DecisionInputs};
use crate::documents::{DocumentClassifier, HttpTextExtractor, KeywordDocumentClassifier, TextExtractor};
use crate::error::KycError;
use crate::facial::{match_faces, FacePlusPlusClient, FaceService};
use crate::models::{
    ComplianceCheckRecord, Contact, CustomerRecord, DocumentRecord, DocumentRole,
    FacialMatchRecord, NotificationRecord, ReviewDecision, ReviewRecord,
};
use crate::notification::{ChannelNotifier, Notification, NotificationDelivery, Notifier, SendGridEmail, TwilioSms};
use crate::Result;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

const DEFAULT_REJECTION_REASON: &str = "Verification could not be completed";

/// Everything a subject submits for a one-shot run.
#[derive(Debug, Clone)]
pub struct KycApplication {
    pub contact: Contact,
    pub id_document: Vec<u8>,
    pub address_document: Vec<u8>,
    pub selfie: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KycReport {
    pub customer: CustomerRecord,
    pub required_actions: Vec<String>,
    pub audit_id: Uuid,
    pub reasoning_trace: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewOutcome {
    pub customer: CustomerRecord,
    pub review: ReviewRecord,
    pub delivery: NotificationDelivery,
    pub audit_id: Uuid,
}

/// External services the orchestrator depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub text_extractor: Arc<dyn TextExtractor>,
    pub classifier: Arc<dyn DocumentClassifier>,
    pub faces: Arc<dyn FaceService>,
    pub screening: Arc<dyn ScreeningProvider>,
    pub notifier: Arc<dyn Notifier>,
}

impl Collaborators {
    /// HTTP-backed collaborators. Missing credentials fail per call, not here.
    pub fn from_config(config: &KycConfig) -> Result<Self> {
        let services = &config.services;

        Ok(Self {
            text_extractor: Arc::new(HttpTextExtractor::new(services.ocr_api_url.as_deref())?),
            classifier: Arc::new(KeywordDocumentClassifier::new(
                config.document_classification_threshold,
            )),
            faces: Arc::new(FacePlusPlusClient::from_endpoints(services)?),
            screening: Arc::new(ComplyAdvantageClient::from_endpoints(services)?),
            notifier: Arc::new(ChannelNotifier::new(
                Arc::new(SendGridEmail::from_endpoints(services)?),
                Arc::new(TwilioSms::from_endpoints(services)?),
            )),
        })
    }
}

/// One-shot KYC runs with status lookup and human review.
///
/// Customer records are retained for the life of the process: status and
/// review stay answerable for every customer ever run. Durable storage with
/// a retention policy belongs behind a store seam like `SessionStore`.
pub struct KycOrchestrator {
    config: Arc<KycConfig>,
    collaborators: Collaborators,
    screener: ComplianceScreener,
    engine: Arc<DecisionEngine>,
    customers: Arc<RwLock<HashMap<Uuid, CustomerRecord>>>,
    audit_log: Arc<AuditLog>,
}

impl KycOrchestrator {
    pub fn new(config: Arc<KycConfig>, collaborators: Collaborators) -> Self {
        Self {
            screener: ComplianceScreener::new(collaborators.screening.clone()),
            engine: Arc::new(create_default_decision_engine()),
            customers: Arc::new(RwLock::new(HashMap::new())),
            audit_log: Arc::new(AuditLog::new()),
            config,
            collaborators,
        }
    }

    pub fn audit_log(&self) -> Arc<AuditLog> {
        self.audit_log.clone()
    }

    /// Run the full verification for one application.
    pub async fn run(&self, application: KycApplication) -> Result<KycReport> {
        let start_time = Instant::now();
        let mut reasoning_trace = Vec::new();
        let contact = &application.contact;
        contact.validate()?;

        info!(email = %contact.email, "KYC run: starting");
        reasoning_trace.push(format!("INPUT: Application received for {}", contact.full_name()));

        let digest = ApplicationDigest::new(
            contact,
            &application.id_document,
            &application.address_document,
            &application.selfie,
        );

        // === OCR ===
        let extractor = &self.collaborators.text_extractor;
        let (id_text, address_text) = tokio::try_join!(
            extractor.extract_text(&application.id_document),
            extractor.extract_text(&application.address_document),
        )?;
        reasoning_trace.push("OCR: 2 documents extracted".to_string());

        // === CLASSIFY ===
        let classifier = &self.collaborators.classifier;
        let (id_class, address_class) = tokio::try_join!(
            classifier.classify(&id_text.text),
            classifier.classify(&address_text.text),
        )?;
        reasoning_trace.push(format!(
            "CLASSIFY: id={} ({:.2}), address={} ({:.2})",
            id_class.predicted_class,
            id_class.confidence,
            address_class.predicted_class,
            address_class.confidence
        ));

        // === FACE MATCH ===
        let facial_match = match_faces(
            self.collaborators.faces.as_ref(),
            &application.id_document,
            &application.selfie,
            self.config.facial_match_threshold,
        )
        .await?;
        reasoning_trace.push(format!(
            "FACE: similarity {:.2} against {:.2} ({})",
            facial_match.similarity_score,
            facial_match.threshold,
            if facial_match.verified { "verified" } else { "not verified" }
        ));

        // === SCREEN ===
        let compliance = self.screener.screen(&contact.full_name()).await;
        reasoning_trace.push(format!("SCREEN: risk {}", compliance.risk_level));

        let mut customer = CustomerRecord::new(contact.clone());
        customer.add_document(DocumentRecord::new(
            DocumentRole::Identity,
            id_text,
            id_class.clone(),
            digest.id_document_sha256.clone(),
        ));
        customer.add_document(DocumentRecord::new(
            DocumentRole::Address,
            address_text,
            address_class.clone(),
            digest.address_document_sha256.clone(),
        ));
        customer.set_facial_match(FacialMatchRecord::from(&facial_match));
        for category in compliance.categories() {
            customer.add_compliance_check(ComplianceCheckRecord::from(category));
        }
        let risk_level = compliance.risk_level;

        // === DECIDE + NOTIFY ===
        let inputs = DecisionInputs {
            id_document: id_class,
            address_document: address_class,
            facial_match,
            compliance,
        };
        let outcome = self
            .engine
            .decide_and_notify(&inputs, contact, self.collaborators.notifier.as_ref())
            .await;

        customer.record_decision(&outcome.decision)?;
        reasoning_trace.push(format!(
            "DECIDE: {} ({} required actions)",
            outcome.decision.status,
            outcome.decision.required_actions.len()
        ));
        reasoning_trace.push(format!(
            "NOTIFY: {} email={:?} sms={:?}",
            outcome.notification.kind(),
            outcome.delivery.email.status,
            outcome.delivery.sms.status
        ));
        customer.add_notification(NotificationRecord::new(&outcome.notification, outcome.delivery));

        // === AUDIT ===
        let audit_id = self
            .audit_log
            .record(AuditRecord {
                audit_id: Uuid::new_v4(),
                customer_id: customer.customer_id,
                event: AuditEvent::KycRun,
                application_fingerprint: compute_fingerprint(&digest),
                application: Arc::new(digest),
                status: customer.status,
                required_actions: customer.required_actions.clone(),
                risk_level: Some(risk_level),
                reasoning_trace: Arc::new(reasoning_trace.clone()),
                created_at: Utc::now(),
                execution_time_ms: start_time.elapsed().as_millis() as u64,
            })
            .await?;

        {
            let mut customers = self.customers.write().await;
            customers.insert(customer.customer_id, customer.clone());
        }

        info!(
            customer_id = %customer.customer_id,
            status = %customer.status,
            risk_level = %risk_level,
            "KYC run: complete"
        );

        Ok(KycReport {
            required_actions: customer.required_actions.clone(),
            customer,
            audit_id,
            reasoning_trace,
        })
    }

    pub async fn status(&self, customer_id: Uuid) -> Result<CustomerRecord> {
        let customers = self.customers.read().await;
        customers
            .get(&customer_id)
            .cloned()
            .ok_or(KycError::CustomerNotFound(customer_id))
    }

    /// Settle a customer waiting for review and tell them the outcome.
    pub async fn review(
        &self,
        customer_id: Uuid,
        decision: ReviewDecision,
        comments: Option<String>,
    ) -> Result<ReviewOutcome> {
        let start_time = Instant::now();

        let (snapshot, review) = {
            let mut customers = self.customers.write().await;
            let customer = customers
                .get_mut(&customer_id)
                .ok_or(KycError::CustomerNotFound(customer_id))?;
            let review = customer.apply_review(decision, comments.clone())?.clone();
            (customer.clone(), review)
        };

        let notification = match decision {
            ReviewDecision::Approve => Notification::Approval,
            ReviewDecision::Reject => Notification::Rejection {
                reason: comments
                    .filter(|c| !c.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_REJECTION_REASON.to_string()),
            },
        };
        let delivery = self
            .collaborators
            .notifier
            .notify(&notification, &snapshot.contact)
            .await;

        let customer = {
            let mut customers = self.customers.write().await;
            let customer = customers
                .get_mut(&customer_id)
                .ok_or(KycError::CustomerNotFound(customer_id))?;
            customer.add_notification(NotificationRecord::new(&notification, delivery.clone()));
            customer.clone()
        };

        let application = match self.audit_log.list_for_customer(customer_id).await?.pop() {
            Some(previous) => previous.application,
            None => Arc::new(ApplicationDigest {
                contact: customer.contact.clone(),
                id_document_sha256: digest_bytes(&[]),
                address_document_sha256: digest_bytes(&[]),
                selfie_sha256: digest_bytes(&[]),
            }),
        };

        let reasoning_trace = vec![
            format!("REVIEW: {:?} by operator", decision),
            format!("STATUS: {} -> {}", review.previous_status, review.new_status),
            format!("NOTIFY: {}", notification.kind()),
        ];
        let audit_id = self
            .audit_log
            .record(AuditRecord {
                audit_id: Uuid::new_v4(),
                customer_id,
                event: AuditEvent::Review,
                application_fingerprint: compute_fingerprint(&application),
                application,
                status: customer.status,
                required_actions: customer.required_actions.clone(),
                risk_level: None,
                reasoning_trace: Arc::new(reasoning_trace),
                created_at: Utc::now(),
                execution_time_ms: start_time.elapsed().as_millis() as u64,
            })
            .await?;

        debug!(customer_id = %customer_id, audit_id = %audit_id, "Review audited");
        info!(
            customer_id = %customer_id,
            status = %customer.status,
            "KYC review recorded"
        );

        Ok(ReviewOutcome {
            customer,
            review,
            delivery,
            audit_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance::{ScreeningCategory, ScreeningHit};
    use crate::documents::ExtractedText;
    use crate::models::{ComplianceCheckStatus, CustomerStatus, FacialMatchStatus};
    use crate::notification::{DeliveryStatus, NotificationKind};
    use crate::testing::{
        contact, FakeFaces, FakeScreening, RecordingNotifier, StaticTextExtractor,
    };

    const PASSPORT: &[u8] = b"passport-image";
    const BILL: &[u8] = b"bill-image";
    const SELFIE: &[u8] = b"selfie-image";

    fn ocr() -> StaticTextExtractor {
        StaticTextExtractor::default()
            .with_text(
                PASSPORT,
                ExtractedText::new("PASSPORT\nNationality: BRITISH\nPlace of Birth: LEEDS")
                    .with_field("Document Number", "925665416"),
            )
            .with_text(
                BILL,
                ExtractedText::new("Electricity bill\nMeter reading 4410 kWh\nUtility account"),
            )
    }

    fn orchestrator(
        ocr: StaticTextExtractor,
        faces: FakeFaces,
        screening: FakeScreening,
        notifier: RecordingNotifier,
    ) -> KycOrchestrator {
        let config = Arc::new(KycConfig::default());
        KycOrchestrator::new(
            config.clone(),
            Collaborators {
                text_extractor: Arc::new(ocr),
                classifier: Arc::new(KeywordDocumentClassifier::new(
                    config.document_classification_threshold,
                )),
                faces: Arc::new(faces),
                screening: Arc::new(screening),
                notifier: Arc::new(notifier),
            },
        )
    }

    fn application() -> KycApplication {
        KycApplication {
            contact: contact(),
            id_document: PASSPORT.to_vec(),
            address_document: BILL.to_vec(),
            selfie: SELFIE.to_vec(),
        }
    }

    #[tokio::test]
    async fn test_clean_run_is_approved() {
        let notifier = RecordingNotifier::default();
        let orchestrator = orchestrator(
            ocr(),
            FakeFaces::new(96.0),
            FakeScreening::clean(),
            notifier.clone(),
        );

        let report = orchestrator.run(application()).await.unwrap();
        let customer = &report.customer;

        assert_eq!(customer.status, CustomerStatus::Approved);
        assert!(report.required_actions.is_empty());
        assert_eq!(customer.documents.len(), 2);
        assert_eq!(customer.documents[0].document_number.as_deref(), Some("925665416"));
        assert_eq!(
            customer.facial_match.as_ref().unwrap().status,
            FacialMatchStatus::Matched
        );
        assert_eq!(customer.compliance_checks.len(), 3);
        assert_eq!(customer.notifications.len(), 1);
        assert_eq!(customer.notifications[0].kind, NotificationKind::Approval);

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, Notification::Approval);
        assert!(orchestrator.audit_log().verify_integrity(report.audit_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_sanctions_hit_and_weak_face_need_review() {
        let screening = FakeScreening::clean().with_hits(
            ScreeningCategory::Sanctions,
            vec![ScreeningHit {
                name: "Jane Doe".into(),
                score: 0.88,
                source: "ofac-sdn".into(),
                url: None,
            }],
        );
        let orchestrator = orchestrator(
            ocr(),
            FakeFaces::new(70.0),
            screening,
            RecordingNotifier::default(),
        );

        let report = orchestrator.run(application()).await.unwrap();

        assert_eq!(report.customer.status, CustomerStatus::NeedsReview);
        assert_eq!(
            report.required_actions,
            vec!["Facial verification failed", "Compliance check requires review"]
        );
        assert_eq!(
            report.customer.compliance_checks[0].status,
            ComplianceCheckStatus::Flagged
        );
        assert_eq!(report.customer.notifications[0].kind, NotificationKind::Review);
    }

    #[tokio::test]
    async fn test_ocr_failure_fails_run_without_notifying() {
        let notifier = RecordingNotifier::default();
        let orchestrator = orchestrator(
            StaticTextExtractor::unavailable(),
            FakeFaces::new(96.0),
            FakeScreening::clean(),
            notifier.clone(),
        );

        let err = orchestrator.run(application()).await.unwrap_err();

        assert_eq!(err.kind(), "collaborator_error");
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_selfie_without_face_fails_run() {
        let orchestrator = orchestrator(
            ocr(),
            FakeFaces::new(96.0).without_face_in(SELFIE),
            FakeScreening::clean(),
            RecordingNotifier::default(),
        );

        let err = orchestrator.run(application()).await.unwrap_err();
        assert!(matches!(err, KycError::NoFaceFound(ref s) if s == "selfie"));
    }

    #[tokio::test]
    async fn test_face_service_outage_fails_run() {
        let orchestrator = orchestrator(
            ocr(),
            FakeFaces::unavailable(),
            FakeScreening::clean(),
            RecordingNotifier::default(),
        );

        let err = orchestrator.run(application()).await.unwrap_err();
        assert_eq!(err.to_string(), "Face++ error: HTTP 503");
    }

    #[tokio::test]
    async fn test_screening_error_is_recorded_not_escalated() {
        let orchestrator = orchestrator(
            ocr(),
            FakeFaces::new(96.0),
            FakeScreening::clean().failing(ScreeningCategory::AdverseMedia),
            RecordingNotifier::default(),
        );

        let report = orchestrator.run(application()).await.unwrap();

        assert_eq!(report.customer.status, CustomerStatus::Approved);
        assert_eq!(
            report.customer.compliance_checks[2].status,
            ComplianceCheckStatus::Error
        );
        assert!(report.reasoning_trace.iter().any(|s| s == "SCREEN: risk unknown"));
    }

    #[tokio::test]
    async fn test_failed_notification_keeps_decision() {
        let orchestrator = orchestrator(
            ocr(),
            FakeFaces::new(96.0),
            FakeScreening::clean(),
            RecordingNotifier::failing(),
        );

        let report = orchestrator.run(application()).await.unwrap();

        assert_eq!(report.customer.status, CustomerStatus::Approved);
        assert_eq!(report.customer.notifications[0].status, DeliveryStatus::Failed);
    }

    #[tokio::test]
    async fn test_status_lookup() {
        let orchestrator = orchestrator(
            ocr(),
            FakeFaces::new(96.0),
            FakeScreening::clean(),
            RecordingNotifier::default(),
        );
        let report = orchestrator.run(application()).await.unwrap();

        let customer = orchestrator.status(report.customer.customer_id).await.unwrap();
        assert_eq!(customer.status, CustomerStatus::Approved);

        let err = orchestrator.status(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.kind(), "customer_not_found");
    }

    #[tokio::test]
    async fn test_review_rejection_notifies_with_reason() {
        let notifier = RecordingNotifier::default();
        let orchestrator = orchestrator(
            ocr(),
            FakeFaces::new(50.0),
            FakeScreening::clean(),
            notifier.clone(),
        );
        let report = orchestrator.run(application()).await.unwrap();
        let customer_id = report.customer.customer_id;
        assert_eq!(report.customer.status, CustomerStatus::NeedsReview);

        let outcome = orchestrator
            .review(customer_id, ReviewDecision::Reject, Some("Selfie does not match".into()))
            .await
            .unwrap();

        assert_eq!(outcome.customer.status, CustomerStatus::Rejected);
        assert_eq!(outcome.review.previous_status, CustomerStatus::NeedsReview);
        assert_eq!(outcome.customer.notifications.len(), 2);
        assert_eq!(
            notifier.sent()[1].0,
            Notification::Rejection {
                reason: "Selfie does not match".into()
            }
        );
        assert!(orchestrator.audit_log().verify_integrity(outcome.audit_id).await.unwrap());

        let history = orchestrator
            .audit_log()
            .list_for_customer(customer_id)
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].application_fingerprint, history[1].application_fingerprint);
    }

    #[tokio::test]
    async fn test_earlier_customers_stay_queryable() {
        let orchestrator = orchestrator(
            ocr(),
            FakeFaces::new(96.0),
            FakeScreening::clean(),
            RecordingNotifier::default(),
        );

        let mut reports = Vec::new();
        for _ in 0..3 {
            reports.push(orchestrator.run(application()).await.unwrap());
        }

        for report in &reports {
            let customer = orchestrator.status(report.customer.customer_id).await.unwrap();
            assert_eq!(customer.status, CustomerStatus::Approved);
            assert!(orchestrator.audit_log().get(report.audit_id).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_review_of_approved_customer_is_invalid() {
        let orchestrator = orchestrator(
            ocr(),
            FakeFaces::new(96.0),
            FakeScreening::clean(),
            RecordingNotifier::default(),
        );
        let report = orchestrator.run(application()).await.unwrap();

        let err = orchestrator
            .review(report.customer.customer_id, ReviewDecision::Approve, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_transition");
    }
}
