//! Core data models for KYC verification

use crate::compliance::{ScreeningCategory, ScreeningCategoryResult};
use crate::decision::DecisionResult;
use crate::documents::{DocumentClass, DocumentClassification, ExtractedText};
use crate::error::KycError;
use crate::facial::FacialMatchResult;
use crate::notification::{DeliveryStatus, Notification, NotificationDelivery, NotificationKind};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CustomerStatus {
    Pending,
    Approved,
    NeedsReview,
    Rejected,
}

impl fmt::Display for CustomerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CustomerStatus::Pending => "pending",
            CustomerStatus::Approved => "approved",
            CustomerStatus::NeedsReview => "needs_review",
            CustomerStatus::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentRole {
    Identity,
    Address,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Verified,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FacialMatchStatus {
    Matched,
    NotMatched,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ComplianceCheckStatus {
    Clear,
    Flagged,
    Error,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

//
// ================= Customer =================
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Contact {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn validate(&self) -> Result<()> {
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(KycError::InvalidInput(
                "first_name and last_name are required".to_string(),
            ));
        }
        if !self.email.contains('@') {
            return Err(KycError::InvalidInput(format!(
                "'{}' is not an email address",
                self.email
            )));
        }
        Ok(())
    }
}

/// Everything recorded about one KYC application.
///
/// Status moves out of `Pending` exactly once, through `record_decision`.
/// A later human review is appended as a `ReviewRecord`; child records are
/// append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub customer_id: Uuid,
    pub contact: Contact,
    pub status: CustomerStatus,
    pub required_actions: Vec<String>,
    pub documents: Vec<DocumentRecord>,
    pub facial_match: Option<FacialMatchRecord>,
    pub compliance_checks: Vec<ComplianceCheckRecord>,
    pub notifications: Vec<NotificationRecord>,
    pub reviews: Vec<ReviewRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CustomerRecord {
    pub fn new(contact: Contact) -> Self {
        let now = Utc::now();
        Self {
            customer_id: Uuid::new_v4(),
            contact,
            status: CustomerStatus::Pending,
            required_actions: Vec::new(),
            documents: Vec::new(),
            facial_match: None,
            compliance_checks: Vec::new(),
            notifications: Vec::new(),
            reviews: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn add_document(&mut self, document: DocumentRecord) {
        self.documents.push(document);
        self.touch();
    }

    pub fn set_facial_match(&mut self, facial_match: FacialMatchRecord) {
        self.facial_match = Some(facial_match);
        self.touch();
    }

    pub fn add_compliance_check(&mut self, check: ComplianceCheckRecord) {
        self.compliance_checks.push(check);
        self.touch();
    }

    pub fn add_notification(&mut self, notification: NotificationRecord) {
        self.notifications.push(notification);
        self.touch();
    }

    pub fn record_decision(&mut self, decision: &DecisionResult) -> Result<()> {
        if self.status != CustomerStatus::Pending {
            return Err(KycError::InvalidTransition {
                operation: "record decision",
                stage: self.status.to_string(),
            });
        }

        self.status = decision.status;
        self.required_actions = decision.required_actions.clone();
        self.touch();
        Ok(())
    }

    /// Settle a `NeedsReview` customer by human decision.
    pub fn apply_review(
        &mut self,
        decision: ReviewDecision,
        comments: Option<String>,
    ) -> Result<&ReviewRecord> {
        if self.status != CustomerStatus::NeedsReview {
            return Err(KycError::InvalidTransition {
                operation: "review",
                stage: self.status.to_string(),
            });
        }

        let previous_status = self.status;
        self.status = match decision {
            ReviewDecision::Approve => CustomerStatus::Approved,
            ReviewDecision::Reject => CustomerStatus::Rejected,
        };

        self.reviews.push(ReviewRecord {
            decision,
            comments,
            previous_status,
            new_status: self.status,
            reviewed_at: Utc::now(),
        });
        self.touch();

        self.reviews
            .last()
            .ok_or_else(|| KycError::InvalidInput("review was not recorded".to_string()))
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

//
// ================= Documents =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub document_id: Uuid,
    pub role: DocumentRole,
    pub document_type: DocumentClass,
    pub document_number: Option<String>,
    pub extracted_data: ExtractedText,
    pub classification_score: f64,
    pub classification: DocumentClassification,
    /// Hex SHA-256 of the uploaded image
    pub image_digest: String,
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
}

impl DocumentRecord {
    pub fn new(
        role: DocumentRole,
        extracted_data: ExtractedText,
        classification: DocumentClassification,
        image_digest: String,
    ) -> Self {
        // Only the identity document carries a number worth keeping
        let document_number = match role {
            DocumentRole::Identity => extracted_data.document_number().map(str::to_string),
            DocumentRole::Address => None,
        };

        Self {
            document_id: Uuid::new_v4(),
            role,
            document_type: classification.predicted_class,
            document_number,
            classification_score: classification.confidence,
            status: if classification.needs_review {
                DocumentStatus::Pending
            } else {
                DocumentStatus::Verified
            },
            classification,
            extracted_data,
            image_digest,
            created_at: Utc::now(),
        }
    }
}

//
// ================= Facial Match =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacialMatchRecord {
    pub similarity_score: f64,
    pub threshold: f64,
    pub status: FacialMatchStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&FacialMatchResult> for FacialMatchRecord {
    fn from(result: &FacialMatchResult) -> Self {
        Self {
            similarity_score: result.similarity_score,
            threshold: result.threshold,
            status: if result.verified {
                FacialMatchStatus::Matched
            } else {
                FacialMatchStatus::NotMatched
            },
            created_at: Utc::now(),
        }
    }
}

//
// ================= Compliance =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceCheckRecord {
    pub check_type: ScreeningCategory,
    pub status: ComplianceCheckStatus,
    pub result: ScreeningCategoryResult,
    pub created_at: DateTime<Utc>,
}

impl From<&ScreeningCategoryResult> for ComplianceCheckRecord {
    fn from(result: &ScreeningCategoryResult) -> Self {
        let status = if result.is_error() {
            ComplianceCheckStatus::Error
        } else if result.has_match {
            ComplianceCheckStatus::Flagged
        } else {
            ComplianceCheckStatus::Clear
        };

        Self {
            check_type: result.category,
            status,
            result: result.clone(),
            created_at: Utc::now(),
        }
    }
}

//
// ================= Notifications & Review =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub notification_id: Uuid,
    pub kind: NotificationKind,
    pub content: String,
    pub status: DeliveryStatus,
    pub delivery_status: NotificationDelivery,
    pub created_at: DateTime<Utc>,
}

impl NotificationRecord {
    pub fn new(notification: &Notification, delivery: NotificationDelivery) -> Self {
        let content = match notification {
            Notification::Approval => "KYC verification approved".to_string(),
            Notification::Review { required_actions } => required_actions.join("; "),
            Notification::Rejection { reason } => reason.clone(),
        };

        Self {
            notification_id: Uuid::new_v4(),
            kind: notification.kind(),
            content,
            status: delivery.overall_status(),
            delivery_status: delivery,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub decision: ReviewDecision,
    pub comments: Option<String>,
    pub previous_status: CustomerStatus,
    pub new_status: CustomerStatus,
    pub reviewed_at: DateTime<Utc>,
}
