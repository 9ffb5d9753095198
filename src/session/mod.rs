//! KYC capture sessions
//!
//! A session tracks one subject through the capture flow. Sessions live in a
//! `SessionStore`; the workflow reads, advances and writes them back.

pub mod store;

pub use store::{spawn_sweeper, InMemorySessionStore};

use crate::decision::DecisionResult;
use crate::error::KycError;
use crate::facial::FaceRef;
use crate::segmentation::Region;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An identifier that does not parse can never name a live session.
impl FromStr for SessionId {
    type Err = KycError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(SessionId)
            .map_err(|_| KycError::SessionNotFound(s.to_string()))
    }
}

/// Progress of a stored session. "No session" is the absence of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    DocumentCaptured,
    SelfieVerified,
    LeftHandCaptured,
    RightHandCaptured,
    Decided,
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkflowStage::DocumentCaptured => "document_captured",
            WorkflowStage::SelfieVerified => "selfie_verified",
            WorkflowStage::LeftHandCaptured => "left_hand_captured",
            WorkflowStage::RightHandCaptured => "right_hand_captured",
            WorkflowStage::Decided => "decided",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfieVerification {
    pub face: FaceRef,
    /// 0..100
    pub confidence: f64,
    pub threshold: f64,
    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandCapture {
    pub region_count: usize,
    pub regions: Vec<Region>,
    pub captured_at: DateTime<Utc>,
}

impl HandCapture {
    pub fn new(regions: Vec<Region>) -> Self {
        Self {
            region_count: regions.len(),
            regions,
            captured_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KycSession {
    pub session_id: SessionId,
    pub stage: WorkflowStage,
    pub document_face: FaceRef,
    pub selfie: Option<SelfieVerification>,
    pub left_hand: Option<HandCapture>,
    pub right_hand: Option<HandCapture>,
    pub decision: Option<DecisionResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KycSession {
    /// A fresh session that has just captured its document.
    pub fn new(document_face: FaceRef) -> Self {
        let now = Utc::now();
        Self {
            session_id: SessionId::new(),
            stage: WorkflowStage::DocumentCaptured,
            document_face,
            selfie: None,
            left_hand: None,
            right_hand: None,
            decision: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.selfie.as_ref().map(|s| s.verified).unwrap_or(false)
    }

    /// Fail unless the session sits exactly at `expected`.
    pub fn require_stage(&self, expected: WorkflowStage, operation: &'static str) -> Result<()> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(KycError::InvalidTransition {
                operation,
                stage: self.stage.to_string(),
            })
        }
    }

    pub fn advance(&mut self, stage: WorkflowStage) {
        self.stage = stage;
        self.updated_at = Utc::now();
    }
}

/// Keyed session storage with an eviction policy.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Live session for `id`; expired sessions read as absent.
    async fn get(&self, id: &SessionId) -> Result<Option<KycSession>>;

    async fn put(&self, session: KycSession) -> Result<()>;

    /// Returns whether a session was removed.
    async fn evict(&self, id: &SessionId) -> Result<bool>;

    /// Drop expired sessions, returning how many went.
    async fn purge_expired(&self) -> Result<usize>;
}
