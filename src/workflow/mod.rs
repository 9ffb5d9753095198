//! Session workflow state machine
//!
//! Strict forward progression, one step per call:
//!
//! (none) → document_captured → selfie_verified → left_hand_captured
//!        → right_hand_captured → decided
//!
//! A new document restarts under a fresh session id. Every transition runs
//! inside that session's exclusive section, so concurrent requests for one
//! session never interleave; different sessions never wait on each other.

mod locks;

use crate::config::KycConfig;
use crate::decision::{create_default_decision_engine, DecisionEngine, DecisionInputs, DecisionResult};
use crate::error::KycError;
use crate::facial::{require_face, FaceService};
use crate::segmentation::{RegionSegmenter, SegmentationResult};
use crate::session::{
    HandCapture, KycSession, SelfieVerification, SessionId, SessionStore, WorkflowStage,
};
use crate::Result;
use locks::SessionLocks;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    fn operation(&self) -> &'static str {
        match self {
            Hand::Left => "capture left hand",
            Hand::Right => "capture right hand",
        }
    }

    /// Stage the session must be in before this capture, and the one after.
    fn stages(&self) -> (WorkflowStage, WorkflowStage) {
        match self {
            Hand::Left => (WorkflowStage::SelfieVerified, WorkflowStage::LeftHandCaptured),
            Hand::Right => (WorkflowStage::LeftHandCaptured, WorkflowStage::RightHandCaptured),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelfieOutcome {
    pub session_id: SessionId,
    pub verified: bool,
    pub confidence: f64,
    pub threshold: f64,
}

#[derive(Debug, Clone)]
pub struct HandOutcome {
    pub session_id: SessionId,
    pub hand: Hand,
    pub segmentation: SegmentationResult,
}

pub struct SessionWorkflow {
    store: Arc<dyn SessionStore>,
    faces: Arc<dyn FaceService>,
    segmenter: RegionSegmenter,
    engine: Arc<DecisionEngine>,
    selfie_match_threshold: f64,
    document_threshold: f64,
    facial_threshold: f64,
    locks: Arc<SessionLocks>,
}

impl SessionWorkflow {
    pub fn new(
        store: Arc<dyn SessionStore>,
        faces: Arc<dyn FaceService>,
        segmenter: RegionSegmenter,
        engine: Arc<DecisionEngine>,
        selfie_match_threshold: f64,
        document_threshold: f64,
        facial_threshold: f64,
    ) -> Self {
        Self {
            store,
            faces,
            segmenter,
            engine,
            selfie_match_threshold,
            document_threshold,
            facial_threshold,
            locks: Arc::new(SessionLocks::default()),
        }
    }

    pub fn from_config(
        config: &KycConfig,
        store: Arc<dyn SessionStore>,
        faces: Arc<dyn FaceService>,
    ) -> Self {
        Self::new(
            store,
            faces,
            RegionSegmenter::from_config(config),
            Arc::new(create_default_decision_engine()),
            config.selfie_match_threshold,
            config.document_classification_threshold,
            config.facial_match_threshold,
        )
    }

    /// Start a session from an identity document showing a face.
    ///
    /// Without a detectable face nothing is stored.
    pub async fn upload_document(&self, document: &[u8]) -> Result<KycSession> {
        let face = require_face(self.faces.as_ref(), document, "document").await?;
        let session = KycSession::new(face);
        self.store.put(session.clone()).await?;

        info!(session_id = %session.session_id, "Document captured");
        Ok(session)
    }

    /// Replace `previous` with a new session built from a new document.
    ///
    /// The old session stays untouched when the new document has no face.
    pub async fn restart(&self, previous: &SessionId, document: &[u8]) -> Result<KycSession> {
        let _guard = self.locks.acquire(*previous).await;

        let session = self.upload_document(document).await?;
        self.store.evict(previous).await?;

        info!(
            previous_session_id = %previous,
            session_id = %session.session_id,
            "Session restarted"
        );
        Ok(session)
    }

    pub async fn upload_selfie(&self, id: &SessionId, selfie: &[u8]) -> Result<SelfieOutcome> {
        let _guard = self.locks.acquire(*id).await;
        let mut session = self.load(id).await?;
        session.require_stage(WorkflowStage::DocumentCaptured, "upload selfie")?;

        let face = require_face(self.faces.as_ref(), selfie, "selfie").await?;
        let comparison = self
            .faces
            .compare_faces(&session.document_face, &face)
            .await?;

        let verified = comparison.meets(self.selfie_match_threshold);
        session.selfie = Some(SelfieVerification {
            face,
            confidence: comparison.confidence,
            threshold: self.selfie_match_threshold,
            verified,
        });
        // An unverified selfie is recorded, not blocked
        session.advance(WorkflowStage::SelfieVerified);
        self.store.put(session).await?;

        info!(
            session_id = %id,
            confidence = comparison.confidence,
            verified,
            "Selfie compared"
        );

        Ok(SelfieOutcome {
            session_id: *id,
            verified,
            confidence: comparison.confidence,
            threshold: self.selfie_match_threshold,
        })
    }

    pub async fn capture_left_hand(&self, id: &SessionId, image: &[u8]) -> Result<HandOutcome> {
        self.capture_hand(id, Hand::Left, image).await
    }

    pub async fn capture_right_hand(&self, id: &SessionId, image: &[u8]) -> Result<HandOutcome> {
        self.capture_hand(id, Hand::Right, image).await
    }

    /// Segment a hand photo. Zero regions still advances the session.
    async fn capture_hand(&self, id: &SessionId, hand: Hand, image: &[u8]) -> Result<HandOutcome> {
        let _guard = self.locks.acquire(*id).await;
        let mut session = self.load(id).await?;
        let (required, next) = hand.stages();
        session.require_stage(required, hand.operation())?;

        let segmenter = self.segmenter;
        let bytes = image.to_vec();
        let segmentation = tokio::task::spawn_blocking(move || segmenter.segment_bytes(&bytes))
            .await
            .map_err(|e| KycError::TaskError(format!("segmentation task failed: {}", e)))??;

        let capture = HandCapture::new(segmentation.regions().to_vec());
        match hand {
            Hand::Left => session.left_hand = Some(capture),
            Hand::Right => session.right_hand = Some(capture),
        }
        session.advance(next);
        self.store.put(session).await?;

        info!(
            session_id = %id,
            hand = ?hand,
            region_count = segmentation.region_count(),
            "Hand captured"
        );

        Ok(HandOutcome {
            session_id: *id,
            hand,
            segmentation,
        })
    }

    /// Decide on inputs gathered outside the workflow and close the flow.
    ///
    /// Review and verification flags are re-derived from the supplied scores
    /// against the configured thresholds.
    pub async fn finalize(&self, id: &SessionId, inputs: &DecisionInputs) -> Result<DecisionResult> {
        let _guard = self.locks.acquire(*id).await;
        let mut session = self.load(id).await?;
        session.require_stage(WorkflowStage::RightHandCaptured, "finalize")?;

        let decision = self
            .engine
            .decide(&inputs.rederived(self.document_threshold, self.facial_threshold));
        session.decision = Some(decision.clone());
        session.advance(WorkflowStage::Decided);
        self.store.put(session).await?;

        info!(session_id = %id, status = %decision.status, "Session decided");
        Ok(decision)
    }

    /// Snapshot of a live session.
    pub async fn session(&self, id: &SessionId) -> Result<KycSession> {
        self.load(id).await
    }

    pub async fn close(&self, id: &SessionId) -> Result<()> {
        let _guard = self.locks.acquire(*id).await;
        if self.store.evict(id).await? {
            info!(session_id = %id, "Session closed");
            Ok(())
        } else {
            Err(KycError::SessionNotFound(id.to_string()))
        }
    }

    async fn load(&self, id: &SessionId) -> Result<KycSession> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| KycError::SessionNotFound(id.to_string()))
    }
}
