//! Facial detection and comparison
//!
//! Face work is delegated to an external service. This module owns the
//! seam (`FaceService`) and the verification rule applied to its output.

pub mod client;

pub use client::FacePlusPlusClient;

use crate::error::KycError;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle to a detected face, issued by the face service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceRef(String);

impl FaceRef {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FaceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw comparison output. `confidence` is on a 0..100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceComparison {
    pub confidence: f64,
}

impl FaceComparison {
    pub fn meets(&self, threshold: f64) -> bool {
        self.confidence >= threshold
    }
}

#[async_trait]
pub trait FaceService: Send + Sync {
    /// First detectable face in the image, or `None` when there is none.
    async fn detect_face(&self, image: &[u8]) -> Result<Option<FaceRef>>;

    async fn compare_faces(&self, first: &FaceRef, second: &FaceRef) -> Result<FaceComparison>;
}

/// Detect a face or fail the capture with `NoFaceFound` naming `subject`.
pub async fn require_face(service: &dyn FaceService, image: &[u8], subject: &str) -> Result<FaceRef> {
    service
        .detect_face(image)
        .await?
        .ok_or_else(|| KycError::NoFaceFound(subject.to_string()))
}

/// `verified` is always derived from the score; a supplied value is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "FacialMatchScores")]
pub struct FacialMatchResult {
    /// 0..1
    pub similarity_score: f64,
    pub verified: bool,
    pub threshold: f64,
}

impl FacialMatchResult {
    pub fn new(similarity_score: f64, threshold: f64) -> Self {
        Self {
            similarity_score,
            verified: similarity_score >= threshold,
            threshold,
        }
    }

    /// Map a 0..100 comparison confidence onto the 0..1 similarity scale.
    pub fn from_comparison(comparison: FaceComparison, threshold: f64) -> Self {
        let similarity = (comparison.confidence / 100.0).clamp(0.0, 1.0);
        Self::new(similarity, threshold)
    }
}

#[derive(Deserialize)]
struct FacialMatchScores {
    similarity_score: f64,
    threshold: f64,
}

impl From<FacialMatchScores> for FacialMatchResult {
    fn from(scores: FacialMatchScores) -> Self {
        Self::new(scores.similarity_score, scores.threshold)
    }
}

/// Detect a face in both images and compare them.
pub async fn match_faces(
    service: &dyn FaceService,
    document: &[u8],
    selfie: &[u8],
    threshold: f64,
) -> Result<FacialMatchResult> {
    let document_face = require_face(service, document, "document").await?;
    let selfie_face = require_face(service, selfie, "selfie").await?;
    let comparison = service.compare_faces(&document_face, &selfie_face).await?;

    Ok(FacialMatchResult::from_comparison(comparison, threshold))
}
