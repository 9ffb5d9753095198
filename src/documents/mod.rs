//! Document text extraction and classification
//!
//! OCR and classification are collaborators. This module fixes the shape of
//! their output and the review rule: a classification whose confidence falls
//! below the configured threshold needs a human.

pub mod classifier;
pub mod ocr;

pub use classifier::KeywordDocumentClassifier;
pub use ocr::HttpTextExtractor;

use crate::error::KycError;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

const DOCUMENT_NUMBER_KEY: &str = "Document Number";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DocumentClass {
    Passport,
    DriverLicense,
    NationalId,
    UtilityBill,
    BankStatement,
    Other,
}

impl DocumentClass {
    /// Declaration order; index `i` of a score vector belongs to `ALL[i]`.
    pub const ALL: [DocumentClass; 6] = [
        DocumentClass::Passport,
        DocumentClass::DriverLicense,
        DocumentClass::NationalId,
        DocumentClass::UtilityBill,
        DocumentClass::BankStatement,
        DocumentClass::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentClass::Passport => "passport",
            DocumentClass::DriverLicense => "driver_license",
            DocumentClass::NationalId => "national_id",
            DocumentClass::UtilityBill => "utility_bill",
            DocumentClass::BankStatement => "bank_statement",
            DocumentClass::Other => "other",
        }
    }
}

impl fmt::Display for DocumentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassPrediction {
    pub class: DocumentClass,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentClassification {
    pub predicted_class: DocumentClass,
    pub confidence: f64,
    pub top3: Vec<ClassPrediction>,
    pub needs_review: bool,
}

impl DocumentClassification {
    /// Build a classification from per-class probabilities in `DocumentClass::ALL` order.
    ///
    /// The first maximum wins; the top three are sorted by descending
    /// probability with ties kept in declaration order.
    pub fn from_scores(scores: &[f64], threshold: f64) -> Result<Self> {
        if scores.len() != DocumentClass::ALL.len() {
            return Err(KycError::InvalidInput(format!(
                "expected {} class scores, got {}",
                DocumentClass::ALL.len(),
                scores.len()
            )));
        }
        if let Some(bad) = scores.iter().find(|s| !(0.0..=1.0).contains(*s)) {
            return Err(KycError::InvalidInput(format!(
                "class score {} outside 0..=1",
                bad
            )));
        }

        let mut ranked: Vec<ClassPrediction> = DocumentClass::ALL
            .iter()
            .zip(scores)
            .map(|(class, confidence)| ClassPrediction {
                class: *class,
                confidence: *confidence,
            })
            .collect();
        // Stable sort keeps declaration order among equal scores
        ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let best = ranked[0];
        ranked.truncate(3);

        Ok(Self {
            predicted_class: best.class,
            confidence: best.confidence,
            top3: ranked,
            needs_review: best.confidence < threshold,
        })
    }

    /// Same classification with `needs_review` re-derived against `threshold`.
    pub fn reviewed_against(&self, threshold: f64) -> Self {
        Self {
            needs_review: self.confidence < threshold,
            ..self.clone()
        }
    }
}

/// OCR output: the recognised text plus any form fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedText {
    pub text: String,
    #[serde(default)]
    pub key_value_pairs: BTreeMap<String, String>,
}

impl ExtractedText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            key_value_pairs: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.key_value_pairs.insert(key.into(), value.into());
        self
    }

    pub fn document_number(&self) -> Option<&str> {
        self.key_value_pairs
            .get(DOCUMENT_NUMBER_KEY)
            .map(String::as_str)
    }
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, image: &[u8]) -> Result<ExtractedText>;
}

#[async_trait]
pub trait DocumentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<DocumentClassification>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reviewed_against_overrides_flag() {
        let mut c = DocumentClassification::from_scores(&[0.05, 0.02, 0.9, 0.01, 0.01, 0.01], 0.85)
            .unwrap();
        c.confidence = 0.05;
        c.needs_review = false;

        assert!(c.reviewed_against(0.85).needs_review);
        assert!(!c.reviewed_against(0.01).needs_review);
    }

    #[test]
    fn test_from_scores_picks_max() {
        let c = DocumentClassification::from_scores(&[0.05, 0.02, 0.9, 0.01, 0.01, 0.01], 0.85)
            .unwrap();

        assert_eq!(c.predicted_class, DocumentClass::NationalId);
        assert_eq!(c.confidence, 0.9);
        assert!(!c.needs_review);
        assert_eq!(c.top3.len(), 3);
        assert_eq!(c.top3[0].class, DocumentClass::NationalId);
        assert_eq!(c.top3[1].class, DocumentClass::Passport);
        assert_eq!(c.top3[2].class, DocumentClass::DriverLicense);
    }

    #[test]
    fn test_ties_resolve_in_declaration_order() {
        let c = DocumentClassification::from_scores(&[0.1, 0.3, 0.1, 0.3, 0.1, 0.1], 0.85)
            .unwrap();

        assert_eq!(c.predicted_class, DocumentClass::DriverLicense);
        let order: Vec<_> = c.top3.iter().map(|p| p.class).collect();
        assert_eq!(
            order,
            vec![
                DocumentClass::DriverLicense,
                DocumentClass::UtilityBill,
                DocumentClass::Passport
            ]
        );
    }

    #[test]
    fn test_below_threshold_needs_review() {
        let c = DocumentClassification::from_scores(&[0.84, 0.16, 0.0, 0.0, 0.0, 0.0], 0.85)
            .unwrap();
        assert!(c.needs_review);

        let c = DocumentClassification::from_scores(&[0.85, 0.15, 0.0, 0.0, 0.0, 0.0], 0.85)
            .unwrap();
        assert!(!c.needs_review);
    }

    #[test]
    fn test_rejects_malformed_scores() {
        assert!(DocumentClassification::from_scores(&[0.5, 0.5], 0.85).is_err());
        assert!(
            DocumentClassification::from_scores(&[1.5, 0.0, 0.0, 0.0, 0.0, 0.0], 0.85).is_err()
        );
    }

    #[test]
    fn test_document_number_field() {
        let text = ExtractedText::new("PASSPORT").with_field("Document Number", "X1234567");
        assert_eq!(text.document_number(), Some("X1234567"));
        assert_eq!(ExtractedText::new("bill").document_number(), None);
    }

    #[test]
    fn test_class_serializes_snake_case() {
        let json = serde_json::to_string(&DocumentClass::DriverLicense).unwrap();
        assert_eq!(json, "\"driver_license\"");
    }
}
