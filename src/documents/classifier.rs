//! Keyword document classifier
//!
//! Deterministic stand-in for a trained text model: each class collects
//! evidence from keyword hits and the hit counts are normalised into
//! probabilities with additive smoothing.

use super::{DocumentClass, DocumentClassification, DocumentClassifier};
use crate::Result;
use async_trait::async_trait;

/// Additive smoothing so no class ever scores exactly zero
const ALPHA: f64 = 0.1;

/// Static keyword lists, indexed like `DocumentClass::ALL`
const KEYWORDS: [&[&str]; 6] = [
    // Passport
    &["passport", "nationality", "place of birth", "p<"],
    // Driver license
    &["driver", "driving", "licence", "license", "dl no"],
    // National ID
    &["national identity", "identity card", "national id", "id card"],
    // Utility bill
    &["electricity", "utility", "water", "gas", "bill", "kwh", "meter"],
    // Bank statement
    &["bank", "statement", "account number", "balance", "iban", "sort code"],
    // Other
    &[],
];

pub struct KeywordDocumentClassifier {
    threshold: f64,
}

impl KeywordDocumentClassifier {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Per-class probabilities in `DocumentClass::ALL` order.
    pub fn scores(text: &str) -> Vec<f64> {
        let text = text.to_lowercase();

        let mut hits: Vec<f64> = KEYWORDS
            .iter()
            .map(|keywords| keywords.iter().filter(|kw| text.contains(**kw)).count() as f64)
            .collect();

        if hits.iter().all(|h| *h == 0.0) {
            if let Some(other) = hits.last_mut() {
                *other = 1.0;
            }
        }

        let total: f64 = hits.iter().map(|h| h + ALPHA).sum();
        hits.into_iter().map(|h| (h + ALPHA) / total).collect()
    }
}

#[async_trait]
impl DocumentClassifier for KeywordDocumentClassifier {
    async fn classify(&self, text: &str) -> Result<DocumentClassification> {
        DocumentClassification::from_scores(&Self::scores(text), self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_strong_passport_evidence() {
        let classifier = KeywordDocumentClassifier::new(0.85);
        let c = classifier
            .classify("PASSPORT REPUBLIC OF INDIA\nNationality: INDIAN\nPlace of Birth: PUNE")
            .await
            .unwrap();

        assert_eq!(c.predicted_class, DocumentClass::Passport);
        assert!(c.confidence > 0.85);
        assert!(!c.needs_review);
    }

    #[tokio::test]
    async fn test_weak_evidence_needs_review() {
        let classifier = KeywordDocumentClassifier::new(0.85);
        let c = classifier.classify("ELECTRICITY BILL").await.unwrap();

        assert_eq!(c.predicted_class, DocumentClass::UtilityBill);
        assert!(c.needs_review);
    }

    #[tokio::test]
    async fn test_no_evidence_is_other() {
        let classifier = KeywordDocumentClassifier::new(0.85);
        let c = classifier.classify("RANDOM DOCUMENT").await.unwrap();

        assert_eq!(c.predicted_class, DocumentClass::Other);
        assert!(c.needs_review);
    }

    #[test]
    fn test_scores_form_a_distribution() {
        for text in ["", "bank statement balance", "driver license passport"] {
            let scores = KeywordDocumentClassifier::scores(text);
            let sum: f64 = scores.iter().sum();
            assert_eq!(scores.len(), 6);
            assert!((sum - 1.0).abs() < 1e-9);
            assert!(scores.iter().all(|s| *s > 0.0));
        }
    }
}
