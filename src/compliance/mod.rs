//! Compliance screening and risk aggregation
//!
//! Three independent watch-list categories (sanctions, PEP, adverse media)
//! are screened by an external provider and folded into one risk level.
//! Aggregation is a pure post-processing step over completed results.

pub mod client;

pub use client::ComplyAdvantageClient;

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScreeningCategory {
    Sanctions,
    Pep,
    AdverseMedia,
}

impl ScreeningCategory {
    pub const ALL: [ScreeningCategory; 3] = [
        ScreeningCategory::Sanctions,
        ScreeningCategory::Pep,
        ScreeningCategory::AdverseMedia,
    ];

    /// Search profile name understood by the screening provider
    pub fn search_profile(&self) -> &'static str {
        match self {
            ScreeningCategory::Sanctions => "sanctions_only",
            ScreeningCategory::Pep => "pep_only",
            ScreeningCategory::AdverseMedia => "adverse_media",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScreeningCategory::Sanctions => "sanctions",
            ScreeningCategory::Pep => "pep",
            ScreeningCategory::AdverseMedia => "adverse_media",
        }
    }
}

impl fmt::Display for ScreeningCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScreeningStatus {
    Completed,
    Error,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    High,
    Unknown,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::High => "high",
            RiskLevel::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

//
// ================= Results =================
//

/// One watch-list record returned by a screening call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScreeningHit {
    pub name: String,
    pub score: f64,
    pub source: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScreeningCategoryResult {
    pub category: ScreeningCategory,
    pub status: ScreeningStatus,
    pub has_match: bool,
    pub hits: Vec<ScreeningHit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScreeningCategoryResult {
    pub fn completed(category: ScreeningCategory, hits: Vec<ScreeningHit>) -> Self {
        Self {
            category,
            status: ScreeningStatus::Completed,
            has_match: !hits.is_empty(),
            hits,
            search_id: None,
            error: None,
        }
    }

    /// A failed screening call never counts as a match.
    pub fn failed(category: ScreeningCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            status: ScreeningStatus::Error,
            has_match: false,
            hits: Vec::new(),
            search_id: None,
            error: Some(message.into()),
        }
    }

    pub fn with_search_id(mut self, search_id: Option<String>) -> Self {
        self.search_id = search_id;
        self
    }

    pub fn is_error(&self) -> bool {
        self.status == ScreeningStatus::Error
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComplianceResult {
    pub risk_level: RiskLevel,
    pub sanctions: ScreeningCategoryResult,
    pub pep: ScreeningCategoryResult,
    pub adverse_media: ScreeningCategoryResult,
}

impl ComplianceResult {
    pub fn categories(&self) -> [&ScreeningCategoryResult; 3] {
        [&self.sanctions, &self.pep, &self.adverse_media]
    }
}

//
// ================= Aggregation =================
//

/// Fold three category results into one risk level.
///
/// Any errored category makes the overall level `Unknown`; otherwise any
/// match makes it `High`; only three clean completed screenings give `Low`.
pub fn aggregate(
    sanctions: ScreeningCategoryResult,
    pep: ScreeningCategoryResult,
    adverse_media: ScreeningCategoryResult,
) -> ComplianceResult {
    let categories = [&sanctions, &pep, &adverse_media];

    let risk_level = if categories.iter().any(|c| c.is_error()) {
        RiskLevel::Unknown
    } else if categories.iter().any(|c| c.has_match) {
        RiskLevel::High
    } else {
        RiskLevel::Low
    };

    ComplianceResult {
        risk_level,
        sanctions,
        pep,
        adverse_media,
    }
}

//
// ================= Screening Collaborator =================
//

/// External watch-list screening service, called once per category.
#[async_trait]
pub trait ScreeningProvider: Send + Sync {
    async fn screen(
        &self,
        name: &str,
        category: ScreeningCategory,
    ) -> Result<ScreeningCategoryResult>;
}

/// Runs the three category screenings concurrently and aggregates them.
#[derive(Clone)]
pub struct ComplianceScreener {
    provider: Arc<dyn ScreeningProvider>,
}

impl ComplianceScreener {
    pub fn new(provider: Arc<dyn ScreeningProvider>) -> Self {
        Self { provider }
    }

    pub async fn screen(&self, name: &str) -> ComplianceResult {
        let (sanctions, pep, adverse_media) = tokio::join!(
            self.screen_category(name, ScreeningCategory::Sanctions),
            self.screen_category(name, ScreeningCategory::Pep),
            self.screen_category(name, ScreeningCategory::AdverseMedia),
        );

        let result = aggregate(sanctions, pep, adverse_media);

        info!(
            risk_level = %result.risk_level,
            sanctions_hits = result.sanctions.hits.len(),
            pep_hits = result.pep.hits.len(),
            adverse_media_hits = result.adverse_media.hits.len(),
            "Compliance screening completed"
        );

        result
    }

    async fn screen_category(
        &self,
        name: &str,
        category: ScreeningCategory,
    ) -> ScreeningCategoryResult {
        match self.provider.screen(name, category).await {
            Ok(result) => result,
            Err(e) => {
                warn!(category = %category, error = %e, "Screening call failed");
                ScreeningCategoryResult::failed(category, e.to_string())
            }
        }
    }
}

//
// ================= Tests =================
//
