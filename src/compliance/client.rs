//! ComplyAdvantage-style watch-list search client

use super::{ScreeningCategory, ScreeningCategoryResult, ScreeningHit, ScreeningProvider};
use crate::config::ServiceEndpoints;
use crate::http::{require, ServiceClient};
use crate::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

const SERVICE: &str = "Compliance API";
const FUZZINESS: f64 = 0.6;
const RESULT_LIMIT: u32 = 10;

pub struct ComplyAdvantageClient {
    http: ServiceClient,
    api_key: Option<String>,
}

impl ComplyAdvantageClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            http: ServiceClient::new(SERVICE, base_url)?,
            api_key,
        })
    }

    pub fn from_endpoints(endpoints: &ServiceEndpoints) -> Result<Self> {
        Self::new(
            &endpoints.compliance_api_url,
            endpoints.compliance_api_key.clone(),
        )
    }
}

#[async_trait]
impl ScreeningProvider for ComplyAdvantageClient {
    async fn screen(
        &self,
        name: &str,
        category: ScreeningCategory,
    ) -> Result<ScreeningCategoryResult> {
        let api_key = require(SERVICE, &self.api_key, "COMPLYADVANTAGE_API_KEY")?;

        let body = json!({
            "search_term": name,
            "fuzziness": FUZZINESS,
            "search_profile": category.search_profile(),
            "limit": RESULT_LIMIT,
        });

        let request = self
            .http
            .post("/searches/")
            .header("Authorization", format!("Token {}", api_key))
            .json(&body);

        let response = self.http.send_json(request).await?;
        let result = parse_search_response(category, &response);

        debug!(
            category = %category,
            hits = result.hits.len(),
            "Screening search returned"
        );

        Ok(result)
    }
}

pub(crate) fn parse_search_response(
    category: ScreeningCategory,
    response: &Value,
) -> ScreeningCategoryResult {
    let hits = response
        .get("hits")
        .and_then(|h| h.as_array())
        .map(|hits| hits.iter().map(|hit| parse_hit(category, hit)).collect())
        .unwrap_or_default();

    let search_id = response.get("search_id").and_then(|id| match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });

    ScreeningCategoryResult::completed(category, hits).with_search_id(search_id)
}

fn parse_hit(category: ScreeningCategory, hit: &Value) -> ScreeningHit {
    let text = |key: &str| hit.get(key).and_then(|v| v.as_str()).map(str::to_string);

    ScreeningHit {
        name: text("name").or_else(|| text("title")).unwrap_or_default(),
        score: hit.get("score").and_then(|v| v.as_f64()).unwrap_or(0.0),
        source: text("source").unwrap_or_else(|| category.label().to_string()),
        url: text("url"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hits_in_order() {
        let response = json!({
            "search_id": 8841,
            "hits": [
                {"name": "Jane Doe", "score": 0.97, "source": "ofac-sdn", "url": "https://a"},
                {"name": "J. Doe", "score": 0.71, "source": "un-list"}
            ]
        });

        let result = parse_search_response(ScreeningCategory::Sanctions, &response);
        assert!(result.has_match);
        assert_eq!(result.hits.len(), 2);
        assert_eq!(result.hits[0].name, "Jane Doe");
        assert_eq!(result.hits[1].url, None);
        assert_eq!(result.search_id.as_deref(), Some("8841"));
    }

    #[test]
    fn test_adverse_media_hits_use_title_and_category_source() {
        let response = json!({"hits": [{"title": "Fraud inquiry widens", "score": 0.5}]});
        let result = parse_search_response(ScreeningCategory::AdverseMedia, &response);

        assert_eq!(result.hits[0].name, "Fraud inquiry widens");
        assert_eq!(result.hits[0].source, "adverse_media");
    }

    #[test]
    fn test_missing_hits_is_clean() {
        let result = parse_search_response(ScreeningCategory::Pep, &json!({}));
        assert!(!result.has_match);
        assert!(result.hits.is_empty());
    }

    #[tokio::test]
    async fn test_missing_key_is_collaborator_error() {
        let client = ComplyAdvantageClient::new("http://127.0.0.1:9", None).unwrap();
        let err = client
            .screen("Jane Doe", ScreeningCategory::Sanctions)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "collaborator_error");
    }
}
