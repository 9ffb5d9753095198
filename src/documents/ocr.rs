//! HTTP OCR client

use super::{ExtractedText, TextExtractor};
use crate::error::KycError;
use crate::http::ServiceClient;
use crate::Result;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};

const SERVICE: &str = "OCR";

pub struct HttpTextExtractor {
    http: Option<ServiceClient>,
}

impl HttpTextExtractor {
    /// `None` leaves the extractor unconfigured; every call then fails.
    pub fn new(base_url: Option<&str>) -> Result<Self> {
        let http = base_url.map(|url| ServiceClient::new(SERVICE, url)).transpose()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl TextExtractor for HttpTextExtractor {
    async fn extract_text(&self, image: &[u8]) -> Result<ExtractedText> {
        let http = self
            .http
            .as_ref()
            .ok_or_else(|| KycError::collaborator(SERVICE, "OCR_API_BASE_URL is not configured"))?;

        let body = json!({ "image": BASE64.encode(image) });
        let response = http.send_json(http.post("/extract").json(&body)).await?;

        parse_extraction(&response)
    }
}

fn parse_extraction(response: &Value) -> Result<ExtractedText> {
    let text = response
        .get("text")
        .and_then(|t| t.as_str())
        .ok_or_else(|| KycError::collaborator(SERVICE, "response carries no text"))?;

    let mut extracted = ExtractedText::new(text);
    if let Some(pairs) = response.get("key_value_pairs").and_then(|p| p.as_object()) {
        for (key, value) in pairs {
            // Keys without a recognised value are dropped
            if let Some(value) = value.as_str() {
                extracted = extracted.with_field(key.clone(), value);
            }
        }
    }

    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_and_fields() {
        let response = json!({
            "text": "PASSPORT\nJANE DOE\n",
            "key_value_pairs": {"Document Number": "P998877", "Expiry": null}
        });

        let extracted = parse_extraction(&response).unwrap();
        assert_eq!(extracted.text, "PASSPORT\nJANE DOE\n");
        assert_eq!(extracted.document_number(), Some("P998877"));
        assert_eq!(extracted.key_value_pairs.len(), 1);
    }

    #[test]
    fn test_missing_text_is_collaborator_error() {
        let err = parse_extraction(&json!({"blocks": []})).unwrap_err();
        assert_eq!(err.kind(), "collaborator_error");
    }

    #[tokio::test]
    async fn test_unconfigured_extractor_fails() {
        let extractor = HttpTextExtractor::new(None).unwrap();
        let err = extractor.extract_text(b"img").await.unwrap_err();
        assert!(err.to_string().contains("OCR_API_BASE_URL"));
    }
}
