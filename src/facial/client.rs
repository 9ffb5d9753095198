//! Face++ detect/compare client

use super::{FaceComparison, FaceRef, FaceService};
use crate::config::ServiceEndpoints;
use crate::error::KycError;
use crate::http::{require, ServiceClient};
use crate::Result;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value;
use tracing::debug;

const SERVICE: &str = "Face++";
const DETECTION_MODEL: &str = "detection_02";

pub struct FacePlusPlusClient {
    http: ServiceClient,
    api_key: Option<String>,
    api_secret: Option<String>,
}

impl FacePlusPlusClient {
    pub fn new(base_url: &str, api_key: Option<String>, api_secret: Option<String>) -> Result<Self> {
        Ok(Self {
            http: ServiceClient::new(SERVICE, base_url)?,
            api_key,
            api_secret,
        })
    }

    pub fn from_endpoints(endpoints: &ServiceEndpoints) -> Result<Self> {
        Self::new(
            &endpoints.facepp_api_url,
            endpoints.facepp_api_key.clone(),
            endpoints.facepp_api_secret.clone(),
        )
    }

    fn credentials(&self) -> Result<(&str, &str)> {
        Ok((
            require(SERVICE, &self.api_key, "FACEPP_API_KEY")?,
            require(SERVICE, &self.api_secret, "FACEPP_API_SECRET")?,
        ))
    }
}

#[async_trait]
impl FaceService for FacePlusPlusClient {
    async fn detect_face(&self, image: &[u8]) -> Result<Option<FaceRef>> {
        let (api_key, api_secret) = self.credentials()?;
        let encoded = BASE64.encode(image);

        let form = [
            ("api_key", api_key),
            ("api_secret", api_secret),
            ("return_landmark", "1"),
            ("return_attributes", "none"),
            ("model", DETECTION_MODEL),
            ("image_base64", encoded.as_str()),
        ];

        let response = self.http.send_json(self.http.post("/detect").form(&form)).await?;
        let face = first_face_token(&response)?;

        debug!(face_found = face.is_some(), "Face detection returned");
        Ok(face)
    }

    async fn compare_faces(&self, first: &FaceRef, second: &FaceRef) -> Result<FaceComparison> {
        let (api_key, api_secret) = self.credentials()?;

        let form = [
            ("api_key", api_key),
            ("api_secret", api_secret),
            ("face_token1", first.as_str()),
            ("face_token2", second.as_str()),
        ];

        let response = self.http.send_json(self.http.post("/compare").form(&form)).await?;
        Ok(parse_comparison(&response))
    }
}

fn first_face_token(response: &Value) -> Result<Option<FaceRef>> {
    let Some(face) = response
        .get("faces")
        .and_then(|f| f.as_array())
        .and_then(|faces| faces.first())
    else {
        return Ok(None);
    };

    face.get("face_token")
        .and_then(|t| t.as_str())
        .map(|t| Some(FaceRef::new(t)))
        .ok_or_else(|| KycError::collaborator(SERVICE, "detected face carries no face_token"))
}

/// Missing confidence means no resemblance.
fn parse_comparison(response: &Value) -> FaceComparison {
    FaceComparison {
        confidence: response
            .get("confidence")
            .and_then(|c| c.as_f64())
            .unwrap_or(0.0),
    }
}
