//! Centralized configuration
//!
//! Every threshold and collaborator endpoint lives here. Built once at
//! startup (from `.env` + environment) and shared as `Arc<KycConfig>`.

use crate::error::KycError;
use crate::Result;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct KycConfig {
    /// Classification confidence below this needs review (0..1)
    pub document_classification_threshold: f64,
    /// Similarity at or above this verifies a facial match (0..1)
    pub facial_match_threshold: f64,
    /// Face comparison confidence at or above this verifies a selfie (0..100)
    pub selfie_match_threshold: f64,
    /// Contours enclosing this area or less are noise
    pub min_region_area: f64,
    pub session_ttl: Duration,
    pub session_sweep_interval: Duration,
    pub max_upload_bytes: usize,
    pub api_port: u16,
    pub services: ServiceEndpoints,
}

#[derive(Debug, Clone)]
pub struct ServiceEndpoints {
    pub compliance_api_url: String,
    pub compliance_api_key: Option<String>,
    pub facepp_api_url: String,
    pub facepp_api_key: Option<String>,
    pub facepp_api_secret: Option<String>,
    pub ocr_api_url: Option<String>,
    pub sendgrid_api_key: Option<String>,
    pub email_from: String,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_from_number: Option<String>,
}

impl Default for ServiceEndpoints {
    fn default() -> Self {
        Self {
            compliance_api_url: "https://api.complyadvantage.com".to_string(),
            compliance_api_key: None,
            facepp_api_url: "https://api-us.faceplusplus.com/facepp/v3".to_string(),
            facepp_api_key: None,
            facepp_api_secret: None,
            ocr_api_url: None,
            sendgrid_api_key: None,
            email_from: "noreply@kyc-automation.com".to_string(),
            twilio_account_sid: None,
            twilio_auth_token: None,
            twilio_from_number: None,
        }
    }
}

impl Default for KycConfig {
    fn default() -> Self {
        Self {
            document_classification_threshold: 0.85,
            facial_match_threshold: 0.9,
            selfie_match_threshold: 80.0,
            min_region_area: 1500.0,
            session_ttl: Duration::from_secs(30 * 60),
            session_sweep_interval: Duration::from_secs(60),
            max_upload_bytes: 5 * 1024 * 1024,
            api_port: 8080,
            services: ServiceEndpoints::default(),
        }
    }
}

impl KycConfig {
    /// Load `.env` (if present) and read overrides from the environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let defaults = Self::default();
        let services = ServiceEndpoints {
            compliance_api_url: env::var("COMPLYADVANTAGE_API_URL")
                .unwrap_or(defaults.services.compliance_api_url),
            compliance_api_key: optional_var("COMPLYADVANTAGE_API_KEY"),
            facepp_api_url: env::var("FACEPP_API_URL").unwrap_or(defaults.services.facepp_api_url),
            facepp_api_key: optional_var("FACEPP_API_KEY"),
            facepp_api_secret: optional_var("FACEPP_API_SECRET"),
            ocr_api_url: optional_var("OCR_API_BASE_URL"),
            sendgrid_api_key: optional_var("SENDGRID_API_KEY"),
            email_from: env::var("NOTIFY_EMAIL_FROM").unwrap_or(defaults.services.email_from),
            twilio_account_sid: optional_var("TWILIO_ACCOUNT_SID"),
            twilio_auth_token: optional_var("TWILIO_AUTH_TOKEN"),
            twilio_from_number: optional_var("TWILIO_FROM_NUMBER"),
        };

        let api_port = match optional_var("PORT").or_else(|| optional_var("API_PORT")) {
            Some(raw) => parse_value("PORT", &raw)?,
            None => defaults.api_port,
        };

        let config = Self {
            document_classification_threshold: parsed_var(
                "DOCUMENT_CLASSIFICATION_THRESHOLD",
                defaults.document_classification_threshold,
            )?,
            facial_match_threshold: parsed_var(
                "FACIAL_MATCH_THRESHOLD",
                defaults.facial_match_threshold,
            )?,
            selfie_match_threshold: parsed_var(
                "SELFIE_MATCH_THRESHOLD",
                defaults.selfie_match_threshold,
            )?,
            min_region_area: parsed_var("MIN_REGION_AREA", defaults.min_region_area)?,
            session_ttl: Duration::from_secs(parsed_var(
                "SESSION_TTL_SECS",
                defaults.session_ttl.as_secs(),
            )?),
            session_sweep_interval: Duration::from_secs(parsed_var(
                "SESSION_SWEEP_INTERVAL_SECS",
                defaults.session_sweep_interval.as_secs(),
            )?),
            max_upload_bytes: parsed_var("MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            api_port,
            services,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        check_unit_range(
            "DOCUMENT_CLASSIFICATION_THRESHOLD",
            self.document_classification_threshold,
        )?;
        check_unit_range("FACIAL_MATCH_THRESHOLD", self.facial_match_threshold)?;

        if !(0.0..=100.0).contains(&self.selfie_match_threshold) {
            return Err(KycError::ConfigError(format!(
                "SELFIE_MATCH_THRESHOLD must be within 0..=100, got {}",
                self.selfie_match_threshold
            )));
        }

        if !self.min_region_area.is_finite() || self.min_region_area < 0.0 {
            return Err(KycError::ConfigError(format!(
                "MIN_REGION_AREA must be a non-negative number, got {}",
                self.min_region_area
            )));
        }

        if self.session_sweep_interval.is_zero() {
            return Err(KycError::ConfigError(
                "SESSION_SWEEP_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_var<T: FromStr>(key: &str, default: T) -> Result<T> {
    match optional_var(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| KycError::ConfigError(format!("{} has an invalid value: {:?}", key, raw)))
}

fn check_unit_range(key: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(KycError::ConfigError(format!(
            "{} must be within 0..=1, got {}",
            key, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = KycConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.selfie_match_threshold, 80.0);
        assert_eq!(config.min_region_area, 1500.0);
        assert_eq!(config.document_classification_threshold, 0.85);
    }

    #[test]
    fn test_out_of_range_thresholds_rejected() {
        let config = KycConfig {
            facial_match_threshold: 1.5,
            ..KycConfig::default()
        };
        assert!(matches!(config.validate(), Err(KycError::ConfigError(_))));

        let config = KycConfig {
            selfie_match_threshold: 120.0,
            ..KycConfig::default()
        };
        assert!(matches!(config.validate(), Err(KycError::ConfigError(_))));

        let config = KycConfig {
            min_region_area: -1.0,
            ..KycConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_value_reports_key() {
        let err = parse_value::<f64>("MIN_REGION_AREA", "lots").unwrap_err();
        assert!(err.to_string().contains("MIN_REGION_AREA"));
        assert_eq!(parse_value::<u16>("PORT", " 9000 ").unwrap(), 9000);
    }
}
