//! SendGrid email and Twilio SMS channels

use super::{EmailChannel, SmsChannel};
use crate::config::ServiceEndpoints;
use crate::http::{require, ServiceClient};
use crate::Result;
use async_trait::async_trait;
use serde_json::json;

const SENDGRID: &str = "SendGrid";
const SENDGRID_URL: &str = "https://api.sendgrid.com/v3";
const TWILIO: &str = "Twilio";
const TWILIO_URL: &str = "https://api.twilio.com/2010-04-01";

pub struct SendGridEmail {
    http: ServiceClient,
    api_key: Option<String>,
    from: String,
}

impl SendGridEmail {
    pub fn new(api_key: Option<String>, from: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: ServiceClient::new(SENDGRID, SENDGRID_URL)?,
            api_key,
            from: from.into(),
        })
    }

    pub fn from_endpoints(endpoints: &ServiceEndpoints) -> Result<Self> {
        Self::new(endpoints.sendgrid_api_key.clone(), endpoints.email_from.clone())
    }
}

#[async_trait]
impl EmailChannel for SendGridEmail {
    async fn send_email(&self, to: &str, subject: &str, html: &str) -> Result<Option<String>> {
        let api_key = require(SENDGRID, &self.api_key, "SENDGRID_API_KEY")?;

        let body = json!({
            "personalizations": [{ "to": [{ "email": to }] }],
            "from": { "email": self.from },
            "subject": subject,
            "content": [{ "type": "text/html", "value": html }],
        });

        let response = self
            .http
            .send(self.http.post("/mail/send").bearer_auth(api_key).json(&body))
            .await?;

        Ok(response
            .headers()
            .get("X-Message-Id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string))
    }
}

pub struct TwilioSms {
    http: ServiceClient,
    account_sid: Option<String>,
    auth_token: Option<String>,
    from_number: Option<String>,
}

impl TwilioSms {
    pub fn new(
        account_sid: Option<String>,
        auth_token: Option<String>,
        from_number: Option<String>,
    ) -> Result<Self> {
        Ok(Self {
            http: ServiceClient::new(TWILIO, TWILIO_URL)?,
            account_sid,
            auth_token,
            from_number,
        })
    }

    pub fn from_endpoints(endpoints: &ServiceEndpoints) -> Result<Self> {
        Self::new(
            endpoints.twilio_account_sid.clone(),
            endpoints.twilio_auth_token.clone(),
            endpoints.twilio_from_number.clone(),
        )
    }
}

#[async_trait]
impl SmsChannel for TwilioSms {
    async fn send_sms(&self, to: &str, body: &str) -> Result<Option<String>> {
        let sid = require(TWILIO, &self.account_sid, "TWILIO_ACCOUNT_SID")?;
        let token = require(TWILIO, &self.auth_token, "TWILIO_AUTH_TOKEN")?;
        let from = require(TWILIO, &self.from_number, "TWILIO_FROM_NUMBER")?;

        let form = [("To", to), ("From", from), ("Body", body)];
        let request = self
            .http
            .post(&format!("/Accounts/{}/Messages.json", sid))
            .basic_auth(sid, Some(token))
            .form(&form);

        let response = self.http.send_json(request).await?;
        Ok(response.get("sid").and_then(|s| s.as_str()).map(str::to_string))
    }
}
