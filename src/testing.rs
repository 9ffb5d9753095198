//! Test fixtures: synthetic images and in-process collaborator fakes

use crate::compliance::{
    aggregate, ScreeningCategory, ScreeningCategoryResult, ScreeningHit, ScreeningProvider,
};
use crate::decision::DecisionInputs;
use crate::documents::{DocumentClassification, ExtractedText, TextExtractor};
use crate::error::KycError;
use crate::facial::{FaceComparison, FaceRef, FaceService, FacialMatchResult};
use crate::models::Contact;
use crate::notification::{
    DeliveryResult, EmailChannel, Notification, NotificationDelivery, Notifier, SmsChannel,
};
use crate::Result;
use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn contact() -> Contact {
    Contact {
        first_name: "Jane".to_string(),
        last_name: "Doe".to_string(),
        email: "jane@example.com".to_string(),
        phone: Some("+15550100".to_string()),
    }
}

/// PNG of a white canvas with solid black rectangles `(x, y, width, height)`.
pub fn hand_image(width: u32, height: u32, blobs: &[(u32, u32, u32, u32)]) -> Vec<u8> {
    let mut image = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    for &(x0, y0, w, h) in blobs {
        for y in y0..(y0 + h).min(height) {
            for x in x0..(x0 + w).min(width) {
                image.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
    }

    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
}

/// Three clearly separated finger-sized blobs.
pub fn three_finger_hand() -> Vec<u8> {
    hand_image(
        320,
        200,
        &[(20, 30, 50, 120), (100, 30, 50, 120), (180, 30, 50, 120)],
    )
}

pub fn classification(confidence: f64) -> DocumentClassification {
    let rest = (1.0 - confidence) / 5.0;
    DocumentClassification::from_scores(&[confidence, rest, rest, rest, rest, rest], 0.85).unwrap()
}

pub fn passing_inputs() -> DecisionInputs {
    DecisionInputs {
        id_document: classification(0.95),
        address_document: classification(0.92),
        facial_match: FacialMatchResult::new(0.96, 0.9),
        compliance: aggregate(
            ScreeningCategoryResult::completed(ScreeningCategory::Sanctions, vec![]),
            ScreeningCategoryResult::completed(ScreeningCategory::Pep, vec![]),
            ScreeningCategoryResult::completed(ScreeningCategory::AdverseMedia, vec![]),
        ),
    }
}

//
// ================= Faces =================
//

/// Detects a face in every image except the listed ones and compares at a fixed confidence.
#[derive(Clone)]
pub struct FakeFaces {
    confidence: f64,
    faceless: HashSet<Vec<u8>>,
    latency: Option<Duration>,
    unavailable: bool,
    comparisons: Arc<AtomicUsize>,
}

impl FakeFaces {
    pub fn new(confidence: f64) -> Self {
        Self {
            confidence,
            faceless: HashSet::new(),
            latency: None,
            unavailable: false,
            comparisons: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn without_face_in(mut self, image: &[u8]) -> Self {
        self.faceless.insert(image.to_vec());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::new(0.0)
        }
    }

    pub fn comparisons(&self) -> usize {
        self.comparisons.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FaceService for FakeFaces {
    async fn detect_face(&self, image: &[u8]) -> Result<Option<FaceRef>> {
        if self.unavailable {
            return Err(KycError::collaborator("Face++", "HTTP 503"));
        }
        if self.faceless.contains(image) {
            return Ok(None);
        }
        Ok(Some(FaceRef::new(format!("face-{}", image.len()))))
    }

    async fn compare_faces(&self, _first: &FaceRef, _second: &FaceRef) -> Result<FaceComparison> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.comparisons.fetch_add(1, Ordering::SeqCst);
        Ok(FaceComparison {
            confidence: self.confidence,
        })
    }
}

//
// ================= Screening =================
//

#[derive(Clone, Default)]
pub struct FakeScreening {
    hits: HashMap<ScreeningCategory, Vec<ScreeningHit>>,
    failing: HashSet<ScreeningCategory>,
    calls: Arc<Mutex<Vec<(String, ScreeningCategory)>>>,
}

impl FakeScreening {
    pub fn clean() -> Self {
        Self::default()
    }

    pub fn with_hits(mut self, category: ScreeningCategory, hits: Vec<ScreeningHit>) -> Self {
        self.hits.insert(category, hits);
        self
    }

    pub fn failing(mut self, category: ScreeningCategory) -> Self {
        self.failing.insert(category);
        self
    }

    pub fn calls(&self) -> Vec<(String, ScreeningCategory)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScreeningProvider for FakeScreening {
    async fn screen(
        &self,
        name: &str,
        category: ScreeningCategory,
    ) -> Result<ScreeningCategoryResult> {
        self.calls.lock().unwrap().push((name.to_string(), category));

        if self.failing.contains(&category) {
            return Err(KycError::collaborator("Compliance API", "HTTP 503"));
        }
        let hits = self.hits.get(&category).cloned().unwrap_or_default();
        Ok(ScreeningCategoryResult::completed(category, hits))
    }
}

//
// ================= Documents =================
//

/// Returns canned OCR output keyed by image bytes.
#[derive(Clone, Default)]
pub struct StaticTextExtractor {
    texts: HashMap<Vec<u8>, ExtractedText>,
    unavailable: bool,
}

impl StaticTextExtractor {
    pub fn with_text(mut self, image: &[u8], text: ExtractedText) -> Self {
        self.texts.insert(image.to_vec(), text);
        self
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl TextExtractor for StaticTextExtractor {
    async fn extract_text(&self, image: &[u8]) -> Result<ExtractedText> {
        if self.unavailable {
            return Err(KycError::collaborator("OCR", "connection refused"));
        }
        Ok(self.texts.get(image).cloned().unwrap_or_default())
    }
}

//
// ================= Notifications =================
//

/// Records every email and SMS it is asked to send.
#[derive(Clone, Default)]
pub struct RecordingChannel {
    sent: Arc<Mutex<Vec<(String, String)>>>,
    fail: bool,
}

impl RecordingChannel {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// `(recipient, body)` pairs
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    fn record(&self, to: &str, body: &str) -> Result<Option<String>> {
        if self.fail {
            return Err(KycError::collaborator("SendGrid", "HTTP 401"));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((to.to_string(), body.to_string()));
        Ok(Some(format!("msg-{}", sent.len())))
    }
}

#[async_trait]
impl EmailChannel for RecordingChannel {
    async fn send_email(&self, to: &str, _subject: &str, html: &str) -> Result<Option<String>> {
        self.record(to, html)
    }
}

#[async_trait]
impl SmsChannel for RecordingChannel {
    async fn send_sms(&self, to: &str, body: &str) -> Result<Option<String>> {
        self.record(to, body)
    }
}

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<(Notification, Contact)>>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<(Notification, Contact)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification, contact: &Contact) -> NotificationDelivery {
        self.sent
            .lock()
            .unwrap()
            .push((notification.clone(), contact.clone()));

        if self.fail {
            NotificationDelivery {
                email: DeliveryResult::failed("SendGrid error: HTTP 401"),
                sms: DeliveryResult::failed("Twilio error: HTTP 401"),
            }
        } else {
            NotificationDelivery {
                email: DeliveryResult::sent(Some("email-1".into())),
                sms: DeliveryResult::sent(Some("sms-1".into())),
            }
        }
    }
}
