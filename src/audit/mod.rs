//! Audit trail for KYC runs and reviews
//!
//! Every run and every human review is recorded with a fingerprint of the
//! application it concerned, so a record can later be checked against the
//! inputs it claims to describe.

use crate::compliance::RiskLevel;
use crate::models::{Contact, CustomerStatus};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    KycRun,
    Review,
}

/// Contact details plus digests of every submitted image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationDigest {
    pub contact: Contact,
    pub id_document_sha256: String,
    pub address_document_sha256: String,
    pub selfie_sha256: String,
}

impl ApplicationDigest {
    pub fn new(contact: &Contact, id_document: &[u8], address_document: &[u8], selfie: &[u8]) -> Self {
        Self {
            contact: contact.clone(),
            id_document_sha256: digest_bytes(id_document),
            address_document_sha256: digest_bytes(address_document),
            selfie_sha256: digest_bytes(selfie),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub audit_id: Uuid,
    pub customer_id: Uuid,
    pub event: AuditEvent,
    pub application: Arc<ApplicationDigest>,
    pub application_fingerprint: String,
    pub status: CustomerStatus,
    pub required_actions: Vec<String>,
    pub risk_level: Option<RiskLevel>,
    pub reasoning_trace: Arc<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub execution_time_ms: u64,
}

/// Audit trail storage
///
/// Append-only and in memory: records are never evicted, so the log grows
/// with every run and review until the process exits.
pub struct AuditLog {
    records: Arc<RwLock<HashMap<Uuid, AuditRecord>>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn record(&self, record: AuditRecord) -> Result<Uuid> {
        let audit_id = record.audit_id;
        let mut records = self.records.write().await;
        records.insert(audit_id, record);
        Ok(audit_id)
    }

    pub async fn get(&self, audit_id: Uuid) -> Result<Option<AuditRecord>> {
        let records = self.records.read().await;
        Ok(records.get(&audit_id).cloned())
    }

    /// Records for a customer, oldest first.
    pub async fn list_for_customer(&self, customer_id: Uuid) -> Result<Vec<AuditRecord>> {
        let records = self.records.read().await;

        let mut items: Vec<AuditRecord> = records
            .values()
            .filter(|record| record.customer_id == customer_id)
            .cloned()
            .collect();
        items.sort_by_key(|record| record.created_at);

        Ok(items)
    }

    /// Recompute the application fingerprint and compare it with the stored one.
    pub async fn verify_integrity(&self, audit_id: Uuid) -> Result<bool> {
        let records = self.records.read().await;

        Ok(records
            .get(&audit_id)
            .map(|record| compute_fingerprint(&record.application) == record.application_fingerprint)
            .unwrap_or(false))
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Hex SHA-256 of raw bytes
pub fn digest_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// SHA-256 over the JSON form of an application, streamed into the hasher.
pub fn compute_fingerprint(application: &ApplicationDigest) -> String {
    let mut hasher = Sha256::new();

    if serde_json::to_writer(&mut HashWriter(&mut hasher), application).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
