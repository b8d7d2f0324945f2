use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

/// Structured view of the metadata payload attached to a certificate.
///
/// Only produced by [`crate::services::metadata_decoder::decode`], which
/// guarantees that every required field was present and well typed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedMetadata {
    pub name: String,
    pub credential_type: String,
    pub issued_at_epoch_seconds: i64,
    /// Issuer address as claimed by the issuing tool. Informational only; the
    /// on-chain issuer on the record is authoritative.
    pub issuer: Option<String>,
    /// The full decoded document, including fields this crate does not interpret.
    pub document: Map<String, JsonValue>,
}

impl DecodedMetadata {
    pub fn issued_at(&self) -> DateTime<Utc> {
        // range checked at decode time
        DateTime::from_timestamp(self.issued_at_epoch_seconds, 0).unwrap_or_default()
    }
}
