use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

/// Block numbers are signed so that expiry arithmetic can go negative.
pub type BlockNumber = i64;

/// A certificate exactly as returned by `certificates_getAccountCertificates`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawCertificateRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub owner: String,
    pub issuer: String,
    /// Encoding problems are kept per record so one bad entry does not fail the batch.
    #[serde(rename = "metadata", deserialize_with = "bytes_or_hex")]
    pub metadata_bytes: Result<Vec<u8>, MetadataEncodingError>,
    /// Block the certificate was issued in. Not used for `issued_at`.
    #[serde(rename = "issued_at", default)]
    pub issued_at_block: Option<BlockNumber>,
    pub revoked: bool,
    /// Expiry block; any value <= 0 means the certificate never expires.
    #[serde(rename = "expires_at")]
    pub expires_at_block: BlockNumber,
}

impl RawCertificateRecord {
    pub fn has_expiry(&self) -> bool {
        self.expires_at_block > 0
    }
}

/// The `metadata` field was neither hex nor a byte array.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataEncodingError {
    #[error("invalid hex metadata: {0}")]
    InvalidHex(String),

    #[error("metadata element {index} is not a byte: {value}")]
    NotAByte { index: usize, value: String },

    #[error("metadata must be a hex string or byte array, got {0}")]
    UnsupportedShape(String),
}

/// Display verdict derived from a resolved certificate. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    Active,
    Expired,
    Revoked,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Active => "Active",
            Verdict::Expired => "Expired",
            Verdict::Revoked => "Revoked",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedCertificate {
    pub id: String,
    pub owner: String,
    pub issuer: String,
    pub name: String,
    pub credential_type: String,
    pub issued_at: DateTime<Utc>,
    pub issued_at_block: Option<BlockNumber>,
    /// Estimated wall-clock expiry, projected from block height.
    pub expires_at: Option<DateTime<Utc>>,
    pub is_expired: bool,
    pub revoked: bool,
    pub metadata: Map<String, JsonValue>,
}

impl ResolvedCertificate {
    /// Revocation always wins over expiry.
    pub fn verdict(&self) -> Verdict {
        if self.revoked {
            Verdict::Revoked
        } else if self.is_expired {
            Verdict::Expired
        } else {
            Verdict::Active
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match JsonValue::deserialize(deserializer)? {
        JsonValue::String(s) => Ok(s),
        JsonValue::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

/// Substrate nodes serialize `Vec<u8>` either as `0x`-prefixed hex or as a
/// plain array of numbers depending on the codec in use.
fn bytes_or_hex<'de, D>(
    deserializer: D,
) -> Result<Result<Vec<u8>, MetadataEncodingError>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(metadata_bytes_from_json(&JsonValue::deserialize(deserializer)?))
}

fn metadata_bytes_from_json(value: &JsonValue) -> Result<Vec<u8>, MetadataEncodingError> {
    match value {
        JsonValue::String(s) => {
            let digits = s.strip_prefix("0x").unwrap_or(s);
            hex::decode(digits).map_err(|e| MetadataEncodingError::InvalidHex(e.to_string()))
        }
        JsonValue::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                item.as_u64()
                    .and_then(|n| u8::try_from(n).ok())
                    .ok_or_else(|| MetadataEncodingError::NotAByte {
                        index,
                        value: item.to_string(),
                    })
            })
            .collect(),
        other => Err(MetadataEncodingError::UnsupportedShape(other.to_string())),
    }
}
