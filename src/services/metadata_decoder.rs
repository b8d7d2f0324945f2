use serde_json::{Map, Value as JsonValue};

use crate::models::{DecodedMetadata, MetadataEncodingError};

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("Metadata bytes are not readable: {0}")]
    BadEncoding(#[from] MetadataEncodingError),

    #[error("Metadata is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("Metadata is not a valid JSON document: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Metadata document is not a key-value object")]
    NotAnObject,

    #[error("Metadata is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("Metadata field `{field}` must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("Metadata issued_at {0} is outside the representable time range")]
    TimestampOutOfRange(i64),
}

const FIELD_NAME: &str = "name";
const FIELD_CERT_TYPE: &str = "cert_type";
const FIELD_ISSUED_AT: &str = "issued_at";
const FIELD_ISSUER: &str = "issuer";

/// Decodes the opaque metadata bytes stored on a certificate.
///
/// The issuer CLI writes a UTF-8 JSON object such as
/// `{"name":"WHMIS","cert_type":"Safety","issuer":"5F...","issued_at":1700000000}`.
/// Decoding is pure; the same bytes always produce the same result.
pub fn decode(metadata_bytes: &[u8]) -> Result<DecodedMetadata, DecodeError> {
    let text = std::str::from_utf8(metadata_bytes)?;

    let document = match serde_json::from_str::<JsonValue>(text)? {
        JsonValue::Object(map) => map,
        _ => return Err(DecodeError::NotAnObject),
    };

    let name = required_string(&document, FIELD_NAME)?;
    let credential_type = required_string(&document, FIELD_CERT_TYPE)?;
    let issued_at_epoch_seconds = required_timestamp(&document, FIELD_ISSUED_AT)?;

    let issuer = match document.get(FIELD_ISSUER) {
        None | Some(JsonValue::Null) => None,
        Some(JsonValue::String(s)) => Some(s.clone()),
        Some(_) => {
            return Err(DecodeError::WrongType {
                field: FIELD_ISSUER,
                expected: "a string",
            })
        }
    };

    Ok(DecodedMetadata {
        name,
        credential_type,
        issued_at_epoch_seconds,
        issuer,
        document,
    })
}

fn required_string(
    document: &Map<String, JsonValue>,
    field: &'static str,
) -> Result<String, DecodeError> {
    match document.get(field) {
        Some(JsonValue::String(s)) => Ok(s.clone()),
        Some(_) => Err(DecodeError::WrongType {
            field,
            expected: "a string",
        }),
        None => Err(DecodeError::MissingField(field)),
    }
}

fn required_timestamp(
    document: &Map<String, JsonValue>,
    field: &'static str,
) -> Result<i64, DecodeError> {
    let value = document.get(field).ok_or(DecodeError::MissingField(field))?;

    // Floats and strings are rejected; only whole seconds are accepted
    let seconds = value.as_i64().ok_or(DecodeError::WrongType {
        field,
        expected: "an integer number of seconds",
    })?;

    if chrono::DateTime::from_timestamp(seconds, 0).is_none() {
        return Err(DecodeError::TimestampOutOfRange(seconds));
    }

    Ok(seconds)
}
