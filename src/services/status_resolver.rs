use chrono::{DateTime, Duration, Utc};

use crate::models::{BlockNumber, DecodedMetadata, RawCertificateRecord, ResolvedCertificate};

/// Assumed block production interval. Expiry is defined in block height, so
/// every wall-clock expiry shown to a user is an estimate built on this value.
pub const DEFAULT_BLOCK_INTERVAL_SECONDS: i64 = 12;

/// Resolves one certificate against the current block height using the
/// current wall-clock time as the projection origin.
pub fn resolve(
    raw: &RawCertificateRecord,
    decoded: DecodedMetadata,
    current_block_height: BlockNumber,
    block_interval_seconds: i64,
) -> ResolvedCertificate {
    resolve_at(
        raw,
        decoded,
        current_block_height,
        block_interval_seconds,
        Utc::now(),
    )
}

/// Same as [`resolve`] with an explicit `now`.
///
/// 1. `issued_at` comes from the metadata timestamp, never from block height.
/// 2. `expires_at_block <= 0` means no expiry: `expires_at` is `None`.
/// 3. Otherwise `expires_at = now + (expires_at_block - height) * interval`,
///    and the certificate is expired when that block difference is `<= 0`.
pub fn resolve_at(
    raw: &RawCertificateRecord,
    decoded: DecodedMetadata,
    current_block_height: BlockNumber,
    block_interval_seconds: i64,
    now: DateTime<Utc>,
) -> ResolvedCertificate {
    let issued_at = decoded.issued_at();

    let (expires_at, is_expired) = if raw.has_expiry() {
        let block_diff = raw.expires_at_block.saturating_sub(current_block_height);
        let seconds_remaining = block_diff.saturating_mul(block_interval_seconds);
        (
            Some(project(now, seconds_remaining)),
            block_diff <= 0,
        )
    } else {
        (None, false)
    };

    tracing::trace!(
        cert_id = %raw.id,
        expires_at_block = raw.expires_at_block,
        current_block_height,
        is_expired,
        revoked = raw.revoked,
        "Resolved certificate status"
    );

    ResolvedCertificate {
        id: raw.id.clone(),
        owner: raw.owner.clone(),
        issuer: raw.issuer.clone(),
        name: decoded.name,
        credential_type: decoded.credential_type,
        issued_at,
        issued_at_block: raw.issued_at_block,
        expires_at,
        is_expired,
        revoked: raw.revoked,
        metadata: decoded.document,
    }
}

/// Adds a (possibly negative) number of seconds to `now`, clamping to the
/// representable range instead of failing.
fn project(now: DateTime<Utc>, seconds: i64) -> DateTime<Utc> {
    let clamped = if seconds.is_negative() {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    };

    Duration::try_seconds(seconds)
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(clamped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::Map;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn raw(expires_at_block: BlockNumber, revoked: bool) -> RawCertificateRecord {
        RawCertificateRecord {
            id: "3".to_string(),
            owner: "5Owner".to_string(),
            issuer: "5Issuer".to_string(),
            metadata_bytes: Ok(Vec::new()),
            issued_at_block: Some(10),
            revoked,
            expires_at_block,
        }
    }

    fn decoded() -> DecodedMetadata {
        DecodedMetadata {
            name: "Tower Crane".to_string(),
            credential_type: "Operator".to_string(),
            issued_at_epoch_seconds: 1_700_000_000,
            issuer: None,
            document: Map::new(),
        }
    }

    #[test]
    fn test_non_positive_expiry_never_expires() {
        for expires_at_block in [0, -1, -5000] {
            for height in [0, 1, 1_000_000] {
                let cert = resolve_at(&raw(expires_at_block, false), decoded(), height, 12, now());
                assert_eq!(cert.expires_at, None);
                assert!(!cert.is_expired);
            }
        }
    }

    #[test]
    fn test_expiry_at_current_height_is_expired() {
        let cert = resolve_at(&raw(1000, false), decoded(), 1000, 12, now());
        assert!(cert.is_expired);
        assert_eq!(cert.expires_at, Some(now()));
    }

    #[test]
    fn test_future_expiry_projects_forward() {
        let cert = resolve_at(&raw(1100, false), decoded(), 1000, 12, now());
        assert!(!cert.is_expired);
        assert_eq!(cert.expires_at, Some(now() + Duration::seconds(1200)));
        assert!(cert.expires_at.unwrap() > now());
    }

    #[test]
    fn test_past_expiry_projects_backward() {
        let cert = resolve_at(&raw(900, false), decoded(), 1000, 12, now());
        assert!(cert.is_expired);
        assert_eq!(cert.expires_at, Some(now() - Duration::seconds(1200)));
    }

    #[test]
    fn test_block_interval_is_overridable() {
        let cert = resolve_at(&raw(1100, false), decoded(), 1000, 6, now());
        assert_eq!(cert.expires_at, Some(now() + Duration::seconds(600)));
    }

    #[test]
    fn test_revoked_is_carried_through() {
        let cert = resolve_at(&raw(1100, true), decoded(), 1000, 12, now());
        assert!(cert.revoked);
        assert!(!cert.is_expired);
        assert_eq!(cert.verdict().as_str(), "Revoked");

        let cert = resolve_at(&raw(900, true), decoded(), 1000, 12, now());
        assert!(cert.is_expired);
        assert_eq!(cert.verdict().as_str(), "Revoked");
    }

    #[test]
    fn test_issued_at_comes_from_metadata() {
        let cert = resolve_at(&raw(0, false), decoded(), 1000, 12, now());
        assert_eq!(cert.issued_at.timestamp(), 1_700_000_000);
        assert_eq!(cert.issued_at_block, Some(10));
        assert_eq!(cert.name, "Tower Crane");
        assert_eq!(cert.credential_type, "Operator");
        assert_eq!(cert.owner, "5Owner");
        assert_eq!(cert.issuer, "5Issuer");
    }

    #[test]
    fn test_extreme_block_numbers_do_not_panic() {
        let cert = resolve_at(&raw(i64::MAX, false), decoded(), 0, 12, now());
        assert!(!cert.is_expired);
        assert_eq!(cert.expires_at, Some(DateTime::<Utc>::MAX_UTC));

        let cert = resolve_at(&raw(1, false), decoded(), i64::MAX, 12, now());
        assert!(cert.is_expired);
        assert_eq!(cert.expires_at, Some(DateTime::<Utc>::MIN_UTC));
    }
}
