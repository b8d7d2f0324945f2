use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;

use crate::models::{ResolvedCertificate, Verdict};
use crate::services::orchestrator::{BatchOutcome, RecordError, RecordOutcome};

/// Display-ready certificate card.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateView {
    pub id: String,
    pub name: String,
    pub credential_type: String,
    pub status: Verdict,
    pub status_label: &'static str,
    pub status_class: &'static str,
    pub issued: String,
    pub expires: String,
    pub issuer: String,
}

impl CertificateView {
    pub fn new(cert: &ResolvedCertificate, now: DateTime<Utc>) -> Self {
        let status = cert.verdict();
        Self {
            id: cert.id.clone(),
            name: cert.name.clone(),
            credential_type: cert.credential_type.clone(),
            status,
            status_label: status.as_str(),
            status_class: status_class(status),
            issued: relative_time(cert.issued_at, now),
            expires: cert
                .expires_at
                .map(|at| relative_time(at, now))
                .unwrap_or_else(|| "Never".to_string()),
            issuer: cert.issuer.clone(),
        }
    }
}

/// Card for a certificate whose metadata could not be read. Kept visibly
/// distinct from resolved cards; it never shows a status.
#[derive(Debug, Clone, Serialize)]
pub struct UnreadableView {
    pub id: String,
    pub reason: String,
}

impl From<&RecordError> for UnreadableView {
    fn from(err: &RecordError) -> Self {
        Self {
            id: err.cert_id.clone(),
            reason: err.error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryView {
    Certificate(CertificateView),
    Unreadable(UnreadableView),
}

pub fn entry_views(outcome: &BatchOutcome) -> Vec<EntryView> {
    outcome
        .entries
        .iter()
        .map(|entry| match entry {
            RecordOutcome::Resolved(cert) => {
                EntryView::Certificate(CertificateView::new(cert, outcome.resolved_at))
            }
            RecordOutcome::Unreadable(err) => EntryView::Unreadable(err.into()),
        })
        .collect()
}

pub fn status_class(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Active => "status-active",
        Verdict::Expired => "status-expired",
        Verdict::Revoked => "status-revoked",
    }
}

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const MONTH: i64 = 30 * DAY;
const YEAR: i64 = 365 * DAY;

/// Human distance between `at` and `now` with a direction suffix, e.g.
/// "3 days ago" or "in about 2 hours".
pub fn relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = at.signed_duration_since(now).num_seconds();
    let distance = distance_words(seconds.saturating_abs());

    if seconds >= 0 {
        format!("in {}", distance)
    } else {
        format!("{} ago", distance)
    }
}

fn distance_words(seconds: i64) -> String {
    let minutes = (seconds + 30) / MINUTE;

    match seconds {
        s if s < 30 => "less than a minute".to_string(),
        s if s < 90 => "1 minute".to_string(),
        s if s < 45 * MINUTE - 30 => format!("{} minutes", minutes),
        s if s < 90 * MINUTE - 30 => "about 1 hour".to_string(),
        s if s < DAY - 30 => format!("about {} hours", (s + HOUR / 2) / HOUR),
        s if s < 42 * HOUR - 30 => "1 day".to_string(),
        s if s < MONTH - 30 => format!("{} days", (s + DAY / 2) / DAY),
        s if s < 45 * DAY - 30 => "about 1 month".to_string(),
        s if s < 60 * DAY - 30 => "about 2 months".to_string(),
        s if s < YEAR => format!("{} months", ((s + MONTH / 2) / MONTH).max(2)),
        s => {
            let years = s / YEAR;
            let remainder = s % YEAR;
            if remainder < 3 * MONTH {
                format!("about {} {}", years, plural(years, "year"))
            } else if remainder < 9 * MONTH {
                format!("over {} {}", years, plural(years, "year"))
            } else {
                format!("almost {} years", years + 1)
            }
        }
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        unit.to_string()
    } else {
        format!("{}s", unit)
    }
}

/// Plain-text rendering of a batch, used by the CLI.
pub fn render_text(outcome: &BatchOutcome) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Account {} (block #{})",
        outcome.account, outcome.block_height
    );

    if outcome.is_empty() {
        let _ = writeln!(out, "  No Certificates Found: this account has no certificates issued to it.");
        return out;
    }

    for entry in entry_views(outcome) {
        match entry {
            EntryView::Certificate(cert) => {
                let _ = writeln!(
                    out,
                    "  [{:<7}] #{} {} ({}) issued {}, expires {}",
                    cert.status_label,
                    cert.id,
                    cert.name,
                    cert.credential_type,
                    cert.issued,
                    cert.expires
                );
            }
            EntryView::Unreadable(err) => {
                let _ = writeln!(out, "  [ERROR  ] #{} unreadable certificate: {}", err.id, err.reason);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::Map;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_relative_time_suffixes() {
        assert_eq!(relative_time(now() + Duration::seconds(10), now()), "in less than a minute");
        assert_eq!(relative_time(now() - Duration::minutes(5), now()), "5 minutes ago");
        assert_eq!(relative_time(now() + Duration::hours(2), now()), "in about 2 hours");
        assert_eq!(relative_time(now() - Duration::days(3), now()), "3 days ago");
        assert_eq!(relative_time(now() + Duration::days(40), now()), "in about 1 month");
        assert_eq!(relative_time(now() - Duration::days(400), now()), "about 1 year ago");
        assert_eq!(relative_time(now() + Duration::days(365 * 2 + 200), now()), "in over 2 years");
    }

    #[test]
    fn test_certificate_view() {
        let cert = ResolvedCertificate {
            id: "12".to_string(),
            owner: "5Owner".to_string(),
            issuer: "5Issuer".to_string(),
            name: "WHMIS".to_string(),
            credential_type: "Safety".to_string(),
            issued_at: now() - Duration::days(3),
            issued_at_block: None,
            expires_at: None,
            is_expired: false,
            revoked: true,
            metadata: Map::new(),
        };

        let view = CertificateView::new(&cert, now());
        assert_eq!(view.status, Verdict::Revoked);
        assert_eq!(view.status_label, "Revoked");
        assert_eq!(view.status_class, "status-revoked");
        assert_eq!(view.issued, "3 days ago");
        assert_eq!(view.expires, "Never");
    }
}
