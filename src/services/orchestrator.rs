use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::models::{AccountId, BlockNumber, RawCertificateRecord, ResolvedCertificate};
use crate::services::chain_session::{ChainSession, ConnectivityError};
use crate::services::metadata_decoder::{self, DecodeError};
use crate::services::status_resolver::{self, DEFAULT_BLOCK_INTERVAL_SECONDS};

/// A certificate whose metadata could not be decoded. It is reported next to
/// its resolved siblings instead of failing the batch.
#[derive(Debug)]
pub struct RecordError {
    pub cert_id: String,
    pub owner: String,
    pub issuer: String,
    pub revoked: bool,
    pub error: DecodeError,
}

#[derive(Debug)]
pub enum RecordOutcome {
    Resolved(ResolvedCertificate),
    Unreadable(RecordError),
}

impl RecordOutcome {
    pub fn cert_id(&self) -> &str {
        match self {
            RecordOutcome::Resolved(cert) => &cert.id,
            RecordOutcome::Unreadable(err) => &err.cert_id,
        }
    }
}

/// Result of resolving every certificate of one account.
///
/// `entries` keeps the order in which the node returned the records.
#[derive(Debug)]
pub struct BatchOutcome {
    pub account: AccountId,
    pub block_height: BlockNumber,
    pub resolved_at: DateTime<Utc>,
    pub entries: Vec<RecordOutcome>,
}

impl BatchOutcome {
    pub fn certificates(&self) -> impl Iterator<Item = &ResolvedCertificate> {
        self.entries.iter().filter_map(|entry| match entry {
            RecordOutcome::Resolved(cert) => Some(cert),
            RecordOutcome::Unreadable(_) => None,
        })
    }

    pub fn errors(&self) -> impl Iterator<Item = &RecordError> {
        self.entries.iter().filter_map(|entry| match entry {
            RecordOutcome::Resolved(_) => None,
            RecordOutcome::Unreadable(err) => Some(err),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Decodes and resolves a single raw record.
pub fn resolve_record(
    raw: &RawCertificateRecord,
    current_block_height: BlockNumber,
    block_interval_seconds: i64,
    now: DateTime<Utc>,
) -> RecordOutcome {
    let decoded = raw
        .metadata_bytes
        .as_ref()
        .map_err(|e| DecodeError::from(e.clone()))
        .and_then(|bytes| metadata_decoder::decode(bytes));

    match decoded {
        Ok(decoded) => RecordOutcome::Resolved(status_resolver::resolve_at(
            raw,
            decoded,
            current_block_height,
            block_interval_seconds,
            now,
        )),
        Err(error) => {
            tracing::warn!(cert_id = %raw.id, error = %error, "Failed to decode certificate metadata");
            RecordOutcome::Unreadable(RecordError {
                cert_id: raw.id.clone(),
                owner: raw.owner.clone(),
                issuer: raw.issuer.clone(),
                revoked: raw.revoked,
                error,
            })
        }
    }
}

/// Runs the resolution pipeline for accounts against one chain session.
#[derive(Debug)]
pub struct BatchResolver<S> {
    session: Arc<S>,
    block_interval_seconds: i64,
}

impl<S> Clone for BatchResolver<S> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            block_interval_seconds: self.block_interval_seconds,
        }
    }
}

impl<S: ChainSession> BatchResolver<S> {
    pub fn new(session: Arc<S>) -> Self {
        Self {
            session,
            block_interval_seconds: DEFAULT_BLOCK_INTERVAL_SECONDS,
        }
    }

    pub fn with_block_interval(mut self, seconds: i64) -> Self {
        self.block_interval_seconds = seconds;
        self
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    /// Fetches and resolves every certificate owned by `account`.
    ///
    /// Records and block height are each fetched exactly once, height right
    /// after the records, so all entries share one time base. A fetch failure
    /// fails the whole batch; a decode failure only affects its own entry.
    #[tracing::instrument(skip(self, account), fields(account = %account))]
    pub async fn resolve_all(&self, account: &AccountId) -> Result<BatchOutcome, ConnectivityError> {
        let records = self.session.account_certificates(account).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch certificates from the chain");
            e
        })?;

        let block_height = self.session.current_block_height().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch current block height");
            e
        })?;

        let resolved_at = Utc::now();
        let entries: Vec<RecordOutcome> = records
            .iter()
            .map(|raw| resolve_record(raw, block_height, self.block_interval_seconds, resolved_at))
            .collect();

        let outcome = BatchOutcome {
            account: account.clone(),
            block_height,
            resolved_at,
            entries,
        };

        tracing::info!(
            block_height,
            record_count = outcome.entries.len(),
            resolved = outcome.certificates().count(),
            unreadable = outcome.errors().count(),
            "Resolved account certificates"
        );

        Ok(outcome)
    }

    pub async fn is_certificate_valid(&self, cert_id: &str) -> Result<bool, ConnectivityError> {
        self.session.is_certificate_valid(cert_id).await
    }
}
