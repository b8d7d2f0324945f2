use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::AppState;
use crate::error::Result;
use crate::models::{AccountId, BlockNumber, ResolvedCertificate, Verdict};
use crate::services::orchestrator::{BatchOutcome, RecordOutcome};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateEntry {
    /// Index in the order the node returned the records
    pub position: usize,
    pub status: Verdict,
    #[serde(flatten)]
    pub certificate: ResolvedCertificate,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordErrorEntry {
    pub position: usize,
    pub id: String,
    pub owner: String,
    pub issuer: String,
    pub revoked: bool,
    pub reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountCertificatesResponse {
    pub account: AccountId,
    pub block_height: BlockNumber,
    pub resolved_at: DateTime<Utc>,
    pub certificates: Vec<CertificateEntry>,
    pub errors: Vec<RecordErrorEntry>,
}

impl From<BatchOutcome> for AccountCertificatesResponse {
    fn from(outcome: BatchOutcome) -> Self {
        let mut certificates = Vec::new();
        let mut errors = Vec::new();

        for (position, entry) in outcome.entries.into_iter().enumerate() {
            match entry {
                RecordOutcome::Resolved(certificate) => certificates.push(CertificateEntry {
                    position,
                    status: certificate.verdict(),
                    certificate,
                }),
                RecordOutcome::Unreadable(err) => errors.push(RecordErrorEntry {
                    position,
                    reason: err.error.to_string(),
                    id: err.cert_id,
                    owner: err.owner,
                    issuer: err.issuer,
                    revoked: err.revoked,
                }),
            }
        }

        Self {
            account: outcome.account,
            block_height: outcome.block_height,
            resolved_at: outcome.resolved_at,
            certificates,
            errors,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidityResponse {
    pub id: String,
    pub valid: bool,
}

/// Resolves every certificate of an account
async fn account_certificates(
    State(state): State<AppState>,
    Path(account): Path<String>,
) -> Result<Json<AccountCertificatesResponse>> {
    let account = AccountId::parse(&account)?;
    let outcome = state.resolver.resolve_all(&account).await?;
    Ok(Json(outcome.into()))
}

/// Asks the runtime whether one certificate is currently valid
async fn certificate_validity(
    State(state): State<AppState>,
    Path(cert_id): Path<String>,
) -> Result<Json<ValidityResponse>> {
    let valid = state.resolver.is_certificate_valid(&cert_id).await?;
    tracing::info!(cert_id = %cert_id, valid, "Checked certificate validity");
    Ok(Json(ValidityResponse { id: cert_id, valid }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/accounts/:account/certificates", get(account_certificates))
        .route("/api/certificates/:id/valid", get(certificate_validity))
}
