use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::OnceCell;
use url::Url;

use crate::config::Config;
use crate::models::{AccountId, BlockNumber, RawCertificateRecord};

#[derive(thiserror::Error, Debug)]
pub enum ConnectivityError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Node returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Unexpected RPC response: {0}")]
    UnexpectedResponse(String),

    #[error("Invalid node configuration: {0}")]
    InvalidConfig(String),
}

/// Read access to the certificates pallet of a remote node.
///
/// Implemented by [`RpcChainSession`] for real nodes and by in-memory fakes in
/// tests. Every failure is a [`ConnectivityError`].
pub trait ChainSession: Send + Sync {
    /// Returns the raw certificates owned by `account`, in the order the node
    /// returns them. An account without certificates yields an empty vector.
    fn account_certificates(
        &self,
        account: &AccountId,
    ) -> impl Future<Output = Result<Vec<RawCertificateRecord>, ConnectivityError>> + Send;

    /// Returns the height of the node's current best block.
    fn current_block_height(
        &self,
    ) -> impl Future<Output = Result<BlockNumber, ConnectivityError>> + Send;

    /// Asks the runtime whether a single certificate is currently valid.
    fn is_certificate_valid(
        &self,
        cert_id: &str,
    ) -> impl Future<Output = Result<bool, ConnectivityError>> + Send;
}

/// Connection parameters for a node RPC endpoint.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub endpoint: Url,
    pub access_token: Option<Secret<String>>,
    /// Only bounds connection establishment; calls themselves have no timeout.
    pub connect_timeout: Duration,
}

impl SessionSettings {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            access_token: None,
            connect_timeout: Duration::from_secs(5),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, ConnectivityError> {
        let endpoint = Url::parse(&config.node_url)
            .map_err(|e| ConnectivityError::InvalidConfig(format!("node_url: {}", e)))?;

        Ok(Self {
            endpoint,
            access_token: config.node_access_token.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
        })
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: JsonValue,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<JsonValue>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<JsonValue>,
}

#[derive(Debug, Deserialize)]
struct BlockHeader {
    number: String,
}

/// Node status as reported by `system_health`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeHealth {
    pub peers: u64,
    pub is_syncing: bool,
    #[serde(default)]
    pub should_have_peers: bool,
}

/// JSON-RPC 2.0 session against a Substrate node over HTTP.
#[derive(Debug)]
pub struct RpcChainSession {
    client: Client,
    endpoint: Url,
    next_id: AtomicU64,
}

impl RpcChainSession {
    pub fn new(settings: &SessionSettings) -> Result<Self, ConnectivityError> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(token) = &settings.access_token {
            let value = reqwest::header::HeaderValue::from_str(&format!(
                "Bearer {}",
                token.expose_secret()
            ))
            .map_err(|_| {
                ConnectivityError::InvalidConfig("access token is not a valid header".to_string())
            })?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Builds a session and checks that the node answers before handing it out.
    /// Returns the health report from that check alongside the session.
    #[tracing::instrument(skip(settings), fields(endpoint = %settings.endpoint))]
    pub async fn connect(
        settings: &SessionSettings,
    ) -> Result<(Self, NodeHealth), ConnectivityError> {
        let session = Self::new(settings)?;
        let health = session.health().await?;

        tracing::info!(
            peers = health.peers,
            is_syncing = health.is_syncing,
            "Connected to chain node"
        );

        Ok((session, health))
    }

    #[tracing::instrument(skip(self))]
    pub async fn health(&self) -> Result<NodeHealth, ConnectivityError> {
        self.call("system_health", json!([])).await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: JsonValue,
    ) -> Result<T, ConnectivityError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        tracing::debug!(method = %method, request_id = id, "Sending RPC request");

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!(
                method = %method,
                status = %status,
                error = %body,
                "RPC request failed"
            );
            return Err(ConnectivityError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let rpc_response: RpcResponse = response.json().await.map_err(|e| {
            ConnectivityError::UnexpectedResponse(format!("{} returned invalid JSON: {}", method, e))
        })?;

        if let Some(error) = rpc_response.error {
            tracing::error!(
                method = %method,
                code = error.code,
                message = %error.message,
                data = ?error.data,
                "RPC call returned an error"
            );
            return Err(ConnectivityError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        serde_json::from_value(rpc_response.result.unwrap_or(JsonValue::Null)).map_err(|e| {
            ConnectivityError::UnexpectedResponse(format!("{} result: {}", method, e))
        })
    }
}

impl ChainSession for RpcChainSession {
    #[tracing::instrument(skip(self, account), fields(account = %account))]
    async fn account_certificates(
        &self,
        account: &AccountId,
    ) -> Result<Vec<RawCertificateRecord>, ConnectivityError> {
        // A null result is how the node reports "nothing stored for this account"
        let records: Option<Vec<RawCertificateRecord>> = self
            .call("certificates_getAccountCertificates", json!([account.as_str()]))
            .await?;
        let records = records.unwrap_or_default();

        tracing::debug!(record_count = records.len(), "Fetched raw certificates");
        Ok(records)
    }

    #[tracing::instrument(skip(self))]
    async fn current_block_height(&self) -> Result<BlockNumber, ConnectivityError> {
        let header: BlockHeader = self.call("chain_getHeader", json!([])).await?;
        let height = parse_block_number(&header.number)?;

        tracing::debug!(block_height = height, "Fetched current block height");
        Ok(height)
    }

    #[tracing::instrument(skip(self))]
    async fn is_certificate_valid(&self, cert_id: &str) -> Result<bool, ConnectivityError> {
        // The runtime keys certificates by u32; pass numeric ids as numbers
        let param = match cert_id.parse::<u64>() {
            Ok(n) => json!(n),
            Err(_) => json!(cert_id),
        };
        self.call("certificates_isCertificateValid", json!([param]))
            .await
    }
}

/// Parses a header block number, which nodes send as a `0x`-prefixed hex string.
fn parse_block_number(raw: &str) -> Result<BlockNumber, ConnectivityError> {
    let parsed = match raw.strip_prefix("0x") {
        Some(digits) => i64::from_str_radix(digits, 16),
        None => raw.parse::<i64>(),
    };

    parsed.map_err(|e| {
        ConnectivityError::UnexpectedResponse(format!("invalid block number {:?}: {}", raw, e))
    })
}

/// Process-wide chain session, created on first use and then reused for every
/// batch. A failed initialisation is not cached, so the next request retries.
#[derive(Debug)]
pub struct SharedChainSession {
    settings: SessionSettings,
    session: OnceCell<RpcChainSession>,
}

impl SharedChainSession {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            session: OnceCell::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.session.initialized()
    }

    pub async fn get(&self) -> Result<&RpcChainSession, ConnectivityError> {
        self.session
            .get_or_try_init(|| async {
                RpcChainSession::connect(&self.settings)
                    .await
                    .map(|(session, _)| session)
            })
            .await
    }

    /// Node health. When this call is the one that connects, the report from
    /// the connect check is returned instead of asking the node twice.
    pub async fn health(&self) -> Result<NodeHealth, ConnectivityError> {
        let mut probed = None;
        let probed_slot = &mut probed;
        let settings = &self.settings;

        let session = self
            .session
            .get_or_try_init(move || async move {
                let (session, health) = RpcChainSession::connect(settings).await?;
                *probed_slot = Some(health);
                Ok::<_, ConnectivityError>(session)
            })
            .await?;

        match probed {
            Some(health) => Ok(health),
            None => session.health().await,
        }
    }
}

impl ChainSession for SharedChainSession {
    async fn account_certificates(
        &self,
        account: &AccountId,
    ) -> Result<Vec<RawCertificateRecord>, ConnectivityError> {
        self.get().await?.account_certificates(account).await
    }

    async fn current_block_height(&self) -> Result<BlockNumber, ConnectivityError> {
        self.get().await?.current_block_height().await
    }

    async fn is_certificate_valid(&self, cert_id: &str) -> Result<bool, ConnectivityError> {
        self.get().await?.is_certificate_valid(cert_id).await
    }
}
