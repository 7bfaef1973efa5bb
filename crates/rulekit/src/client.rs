//! The remote-service seam and its HTTP-backed production client.
//!
//! [`ConfigService`] is the single interface to the configuration-management
//! service; implementations are selected at construction time. The core
//! crate ships [`HttpConfigService`]; the testkit crate ships a scripted
//! mock for rule tests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ServiceError;
use crate::types::{
    ComplianceDetailsPage, ComplianceDetailsRequest, HistoryConfigurationItem,
    PutEvaluationsRequest, ResourceHistoryPage, ResourceHistoryRequest,
};

/// User agent for service requests.
const USER_AGENT_VALUE: &str = concat!("rulekit/", env!("CARGO_PKG_VERSION"));

/// The three remote operations the evaluation pipeline needs.
///
/// No retry or backoff lives behind this trait; each call is issued once
/// and a failure propagates to the caller.
#[async_trait]
pub trait ConfigService: Send + Sync {
    /// Report a batch of evaluation results.
    async fn put_evaluations(&self, request: &PutEvaluationsRequest) -> Result<(), ServiceError>;

    /// Query one page of previously reported results.
    async fn get_compliance_details(
        &self,
        request: &ComplianceDetailsRequest,
    ) -> Result<ComplianceDetailsPage, ServiceError>;

    /// Fetch at most `limit` historical snapshots for one resource.
    async fn get_resource_config_history(
        &self,
        resource_type: &str,
        resource_id: &str,
        limit: u32,
    ) -> Result<Vec<HistoryConfigurationItem>, ServiceError>;
}

/// Connection settings for [`HttpConfigService`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the service endpoint.
    pub endpoint: String,

    /// Bearer token, when the endpoint requires one.
    #[serde(default)]
    pub token: Option<String>,

    /// Execution role the service should evaluate resources under; sent as
    /// the `x-execution-role` header when set.
    #[serde(default)]
    pub execution_role: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            token: None,
            execution_role: None,
            timeout_secs: default_timeout(),
        }
    }
}

impl ServiceConfig {
    /// Read settings from the environment.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `RULEKIT_ENDPOINT` | Service base URL |
    /// | `RULEKIT_TOKEN` | Bearer token |
    /// | `RULEKIT_TIMEOUT` | Request timeout in seconds (default: 30) |
    pub fn from_env() -> Self {
        Self {
            endpoint: std::env::var("RULEKIT_ENDPOINT").unwrap_or_default(),
            token: std::env::var("RULEKIT_TOKEN").ok(),
            execution_role: None,
            timeout_secs: std::env::var("RULEKIT_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_timeout),
        }
    }

    /// Set the endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

/// Error body the service returns on failed calls.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// HTTP client for the configuration-management service.
#[derive(Debug, Clone)]
pub struct HttpConfigService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpConfigService {
    /// Create a client from connection settings.
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        if let Some(token) = config.token.as_deref() {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                ServiceError::Network {
                    message: "token contains characters not valid in a header".to_string(),
                }
            })?;
            default_headers.insert(AUTHORIZATION, value);
        }
        if let Some(role) = config.execution_role.as_deref() {
            let value = HeaderValue::from_str(role).map_err(|_| ServiceError::Network {
                message: "execution role contains characters not valid in a header".to_string(),
            })?;
            default_headers.insert("x-execution-role", value);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(default_headers)
            .build()
            .map_err(|e| ServiceError::Network {
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// Create a client from environment variables.
    pub fn from_env() -> Result<Self, ServiceError> {
        Self::new(&ServiceConfig::from_env())
    }

    /// The base URL calls are issued against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        route: &str,
        body: &B,
    ) -> Result<T, ServiceError> {
        let url = format!("{}/{route}", self.base_url);
        debug!(url = %url, "calling service");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ServiceError::Network {
                message: format!("request to {route} failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let parsed: Option<ApiErrorBody> = serde_json::from_str(&body).ok();
            let (code, message) = match parsed {
                Some(ApiErrorBody { code, message }) => (
                    code.unwrap_or_else(|| status.as_u16().to_string()),
                    message.unwrap_or(body),
                ),
                None => (status.as_u16().to_string(), body),
            };
            return Err(ServiceError::api(code, message).with_status(status.as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse {
                message: format!("failed to parse {route} response: {e}"),
            })
    }
}

#[async_trait]
impl ConfigService for HttpConfigService {
    async fn put_evaluations(&self, request: &PutEvaluationsRequest) -> Result<(), ServiceError> {
        debug!(
            evaluations = request.evaluations.len(),
            test_mode = request.test_mode,
            "put_evaluations"
        );
        let _: serde_json::Value = self.post("evaluations", request).await?;
        Ok(())
    }

    async fn get_compliance_details(
        &self,
        request: &ComplianceDetailsRequest,
    ) -> Result<ComplianceDetailsPage, ServiceError> {
        self.post("compliance-details", request).await
    }

    async fn get_resource_config_history(
        &self,
        resource_type: &str,
        resource_id: &str,
        limit: u32,
    ) -> Result<Vec<HistoryConfigurationItem>, ServiceError> {
        debug!(resource_type, resource_id, limit, "get_resource_config_history");
        let request = ResourceHistoryRequest {
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
            limit,
        };
        let page: ResourceHistoryPage = self.post("resource-history", &request).await?;
        Ok(page.configuration_items)
    }
}
