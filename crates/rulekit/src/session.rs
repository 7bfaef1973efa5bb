//! Per-invocation session scoping.
//!
//! Each invocation derives one [`SessionSpec`] from the trigger envelope
//! and rule parameters, turns it into a service handle through a
//! [`ClientFactory`], reuses that handle for every remote call in the
//! invocation, and drops it at the end. Nothing is persisted across
//! invocations.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::client::{ConfigService, HttpConfigService, ServiceConfig};
use crate::error::RuleResult;
use crate::events::TriggerEvent;

/// The execution identity one invocation runs under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSpec {
    /// Role to evaluate resources as.
    pub role_arn: String,

    /// Region override from the `ExecutionRoleRegion` rule parameter.
    pub region: Option<String>,

    /// Whether the role should be assumed at all; the `AssumeRoleMode`
    /// rule parameter value "false" (case-insensitive) disables it.
    pub assume_role: bool,
}

impl SessionSpec {
    /// Derive the session from the trigger envelope and rule parameters.
    ///
    /// `ExecutionRoleName` replaces the final path segment of the
    /// envelope's role ARN, keeping the account prefix.
    pub fn from_event(event: &TriggerEvent) -> RuleResult<Self> {
        let params = event.rule_parameters_value()?;

        let role_arn = match param_str(&params, "ExecutionRoleName") {
            Some(name) => {
                let prefix = event
                    .execution_role_arn
                    .split('/')
                    .next()
                    .unwrap_or_default();
                format!("{prefix}/{name}")
            }
            None => event.execution_role_arn.clone(),
        };

        Ok(Self {
            role_arn,
            region: param_str(&params, "ExecutionRoleRegion").map(str::to_string),
            assume_role: param_str(&params, "AssumeRoleMode")
                .map(|mode| !mode.eq_ignore_ascii_case("false"))
                .unwrap_or(true),
        })
    }
}

fn param_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Turns a session spec into a service handle, once per invocation.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn build(&self, session: &SessionSpec) -> RuleResult<Arc<dyn ConfigService>>;
}

/// Production factory backed by [`HttpConfigService`].
#[derive(Debug, Clone)]
pub struct HttpClientFactory {
    config: ServiceConfig,
}

impl HttpClientFactory {
    pub fn new(config: ServiceConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(ServiceConfig::from_env())
    }
}

#[async_trait]
impl ClientFactory for HttpClientFactory {
    /// Scope the configured endpoint to this session: a `{region}`
    /// placeholder in the endpoint is filled from the session's region
    /// override, and the session role is attached when assume-role is on.
    async fn build(&self, session: &SessionSpec) -> RuleResult<Arc<dyn ConfigService>> {
        let mut config = self.config.clone();
        if let Some(region) = session.region.as_deref() {
            config.endpoint = config.endpoint.replace("{region}", region);
        }
        if session.assume_role {
            config.execution_role = Some(session.role_arn.clone());
        }
        Ok(Arc::new(HttpConfigService::new(&config)?))
    }
}
