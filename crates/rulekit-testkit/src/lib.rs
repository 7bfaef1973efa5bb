//! Test helpers for rulekit rules.
//!
//! Provides what a rule test needs and nothing else: builders for
//! realistic trigger envelopes, a scripted [`MockConfigService`] that
//! records every call, a [`MockClientFactory`] to hand it to an
//! [`Evaluator`](rulekit::Evaluator), and assertion helpers over the
//! handler response.
//!
//! ```no_run
//! use std::sync::Arc;
//! use rulekit::Evaluator;
//! use rulekit_testkit::{test_scheduled_event, MockClientFactory, MockConfigService};
//!
//! # async fn example(rule: Arc<dyn rulekit::ConfigRule>) {
//! let service = Arc::new(MockConfigService::new());
//! let evaluator = Evaluator::new(rule, Arc::new(MockClientFactory::new(service.clone())));
//! let response = evaluator.handle(test_scheduled_event(None)).await;
//! # let _ = response;
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use rulekit::{
    ClientFactory, ComplianceDetailsPage, ComplianceDetailsRequest, ConfigService,
    HandlerResponse, HistoryConfigurationItem, PutEvaluationsRequest, ResourceHistoryRequest,
    RuleResult, ServiceError, SessionSpec, WireEvaluation,
};

/// Account id used by the canned trigger envelopes.
pub const TEST_ACCOUNT_ID: &str = "123456789012";

/// Result token used by the canned trigger envelopes.
pub const TEST_RESULT_TOKEN: &str = "token";

/// Build a change-trigger envelope around the given invoking event.
pub fn test_change_event(invoking_event: Value, rule_parameters: Option<Value>) -> Value {
    let mut event = json!({
        "configRuleName": "myrule",
        "executionRoleArn": format!("arn:cloud:iam::{TEST_ACCOUNT_ID}:role/example"),
        "eventLeftScope": false,
        "invokingEvent": invoking_event.to_string(),
        "accountId": TEST_ACCOUNT_ID,
        "configRuleArn": format!("arn:cloud:config:region:{TEST_ACCOUNT_ID}:config-rule/config-rule-8fngan"),
        "resultToken": TEST_RESULT_TOKEN,
    });
    if let Some(params) = rule_parameters {
        event["ruleParameters"] = Value::String(params.to_string());
    }
    event
}

/// Build a scheduled-trigger envelope.
pub fn test_scheduled_event(rule_parameters: Option<Value>) -> Value {
    let invoking_event = json!({
        "messageType": "ScheduledNotification",
        "notificationCreationTime": "2017-12-23T22:11:18.158Z",
    });
    test_change_event(invoking_event, rule_parameters)
}

#[derive(Default)]
struct MockState {
    put_requests: Vec<PutEvaluationsRequest>,
    compliance_requests: Vec<ComplianceDetailsRequest>,
    history_requests: Vec<ResourceHistoryRequest>,
    compliance_pages: VecDeque<ComplianceDetailsPage>,
    history_items: Vec<HistoryConfigurationItem>,
    fail_put: Option<(usize, ServiceError)>,
    fail_compliance: Option<ServiceError>,
    fail_history: Option<ServiceError>,
}

/// A scripted configuration service.
///
/// Records every call; replays pre-loaded compliance pages and history
/// snapshots; never performs a durable write. This is the second
/// implementation of the [`ConfigService`] reporting seam, selected at
/// construction time by tests.
#[derive(Default)]
pub struct MockConfigService {
    state: Mutex<MockState>,
}

impl MockConfigService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-load the pages `get_compliance_details` returns, in order.
    /// Once exhausted (or when none are loaded) it returns empty,
    /// token-free pages.
    pub fn with_compliance_pages(self, pages: Vec<ComplianceDetailsPage>) -> Self {
        self.state.lock().unwrap().compliance_pages = pages.into();
        self
    }

    /// Pre-load the snapshots `get_resource_config_history` serves.
    pub fn with_history_items(self, items: Vec<HistoryConfigurationItem>) -> Self {
        self.state.lock().unwrap().history_items = items;
        self
    }

    /// Let the first `successes` put calls succeed, then fail the rest.
    pub fn fail_put_after(self, successes: usize, error: ServiceError) -> Self {
        self.state.lock().unwrap().fail_put = Some((successes, error));
        self
    }

    /// Fail every `put_evaluations` call.
    pub fn fail_put_with(self, error: ServiceError) -> Self {
        self.fail_put_after(0, error)
    }

    /// Fail every `get_compliance_details` call.
    pub fn fail_compliance_with(self, error: ServiceError) -> Self {
        self.state.lock().unwrap().fail_compliance = Some(error);
        self
    }

    /// Fail every `get_resource_config_history` call.
    pub fn fail_history_with(self, error: ServiceError) -> Self {
        self.state.lock().unwrap().fail_history = Some(error);
        self
    }

    /// Every successful `put_evaluations` request, in call order.
    pub fn recorded_put_requests(&self) -> Vec<PutEvaluationsRequest> {
        self.state.lock().unwrap().put_requests.clone()
    }

    /// Every `get_compliance_details` request, in call order.
    pub fn recorded_compliance_requests(&self) -> Vec<ComplianceDetailsRequest> {
        self.state.lock().unwrap().compliance_requests.clone()
    }

    /// Every `get_resource_config_history` request, in call order.
    pub fn recorded_history_requests(&self) -> Vec<ResourceHistoryRequest> {
        self.state.lock().unwrap().history_requests.clone()
    }

    /// Count of put calls that would have written durably (test mode off).
    pub fn durable_write_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .put_requests
            .iter()
            .filter(|r| !r.test_mode)
            .count()
    }
}

#[async_trait]
impl ConfigService for MockConfigService {
    async fn put_evaluations(&self, request: &PutEvaluationsRequest) -> Result<(), ServiceError> {
        let mut state = self.state.lock().unwrap();
        if let Some((successes, error)) = &state.fail_put {
            if state.put_requests.len() >= *successes {
                return Err(error.clone());
            }
        }
        state.put_requests.push(request.clone());
        Ok(())
    }

    async fn get_compliance_details(
        &self,
        request: &ComplianceDetailsRequest,
    ) -> Result<ComplianceDetailsPage, ServiceError> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = &state.fail_compliance {
            return Err(error.clone());
        }
        state.compliance_requests.push(request.clone());
        Ok(state.compliance_pages.pop_front().unwrap_or_default())
    }

    async fn get_resource_config_history(
        &self,
        resource_type: &str,
        resource_id: &str,
        limit: u32,
    ) -> Result<Vec<HistoryConfigurationItem>, ServiceError> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = &state.fail_history {
            return Err(error.clone());
        }
        state.history_requests.push(ResourceHistoryRequest {
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
            limit,
        });
        Ok(state
            .history_items
            .iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

/// Hands a shared [`MockConfigService`] to the evaluator and records the
/// session each invocation was built with.
pub struct MockClientFactory {
    service: Arc<MockConfigService>,
    sessions: Mutex<Vec<SessionSpec>>,
}

impl MockClientFactory {
    pub fn new(service: Arc<MockConfigService>) -> Self {
        Self {
            service,
            sessions: Mutex::new(Vec::new()),
        }
    }

    /// The session specs passed to `build`, in call order.
    pub fn recorded_sessions(&self) -> Vec<SessionSpec> {
        self.sessions.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClientFactory for MockClientFactory {
    async fn build(&self, session: &SessionSpec) -> RuleResult<Arc<dyn ConfigService>> {
        self.sessions.lock().unwrap().push(session.clone());
        Ok(self.service.clone())
    }
}

/// Assert the invocation succeeded with exactly the expected records.
///
/// # Panics
///
/// Panics with a descriptive message when the response is an error
/// envelope or the records differ.
pub fn assert_successful_evaluation(
    response: &HandlerResponse,
    expected: &[WireEvaluation],
    evaluations_count: usize,
) {
    let evaluations = response
        .evaluations()
        .unwrap_or_else(|| panic!("expected evaluations, got error envelope: {response:?}"));
    assert_eq!(
        evaluations.len(),
        evaluations_count,
        "unexpected evaluation count"
    );
    assert_eq!(evaluations, expected, "submitted records differ");
}

/// Assert the invocation failed with a customer-facing envelope, optionally
/// pinning the code and message.
pub fn assert_customer_error_response(
    response: &HandlerResponse,
    customer_error_code: Option<&str>,
    customer_error_message: Option<&str>,
) {
    let envelope = response
        .error()
        .unwrap_or_else(|| panic!("expected error envelope, got evaluations: {response:?}"));
    assert!(
        envelope.customer_error_code.as_deref().is_some_and(|c| !c.is_empty()),
        "customer error code is empty: {envelope:?}"
    );
    assert!(
        envelope
            .customer_error_message
            .as_deref()
            .is_some_and(|m| !m.is_empty()),
        "customer error message is empty: {envelope:?}"
    );
    if let Some(code) = customer_error_code {
        assert_eq!(envelope.customer_error_code.as_deref(), Some(code));
    }
    if let Some(message) = customer_error_message {
        assert_eq!(envelope.customer_error_message.as_deref(), Some(message));
    }
}
