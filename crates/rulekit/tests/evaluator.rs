//! End-to-end tests of the evaluation pipeline against the scripted mock
//! service.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Timelike, Utc};
use serde_json::{json, Value};

use rulekit::{
    ComplianceType, ConfigRule, ConfigService, ConfigurationItem, Evaluation, Evaluator,
    EvaluatorError, RuleResult, ServiceError, TriggerEvent, WireEvaluation,
};
use rulekit_testkit::{
    assert_customer_error_response, assert_successful_evaluation, test_change_event,
    test_scheduled_event, MockClientFactory, MockConfigService,
};

/// A rule whose behavior is picked per test.
#[derive(Default)]
struct TestRule {
    change_called: AtomicBool,
    periodic_called: AtomicBool,
    reject_parameters: bool,
    resource_types: Vec<String>,
    delete_old_evaluations: bool,
    periodic_results: Vec<Evaluation>,
    change_results: Vec<Evaluation>,
    fail_with: Option<EvaluatorError>,
}

impl TestRule {
    fn new() -> Self {
        Self {
            delete_old_evaluations: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl ConfigRule for TestRule {
    fn evaluate_parameters(&self, rule_parameters: Value) -> RuleResult<Value> {
        if self.reject_parameters {
            return Err(EvaluatorError::InvalidParameters("some-error".into()));
        }
        Ok(rule_parameters)
    }

    async fn evaluate_change(
        &self,
        _event: &TriggerEvent,
        _service: &dyn ConfigService,
        _item: &ConfigurationItem,
        _parameters: &Value,
    ) -> RuleResult<Vec<Evaluation>> {
        self.change_called.store(true, Ordering::SeqCst);
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        Ok(self.change_results.clone())
    }

    async fn evaluate_periodic(
        &self,
        _event: &TriggerEvent,
        _service: &dyn ConfigService,
        _parameters: &Value,
    ) -> RuleResult<Vec<Evaluation>> {
        self.periodic_called.store(true, Ordering::SeqCst);
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        Ok(self.periodic_results.clone())
    }

    fn expected_resource_types(&self) -> Vec<String> {
        self.resource_types.clone()
    }

    fn delete_old_evaluations_on_scheduled_notification(&self) -> bool {
        self.delete_old_evaluations
    }
}

fn harness(rule: TestRule) -> (Arc<TestRule>, Arc<MockConfigService>, Evaluator) {
    harness_with_service(rule, MockConfigService::new())
}

fn harness_with_service(
    rule: TestRule,
    service: MockConfigService,
) -> (Arc<TestRule>, Arc<MockConfigService>, Evaluator) {
    let rule = Arc::new(rule);
    let service = Arc::new(service);
    let evaluator = Evaluator::new(
        rule.clone(),
        Arc::new(MockClientFactory::new(service.clone())),
    );
    (rule, service, evaluator)
}

fn change_invoking_event(status: &str) -> Value {
    json!({
        "messageType": "ConfigurationItemChangeNotification",
        "notificationCreationTime": "2018-02-17T01:36:35.000Z",
        "recordVersion": "1.3",
        "configurationItem": {
            "configurationItemCaptureTime": "2018-02-17T01:36:34.000Z",
            "configurationItemStatus": status,
            "resourceType": "Service::Instance",
            "resourceId": "i-abc",
            "configuration": {"state": "running"}
        }
    })
}

#[tokio::test]
async fn parameter_rejection_short_circuits_before_the_check() {
    let (rule, service, evaluator) = harness(TestRule {
        reject_parameters: true,
        ..TestRule::new()
    });

    let response = evaluator.handle(test_scheduled_event(Some(json!({"bad": "1"})))).await;

    assert_customer_error_response(
        &response,
        Some("InvalidParameterValueException"),
        Some("some-error"),
    );
    assert!(!rule.periodic_called.load(Ordering::SeqCst));
    assert!(service.recorded_put_requests().is_empty());
}

#[tokio::test]
async fn unexpected_message_type_yields_internal_envelope() {
    let (rule, _, evaluator) = harness(TestRule::new());

    let response = evaluator
        .handle(test_change_event(json!({"messageType": "some-msg-type"}), None))
        .await;

    let envelope = response.error().expect("expected envelope");
    assert_eq!(
        envelope.internal_error_message.as_deref(),
        Some("Unexpected message type")
    );
    assert!(envelope
        .internal_error_details
        .as_deref()
        .unwrap()
        .contains("some-msg-type"));
    assert!(envelope.customer_error_code.is_none());
    assert!(!rule.periodic_called.load(Ordering::SeqCst));
    assert!(!rule.change_called.load(Ordering::SeqCst));
}

#[tokio::test]
async fn customer_service_error_carries_code_and_message() {
    let (_, _, evaluator) = harness(TestRule {
        fail_with: Some(EvaluatorError::Service(
            ServiceError::api("AccessDenied", "access-denied").with_status(403),
        )),
        ..TestRule::new()
    });

    let response = evaluator.handle(test_scheduled_event(None)).await;
    assert_customer_error_response(&response, Some("AccessDenied"), Some("access-denied"));
    assert_eq!(
        response.error().unwrap().internal_error_message.as_deref(),
        Some("Customer error while making API request")
    );
}

#[tokio::test]
async fn internal_service_error_yields_internal_envelope() {
    let (_, _, evaluator) = harness(TestRule {
        fail_with: Some(EvaluatorError::Service(ServiceError::api(
            "InternalError",
            "some-internal-error",
        ))),
        ..TestRule::new()
    });

    let response = evaluator.handle(test_scheduled_event(None)).await;
    let envelope = response.error().expect("expected envelope");
    assert_eq!(
        envelope.internal_error_message.as_deref(),
        Some("Unexpected error while completing API request")
    );
    assert!(envelope.customer_error_code.is_none());
}

#[tokio::test]
async fn value_error_echoes_into_internal_fields() {
    let (_, _, evaluator) = harness(TestRule {
        fail_with: Some(EvaluatorError::value("some-value-error")),
        ..TestRule::new()
    });

    let response = evaluator.handle(test_scheduled_event(None)).await;
    let envelope = response.error().expect("expected envelope");
    assert_eq!(envelope.internal_error_message.as_deref(), Some("some-value-error"));
    assert_eq!(envelope.internal_error_details.as_deref(), Some("some-value-error"));
}

#[tokio::test]
async fn missing_trigger_handler_is_reported_plainly() {
    struct Bare;
    impl ConfigRule for Bare {}

    let service = Arc::new(MockConfigService::new());
    let evaluator = Evaluator::new(
        Arc::new(Bare),
        Arc::new(MockClientFactory::new(service)),
    );

    let response = evaluator.handle(test_scheduled_event(None)).await;
    let envelope = response.error().expect("expected envelope");
    assert_eq!(
        envelope.internal_error_message.as_deref(),
        Some("You must implement the evaluate_periodic method of the ConfigRule trait.")
    );
}

#[tokio::test]
async fn change_results_are_backfilled_and_submitted() {
    let (rule, service, evaluator) = harness(TestRule {
        change_results: vec![
            Evaluation::new(ComplianceType::NonCompliant).with_annotation("not encrypted")
        ],
        ..TestRule::new()
    });

    let response = evaluator
        .handle(test_change_event(change_invoking_event("OK"), None))
        .await;

    assert!(rule.change_called.load(Ordering::SeqCst));
    let expected = vec![WireEvaluation {
        compliance_resource_id: "i-abc".into(),
        compliance_resource_type: "Service::Instance".into(),
        compliance_type: ComplianceType::NonCompliant,
        ordering_timestamp: Utc.with_ymd_and_hms(2018, 2, 17, 1, 36, 34).unwrap(),
        annotation: Some("not encrypted".into()),
    }];
    assert_successful_evaluation(&response, &expected, 1);

    let puts = service.recorded_put_requests();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].evaluations, expected);
    assert_eq!(puts[0].result_token, "token");
}

#[tokio::test]
async fn unexpected_resource_type_skips_the_check() {
    let (rule, service, evaluator) = harness(TestRule {
        resource_types: vec!["Service::Volume".into()],
        ..TestRule::new()
    });

    let response = evaluator
        .handle(test_change_event(change_invoking_event("OK"), None))
        .await;

    assert!(!rule.change_called.load(Ordering::SeqCst));
    let submitted = response.evaluations().expect("expected evaluations");
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].compliance_type, ComplianceType::NotApplicable);
    assert_eq!(submitted[0].compliance_resource_id, "i-abc");
    assert_eq!(service.recorded_put_requests().len(), 1);
}

#[tokio::test]
async fn deleted_resource_is_not_applicable_without_the_check() {
    let (rule, _, evaluator) = harness(TestRule::new());

    let response = evaluator
        .handle(test_change_event(change_invoking_event("ResourceDeleted"), None))
        .await;

    assert!(!rule.change_called.load(Ordering::SeqCst));
    let submitted = response.evaluations().expect("expected evaluations");
    assert_eq!(submitted[0].compliance_type, ComplianceType::NotApplicable);
}

#[tokio::test]
async fn event_left_scope_is_not_applicable_without_the_check() {
    let (rule, _, evaluator) = harness(TestRule::new());

    let mut event = test_change_event(change_invoking_event("OK"), None);
    event["eventLeftScope"] = json!(true);
    let response = evaluator.handle(event).await;

    assert!(!rule.change_called.load(Ordering::SeqCst));
    let submitted = response.evaluations().expect("expected evaluations");
    assert_eq!(submitted[0].compliance_type, ComplianceType::NotApplicable);
}

#[tokio::test]
async fn periodic_run_reconciles_against_previous_results() {
    let pages = vec![serde_json::from_value(json!({
        "EvaluationResults": [
            {"EvaluationResultIdentifier": {"EvaluationResultQualifier": {
                "ResourceId": "gone", "ResourceType": "Service::Instance"}}},
            {"EvaluationResultIdentifier": {"EvaluationResultQualifier": {
                "ResourceId": "kept", "ResourceType": "Service::Instance"}}}
        ]
    }))
    .unwrap()];
    let (_, service, evaluator) = harness_with_service(
        TestRule {
            periodic_results: vec![Evaluation::for_resource(
                ComplianceType::Compliant,
                "kept",
                "Service::Instance",
            )],
            ..TestRule::new()
        },
        MockConfigService::new().with_compliance_pages(pages),
    );

    let response = evaluator.handle(test_scheduled_event(None)).await;
    let submitted = response.evaluations().expect("expected evaluations");

    let run_time = Utc.with_ymd_and_hms(2017, 12, 23, 22, 11, 18)
        .unwrap()
        .with_nanosecond(158_000_000)
        .unwrap();
    assert_eq!(submitted.len(), 2);
    assert_eq!(submitted[0].compliance_resource_id, "gone");
    assert_eq!(submitted[0].compliance_type, ComplianceType::NotApplicable);
    assert_eq!(submitted[0].ordering_timestamp, run_time);
    assert_eq!(submitted[1].compliance_resource_id, "kept");
    assert_eq!(submitted[1].compliance_type, ComplianceType::Compliant);
    assert_eq!(submitted[1].ordering_timestamp, run_time);

    assert_eq!(service.recorded_compliance_requests().len(), 1);
    assert_eq!(service.recorded_put_requests().len(), 1);
}

#[tokio::test]
async fn reconciliation_can_be_opted_out() {
    let (_, service, evaluator) = harness(TestRule {
        delete_old_evaluations: false,
        periodic_results: vec![Evaluation::for_resource(
            ComplianceType::Compliant,
            "kept",
            "Service::Instance",
        )],
        ..TestRule::new()
    });

    let response = evaluator.handle(test_scheduled_event(None)).await;
    assert_eq!(response.evaluations().unwrap().len(), 1);
    assert!(service.recorded_compliance_requests().is_empty());
}

#[tokio::test]
async fn periodic_run_with_no_findings_still_reports_once() {
    let (_, service, evaluator) = harness(TestRule::new());

    let response = evaluator.handle(test_scheduled_event(None)).await;
    assert_successful_evaluation(&response, &[], 0);

    let puts = service.recorded_put_requests();
    assert_eq!(puts.len(), 1);
    assert!(puts[0].evaluations.is_empty());
}

#[tokio::test]
async fn oversized_event_expands_then_evaluates() {
    let snapshot = serde_json::from_value(json!({
        "configurationItemCaptureTime": "2018-02-17T01:36:34.000Z",
        "configurationItemStatus": "OK",
        "resourceType": "Service::Instance",
        "resourceId": "i-abc",
        "configuration": "{\"state\":\"running\"}"
    }))
    .unwrap();
    let (rule, service, evaluator) = harness_with_service(
        TestRule {
            change_results: vec![Evaluation::new(ComplianceType::Compliant)],
            ..TestRule::new()
        },
        MockConfigService::new().with_history_items(vec![snapshot]),
    );

    let invoking = json!({
        "messageType": "OversizedConfigurationItemChangeNotification",
        "notificationCreationTime": "2018-02-17T01:36:35.000Z",
        "configurationItemSummary": {
            "resourceType": "Service::Instance",
            "resourceId": "i-abc"
        }
    });
    let response = evaluator.handle(test_change_event(invoking, None)).await;

    assert!(rule.change_called.load(Ordering::SeqCst));
    let submitted = response.evaluations().expect("expected evaluations");
    assert_eq!(submitted[0].compliance_resource_id, "i-abc");
    assert_eq!(service.recorded_history_requests().len(), 1);
}

#[tokio::test]
async fn oversized_event_with_no_history_fails_before_the_check() {
    let (rule, _, evaluator) = harness(TestRule::new());

    let invoking = json!({
        "messageType": "OversizedConfigurationItemChangeNotification",
        "notificationCreationTime": "2018-02-17T01:36:35.000Z",
        "configurationItemSummary": {
            "resourceType": "Service::Instance",
            "resourceId": "i-gone"
        }
    });
    let response = evaluator.handle(test_change_event(invoking, None)).await;

    assert!(!rule.change_called.load(Ordering::SeqCst));
    let envelope = response.error().expect("expected envelope");
    assert!(envelope
        .internal_error_details
        .as_deref()
        .unwrap()
        .contains("no configuration history"));
}

#[tokio::test]
async fn incomplete_periodic_record_aborts_the_whole_report() {
    // Periodic results are not back-filled with resource identity, so a
    // record without one fails validation before anything is submitted.
    let (_, service, evaluator) = harness(TestRule {
        periodic_results: vec![Evaluation::new(ComplianceType::Compliant)],
        ..TestRule::new()
    });

    let response = evaluator.handle(test_scheduled_event(None)).await;
    let envelope = response.error().expect("expected envelope");
    assert!(envelope
        .internal_error_message
        .as_deref()
        .unwrap()
        .contains("complianceResourceId"));
    assert!(service.recorded_put_requests().is_empty());
}

#[tokio::test]
async fn execution_role_parameters_shape_the_session() {
    let service = Arc::new(MockConfigService::new());
    let factory = Arc::new(MockClientFactory::new(service));
    let evaluator = Evaluator::new(Arc::new(TestRule::new()), factory.clone());

    let params = json!({
        "ExecutionRoleName": "audit-role",
        "ExecutionRoleRegion": "us-west-2",
        "AssumeRoleMode": "FALSE"
    });
    evaluator.handle(test_scheduled_event(Some(params))).await;

    let sessions = factory.recorded_sessions();
    assert_eq!(sessions.len(), 1);
    assert!(sessions[0].role_arn.ends_with("/audit-role"));
    assert!(sessions[0].role_arn.starts_with("arn:cloud:iam"));
    assert_eq!(sessions[0].region.as_deref(), Some("us-west-2"));
    assert!(!sessions[0].assume_role);
}
