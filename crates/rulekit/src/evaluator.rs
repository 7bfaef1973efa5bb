//! Top-level orchestration of one invocation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

use crate::client::ConfigService;
use crate::error::{ErrorResponse, EvaluatorError, RuleResult};
use crate::evaluation::{ComplianceType, Evaluation, WireEvaluation};
use crate::events::{is_applicable, ConfigurationItem, TriggerEvent};
use crate::normalize::{normalize_event, NormalizedEvent};
use crate::reconcile::clean_up_old_evaluations;
use crate::report::submit_evaluations;
use crate::rule::ConfigRule;
use crate::session::ClientFactory;

/// What one invocation returns to the invoking service: the wire records
/// actually submitted, or exactly one structured error envelope. There is
/// no separate success flag; the shape is the contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HandlerResponse {
    Evaluations(Vec<WireEvaluation>),
    Error(ErrorResponse),
}

impl HandlerResponse {
    /// The submitted records, when the invocation succeeded.
    pub fn evaluations(&self) -> Option<&[WireEvaluation]> {
        match self {
            Self::Evaluations(evals) => Some(evals),
            Self::Error(_) => None,
        }
    }

    /// The envelope, when the invocation failed.
    pub fn error(&self) -> Option<&ErrorResponse> {
        match self {
            Self::Evaluations(_) => None,
            Self::Error(env) => Some(env),
        }
    }
}

/// Drives one trigger event through normalization, the rule's check
/// function, validation and reporting.
pub struct Evaluator {
    rule: Arc<dyn ConfigRule>,
    client_factory: Arc<dyn ClientFactory>,
}

impl Evaluator {
    pub fn new(rule: Arc<dyn ConfigRule>, client_factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            rule,
            client_factory,
        }
    }

    /// Process one trigger event to completion.
    ///
    /// Every failure is folded into one envelope; results and envelopes
    /// are never mixed.
    pub async fn handle(&self, event: Value) -> HandlerResponse {
        match self.run(event).await {
            Ok(submitted) => HandlerResponse::Evaluations(submitted),
            Err(err) => {
                let envelope = envelope_for(&err);
                error!(error = %err, ?envelope, "invocation failed");
                HandlerResponse::Error(envelope)
            }
        }
    }

    async fn run(&self, event: Value) -> RuleResult<Vec<WireEvaluation>> {
        if event.is_null() {
            return Err(EvaluatorError::value("Error: event is not defined."));
        }
        let event: TriggerEvent = serde_json::from_value(event)
            .map_err(|e| EvaluatorError::value(format!("Error: event is malformed: {e}")))?;

        let session = self.rule.execution_role(&event)?;
        let service = self.client_factory.build(&session).await?;

        let normalized = normalize_event(&event, service.as_ref()).await?;

        let parameters = self
            .rule
            .evaluate_parameters(event.rule_parameters_value()?)?;

        match normalized {
            NormalizedEvent::Scheduled(notification) => {
                debug!(rule = %event.config_rule_name, "periodic evaluation");
                let results = self
                    .rule
                    .evaluate_periodic(&event, service.as_ref(), &parameters)
                    .await?;
                self.process_periodic(
                    service.as_ref(),
                    &event,
                    notification.notification_creation_time,
                    results,
                )
                .await
            }
            NormalizedEvent::Change(notification) => {
                let item = notification.configuration_item;
                debug!(
                    rule = %event.config_rule_name,
                    resource_id = %item.resource_id,
                    "change evaluation"
                );
                let results = if is_applicable(&item, &event, &self.rule.expected_resource_types())
                {
                    self.rule
                        .evaluate_change(&event, service.as_ref(), &item, &parameters)
                        .await?
                } else {
                    vec![Evaluation::new(ComplianceType::NotApplicable)]
                };
                process_change_results(service.as_ref(), &event, &item, results).await
            }
        }
    }

    async fn process_periodic(
        &self,
        service: &dyn ConfigService,
        event: &TriggerEvent,
        notification_creation_time: DateTime<Utc>,
        results: Vec<Evaluation>,
    ) -> RuleResult<Vec<WireEvaluation>> {
        let mut latest = Vec::with_capacity(results.len());
        for mut evaluation in results {
            evaluation.import_from_periodic(notification_creation_time);
            latest.push(evaluation.into_wire()?);
        }

        let evaluations = if self
            .rule
            .delete_old_evaluations_on_scheduled_notification()
        {
            clean_up_old_evaluations(
                service,
                &event.config_rule_name,
                latest,
                notification_creation_time,
            )
            .await?
        } else {
            latest
        };

        submit_evaluations(service, &event.result_token, evaluations).await
    }
}

async fn process_change_results(
    service: &dyn ConfigService,
    event: &TriggerEvent,
    item: &ConfigurationItem,
    results: Vec<Evaluation>,
) -> RuleResult<Vec<WireEvaluation>> {
    let mut evaluations = Vec::with_capacity(results.len());
    for mut evaluation in results {
        evaluation.import_from_configuration_item(item);
        evaluations.push(evaluation.into_wire()?);
    }
    submit_evaluations(service, &event.result_token, evaluations).await
}

/// Map a pipeline error to the one envelope shape its kind produces.
fn envelope_for(err: &EvaluatorError) -> ErrorResponse {
    match err {
        EvaluatorError::InvalidParameters(details) => ErrorResponse::invalid_parameters(details),
        EvaluatorError::UnexpectedMessageType { details } => {
            ErrorResponse::internal("Unexpected message type", details)
        }
        EvaluatorError::Service(service_err) if service_err.is_internal() => {
            ErrorResponse::internal(
                "Unexpected error while completing API request",
                service_err.to_string(),
            )
        }
        EvaluatorError::Service(service_err) => ErrorResponse::customer(
            "Customer error while making API request",
            service_err.to_string(),
            service_err.code().unwrap_or_default(),
            service_err.message().unwrap_or_default(),
        ),
        other => ErrorResponse::internal(other.to_string(), other.to_string()),
    }
}
