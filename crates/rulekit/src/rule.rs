//! The rule trait check authors implement.

use async_trait::async_trait;
use serde_json::Value;

use crate::client::ConfigService;
use crate::error::{EvaluatorError, RuleResult};
use crate::evaluation::Evaluation;
use crate::events::{ConfigurationItem, TriggerEvent};
use crate::session::SessionSpec;

/// A compliance rule.
///
/// Implement `evaluate_change` for change-triggered rules,
/// `evaluate_periodic` for scheduled rules, or both. The defaults signal a
/// missing handler as a distinct error kind, so a rule wired to a trigger
/// it does not implement fails with a plain message rather than a generic
/// error.
#[async_trait]
pub trait ConfigRule: Send + Sync {
    /// Validate and transform the raw rule parameters.
    ///
    /// Return [`EvaluatorError::InvalidParameters`] to reject them; the
    /// invocation then short-circuits to the parameter error envelope
    /// before any check function runs.
    fn evaluate_parameters(&self, rule_parameters: Value) -> RuleResult<Value> {
        Ok(rule_parameters)
    }

    /// Evaluate one changed resource.
    async fn evaluate_change(
        &self,
        event: &TriggerEvent,
        service: &dyn ConfigService,
        item: &ConfigurationItem,
        parameters: &Value,
    ) -> RuleResult<Vec<Evaluation>> {
        let _ = (event, service, item, parameters);
        Err(EvaluatorError::MissingTriggerHandler {
            method: "evaluate_change",
        })
    }

    /// Evaluate the whole fleet on a scheduled trigger.
    async fn evaluate_periodic(
        &self,
        event: &TriggerEvent,
        service: &dyn ConfigService,
        parameters: &Value,
    ) -> RuleResult<Vec<Evaluation>> {
        let _ = (event, service, parameters);
        Err(EvaluatorError::MissingTriggerHandler {
            method: "evaluate_periodic",
        })
    }

    /// Resource types this rule evaluates on change triggers.
    ///
    /// Empty (the default) means every type is in scope. When non-empty,
    /// items of other types are reported NOT_APPLICABLE without invoking
    /// `evaluate_change`.
    fn expected_resource_types(&self) -> Vec<String> {
        Vec::new()
    }

    /// Whether scheduled runs retract previously reported results for
    /// resources missing from the fresh set.
    fn delete_old_evaluations_on_scheduled_notification(&self) -> bool {
        true
    }

    /// The execution identity for this invocation; override to bypass the
    /// parameter-driven derivation.
    fn execution_role(&self, event: &TriggerEvent) -> RuleResult<SessionSpec> {
        SessionSpec::from_event(event)
    }
}

// The tests for this module live in tests/rule.rs: they drive the
// testkit's MockConfigService, which implements the `ConfigService` of
// the compiled library, a distinct type from `crate::ConfigService` in a
// unit-test build.
