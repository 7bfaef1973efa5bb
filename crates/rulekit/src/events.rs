//! Trigger payloads from the configuration-management service.
//!
//! An invocation receives an outer [`TriggerEvent`] envelope whose
//! `invokingEvent` field is a JSON-encoded [`InvokingEvent`]: either a
//! scheduled notification, a change notification embedding the full
//! configuration item, or an oversized change notification carrying only a
//! summary to be expanded through a history lookup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EvaluatorError, RuleResult};

/// The outer envelope delivered to the handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerEvent {
    pub execution_role_arn: String,

    /// Raw `ruleParameters` JSON text, when the rule has parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_parameters: Option<String>,

    /// JSON-encoded invoking event.
    pub invoking_event: String,

    /// Set when the resource left the service's monitoring scope.
    #[serde(default)]
    pub event_left_scope: bool,

    /// Opaque token correlating report calls with this invocation.
    pub result_token: String,

    pub config_rule_name: String,

    #[serde(default)]
    pub account_id: String,

    #[serde(default)]
    pub config_rule_arn: String,
}

impl TriggerEvent {
    /// Parse `ruleParameters` into structured form; `{}` when absent.
    pub fn rule_parameters_value(&self) -> RuleResult<Value> {
        match self.rule_parameters.as_deref() {
            None => Ok(Value::Object(serde_json::Map::new())),
            Some(raw) => serde_json::from_str(raw)
                .map_err(|e| EvaluatorError::value(format!("ruleParameters is not valid JSON: {e}"))),
        }
    }

    /// Parse the embedded invoking event, rejecting unknown message types.
    pub fn parse_invoking_event(&self) -> RuleResult<InvokingEvent> {
        let raw: Value = serde_json::from_str(&self.invoking_event)
            .map_err(|e| EvaluatorError::value(format!("invokingEvent is not valid JSON: {e}")))?;

        let message_type = raw
            .get("messageType")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !matches!(
            message_type,
            "ScheduledNotification"
                | "ConfigurationItemChangeNotification"
                | "OversizedConfigurationItemChangeNotification"
        ) {
            return Err(EvaluatorError::UnexpectedMessageType {
                details: self.invoking_event.clone(),
            });
        }

        serde_json::from_value(raw)
            .map_err(|e| EvaluatorError::value(format!("invokingEvent is malformed: {e}")))
    }
}

/// Canonical in-memory form of the invoking event, keyed by `messageType`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "messageType")]
pub enum InvokingEvent {
    ScheduledNotification(ScheduledNotification),
    ConfigurationItemChangeNotification(ChangeNotification),
    OversizedConfigurationItemChangeNotification(OversizedChangeNotification),
}

/// Periodic trigger; not tied to a specific resource change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledNotification {
    pub notification_creation_time: DateTime<Utc>,
}

/// Change trigger embedding the full configuration item.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeNotification {
    pub configuration_item: ConfigurationItem,
    pub notification_creation_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_version: Option<String>,
}

/// Change trigger whose item was too large to embed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OversizedChangeNotification {
    pub configuration_item_summary: ConfigurationItemSummary,
    pub notification_creation_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_version: Option<String>,
}

/// Recording status of a configuration item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemStatus {
    #[serde(rename = "OK")]
    Ok,
    ResourceDiscovered,
    ResourceDeleted,
    ResourceDeletedNotRecorded,
    ResourceNotRecorded,
    #[serde(other)]
    Unknown,
}

impl ItemStatus {
    /// Whether a resource with this status is still evaluable at all.
    pub fn in_scope(&self) -> bool {
        matches!(self, Self::Ok | Self::ResourceDiscovered)
    }
}

/// A tracked resource's configuration snapshot as embedded in change
/// notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationItem {
    pub configuration_item_capture_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration_state_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_account_id: Option<String>,
    pub configuration_item_status: ItemStatus,
    pub resource_type: String,
    pub resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    #[serde(default, rename = "ARN", skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration_state_md5_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_creation_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub related_events: Vec<Value>,
    #[serde(default)]
    pub tags: serde_json::Map<String, Value>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    /// Free-form configuration blob; shape depends on the resource type.
    #[serde(default)]
    pub configuration: Value,
    #[serde(default)]
    pub supplementary_configuration: serde_json::Map<String, Value>,
}

/// A related-resource entry on a configuration item.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
}

/// The slim summary embedded in oversized notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationItemSummary {
    pub resource_type: String,
    pub resource_id: String,
}

/// Whether a change-triggered item is in scope for evaluation.
///
/// In scope iff the item's status is `OK` or `ResourceDiscovered`, the
/// event does not flag that the resource left monitoring scope, and the
/// rule's expected resource types (when declared) include the item's type.
pub fn is_applicable(
    item: &ConfigurationItem,
    event: &TriggerEvent,
    expected_resource_types: &[String],
) -> bool {
    if !item.configuration_item_status.in_scope() {
        tracing::debug!(
            resource_id = %item.resource_id,
            status = ?item.configuration_item_status,
            "resource deleted or not recorded, marking NOT_APPLICABLE"
        );
        return false;
    }
    if event.event_left_scope {
        return false;
    }
    if !expected_resource_types.is_empty()
        && !expected_resource_types
            .iter()
            .any(|t| t == &item.resource_type)
    {
        tracing::debug!(
            resource_type = %item.resource_type,
            "resource type is not in the rule's expected resource types"
        );
        return false;
    }
    true
}
