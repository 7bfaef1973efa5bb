//! Request and response types for the remote service operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EvaluatorError, RuleResult};
use crate::evaluation::{ComplianceType, WireEvaluation};
use crate::events::{ConfigurationItem, Relationship};

/// Batched "report evaluation results" call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutEvaluationsRequest {
    pub evaluations: Vec<WireEvaluation>,
    pub result_token: String,
    /// When set the remote side performs no durable write.
    pub test_mode: bool,
}

/// One page of the "query previously reported results" call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ComplianceDetailsRequest {
    pub config_rule_name: String,
    pub compliance_types: Vec<ComplianceType>,
    pub limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

/// Response page of previously reported results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComplianceDetailsPage {
    #[serde(rename = "EvaluationResults", default)]
    pub evaluation_results: Vec<EvaluationResult>,
    /// Continuation token; absent or empty on the last page.
    #[serde(rename = "nextToken", default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

/// A previously reported result as the query API returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EvaluationResult {
    pub evaluation_result_identifier: EvaluationResultIdentifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance_type: Option<ComplianceType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EvaluationResultIdentifier {
    pub evaluation_result_qualifier: EvaluationResultQualifier,
}

/// Identity of the resource a previous result was reported for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EvaluationResultQualifier {
    pub resource_id: String,
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_rule_name: Option<String>,
}

/// "Fetch historical snapshots" call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceHistoryRequest {
    pub resource_type: String,
    pub resource_id: String,
    pub limit: u32,
}

/// Response of the history call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceHistoryPage {
    #[serde(default)]
    pub configuration_items: Vec<HistoryConfigurationItem>,
}

/// A snapshot as the history API returns it.
///
/// Differs from the notification-embedded item shape: different field
/// names, JSON-encoded text blobs for `configuration` and each
/// `supplementaryConfiguration` entry, and `relationshipName` instead of
/// `name` on relationships. [`Self::into_configuration_item`] converts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryConfigurationItem {
    pub configuration_item_capture_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration_state_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    pub configuration_item_status: crate::events::ItemStatus,
    pub resource_type: String,
    pub resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    #[serde(
        default,
        rename = "configurationItemMD5Hash",
        skip_serializing_if = "Option::is_none"
    )]
    pub configuration_item_md5_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_creation_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub related_events: Vec<Value>,
    #[serde(default)]
    pub tags: serde_json::Map<String, Value>,
    #[serde(default)]
    pub relationships: Vec<HistoryRelationship>,
    /// JSON-encoded configuration blob.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<String>,
    /// JSON-encoded text per entry.
    #[serde(default)]
    pub supplementary_configuration: std::collections::BTreeMap<String, String>,
}

/// Relationship entry in the history shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRelationship {
    pub relationship_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
}

impl HistoryConfigurationItem {
    /// Convert into the shape a change notification embeds, re-parsing the
    /// JSON-encoded text fields into structured values.
    pub fn into_configuration_item(self) -> RuleResult<ConfigurationItem> {
        let configuration = match self.configuration.as_deref() {
            None | Some("") => Value::Null,
            Some(raw) => serde_json::from_str(raw).map_err(|e| {
                EvaluatorError::value(format!(
                    "configuration of {} is not valid JSON: {e}",
                    self.resource_id
                ))
            })?,
        };

        let mut supplementary_configuration = serde_json::Map::new();
        for (key, raw) in self.supplementary_configuration {
            let parsed = serde_json::from_str(&raw).map_err(|e| {
                EvaluatorError::value(format!(
                    "supplementaryConfiguration entry '{key}' is not valid JSON: {e}"
                ))
            })?;
            supplementary_configuration.insert(key, parsed);
        }

        let relationships = self
            .relationships
            .into_iter()
            .map(|r| Relationship {
                name: r.relationship_name,
                resource_id: r.resource_id,
                resource_name: r.resource_name,
                resource_type: r.resource_type,
            })
            .collect();

        Ok(ConfigurationItem {
            configuration_item_capture_time: self.configuration_item_capture_time,
            configuration_state_id: self.configuration_state_id,
            aws_account_id: self.account_id,
            configuration_item_status: self.configuration_item_status,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            resource_name: self.resource_name,
            arn: self.arn,
            aws_region: self.aws_region,
            availability_zone: self.availability_zone,
            configuration_state_md5_hash: self.configuration_item_md5_hash,
            resource_creation_time: self.resource_creation_time,
            related_events: self.related_events,
            tags: self.tags,
            relationships,
            configuration,
            supplementary_configuration,
        })
    }
}
