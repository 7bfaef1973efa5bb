//! Compliance verdicts and the evaluation result record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{EvaluatorError, RuleResult};
use crate::events::ConfigurationItem;

/// Maximum annotation length the reporting API accepts.
pub const MAX_ANNOTATION_LEN: usize = 256;

/// Marker appended to annotations cut down to the service limit.
const TRUNCATION_MARKER: &str = " [truncated]";

/// Content kept ahead of the marker so the total is exactly the limit.
const TRUNCATED_CONTENT_LEN: usize = MAX_ANNOTATION_LEN - TRUNCATION_MARKER.len();

/// Tri-state compliance verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceType {
    Compliant,
    NonCompliant,
    NotApplicable,
}

impl ComplianceType {
    /// The wire representation of the verdict.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compliant => "COMPLIANT",
            Self::NonCompliant => "NON_COMPLIANT",
            Self::NotApplicable => "NOT_APPLICABLE",
        }
    }
}

impl fmt::Display for ComplianceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplianceType {
    type Err = EvaluatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COMPLIANT" => Ok(Self::Compliant),
            "NON_COMPLIANT" => Ok(Self::NonCompliant),
            "NOT_APPLICABLE" => Ok(Self::NotApplicable),
            other => Err(EvaluatorError::InvalidComplianceType(other.to_string())),
        }
    }
}

/// One statement of compliance for one resource.
///
/// Check functions create these with at least the verdict set; the
/// framework back-fills resource identity from the triggering item and the
/// ordering timestamp from the trigger, then validates the record
/// immediately before serialization. The ordering timestamp is never
/// supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    compliance_type: ComplianceType,
    resource_id: Option<String>,
    resource_type: Option<String>,
    annotation: String,
    ordering_timestamp: Option<DateTime<Utc>>,
}

impl Evaluation {
    /// Create a record carrying only the verdict.
    pub fn new(compliance_type: ComplianceType) -> Self {
        Self {
            compliance_type,
            resource_id: None,
            resource_type: None,
            annotation: String::new(),
            ordering_timestamp: None,
        }
    }

    /// Create a record with the resource identity already set.
    pub fn for_resource(
        compliance_type: ComplianceType,
        resource_id: impl Into<String>,
        resource_type: impl Into<String>,
    ) -> Self {
        Self::new(compliance_type)
            .with_resource_id(resource_id)
            .with_resource_type(resource_type)
    }

    /// Set the resource id.
    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Set the resource type.
    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    /// Set the free-text explanation, truncated to the service limit.
    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = truncate_annotation(&annotation.into());
        self
    }

    pub fn compliance_type(&self) -> ComplianceType {
        self.compliance_type
    }

    pub fn resource_id(&self) -> Option<&str> {
        self.resource_id.as_deref()
    }

    pub fn resource_type(&self) -> Option<&str> {
        self.resource_type.as_deref()
    }

    pub fn annotation(&self) -> &str {
        &self.annotation
    }

    pub fn ordering_timestamp(&self) -> Option<DateTime<Utc>> {
        self.ordering_timestamp
    }

    /// Back-fill from a scheduled trigger's notification creation time.
    pub(crate) fn import_from_periodic(&mut self, notification_creation_time: DateTime<Utc>) {
        self.ordering_timestamp = Some(notification_creation_time);
    }

    /// Back-fill identity and timestamp from the triggering item.
    pub(crate) fn import_from_configuration_item(&mut self, item: &ConfigurationItem) {
        self.ordering_timestamp = Some(item.configuration_item_capture_time);
        if self.resource_id.is_none() {
            self.resource_id = Some(item.resource_id.clone());
        }
        if self.resource_type.is_none() {
            self.resource_type = Some(item.resource_type.clone());
        }
    }

    /// Check the record is complete; an incomplete record aborts the whole
    /// reporting call.
    pub fn validate(&self) -> RuleResult<()> {
        if self.resource_id.as_deref().is_none_or(str::is_empty) {
            return Err(EvaluatorError::IncompleteEvaluation {
                field: "complianceResourceId",
            });
        }
        if self.resource_type.as_deref().is_none_or(str::is_empty) {
            return Err(EvaluatorError::IncompleteEvaluation {
                field: "complianceResourceType",
            });
        }
        if self.ordering_timestamp.is_none() {
            return Err(EvaluatorError::IncompleteEvaluation {
                field: "orderingTimestamp",
            });
        }
        Ok(())
    }

    /// Validate and serialize to the reporting wire shape.
    pub fn into_wire(self) -> RuleResult<WireEvaluation> {
        self.validate()?;
        Ok(WireEvaluation {
            compliance_resource_id: self.resource_id.unwrap_or_default(),
            compliance_resource_type: self.resource_type.unwrap_or_default(),
            compliance_type: self.compliance_type,
            ordering_timestamp: self.ordering_timestamp.unwrap_or_default(),
            annotation: if self.annotation.is_empty() {
                None
            } else {
                Some(self.annotation)
            },
        })
    }
}

/// A validated evaluation in the shape the reporting API takes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireEvaluation {
    pub compliance_resource_id: String,
    pub compliance_resource_type: String,
    pub compliance_type: ComplianceType,
    pub ordering_timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
}

/// Truncate to the service's 256-character annotation limit, appending a
/// fixed marker when content was dropped. Counts characters, not bytes.
pub fn truncate_annotation(annotation: &str) -> String {
    if annotation.chars().count() <= MAX_ANNOTATION_LEN {
        return annotation.to_string();
    }
    let mut truncated: String = annotation.chars().take(TRUNCATED_CONTENT_LEN).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}
