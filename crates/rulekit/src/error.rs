//! Error types for the evaluation pipeline.

use serde::{Deserialize, Serialize};

/// Result alias for framework and rule code.
pub type RuleResult<T> = Result<T, EvaluatorError>;

/// Errors raised by the framework or by user-supplied check functions.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EvaluatorError {
    /// The rule's `evaluate_parameters` hook rejected the rule parameters.
    #[error("invalid rule parameters: {0}")]
    InvalidParameters(String),

    /// The rule does not implement the check function for this trigger type.
    #[error("You must implement the {method} method of the ConfigRule trait.")]
    MissingTriggerHandler { method: &'static str },

    /// A compliance verdict string is not one of the three valid values.
    #[error(
        "The complianceType is not valid. Valid values are COMPLIANT, NON_COMPLIANT and NOT_APPLICABLE, got '{0}'."
    )]
    InvalidComplianceType(String),

    /// An evaluation is missing a required field at serialization time.
    #[error("Missing {field} from an evaluation result.")]
    IncompleteEvaluation { field: &'static str },

    /// The invoking event's message type is not one this framework handles.
    #[error("Unexpected message type")]
    UnexpectedMessageType { details: String },

    /// A remote service call failed.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Any other validation failure.
    #[error("{0}")]
    Value(String),
}

impl EvaluatorError {
    /// Shorthand for the catch-all validation variant.
    pub fn value(message: impl Into<String>) -> Self {
        Self::Value(message.into())
    }
}

/// Errors returned by the remote configuration-management service.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    /// The service rejected the call with a coded error.
    #[error("{code}: {message}")]
    Api {
        code: String,
        message: String,
        status: Option<u16>,
    },

    /// The call never produced a response.
    #[error("network error: {message}")]
    Network { message: String },

    /// The response body could not be decoded.
    #[error("invalid response: {message}")]
    InvalidResponse { message: String },
}

impl ServiceError {
    /// Build a coded API error.
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code: code.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Attach the HTTP status the error arrived with.
    pub fn with_status(self, status: u16) -> Self {
        match self {
            Self::Api { code, message, .. } => Self::Api {
                code,
                message,
                status: Some(status),
            },
            other => other,
        }
    }

    /// Whether this failure is the service's fault rather than the caller's.
    ///
    /// Coded errors are internal when the status is 5xx, the code starts
    /// with '5', or the code mentions "InternalError" or "ServiceError".
    /// Transport and decode failures are always internal.
    pub fn is_internal(&self) -> bool {
        match self {
            Self::Api { code, status, .. } => {
                status.is_some_and(|s| (500..600).contains(&s))
                    || code.starts_with('5')
                    || code.contains("InternalError")
                    || code.contains("ServiceError")
            }
            Self::Network { .. } | Self::InvalidResponse { .. } => true,
        }
    }

    /// The error code, when the service supplied one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    /// The error message, when the service supplied one.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Api { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// The structured error envelope returned to the invoking service.
///
/// One envelope is produced per failed invocation; it is never mixed with
/// partial results. Internal failures populate only the internal fields,
/// customer-attributable failures additionally carry the original error
/// code and message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub internal_error_message: Option<String>,
    pub internal_error_details: Option<String>,
    pub customer_error_message: Option<String>,
    pub customer_error_code: Option<String>,
}

impl ErrorResponse {
    /// Envelope for failures the customer cannot act on.
    pub fn internal(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            internal_error_message: Some(message.into()),
            internal_error_details: Some(details.into()),
            customer_error_message: None,
            customer_error_code: None,
        }
    }

    /// Envelope for failures attributable to the customer's account or setup.
    pub fn customer(
        message: impl Into<String>,
        details: impl Into<String>,
        code: impl Into<String>,
        customer_message: impl Into<String>,
    ) -> Self {
        Self {
            internal_error_message: Some(message.into()),
            internal_error_details: Some(details.into()),
            customer_error_message: Some(customer_message.into()),
            customer_error_code: Some(code.into()),
        }
    }

    /// Envelope for a rejected `ruleParameters` value.
    pub fn invalid_parameters(details: impl Into<String>) -> Self {
        Self::customer(
            "Parameter value is invalid",
            "An error was raised during the validation of the Parameter value",
            "InvalidParameterValueException",
            details,
        )
    }
}
