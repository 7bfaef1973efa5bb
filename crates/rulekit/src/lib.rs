//! Framework for writing compliance-check rules invoked by a
//! configuration-management service.
//!
//! rulekit normalizes the service's trigger payloads, delegates to a
//! rule's check function, validates and serializes the results, and
//! reports them back through the service's reporting API:
//!
//! - Three trigger shapes (scheduled, change, oversized change) folded
//!   into one canonical event, with oversized items rebuilt from a
//!   history lookup
//! - Validated, fail-fast evaluation records with annotation truncation
//! - Batched reporting (at most 100 records per call) with a dry-run
//!   sentinel token
//! - Optional reconciliation of periodic runs against previously
//!   reported results
//! - One structured error envelope per failed invocation
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use serde_json::Value;
//! use rulekit::{
//!     ComplianceType, ConfigRule, ConfigService, ConfigurationItem, Evaluation, Evaluator,
//!     HttpClientFactory, RuleResult, TriggerEvent,
//! };
//!
//! struct VolumesEncrypted;
//!
//! #[async_trait]
//! impl ConfigRule for VolumesEncrypted {
//!     async fn evaluate_change(
//!         &self,
//!         _event: &TriggerEvent,
//!         _service: &dyn ConfigService,
//!         item: &ConfigurationItem,
//!         _parameters: &Value,
//!     ) -> RuleResult<Vec<Evaluation>> {
//!         let encrypted = item.configuration["encrypted"].as_bool().unwrap_or(false);
//!         let verdict = if encrypted {
//!             ComplianceType::Compliant
//!         } else {
//!             ComplianceType::NonCompliant
//!         };
//!         Ok(vec![Evaluation::new(verdict)])
//!     }
//!
//!     fn expected_resource_types(&self) -> Vec<String> {
//!         vec!["Service::Volume".to_string()]
//!     }
//! }
//!
//! # async fn example(event: Value) {
//! let evaluator = Evaluator::new(
//!     Arc::new(VolumesEncrypted),
//!     Arc::new(HttpClientFactory::from_env()),
//! );
//! let response = evaluator.handle(event).await;
//! # let _ = response;
//! # }
//! ```

pub mod client;
pub mod error;
pub mod evaluation;
pub mod evaluator;
pub mod events;
pub mod normalize;
pub mod reconcile;
pub mod report;
pub mod rule;
pub mod session;
pub mod types;

// Re-export main types
pub use client::{ConfigService, HttpConfigService, ServiceConfig};
pub use error::{ErrorResponse, EvaluatorError, RuleResult, ServiceError};
pub use evaluation::{
    truncate_annotation, ComplianceType, Evaluation, WireEvaluation, MAX_ANNOTATION_LEN,
};
pub use evaluator::{Evaluator, HandlerResponse};
pub use events::{
    is_applicable, ChangeNotification, ConfigurationItem, ConfigurationItemSummary, InvokingEvent,
    ItemStatus, OversizedChangeNotification, Relationship, ScheduledNotification, TriggerEvent,
};
pub use normalize::{normalize_event, NormalizedEvent};
pub use reconcile::clean_up_old_evaluations;
pub use report::{submit_evaluations, MAX_EVALUATIONS_PER_CALL, TEST_MODE_TOKEN};
pub use rule::ConfigRule;
pub use session::{ClientFactory, HttpClientFactory, SessionSpec};
pub use types::{
    ComplianceDetailsPage, ComplianceDetailsRequest, EvaluationResult, EvaluationResultIdentifier,
    EvaluationResultQualifier, HistoryConfigurationItem, HistoryRelationship,
    PutEvaluationsRequest, ResourceHistoryPage, ResourceHistoryRequest,
};
