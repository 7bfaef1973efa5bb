//! Retracts previously reported results that a fresh periodic run no
//! longer covers.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::client::ConfigService;
use crate::error::RuleResult;
use crate::evaluation::{ComplianceType, WireEvaluation};
use crate::report::MAX_EVALUATIONS_PER_CALL;
use crate::types::ComplianceDetailsRequest;

/// Compare the fresh periodic results against everything previously
/// reported for this rule and synthesize NOT_APPLICABLE retractions for
/// resources that disappeared from the fresh set.
///
/// Retractions come first in the output: if a resource both disappears and
/// reappears downstream, the fresh record is the last word for that id.
pub async fn clean_up_old_evaluations(
    service: &dyn ConfigService,
    config_rule_name: &str,
    fresh: Vec<WireEvaluation>,
    run_timestamp: DateTime<Utc>,
) -> RuleResult<Vec<WireEvaluation>> {
    let fresh_ids: HashSet<&str> = fresh
        .iter()
        .map(|e| e.compliance_resource_id.as_str())
        .collect();

    let mut previous = Vec::new();
    let mut next_token: Option<String> = None;
    loop {
        let page = service
            .get_compliance_details(&ComplianceDetailsRequest {
                config_rule_name: config_rule_name.to_string(),
                compliance_types: vec![ComplianceType::Compliant, ComplianceType::NonCompliant],
                limit: MAX_EVALUATIONS_PER_CALL as u32,
                next_token: next_token.clone(),
            })
            .await?;
        previous.extend(page.evaluation_results);

        next_token = page.next_token.filter(|t| !t.is_empty());
        if next_token.is_none() {
            break;
        }
    }

    let mut retracted_ids = HashSet::new();
    let mut output = Vec::new();
    for old in previous {
        let qualifier = old
            .evaluation_result_identifier
            .evaluation_result_qualifier;
        if fresh_ids.contains(qualifier.resource_id.as_str()) {
            continue;
        }
        if !retracted_ids.insert(qualifier.resource_id.clone()) {
            continue;
        }
        output.push(WireEvaluation {
            compliance_resource_id: qualifier.resource_id,
            compliance_resource_type: qualifier.resource_type,
            compliance_type: ComplianceType::NotApplicable,
            ordering_timestamp: run_timestamp,
            annotation: None,
        });
    }

    debug!(
        retracted = output.len(),
        fresh = fresh.len(),
        "reconciled periodic evaluations"
    );

    output.extend(fresh);
    Ok(output)
}

// The tests for this module live in tests/reconcile.rs: they drive the
// testkit's MockConfigService, which implements the `ConfigService` of
// the compiled library, a distinct type from `crate::ConfigService` in a
// unit-test build.
