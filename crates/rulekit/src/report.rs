//! Submits validated results to the reporting API in bounded batches.

use tracing::debug;

use crate::client::ConfigService;
use crate::error::RuleResult;
use crate::evaluation::WireEvaluation;
use crate::types::PutEvaluationsRequest;

/// Hard batch-size limit of the reporting API.
pub const MAX_EVALUATIONS_PER_CALL: usize = 100;

/// Result-token sentinel marking a dry run; calls are still issued but the
/// remote side performs no durable write.
pub const TEST_MODE_TOKEN: &str = "TESTMODE";

/// Report the records, batching as needed, and return what was submitted.
///
/// An empty input still issues exactly one call with an empty batch: it is
/// the only way the remote side can tell "ran and found nothing" apart
/// from "crashed before reporting". Non-empty input is chunked into
/// batches of at most [`MAX_EVALUATIONS_PER_CALL`], submitted in input
/// order; a failed chunk propagates immediately and earlier chunks stay
/// reported.
pub async fn submit_evaluations(
    service: &dyn ConfigService,
    result_token: &str,
    evaluations: Vec<WireEvaluation>,
) -> RuleResult<Vec<WireEvaluation>> {
    let test_mode = result_token == TEST_MODE_TOKEN;

    if evaluations.is_empty() {
        debug!(test_mode, "reporting zero findings");
        service
            .put_evaluations(&PutEvaluationsRequest {
                evaluations: Vec::new(),
                result_token: result_token.to_string(),
                test_mode,
            })
            .await?;
        return Ok(Vec::new());
    }

    for chunk in evaluations.chunks(MAX_EVALUATIONS_PER_CALL) {
        debug!(batch = chunk.len(), test_mode, "submitting evaluation batch");
        service
            .put_evaluations(&PutEvaluationsRequest {
                evaluations: chunk.to_vec(),
                result_token: result_token.to_string(),
                test_mode,
            })
            .await?;
    }

    Ok(evaluations)
}

// The tests for this module live in tests/report.rs: they drive the
// testkit's MockConfigService, which implements the `ConfigService` of
// the compiled library, a distinct type from `crate::ConfigService` in a
// unit-test build.
