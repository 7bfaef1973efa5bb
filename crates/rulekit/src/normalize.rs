//! Normalizes incoming triggers into one canonical shape.
//!
//! Oversized change notifications carry only a summary of the changed
//! item; expansion fetches the latest historical snapshot and rebuilds the
//! embedded-item form, so check functions only ever see scheduled or
//! full change notifications.

use tracing::debug;

use crate::client::ConfigService;
use crate::error::{EvaluatorError, RuleResult};
use crate::events::{
    ChangeNotification, InvokingEvent, OversizedChangeNotification, ScheduledNotification,
    TriggerEvent,
};

/// The invoking event with the oversized variant already expanded.
#[derive(Debug, Clone)]
pub enum NormalizedEvent {
    Scheduled(ScheduledNotification),
    Change(ChangeNotification),
}

/// Parse the trigger's invoking event and expand it if oversized.
pub async fn normalize_event(
    event: &TriggerEvent,
    service: &dyn ConfigService,
) -> RuleResult<NormalizedEvent> {
    match event.parse_invoking_event()? {
        InvokingEvent::ScheduledNotification(n) => Ok(NormalizedEvent::Scheduled(n)),
        InvokingEvent::ConfigurationItemChangeNotification(n) => Ok(NormalizedEvent::Change(n)),
        InvokingEvent::OversizedConfigurationItemChangeNotification(n) => {
            Ok(NormalizedEvent::Change(expand_oversized(n, service).await?))
        }
    }
}

/// Rebuild a full change notification from an oversized one.
async fn expand_oversized(
    notification: OversizedChangeNotification,
    service: &dyn ConfigService,
) -> RuleResult<ChangeNotification> {
    let summary = &notification.configuration_item_summary;
    debug!(
        resource_type = %summary.resource_type,
        resource_id = %summary.resource_id,
        "expanding oversized change notification"
    );

    let snapshots = service
        .get_resource_config_history(&summary.resource_type, &summary.resource_id, 1)
        .await?;
    let snapshot = snapshots.into_iter().next().ok_or_else(|| {
        EvaluatorError::value(format!(
            "no configuration history for {} {}",
            summary.resource_type, summary.resource_id
        ))
    })?;

    Ok(ChangeNotification {
        configuration_item: snapshot.into_configuration_item()?,
        notification_creation_time: notification.notification_creation_time,
        record_version: notification.record_version,
    })
}

// The tests for this module live in tests/normalize.rs: they drive the
// testkit's MockConfigService, which implements the `ConfigService` of
// the compiled library, a distinct type from `crate::ConfigService` in a
// unit-test build.
