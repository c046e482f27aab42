use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

use crate::constants::IDEMPOTENCY_KEY_PREFIX;

/// Derive the idempotency key for a conversion attempt.
///
/// Requests for the same tenant, lead and initiator that fall inside the same
/// `window` bucket share a key. A zero window is treated as one second.
pub fn generate_idempotency_key(
    tenant_id: Uuid,
    lead_id: Uuid,
    initiated_by: Uuid,
    at: DateTime<Utc>,
    window: Duration,
) -> String {
    let window_secs = window.as_secs().max(1) as i64;
    let bucket = at.timestamp().div_euclid(window_secs);
    format!("{IDEMPOTENCY_KEY_PREFIX}:{tenant_id}:{lead_id}:{initiated_by}:{bucket}")
}
