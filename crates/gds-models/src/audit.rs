//! Append-only audit logs for state machine transitions
//!
//! Both the VASP verification log and the certificate request log share the
//! same entry shape: who moved the record from which state to which state,
//! when, and why. Entries are never rewritten and their timestamps are
//! strictly monotonic so that operators can replay a record's history.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Audit source recorded for transitions performed by the service itself
/// rather than a human actor (the certificate manager, primarily).
pub const AUTOMATED: &str = "automated";

/// One state transition on a directory record.
///
/// `source` is the email address of the actor that caused the transition, or
/// the literal string [`AUTOMATED`] for transitions the pipeline performs on
/// its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry<S> {
    pub timestamp: DateTime<Utc>,
    pub previous_state: S,
    pub current_state: S,
    pub description: String,
    pub source: String,
}

/// Append a transition entry to a log, guaranteeing strictly monotonic
/// timestamps even when transitions land inside the same clock tick.
pub fn append_entry<S: Copy>(
    log: &mut Vec<AuditLogEntry<S>>,
    previous: S,
    current: S,
    description: &str,
    source: &str,
) {
    let mut timestamp = Utc::now();
    if let Some(last) = log.last() {
        if timestamp <= last.timestamp {
            timestamp = last.timestamp + Duration::microseconds(1);
        }
    }

    log.push(AuditLogEntry {
        timestamp,
        previous_state: previous,
        current_state: current,
        description: description.to_owned(),
        source: source.to_owned(),
    });
}
