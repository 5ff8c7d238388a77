//! Engine events rendered as log lines.

use tracing::{debug, error, info, warn};

use scanpoint_core::SyncRecord;
use scanpoint_sync::{SyncEventSink, SyncReport, SyncStatus};

/// Routes engine events to the tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl SyncEventSink for ConsoleSink {
    fn emit_status(&self, status: &SyncStatus) {
        debug!(
            pending = status.pending_count,
            failed = status.failed_count,
            online = status.online,
            queue_size = status.queue_size,
            "sync:status"
        );
    }

    fn emit_code_added(&self, record: &SyncRecord) {
        info!(id = %record.id, code = %record.code, "sync:code_added");
    }

    fn emit_pass_complete(&self, report: &SyncReport) {
        if report.gate_closed {
            debug!(skipped = report.skipped, "sync:pass skipped, offline or not activated");
            return;
        }
        info!(
            attempted = report.attempted,
            synced = report.synced,
            failed = report.failed,
            exhausted = report.exhausted,
            "sync:pass"
        );
    }

    fn emit_error(&self, message: &str, retryable: bool) {
        if retryable {
            warn!(reason = message, "sync:error");
        } else {
            error!(reason = message, "sync:error");
        }
    }
}
