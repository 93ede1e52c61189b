use serde_json::json;
use uplink_core::validation::DEFAULT_CONTENT_TYPE;
use uplink_core::{
    BatchState, BatchStatus, BatchStatusResponse, EventKind, ProgressEvent, UploadError,
    UploadItem, UploadStatus,
};

/// Initialize tracing for CLI binaries. Logs go to stderr so stdout stays machine-readable.
///
/// `UPLINK_LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if std::env::var("UPLINK_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// One-line description of an applied event.
pub fn format_event(state: &BatchState, event: &ProgressEvent) -> String {
    let counts = state.counts();
    let totals = format!("{}/{} complete", counts.complete, counts.total);

    match event.kind {
        EventKind::BatchStatus => format!(
            "{} status {} ({})",
            state.batch_id,
            state.status_label.as_deref().unwrap_or("unknown"),
            totals
        ),
        EventKind::BatchProgress => {
            format!("{} progress {:.0}% ({})", state.batch_id, state.progress, totals)
        }
        EventKind::SyncProgress => {
            format!("{} sync {:.0}%", state.batch_id, state.sync_progress)
        }
        EventKind::FileProcessed => {
            let file_id = event.file_id.as_deref().unwrap_or("-");
            match state.item(file_id) {
                Some(item) => {
                    let mut line = format!(
                        "{} {} {} {:.0}%",
                        state.batch_id, item.filename, item.status, item.progress
                    );
                    if let Some(error) = &item.error {
                        line.push_str(&format!(": {}", error));
                    }
                    line
                }
                None => format!("{} {}", state.batch_id, file_id),
            }
        }
        EventKind::BatchComplete => format!(
            "{} complete ({}, {} failed)",
            state.batch_id, totals, counts.errored
        ),
    }
}

/// Final report printed when tracking ends.
pub fn summary(state: &BatchState) -> serde_json::Value {
    let counts = state.counts();
    json!({
        "batch_id": state.batch_id,
        "status": state.status.to_string(),
        "server_status": state.status_label,
        "progress": state.progress,
        "sync_progress": state.sync_progress,
        "complete": counts.complete,
        "errored": counts.errored,
        "in_flight": counts.in_flight,
        "failure": state.failure,
        "files": state.items.iter().map(|item| json!({
            "id": item.id,
            "filename": item.filename,
            "status": item.status,
            "progress": item.progress,
            "error": item.error,
        })).collect::<Vec<_>>(),
    })
}

/// Final report including the error that ended tracking, if any.
pub fn tracking_report(
    state: &BatchState,
    result: &Result<BatchStatus, UploadError>,
) -> serde_json::Value {
    let mut report = summary(state);
    if let Err(e) = result {
        report["error"] = json!(e.to_string());
    }
    report
}

/// Whether the server reports the batch as finished, so no further events will arrive.
pub fn is_finished(response: &BatchStatusResponse) -> bool {
    let status = response.status.trim().to_lowercase();
    matches!(status.as_str(), "cancelled" | "canceled")
        || status
            .parse::<UploadStatus>()
            .is_ok_and(UploadStatus::is_terminal)
}

/// Snapshot of a finished batch built from the status endpoint alone.
pub fn state_from_status(response: &BatchStatusResponse) -> BatchState {
    let mut state = BatchState::new(response.batch_id.clone(), items_from_status(response));
    state.status_label = Some(response.status.clone());
    if let Some(progress) = response.progress {
        state.progress = progress.clamp(0.0, 100.0);
    }
    match response.status.parse::<UploadStatus>() {
        Ok(UploadStatus::Complete) => state.status = BatchStatus::Complete,
        Ok(UploadStatus::Error) => state.fail("Reported failed by server"),
        _ if is_finished(response) => state.cancel(),
        _ => {}
    }
    state
}

/// Items for a batch this process did not submit, seeded from the status endpoint.
pub fn items_from_status(response: &BatchStatusResponse) -> Vec<UploadItem> {
    response
        .files
        .iter()
        .map(|ack| {
            let mut item =
                UploadItem::new(ack.id.clone(), 0, DEFAULT_CONTENT_TYPE).with_id(ack.id.clone());
            if let Some(status) = ack.upload_status() {
                item.transition(status);
            }
            item
        })
        .collect()
}
