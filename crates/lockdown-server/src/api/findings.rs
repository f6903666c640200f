//! Findings-batch ingestion endpoint.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use lockdown_models::FindingBatch;
use serde_json::json;

use super::AppState;

/// Accept a findings batch and run the containment pipeline synchronously.
/// The response summarizes what happened per instance; 202 because the
/// contained instances still await the human approval step.
pub async fn handle_findings(
    State(core): State<AppState>,
    payload: Result<Json<FindingBatch>, JsonRejection>,
) -> (StatusCode, Json<serde_json::Value>) {
    let Json(batch) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": rejection.body_text() })),
            );
        }
    };

    match core.dispatcher.handle_batch(batch).await {
        Ok(outcome) => {
            let failed: Vec<_> = outcome
                .failed
                .iter()
                .map(|(instance_id, reason)| json!({ "instance_id": instance_id, "reason": reason }))
                .collect();
            (
                StatusCode::ACCEPTED,
                Json(json!({
                    "contained": outcome.contained,
                    "skipped": outcome.skipped,
                    "failed": failed,
                    "resolved_findings": outcome.resolved_findings,
                })),
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "findings batch processing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}
