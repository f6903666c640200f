//! Approval callback surface.
//!
//! Renders a small standalone HTML page for the human clicking the link in
//! the notification email. Status codes distinguish the verification
//! outcomes so monitors can tell an expired link from a tampered one.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use lockdown_core::approval::CallbackOutcome;
use lockdown_core::token::ApprovalQuery;

use super::AppState;

pub async fn handle_approve(
    State(core): State<AppState>,
    Query(query): Query<ApprovalQuery>,
) -> (StatusCode, Html<String>) {
    match core.approval.handle_callback(&query).await {
        CallbackOutcome::Confirmed {
            instance_id,
            instance_name,
        } => (
            StatusCode::OK,
            page(
                "Approval Confirmed",
                &format!("Instance {instance_name} ({instance_id}) is powering down. The containment lock has been released."),
                "#2e7d32",
            ),
        ),
        CallbackOutcome::Expired => (
            StatusCode::GONE,
            page(
                "Link Expired",
                "This approval link has expired. The instance remains contained; a new link must be issued.",
                "#ef6c00",
            ),
        ),
        CallbackOutcome::Unauthorized => (
            StatusCode::FORBIDDEN,
            page(
                "Invalid Link",
                "The signature on this approval link is not valid.",
                "#c62828",
            ),
        ),
        CallbackOutcome::Malformed(field) => (
            StatusCode::BAD_REQUEST,
            page(
                "Malformed Request",
                &format!("Missing or malformed parameter: {field}"),
                "#c62828",
            ),
        ),
        CallbackOutcome::StopFailed(detail) => (
            StatusCode::BAD_GATEWAY,
            page(
                "Power-Down Failed",
                &format!("The approval was verified but the power-down command failed: {detail}"),
                "#c62828",
            ),
        ),
    }
}

fn page(title: &str, message: &str, color: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>{title}</title></head>
<body style="font-family: sans-serif; margin: 40px auto; max-width: 600px;">
  <h1 style="color: {color};">{title}</h1>
  <p>{message}</p>
</body>
</html>"#
    ))
}
