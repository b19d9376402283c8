use super::SessionAdmission;
use crate::error::AppError;
use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

pub const SESSION_HEADER: &str = "x-session-id";

/// Paths that are never subject to admission
pub const EXEMPT_PATHS: &[&str] = &[
    "/",
    "/api/status",
    "/api/lessons",
    "/api/tts/voices",
    "/health",
    "/health/ready",
    "/favicon.ico",
];

/// Static asset prefixes that are never subject to admission
pub const EXEMPT_PREFIXES: &[&str] = &["/js/", "/css/", "/img/", "/api/lessons/"];

/// Endpoints that reach the speech backend
const GENERATION_PATHS: &[&str] = &["/api/tts", "/api/tts/batch", "/api/tts/check-cache"];

pub fn is_exempt(path: &str) -> bool {
    EXEMPT_PATHS.contains(&path) || EXEMPT_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

/// True for requests that must hold a session slot
pub fn requires_admission(method: &Method, path: &str) -> bool {
    let path = match path.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => trimmed,
        _ => path,
    };
    !is_exempt(path) && method == Method::POST && GENERATION_PATHS.contains(&path)
}

/// Admission gate for the generation endpoints.
///
/// Every other request passes straight through. A session whose requests
/// have all failed, or were abandoned by the client, gives its slot back once
/// the last of them ends.
pub async fn admission_middleware(
    State(admission): State<Arc<SessionAdmission>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !requires_admission(request.method(), request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let session_id = request
        .headers()
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(AppError::MissingSessionId)?
        .to_string();

    let ticket = admission.admit(&session_id).await?;
    let response = next.run(request).await;

    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        tracing::debug!(session_id = %session_id, status = %status.as_u16(), "Releasing slot after failed request");
        ticket.release();
    } else {
        ticket.keep();
    }

    Ok(response)
}
