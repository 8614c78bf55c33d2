use std::collections::HashMap;

use axum::{
    extract::{Query, Request, State},
    middleware::Next,
    response::Response,
};

use crate::{
    AppState,
    config::AuthConfig,
    error::{AppError, Result},
    utils::security::secrets_match,
};

/// Rejects the request with 401 unless it carries the configured shared secret,
/// either as a header or as a query parameter. No secret configured means open.
pub async fn require_shared_secret(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response> {
    let auth = &state.config.auth;
    let Some(secret) = auth.shared_secret.as_deref() else {
        return Ok(next.run(request).await);
    };

    if !presented_secret_matches(&request, auth, secret) {
        tracing::debug!(path = %request.uri().path(), "Shared secret missing or wrong");
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}

fn presented_secret_matches(request: &Request, auth: &AuthConfig, secret: &str) -> bool {
    let header_match = request
        .headers()
        .get_all(auth.header_name.as_str())
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| secrets_match(secret, value.trim()));
    if header_match {
        return true;
    }

    Query::<HashMap<String, String>>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(params)| params.get(&auth.query_name).cloned())
        .is_some_and(|value| secrets_match(secret, &value))
}
