use axum::{extract::Request, http::Uri};
use tracing::{Span, info_span};

use crate::utils::security::mask_query_param;

/// Request span for the trace layer. The shared secret never reaches the logs.
pub fn make_log_span(request: &Request, secret_param: &str) -> Span {
    let (path, query) = request_target(request.uri(), secret_param);

    info_span!(
        "request",
        method = %request.method(),
        path = %path,
        query = query.as_deref().unwrap_or(""),
        version = ?request.version(),
    )
}

/// Path and masked query string; absolute URIs lose their scheme and authority.
fn request_target(uri: &Uri, secret_param: &str) -> (String, Option<String>) {
    let query = uri
        .query()
        .filter(|query| !query.is_empty())
        .map(|query| mask_query_param(&format!("?{query}"), secret_param))
        .map(|masked| masked.trim_start_matches('?').to_string());
    (uri.path().to_string(), query)
}
