//! Retry classification for REST calls.
//!
//! Connection errors and timeouts are always retried. Of the HTTP statuses,
//! only 429 and the gateway-ish 5xx family are; 4xx otherwise means the
//! request itself is wrong and retrying cannot help.

use reqwest::StatusCode;

/// Whether a REST response status warrants another attempt.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || matches!(
            status,
            StatusCode::INTERNAL_SERVER_ERROR
                | StatusCode::BAD_GATEWAY
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GATEWAY_TIMEOUT
        )
}

/// Whether a transport-level failure warrants another attempt.
pub fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout() || error.is_request()
}
