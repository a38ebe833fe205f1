//! Classification of transport errors into "the backend itself is down"
//! versus ordinary application errors.

use crate::error::ApiError;

/// Returns `true` when the error means the vpner backend process is
/// unreachable rather than an individual request having failed.
///
/// Network failures always qualify. HTTP errors qualify only for the gateway
/// class (502, 503, 504); 4xx and 500 are application errors.
pub fn is_backend_unavailable(error: &ApiError) -> bool {
    match error {
        ApiError::Network { .. } => true,
        ApiError::Http { status, .. } => matches!(status, 502..=504),
        ApiError::Unknown { .. } => false,
    }
}

/// Human readable diagnostic for a backend error. Display only.
pub fn describe_backend_error(error: &ApiError) -> String {
    match error {
        ApiError::Network { .. } => "Unable to connect to the vpner backend service".to_string(),
        ApiError::Http { status, .. } => match status {
            502 => "Bad Gateway - The vpner backend service may not be running".to_string(),
            503 => "Service Unavailable - The vpner backend is temporarily unavailable".to_string(),
            504 => "Gateway Timeout - The vpner backend is not responding".to_string(),
            other => format!("Server error ({})", other),
        },
        ApiError::Unknown { .. } => "Unknown connection error".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_failure_is_unavailable() {
        assert!(is_backend_unavailable(&ApiError::network(
            "error sending request: connection refused"
        )));
    }

    #[test]
    fn test_gateway_statuses_are_unavailable() {
        for status in [502, 503, 504] {
            assert!(
                is_backend_unavailable(&ApiError::http(status, "gateway")),
                "status {} should be unavailable",
                status
            );
        }
    }

    #[test]
    fn test_application_statuses_are_not_unavailable() {
        for status in [400, 401, 403, 404, 500, 501, 505] {
            assert!(
                !is_backend_unavailable(&ApiError::http(status, "app error")),
                "status {} should not be unavailable",
                status
            );
        }
    }

    #[test]
    fn test_unknown_is_not_unavailable() {
        assert!(!is_backend_unavailable(&ApiError::unknown("bad json")));
    }

    #[test]
    fn test_descriptions() {
        assert_eq!(
            describe_backend_error(&ApiError::network("refused")),
            "Unable to connect to the vpner backend service"
        );
        assert_eq!(
            describe_backend_error(&ApiError::http(502, "")),
            "Bad Gateway - The vpner backend service may not be running"
        );
        assert_eq!(
            describe_backend_error(&ApiError::http(503, "")),
            "Service Unavailable - The vpner backend is temporarily unavailable"
        );
        assert_eq!(
            describe_backend_error(&ApiError::http(504, "")),
            "Gateway Timeout - The vpner backend is not responding"
        );
        assert_eq!(
            describe_backend_error(&ApiError::http(404, "Not Found")),
            "Server error (404)"
        );
        assert_eq!(
            describe_backend_error(&ApiError::unknown("?")),
            "Unknown connection error"
        );
    }
}
