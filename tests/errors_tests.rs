use actix_web::http::StatusCode;
use smsrelay::api::services::relay::ErrorCode;
use smsrelay::errors::RelayError;
use smsrelay::utils::normalize_phone;

#[cfg(test)]
mod error_creation_tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let error = RelayError::validation("body is empty");

        assert!(matches!(error, RelayError::Validation(_)));
        assert!(error.to_string().contains("Validation Error"));
        assert!(error.to_string().contains("body is empty"));
    }

    #[test]
    fn test_consent_required_error() {
        let error = RelayError::consent_required("recipient opted out");

        assert!(matches!(error, RelayError::ConsentRequired(_)));
        assert_eq!(error.message(), "recipient opted out");
        assert_eq!(error.code(), "E004");
    }

    #[test]
    fn test_phone_error_conversion() {
        let error: RelayError = normalize_phone("555-0123", None).unwrap_err().into();
        assert!(matches!(error, RelayError::InvalidPhone(_)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error: RelayError = io.into();
        assert!(matches!(error, RelayError::FileOperation(_)));
    }
}

#[cfg(test)]
mod error_mapping_tests {
    use super::*;

    #[test]
    fn test_http_status_mapping() {
        let cases = [
            (RelayError::validation("x"), StatusCode::BAD_REQUEST),
            (RelayError::invalid_phone("x"), StatusCode::BAD_REQUEST),
            (RelayError::not_found("x"), StatusCode::NOT_FOUND),
            (RelayError::consent_required("x"), StatusCode::FORBIDDEN),
            (RelayError::quota_exceeded("x"), StatusCode::TOO_MANY_REQUESTS),
            (RelayError::provider("x"), StatusCode::BAD_GATEWAY),
            (
                RelayError::provider_config("x"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.http_status(), status, "{:?}", error);
        }
    }

    #[test]
    fn test_api_error_codes() {
        assert_eq!(
            ErrorCode::from(&RelayError::quota_exceeded("x")),
            ErrorCode::QuotaExceeded
        );
        assert_eq!(
            ErrorCode::from(&RelayError::provider("x")),
            ErrorCode::ProviderError
        );
        assert_eq!(
            ErrorCode::from(&RelayError::serialization("x")),
            ErrorCode::InternalServerError
        );
    }

    #[test]
    fn test_format_simple() {
        let error = RelayError::quota_exceeded("global send quota of 1 per minute exceeded");
        assert_eq!(
            error.format_simple(),
            "Send Quota Exceeded: global send quota of 1 per minute exceeded"
        );
    }
}
