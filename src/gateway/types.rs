//! API response envelope and error codes.
//!
//! Every response carries the same wrapper: `code` 0 on success, a stable
//! non-zero code on error, `data` only when `code == 0`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::flow::FlowError;

/// Unified API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }
}

/// Standard API error codes.
pub mod error_codes {
    pub const SUCCESS: i32 = 0;

    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;
    pub const INSUFFICIENT_BALANCE: i32 = 1002;
    pub const BELOW_MINIMUM: i32 = 1003;
    pub const OVER_TRANSFER_LIMIT: i32 = 1004;
    pub const SELF_TRANSFER: i32 = 1005;
    pub const INVALID_CODE: i32 = 1006;

    // Auth errors (2xxx)
    pub const MISSING_AUTH: i32 = 2001;
    pub const FORBIDDEN: i32 = 2003;

    // Resource errors (4xxx)
    pub const NOT_FOUND: i32 = 4001;
    pub const ALREADY_EXISTS: i32 = 4091;
    pub const ALREADY_RESOLVED: i32 = 4092;
    pub const EXPIRED: i32 = 4093;
    pub const TOO_MANY_ATTEMPTS: i32 = 4094;
    pub const ACCOUNT_FROZEN: i32 = 4095;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
}

/// Map a domain error code string to the numeric API code.
fn numeric_code(code: &str) -> i32 {
    use error_codes::*;
    match code {
        "INVALID_AMOUNT" | "INVALID_PARAMETER" | "SAME_ACCOUNT" => INVALID_PARAMETER,
        "INSUFFICIENT_BALANCE" => INSUFFICIENT_BALANCE,
        "BELOW_MINIMUM" => BELOW_MINIMUM,
        "OVER_TRANSFER_LIMIT" => OVER_TRANSFER_LIMIT,
        "SELF_TRANSFER" => SELF_TRANSFER,
        "INVALID_CODE" => INVALID_CODE,
        "FORBIDDEN" => FORBIDDEN,
        "RECIPIENT_NOT_FOUND" | "PENDING_NOT_FOUND" | "WALLET_NOT_FOUND"
        | "ACCOUNT_NOT_FOUND" | "ADDRESS_NOT_FOUND" | "CHALLENGE_NOT_FOUND" => NOT_FOUND,
        "WALLET_EXISTS" => ALREADY_EXISTS,
        "ALREADY_RESOLVED" | "CODE_ALREADY_USED" => ALREADY_RESOLVED,
        "TRANSFER_EXPIRED" | "CODE_EXPIRED" => EXPIRED,
        "TOO_MANY_ATTEMPTS" => TOO_MANY_ATTEMPTS,
        "ACCOUNT_FROZEN" => ACCOUNT_FROZEN,
        _ => INTERNAL_ERROR,
    }
}

/// API error: HTTP status plus the wrapped envelope.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub msg: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: i32, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            msg: msg.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error_codes::INVALID_PARAMETER, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, error_codes::MISSING_AUTH, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            error_codes::INTERNAL_ERROR,
            msg,
        )
    }

    pub fn into_err<T>(self) -> ApiResult<T> {
        Err(self)
    }
}

impl From<FlowError> for ApiError {
    fn from(e: FlowError) -> Self {
        let status =
            StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, numeric_code(e.code()), e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiResponse::<()> {
            code: self.code,
            msg: self.msg,
            data: None,
        });
        (self.status, body).into_response()
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Wrap a success payload in the standard envelope.
pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerError;
    use crate::otp::OtpError;

    #[test]
    fn test_flow_error_maps_status_and_code() {
        let err = ApiError::from(FlowError::Forbidden);
        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert_eq!(err.code, error_codes::FORBIDDEN);

        let err = ApiError::from(FlowError::Ledger(LedgerError::InsufficientFunds));
        assert_eq!(err.code, error_codes::INSUFFICIENT_BALANCE);

        let err = ApiError::from(FlowError::Otp(OtpError::TooManyAttempts));
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.code, error_codes::TOO_MANY_ATTEMPTS);
    }

    #[test]
    fn test_success_envelope_shape() {
        let json = serde_json::to_value(ApiResponse::success(7)).unwrap();
        assert_eq!(json["code"], 0);
        assert_eq!(json["msg"], "ok");
        assert_eq!(json["data"], 7);
    }

    #[test]
    fn test_error_envelope_omits_data() {
        let json = serde_json::to_value(ApiResponse::<()> {
            code: error_codes::NOT_FOUND,
            msg: "missing".to_string(),
            data: None,
        })
        .unwrap();
        assert!(json.get("data").is_none());
    }
}
