//! Caller identity extraction.
//!
//! The gateway sits behind an authenticating edge proxy that injects
//! `X-User-Id` and `X-User-Email` after verifying the session. The handlers
//! receive a fully-formed [`Identity`] and never see raw credentials.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::core_types::Identity;

use super::types::ApiError;

const USER_ID_HEADER: &str = "x-user-id";
const USER_EMAIL_HEADER: &str = "x-user-email";

fn header_str<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, ApiError> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::unauthorized(format!("Missing {} header", name)))
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header_str(parts, USER_ID_HEADER)?
            .parse()
            .map_err(|_| ApiError::unauthorized("Invalid x-user-id header"))?;
        let email = header_str(parts, USER_EMAIL_HEADER)?.to_string();
        Ok(Identity::new(user_id, email))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(req: Request<()>) -> Result<Identity, ApiError> {
        let (mut parts, _) = req.into_parts();
        Identity::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_extracts_identity_from_headers() {
        let req = Request::builder()
            .header("x-user-id", "42")
            .header("x-user-email", "alice@tau.dev")
            .body(())
            .unwrap();
        let identity = extract(req).await.unwrap();
        assert_eq!(identity.user_id, 42);
        assert_eq!(identity.email, "alice@tau.dev");
    }

    #[tokio::test]
    async fn test_missing_or_bad_headers_rejected() {
        let req = Request::builder().body(()).unwrap();
        assert!(extract(req).await.is_err());

        let req = Request::builder()
            .header("x-user-id", "not-a-number")
            .header("x-user-email", "alice@tau.dev")
            .body(())
            .unwrap();
        assert!(extract(req).await.is_err());
    }
}
